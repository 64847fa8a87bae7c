pub const MMBTU_PER_KWH: f64 = 0.003412;
pub const BTU_PER_MMBTU: f64 = 1_000_000.;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const HOURS_PER_YEAR: usize = 8_760;
pub const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub fn kwh_to_mmbtu(kwh: f64) -> f64 {
    kwh * MMBTU_PER_KWH
}

pub fn mmbtu_to_kwh(mmbtu: f64) -> f64 {
    mmbtu / MMBTU_PER_KWH
}

pub fn btu_to_mmbtu(btu: f64) -> f64 {
    btu / BTU_PER_MMBTU
}

/// Converts an energy amount in MMBTU into the physical units of a fuel (gallons, cords, ...),
/// given the Btu content of one unit of that fuel.
pub fn mmbtu_to_fuel_units(mmbtu: f64, btus_per_unit: f64) -> f64 {
    mmbtu * BTU_PER_MMBTU / btus_per_unit
}

pub fn fuel_units_to_mmbtu(units: f64, btus_per_unit: f64) -> f64 {
    units * btus_per_unit / BTU_PER_MMBTU
}
