use crate::core::energy_model::{model_building, simulate_hours};
use crate::core::units::HOURS_PER_YEAR;
use crate::input::{EndUse, Fuel, HeatPumpSource};
use crate::simulation_time::{ANNUAL_PERIOD, MONTH_NAMES};
use crate::tests::fixtures::{building, heat_pump, reference_data};
use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use rstest::*;

#[rstest]
#[case::air_source(HeatPumpSource::Air)]
#[case::ground_source(HeatPumpSource::Ground)]
fn should_keep_hourly_loads_within_heat_pump_limits(#[case] source_type: HeatPumpSource) {
    let mut heat_pump = heat_pump();
    if source_type != HeatPumpSource::Air {
        heat_pump.source_type = source_type;
        heat_pump.cop_32f = Some(3.2);
        heat_pump.max_out_32f = Some(20_000.0);
    }
    let mut building = building();
    building.heat_pump = Some(heat_pump);

    let hours = simulate_hours(&building, &reference_data()).unwrap();

    assert_eq!(hours.len(), HOURS_PER_YEAR);
    for hour in &hours {
        assert!(hour.conventional_load_mmbtu >= 0.0, "{hour:?}");
        assert!(hour.hp_load_mmbtu <= hour.hp_max_output_mmbtu + 1e-12, "{hour:?}");
        assert!((0.0..=1.0).contains(&hour.hp_capacity_used), "{hour:?}");
        if !hour.running {
            assert_eq!(hour.hp_load_mmbtu, 0.0);
            assert_eq!(hour.hp_kwh, 0.0);
        }
    }
    assert!(hours.iter().any(|hour| hour.hp_load_mmbtu > 0.0));
}

#[rstest]
fn should_sum_months_to_annual_totals() {
    let mut building = building();
    building.heat_pump = Some(heat_pump());
    building.ev_charging_miles_per_day = 15.0;
    building.solar_kw = 3.0;

    let results = model_building(&building, &reference_data()).unwrap();
    let months = &results.monthly_results;
    let annual = &results.annual_results;

    assert_eq!(
        months.iter().map(|m| m.period.as_str()).collect::<Vec<_>>(),
        MONTH_NAMES.to_vec()
    );
    assert_eq!(annual.period, ANNUAL_PERIOD);

    let sum = |field: fn(&crate::output::TimePeriodResults) -> f64| months.iter().map(field).sum::<f64>();
    assert_relative_eq!(sum(|m| m.hp_load_mmbtu), annual.hp_load_mmbtu, max_relative = 1e-9);
    assert_relative_eq!(sum(|m| m.hp_kwh), annual.hp_kwh, max_relative = 1e-9);
    assert_relative_eq!(
        sum(|m| m.conventional_load_mmbtu),
        annual.conventional_load_mmbtu,
        max_relative = 1e-9
    );
    assert_relative_eq!(sum(|m| m.fuel_total_cost), annual.fuel_total_cost, max_relative = 1e-9);
    assert_relative_eq!(sum(|m| m.co2_lbs), annual.co2_lbs, max_relative = 1e-9);
    assert_eq!(
        annual.elec_demand,
        months.iter().map(|m| m.elec_demand).fold(0.0, f64::max)
    );

    for (fuel, end_use, annual_use) in annual.fuel_use_mmbtu.iter() {
        let monthly_use = months
            .iter()
            .map(|m| m.fuel_use_mmbtu.get(fuel, end_use))
            .sum::<f64>();
        assert_relative_eq!(monthly_use, annual_use, epsilon = 1e-9, max_relative = 1e-9);
    }
    assert!(annual.fuel_use_mmbtu.get(Fuel::Electricity, EndUse::PvSolar) < 0.0);
    assert!(annual.fuel_use_mmbtu.get(Fuel::Electricity, EndUse::EvCharging) > 0.0);
    assert!(annual.fuel_use_mmbtu.get(Fuel::Propane, EndUse::Cooking) > 0.0);
}

#[rstest]
fn should_shift_heating_from_oil_to_electricity_with_heat_pump() {
    let reference = reference_data();
    let without = model_building(&building(), &reference).unwrap();
    let mut with_heat_pump = building();
    with_heat_pump.heat_pump = Some(heat_pump());
    let with = model_building(&with_heat_pump, &reference).unwrap();

    let oil = |results: &crate::output::DetailedModelResults| {
        results.annual_results.fuel_use_mmbtu.get(Fuel::Oil1, EndUse::SpaceHtg)
    };
    let elec = |results: &crate::output::DetailedModelResults| {
        results.annual_results.fuel_use_units.sum_key1()[&Fuel::Electricity]
    };

    assert!(oil(&with) < oil(&without));
    assert!(elec(&with) > elec(&without));
    assert_eq!(without.annual_results.hp_load_frac, Some(0.0));
    assert_eq!(without.annual_results.cop, None);
    let cop = with.annual_results.cop.unwrap();
    assert!(cop > 1.0 && cop < 5.0, "{cop}");
    // total heating load does not depend on who serves it
    assert_relative_eq!(
        with.annual_results.hp_load_mmbtu + with.annual_results.conventional_load_mmbtu,
        without.annual_results.conventional_load_mmbtu,
        max_relative = 1e-9
    );
    assert_eq!(with.design_heat_load, without.design_heat_load);
}
