/// Rolls hourly space heating records up into monthly fuel use, cost and emissions for all
/// end uses, and monthly results up into annual ones.
use crate::core::elec_cost::ElecCostCalc;
use crate::core::energy_model::HourlyRecord;
use crate::core::units::{
    kwh_to_mmbtu, mmbtu_to_fuel_units, mmbtu_to_kwh, DAYS_IN_MONTH, DAYS_PER_YEAR, HOURS_PER_DAY,
};
use crate::errors::InvalidInputError;
use crate::input::{BuildingDescription, EndUse, Fuel};
use crate::library::{City, FuelInfo, ReferenceData};
use crate::output::{FuelUse, TimePeriodResults};
use crate::simulation_time::{ANNUAL_PERIOD, MONTH_NAMES};
use indexmap::IndexMap;
use std::f64::consts::PI;

/// Ratio of average to peak electric demand used to estimate a month's peak from its use.
/// Chosen to reflect the heat pump's contribution to the peak.
const ELEC_LOAD_FACTOR: f64 = 0.35;

/// Annual MMBTU per occupant
const DRYING_MMBTU_ELEC: f64 = 0.86;
const DRYING_MMBTU_FUEL: f64 = 2.15;
const COOKING_MMBTU_ELEC: f64 = 0.64;
const COOKING_MMBTU_FUEL: f64 = 0.8;

/// Share of average daily solar production in each month, for a south-facing array tilted
/// at 30 degrees in Southeast Alaska.
const SOLAR_MONTHLY_PATTERN: [f64; 12] = [
    0.283, 0.624, 1.005, 1.521, 2.131, 1.738, 1.451, 1.366, 0.753, 0.500, 0.386, 0.220,
];

/// Monthly use (January - December) that varies sinusoidally around `avg_use_per_day`, with
/// the extremes in December and June. A positive `frac_variation` puts the highest use in
/// December.
pub fn seasonal_use(avg_use_per_day: f64, frac_variation: f64) -> [f64; 12] {
    std::array::from_fn(|idx| {
        let month = idx + 1;
        let radians = (month % 12) as f64 / 12.0 * 2.0 * PI;
        let use_per_day = avg_use_per_day * (1.0 + frac_variation * radians.cos());
        use_per_day * DAYS_IN_MONTH[idx] as f64
    })
}

pub fn monthly_solar(avg_production_per_day: f64) -> [f64; 12] {
    std::array::from_fn(|idx| {
        SOLAR_MONTHLY_PATTERN[idx] * avg_production_per_day * DAYS_IN_MONTH[idx] as f64
    })
}

/// Space heating totals for a period.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct HeatTotals {
    hp_load_mmbtu: f64,
    conventional_load_mmbtu: f64,
    hp_kwh: f64,
    hp_capacity_used_max: f64,
}

impl HeatTotals {
    fn add(self, record: &HourlyRecord) -> Self {
        Self {
            hp_load_mmbtu: self.hp_load_mmbtu + record.hp_load_mmbtu,
            conventional_load_mmbtu: self.conventional_load_mmbtu + record.conventional_load_mmbtu,
            hp_kwh: self.hp_kwh + record.hp_kwh,
            hp_capacity_used_max: self.hp_capacity_used_max.max(record.hp_capacity_used),
        }
    }
}

/// A non-space-heating end use with a constant daily amount of fuel.
#[derive(Clone, Copy, Debug, PartialEq)]
struct DailyEndUse {
    fuel: Fuel,
    end_use: EndUse,
    mmbtu_per_day: f64,
}

/// Everything about a building that stays the same from month to month.
pub struct Aggregator<'a> {
    building: &'a BuildingDescription,
    elec_cost: ElecCostCalc,
    /// $/unit including sales tax, for every non-electric fuel used
    fuel_prices: IndexMap<Fuel, f64>,
    fuels: IndexMap<Fuel, &'a FuelInfo>,
    daily_end_uses: Vec<DailyEndUse>,
    misc_elec_kwh: [f64; 12],
    ev_kwh: [f64; 12],
    solar_kwh: [f64; 12],
}

impl<'a> Aggregator<'a> {
    pub fn new(
        building: &'a BuildingDescription,
        city: &'a City,
        reference: &'a ReferenceData,
    ) -> Result<Self, InvalidInputError> {
        let prices = &building.energy_prices;
        let sales_tax = prices.sales_tax_override.unwrap_or_else(|| city.sales_tax());
        let utility = reference.utility(prices.utility_id)?;
        let elec_cost = ElecCostCalc::for_building(utility, prices, sales_tax);

        let mut fuels = IndexMap::new();
        fuels.insert(Fuel::Electricity, reference.fuel(Fuel::Electricity)?);
        for (field, fuel) in fuel_fields(building) {
            let info = reference
                .fuel(fuel)
                .map_err(|_| InvalidInputError::unknown(field, "fuel", fuel))?;
            fuels.insert(fuel, info);
        }

        let mut fuel_prices = IndexMap::new();
        for fuel in building.fuels_used().into_iter().filter(|f| !f.is_electricity()) {
            let price = match prices.fuel_price_overrides.get(&fuel) {
                Some(price) => *price,
                None => reference.fuel_price(fuel, city.id)?.ok_or_else(|| {
                    InvalidInputError::MissingFuelPrice {
                        fuel,
                        city: city.name.clone(),
                    }
                })?,
            };
            fuel_prices.insert(fuel, price * (1.0 + sales_tax));
        }

        Ok(Self {
            building,
            elec_cost,
            fuel_prices,
            fuels,
            daily_end_uses: daily_end_uses(building),
            misc_elec_kwh: seasonal_use(building.misc_elec_kwh_per_day, building.misc_elec_seasonality),
            ev_kwh: seasonal_use(ev_kwh_per_day(building), building.ev_seasonality),
            solar_kwh: monthly_solar(
                building.solar_kw * building.solar_kwh_per_kw / DAYS_PER_YEAR as f64,
            ),
        })
    }

    /// Summarizes the hours of one month (1 = January).
    pub fn summarize_month(&self, month: u8, hours: &[HourlyRecord]) -> TimePeriodResults {
        let idx = (month.clamp(1, 12) - 1) as usize;
        let days = DAYS_IN_MONTH[idx] as f64;
        let heat = hours
            .iter()
            .filter(|record| record.month == month)
            .fold(HeatTotals::default(), HeatTotals::add);

        let mut fuel_use_mmbtu = FuelUse::new();
        let mut fuel_use_units = FuelUse::new();
        let mut add_use = |fuel: Fuel, end_use: EndUse, mmbtu: f64| {
            fuel_use_mmbtu.add(fuel, end_use, mmbtu);
            fuel_use_units.add(fuel, end_use, self.fuel_units(fuel, mmbtu));
        };

        add_use(Fuel::Electricity, EndUse::SpaceHtg, kwh_to_mmbtu(heat.hp_kwh));

        let conventional = &self.building.conventional_heat;
        let primary_frac = conventional.primary.frac_load_served;
        let secondary_frac = conventional.secondary.as_ref().map_or(0.0, |s| s.frac_load_served);
        let conventional_load_mmbtu_by_sys = (
            heat.conventional_load_mmbtu * primary_frac,
            heat.conventional_load_mmbtu * secondary_frac,
        );
        for (system, load_served) in conventional.systems().zip([
            conventional_load_mmbtu_by_sys.0,
            conventional_load_mmbtu_by_sys.1,
        ]) {
            let aux_kwh = load_served * system.aux_elec_use;
            let fuel_mmbtu = (load_served - kwh_to_mmbtu(aux_kwh)) / system.heating_effic;
            add_use(system.heat_fuel_id, EndUse::SpaceHtg, fuel_mmbtu);
            add_use(Fuel::Electricity, EndUse::SpaceHtg, kwh_to_mmbtu(aux_kwh));
        }

        for daily in &self.daily_end_uses {
            add_use(daily.fuel, daily.end_use, daily.mmbtu_per_day * days);
        }
        add_use(Fuel::Electricity, EndUse::MiscElec, kwh_to_mmbtu(self.misc_elec_kwh[idx]));
        add_use(Fuel::Electricity, EndUse::EvCharging, kwh_to_mmbtu(self.ev_kwh[idx]));
        add_use(Fuel::Electricity, EndUse::PvSolar, -kwh_to_mmbtu(self.solar_kwh[idx]));

        let units_by_fuel = fuel_use_units.sum_key1();
        let elec_kwh = units_by_fuel.get(&Fuel::Electricity).copied().unwrap_or(0.0);
        let elec_demand = elec_kwh.max(0.0) / days / HOURS_PER_DAY as f64 / ELEC_LOAD_FACTOR;

        let fuel_cost = units_by_fuel
            .iter()
            .map(|(fuel, units)| {
                let cost = if fuel.is_electricity() {
                    self.elec_cost.monthly_cost(*units, elec_demand)
                } else {
                    units * self.fuel_prices.get(fuel).copied().unwrap_or(0.0)
                };
                (*fuel, cost)
            })
            .collect::<IndexMap<_, _>>();
        let fuel_total_cost = fuel_cost.values().sum();

        let co2_lbs = fuel_use_mmbtu
            .sum_key1()
            .iter()
            .map(|(fuel, mmbtu)| {
                if fuel.is_electricity() {
                    mmbtu_to_kwh(*mmbtu) * self.elec_cost.co2_lbs_per_kwh()
                } else {
                    mmbtu * self.fuels.get(fuel).and_then(|info| info.co2).unwrap_or(0.0)
                }
            })
            .sum();

        TimePeriodResults {
            period: MONTH_NAMES[idx].to_string(),
            hp_load_mmbtu: heat.hp_load_mmbtu,
            hp_load_frac: hp_load_frac(heat.hp_load_mmbtu, heat.conventional_load_mmbtu),
            hp_kwh: heat.hp_kwh,
            hp_capacity_used_max: heat.hp_capacity_used_max,
            cop: cop(heat.hp_load_mmbtu, heat.hp_kwh),
            conventional_load_mmbtu: heat.conventional_load_mmbtu,
            conventional_load_mmbtu_by_sys,
            fuel_use_mmbtu,
            elec_demand,
            fuel_use_units,
            fuel_cost,
            fuel_total_cost,
            co2_lbs,
        }
    }

    fn fuel_units(&self, fuel: Fuel, mmbtu: f64) -> f64 {
        if fuel.is_electricity() {
            return mmbtu_to_kwh(mmbtu);
        }
        match self.fuels.get(&fuel) {
            Some(info) => mmbtu_to_fuel_units(mmbtu, info.btus),
            None => 0.0,
        }
    }
}

fn fuel_fields(building: &BuildingDescription) -> Vec<(&'static str, Fuel)> {
    let conventional = &building.conventional_heat;
    [
        ("conventional_heat.primary.heat_fuel_id", Some(conventional.primary.heat_fuel_id)),
        (
            "conventional_heat.secondary.heat_fuel_id",
            conventional.secondary.as_ref().map(|s| s.heat_fuel_id),
        ),
        ("dhw_fuel_id", building.dhw_fuel_id),
        ("clothes_drying_fuel_id", building.clothes_drying_fuel_id),
        ("cooking_fuel_id", building.cooking_fuel_id),
    ]
    .into_iter()
    .filter_map(|(field, fuel)| fuel.map(|fuel| (field, fuel)))
    .collect()
}

fn daily_end_uses(building: &BuildingDescription) -> Vec<DailyEndUse> {
    let per_occupant_day = |annual_mmbtu: f64| annual_mmbtu * building.occupant_count / DAYS_PER_YEAR as f64;
    let mut uses = vec![];

    if let Some(fuel) = building.dhw_fuel_id {
        uses.push(DailyEndUse {
            fuel,
            end_use: EndUse::Dhw,
            mmbtu_per_day: building.dhw_load_mmbtu_per_day() / building.dhw_ef,
        });
    }
    if let Some(fuel) = building.clothes_drying_fuel_id {
        let annual = if fuel.is_electricity() {
            DRYING_MMBTU_ELEC
        } else {
            DRYING_MMBTU_FUEL
        };
        uses.push(DailyEndUse {
            fuel,
            end_use: EndUse::Drying,
            mmbtu_per_day: per_occupant_day(annual),
        });
    }
    if let Some(fuel) = building.cooking_fuel_id {
        let annual = if fuel.is_electricity() {
            COOKING_MMBTU_ELEC
        } else {
            COOKING_MMBTU_FUEL
        };
        uses.push(DailyEndUse {
            fuel,
            end_use: EndUse::Cooking,
            mmbtu_per_day: per_occupant_day(annual),
        });
    }

    uses
}

fn ev_kwh_per_day(building: &BuildingDescription) -> f64 {
    if building.ev_charging_miles_per_day > 0.0 && building.ev_miles_per_kwh > 0.0 {
        building.ev_charging_miles_per_day / building.ev_miles_per_kwh
    } else {
        0.0
    }
}

fn hp_load_frac(hp_load_mmbtu: f64, conventional_load_mmbtu: f64) -> Option<f64> {
    let total = hp_load_mmbtu + conventional_load_mmbtu;
    (total > 0.0).then(|| hp_load_mmbtu / total)
}

fn cop(hp_load_mmbtu: f64, hp_kwh: f64) -> Option<f64> {
    (hp_kwh > 0.0).then(|| hp_load_mmbtu / kwh_to_mmbtu(hp_kwh))
}

/// Combines the twelve monthly results: energy, cost and emissions are summed in month
/// order, and peaks are the largest monthly value.
pub fn annual_results(monthly: &[TimePeriodResults]) -> TimePeriodResults {
    let sum = |value: fn(&TimePeriodResults) -> f64| monthly.iter().map(value).sum::<f64>();
    let max = |value: fn(&TimePeriodResults) -> f64| monthly.iter().map(value).fold(0.0, f64::max);

    let hp_load_mmbtu = sum(|m| m.hp_load_mmbtu);
    let hp_kwh = sum(|m| m.hp_kwh);
    let conventional_load_mmbtu = sum(|m| m.conventional_load_mmbtu);

    let mut fuel_use_mmbtu = FuelUse::new();
    let mut fuel_use_units = FuelUse::new();
    let mut fuel_cost: IndexMap<Fuel, f64> = IndexMap::new();
    for month in monthly {
        fuel_use_mmbtu.merge(&month.fuel_use_mmbtu);
        fuel_use_units.merge(&month.fuel_use_units);
        for (fuel, cost) in &month.fuel_cost {
            *fuel_cost.entry(*fuel).or_insert(0.0) += cost;
        }
    }

    TimePeriodResults {
        period: ANNUAL_PERIOD.to_string(),
        hp_load_mmbtu,
        hp_load_frac: hp_load_frac(hp_load_mmbtu, conventional_load_mmbtu),
        hp_kwh,
        hp_capacity_used_max: max(|m| m.hp_capacity_used_max),
        cop: cop(hp_load_mmbtu, hp_kwh),
        conventional_load_mmbtu,
        conventional_load_mmbtu_by_sys: (
            sum(|m| m.conventional_load_mmbtu_by_sys.0),
            sum(|m| m.conventional_load_mmbtu_by_sys.1),
        ),
        fuel_use_mmbtu,
        elec_demand: max(|m| m.elec_demand),
        fuel_use_units,
        fuel_cost,
        fuel_total_cost: sum(|m| m.fuel_total_cost),
        co2_lbs: sum(|m| m.co2_lbs),
    }
}
