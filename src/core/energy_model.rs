/// Hour-by-hour space heating simulation of a home, optionally with a heat pump taking
/// part of the load, and the entry point that turns it into monthly and annual results.
use crate::core::aggregator::{annual_results, Aggregator};
use crate::core::heat_pump_performance::{performance_curve, PerformanceCurve};
use crate::core::units::{btu_to_mmbtu, mmbtu_to_kwh, HOURS_PER_YEAR};
use crate::errors::InvalidInputError;
use crate::input::{BuildingDescription, HeatPump, HeatPumpSource};
use crate::library::ReferenceData;
use crate::output::DetailedModelResults;
use crate::read_weather_file::{WeatherHour, WeatherSeries};
use crate::simulation_time::MONTH_NAMES;
use crate::statistics::quantile;
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;

pub const GARAGE_HEATING_SETPOINT: f64 = 55.0;

/// Ground temperature is this much warmer than the average air temperature, deg F
const GROUND_AIR_DELTA_T: f64 = 3.0;

/// ft2 of garage for 0 - 4 stalls
const GARAGE_AREAS: [f64; 5] = [0.0, 14.0 * 22.0, 22.0 * 22.0, 36.0 * 25.0, 48.0 * 28.0];

/// Garages leak more air than the main home.
const GARAGE_UA_MULT: f64 = 1.1;

/// Internal and solar gains at 0.19 Btu/hr/F/ft2 lower the balance point this much, deg F
const HOME_GAINS_DELTA_T: f64 = 8.0;
const GARAGE_GAINS_DELTA_T: f64 = 4.0;
const GAINS_REFERENCE_UA_PER_FT2: f64 = 0.19;

/// A day counts as too cold for the heat pump when this quantile of its hourly temperatures
/// is at or below the low temperature cutoff.
const RUNNING_DAY_QUANTILE: f64 = 0.2;

/// Thermal resistance between the main space and adjacent rooms, per ft2
const ADJACENT_R_DOORS_OPEN: f64 = 0.424;
const ADJACENT_R_DOORS_CLOSED: f64 = 1.42;

/// The space heating outcome of one hour of the year.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HourlyRecord {
    /// 1 = January
    pub month: u8,
    pub db_temp: f64,
    /// Whether the heat pump was available to run
    pub running: bool,
    pub hp_load_mmbtu: f64,
    pub conventional_load_mmbtu: f64,
    /// Heat the heat pump could have delivered in the hour
    pub hp_max_output_mmbtu: f64,
    /// Fraction of the heat pump capacity used, 0 - 1.0
    pub hp_capacity_used: f64,
    pub hp_kwh: f64,
}

/// UA values and balance points of the home and its garage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct BuildingShell {
    /// Btu/hour/deg F
    ua_home: f64,
    ua_garage: f64,
    balance_point_home: f64,
    balance_point_garage: f64,
    /// Btu/hour removed from each space by a heat pump water heater
    hpwh_home: f64,
    hpwh_garage: f64,
    indoor_heat_setpoint: f64,
}

impl BuildingShell {
    pub(crate) fn new(building: &BuildingDescription) -> Self {
        let garage_area = GARAGE_AREAS
            .get(building.garage_stall_count as usize)
            .copied()
            .unwrap_or(0.0);
        let gains_mult = GAINS_REFERENCE_UA_PER_FT2 / building.ua_per_ft2;
        let (hpwh_home, hpwh_garage) = building.hpwh_space_loads();

        Self {
            ua_home: building.ua_per_ft2 * building.bldg_floor_area,
            ua_garage: building.ua_per_ft2 * GARAGE_UA_MULT * garage_area,
            balance_point_home: building.indoor_heat_setpoint - HOME_GAINS_DELTA_T * gains_mult,
            balance_point_garage: GARAGE_HEATING_SETPOINT - GARAGE_GAINS_DELTA_T * gains_mult,
            hpwh_home,
            hpwh_garage,
            indoor_heat_setpoint: building.indoor_heat_setpoint,
        }
    }

    /// Heating loads of the (main home, garage) at an outdoor temperature, Btu/hour
    pub(crate) fn loads_at(&self, outdoor_temp: f64) -> (f64, f64) {
        let home = (self.balance_point_home - outdoor_temp).max(0.0) * self.ua_home + self.hpwh_home;
        let garage =
            (self.balance_point_garage - outdoor_temp).max(0.0) * self.ua_garage + self.hpwh_garage;
        (home, garage)
    }

    /// Btu/hour at the design temperature, ignoring internal gains
    pub(crate) fn design_heat_load(&self, design_temp: f64) -> f64 {
        self.ua_home * (self.indoor_heat_setpoint - design_temp)
            + self.ua_garage * (GARAGE_HEATING_SETPOINT - design_temp)
    }
}

/// Degrees F that rooms next to the heated main space run cooler than it when they get no
/// heat of their own.
pub fn temp_depression(ua_per_ft2: f64, balance_point: f64, outdoor_temp: f64, doors_open: bool) -> f64 {
    let r_to_adjacent = if doors_open {
        ADJACENT_R_DOORS_OPEN
    } else {
        ADJACENT_R_DOORS_CLOSED
    };
    (balance_point - outdoor_temp) * r_to_adjacent / (r_to_adjacent + 1.0 / ua_per_ft2)
}

struct InstalledHeatPump<'a> {
    heat_pump: &'a HeatPump,
    curve: PerformanceCurve,
    /// Keyed on day of year
    running_days: HashMap<u16, bool>,
}

impl<'a> InstalledHeatPump<'a> {
    fn new(
        heat_pump: &'a HeatPump,
        building: &BuildingDescription,
        weather: &WeatherSeries,
    ) -> Result<Self, InvalidInputError> {
        let ground_temp = weather.mean_temp() + GROUND_AIR_DELTA_T;
        let curve = performance_curve(heat_pump, building.indoor_heat_setpoint, ground_temp)?;
        if matches!(heat_pump.source_type, HeatPumpSource::Ground | HeatPumpSource::Water)
            && curve.cop_at(ground_temp) <= 0.0
        {
            return Err(InvalidInputError::field(
                "heat_pump.cop_32f",
                format!("ground temperature of {ground_temp:.1} F is too cold for this heat pump"),
            ));
        }

        let running_days = weather
            .hours()
            .iter()
            .into_group_map_by(|hour| hour.day_of_year)
            .into_iter()
            .map(|(day, hours)| {
                let running = match heat_pump.low_temp_cutoff {
                    Some(cutoff) => {
                        let temps = hours.iter().map(|hour| hour.db_temp).collect::<Vec<_>>();
                        quantile(&temps, RUNNING_DAY_QUANTILE) > cutoff
                    }
                    None => true,
                };
                (day, running)
            })
            .collect();

        Ok(Self {
            heat_pump,
            curve,
            running_days,
        })
    }

    fn is_running(&self, hour: &WeatherHour) -> bool {
        !self.heat_pump.is_off_in_month(hour.month)
            && self.running_days.get(&hour.day_of_year).copied().unwrap_or(false)
    }
}

/// Splits each hour's heating load between the heat pump and the conventional systems.
pub struct Simulator<'a> {
    building: &'a BuildingDescription,
    shell: BuildingShell,
    heat_pump: Option<InstalledHeatPump<'a>>,
}

impl<'a> Simulator<'a> {
    pub fn new(
        building: &'a BuildingDescription,
        weather: &WeatherSeries,
    ) -> Result<Self, InvalidInputError> {
        let heat_pump = building
            .heat_pump
            .as_ref()
            .map(|heat_pump| InstalledHeatPump::new(heat_pump, building, weather))
            .transpose()?;

        Ok(Self {
            building,
            shell: BuildingShell::new(building),
            heat_pump,
        })
    }

    /// One record per weather hour, in order.
    pub fn simulate(&self, weather: &WeatherSeries) -> Vec<HourlyRecord> {
        weather
            .hours()
            .iter()
            .fold(Vec::with_capacity(HOURS_PER_YEAR), |mut records, hour| {
                records.push(self.simulate_hour(hour));
                records
            })
    }

    fn simulate_hour(&self, hour: &WeatherHour) -> HourlyRecord {
        let (home_load, garage_load) = self.shell.loads_at(hour.db_temp);
        let total_load = home_load + garage_load;

        let conventional_only = HourlyRecord {
            month: hour.month,
            db_temp: hour.db_temp,
            running: false,
            hp_load_mmbtu: 0.0,
            conventional_load_mmbtu: btu_to_mmbtu(total_load),
            hp_max_output_mmbtu: 0.0,
            hp_capacity_used: 0.0,
            hp_kwh: 0.0,
        };
        let Some(installed) = self.heat_pump.as_ref() else {
            return conventional_only;
        };
        let max_output = installed.curve.max_output_at(hour.db_temp).max(0.0);
        if !installed.is_running(hour) {
            return HourlyRecord {
                hp_max_output_mmbtu: btu_to_mmbtu(max_output),
                ..conventional_only
            };
        }

        let heat_pump = installed.heat_pump;
        let mut hp_load = home_load * heat_pump.frac_exposed_to_hp;
        if heat_pump.serves_garage {
            hp_load += garage_load;
        }
        let depression = temp_depression(
            self.building.ua_per_ft2,
            self.shell.balance_point_home,
            hour.db_temp,
            heat_pump.doors_open_to_adjacent,
        );
        if depression <= heat_pump.bedroom_temp_tolerance.max_depression() {
            hp_load += home_load * heat_pump.frac_adjacent_to_hp;
        }
        let hp_load = hp_load.min(max_output);

        let hp_capacity_used = if max_output > 0.0 {
            hp_load / max_output
        } else {
            0.0
        };
        let cop = installed.curve.cop_at(hour.db_temp);
        let hp_load_mmbtu = btu_to_mmbtu(hp_load);

        HourlyRecord {
            month: hour.month,
            db_temp: hour.db_temp,
            running: true,
            hp_load_mmbtu,
            conventional_load_mmbtu: btu_to_mmbtu((total_load - hp_load).max(0.0)),
            hp_max_output_mmbtu: btu_to_mmbtu(max_output),
            hp_capacity_used,
            hp_kwh: if cop > 0.0 {
                mmbtu_to_kwh(hp_load_mmbtu) / cop
            } else {
                0.0
            },
        }
    }
}

/// Simulates a year of the building's energy use, returning the hourly records.
pub fn simulate_hours(
    building: &BuildingDescription,
    reference: &ReferenceData,
) -> Result<Vec<HourlyRecord>, InvalidInputError> {
    building.validate()?;
    let city = reference.city(building.city_id)?;
    let weather = reference.weather(city.tmy_id)?;

    Ok(Simulator::new(building, &weather)?.simulate(&weather))
}

/// Models a year of the building's energy use and costs.
pub fn model_building(
    building: &BuildingDescription,
    reference: &ReferenceData,
) -> Result<DetailedModelResults, InvalidInputError> {
    building.validate()?;
    let city = reference.city(building.city_id)?;
    let weather = reference.weather(city.tmy_id)?;

    let hours = Simulator::new(building, &weather)?.simulate(&weather);

    let aggregator = Aggregator::new(building, city, reference)?;
    let monthly_results = (1..=MONTH_NAMES.len() as u8)
        .map(|month| aggregator.summarize_month(month, &hours))
        .collect::<Vec<_>>();
    let annual_results = annual_results(&monthly_results);

    let design_heat_temp = weather.site().heating_design_temp;
    let design_heat_load = BuildingShell::new(building).design_heat_load(design_heat_temp);

    Ok(DetailedModelResults {
        monthly_results,
        annual_results,
        design_heat_temp,
        design_heat_load,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{
        ConventionalHeat, ConventionalHeatingSystem, EnergyPrices, Fuel, HspfType,
        TemperatureTolerance,
    };
    use crate::read_weather_file::WeatherSite;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn building(heat_pump: Option<HeatPump>) -> BuildingDescription {
        BuildingDescription {
            city_id: 1,
            energy_prices: EnergyPrices::new(1),
            conventional_heat: ConventionalHeat {
                primary: ConventionalHeatingSystem {
                    heat_fuel_id: Fuel::Oil1,
                    heating_effic: 0.8,
                    aux_elec_use: 3.0,
                    frac_load_served: 1.0,
                },
                secondary: None,
            },
            heat_pump,
            building_type: Default::default(),
            garage_stall_count: 0,
            bldg_floor_area: 1000.0,
            ua_per_ft2: 0.19,
            occupant_count: 3.0,
            indoor_heat_setpoint: 70.0,
            dhw_fuel_id: None,
            dhw_ef: 0.62,
            dhw_hpwh_source: Default::default(),
            clothes_drying_fuel_id: None,
            cooking_fuel_id: None,
            misc_elec_kwh_per_day: 10.0,
            misc_elec_seasonality: 0.0,
            ev_charging_miles_per_day: 0.0,
            ev_miles_per_kwh: 3.0,
            ev_seasonality: 0.0,
            solar_kw: 0.0,
            solar_kwh_per_kw: 650.0,
        }
    }

    #[fixture]
    fn heat_pump() -> HeatPump {
        HeatPump {
            source_type: HeatPumpSource::Air,
            hspf_type: HspfType::Hspf,
            hspf: Some(11.33),
            max_out_5f: Some(11_000.0),
            cop_32f: None,
            max_out_32f: None,
            low_temp_cutoff: Some(5.0),
            off_months: vec![],
            frac_exposed_to_hp: 0.5,
            frac_adjacent_to_hp: 0.3,
            doors_open_to_adjacent: true,
            bedroom_temp_tolerance: TemperatureTolerance::Med,
            serves_garage: false,
        }
    }

    fn weather(temp: impl Fn(usize) -> f64) -> WeatherSeries {
        let site = WeatherSite {
            tmy_id: 7,
            city: "Testville".to_string(),
            db_temp_avg: 30.0,
            heating_design_temp: -10.0,
        };
        let temps = (0..HOURS_PER_YEAR).map(temp).collect::<Vec<_>>();
        WeatherSeries::from_temperatures(site, &temps).unwrap()
    }

    #[test]
    fn should_lower_balance_point_with_gains() {
        let shell = BuildingShell::new(&building(None));
        // 62 F balance point, 190 Btu/hr/F
        let (home, garage) = shell.loads_at(32.0);
        assert_relative_eq!(home, 30.0 * 190.0, max_relative = 1e-12);
        assert_eq!(garage, 0.0);
        assert_eq!(shell.loads_at(65.0), (0.0, 0.0));
    }

    #[test]
    fn should_size_garage_by_stalls() {
        let mut with_garage = building(None);
        with_garage.garage_stall_count = 2;
        let shell = BuildingShell::new(&with_garage);
        let (_, garage) = shell.loads_at(41.0);
        // 51 F garage balance point
        assert_relative_eq!(garage, 10.0 * 0.19 * 1.1 * 484.0, max_relative = 1e-12);
        assert_relative_eq!(
            shell.design_heat_load(-10.0),
            190.0 * 80.0 + 0.19 * 1.1 * 484.0 * 65.0,
            max_relative = 1e-12
        );
    }

    #[rstest]
    #[case(true, 0.424)]
    #[case(false, 1.42)]
    fn should_depress_adjacent_room_temperature(#[case] doors_open: bool, #[case] r: f64) {
        let depression = temp_depression(0.19, 62.0, 12.0, doors_open);
        assert_relative_eq!(depression, 50.0 * r / (r + 1.0 / 0.19), max_relative = 1e-12);
    }

    #[test]
    fn should_send_all_load_to_conventional_without_heat_pump() {
        let building = building(None);
        let weather = weather(|idx| (idx % 24) as f64);
        let records = Simulator::new(&building, &weather).unwrap().simulate(&weather);

        assert_eq!(records.len(), HOURS_PER_YEAR);
        assert!(records.iter().all(|r| r.hp_load_mmbtu == 0.0 && r.hp_kwh == 0.0 && !r.running));
        assert_relative_eq!(records[0].conventional_load_mmbtu, 62.0 * 190.0 / 1e6, max_relative = 1e-12);
    }

    #[rstest]
    fn should_stop_heat_pump_on_cold_days(heat_pump: HeatPump) {
        let building = building(Some(heat_pump));
        // first 10 days at -20 F, the rest at 30 F
        let weather = weather(|idx| if idx < 240 { -20.0 } else { 30.0 });
        let records = Simulator::new(&building, &weather).unwrap().simulate(&weather);

        assert!(!records[100].running);
        assert_eq!(records[100].hp_load_mmbtu, 0.0);
        assert!(records[300].running);
        assert!(records[300].hp_load_mmbtu > 0.0);
    }

    #[rstest]
    #[case(4.5, true)]
    #[case(4.7, false)]
    fn should_run_when_daily_20th_percentile_is_above_cutoff(
        mut heat_pump: HeatPump,
        #[case] cutoff: f64,
        #[case] running: bool,
    ) {
        heat_pump.low_temp_cutoff = Some(cutoff);
        let building = building(Some(heat_pump));
        // each day runs 0 F - 23 F, a 20th percentile of 4.6 F
        let weather = weather(|idx| (idx % 24) as f64);
        let records = Simulator::new(&building, &weather).unwrap().simulate(&weather);

        assert!(records.iter().all(|r| r.running == running));
    }

    #[rstest]
    fn should_stop_heat_pump_in_off_months(mut heat_pump: HeatPump) {
        heat_pump.off_months = vec![1];
        let building = building(Some(heat_pump));
        let weather = weather(|_| 30.0);
        let records = Simulator::new(&building, &weather).unwrap().simulate(&weather);

        assert!(records.iter().filter(|r| r.month == 1).all(|r| !r.running));
        assert!(records.iter().filter(|r| r.month == 2).all(|r| r.running));
    }

    #[rstest]
    fn should_serve_adjacent_rooms_only_within_tolerance(mut heat_pump: HeatPump) {
        heat_pump.max_out_5f = Some(1e9);
        heat_pump.low_temp_cutoff = None;
        let building = building(Some(heat_pump));
        // 62 F balance point: depression is ~2.4 F at 30 F and ~6.1 F at -20 F
        let weather = weather(|idx| if idx < 24 { -20.0 } else { 30.0 });
        let records = Simulator::new(&building, &weather).unwrap().simulate(&weather);

        let mild = records[100];
        assert_relative_eq!(
            mild.hp_load_mmbtu,
            0.8 * 32.0 * 190.0 / 1e6,
            max_relative = 1e-12
        );
        let cold = records[0];
        assert_relative_eq!(
            cold.hp_load_mmbtu,
            0.5 * 82.0 * 190.0 / 1e6,
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn should_limit_heat_pump_to_capacity(mut heat_pump: HeatPump) {
        heat_pump.frac_exposed_to_hp = 1.0;
        heat_pump.frac_adjacent_to_hp = 0.0;
        heat_pump.max_out_5f = Some(2_000.0);
        let building = building(Some(heat_pump));
        let weather = weather(|idx| 10.0 + (idx % 24) as f64);
        let records = Simulator::new(&building, &weather).unwrap().simulate(&weather);

        for record in &records {
            assert!(record.hp_load_mmbtu <= record.hp_max_output_mmbtu * (1.0 + 1e-12));
            assert!((0.0..=1.0 + 1e-12).contains(&record.hp_capacity_used));
            assert!(record.conventional_load_mmbtu >= 0.0);
        }
        assert!(records.iter().any(|r| r.hp_capacity_used > 0.999));
    }
}
