use crate::core::energy_model::model_building;
use crate::core::units::HOURS_PER_YEAR;
use crate::input::{
    BuildingDescription, ConventionalHeat, ConventionalHeatingSystem, EnergyModelFitInputs,
    EnergyPrices, Fuel, HeatPump, HeatPumpSource, HspfType, TemperatureTolerance,
};
use crate::library::{City, FuelInfo, RateBlock, ReferenceData, Utility};
use crate::read_weather_file::{WeatherSeries, WeatherSite};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// A year that is coldest in mid January and warmest in mid July, with a daily swing.
pub(crate) fn weather() -> WeatherSeries {
    let site = WeatherSite {
        tmy_id: 7,
        city: "Testville".to_string(),
        db_temp_avg: 35.0,
        heating_design_temp: -15.0,
    };
    let temps = (0..HOURS_PER_YEAR)
        .map(|hour| {
            let season = 2.0 * PI * (hour as f64 - 360.0) / HOURS_PER_YEAR as f64;
            let day = 2.0 * PI * ((hour % 24) as f64 - 15.0) / 24.0;
            35.0 - 28.0 * season.cos() + 6.0 * day.cos()
        })
        .collect::<Vec<_>>();
    WeatherSeries::from_temperatures(site, &temps).unwrap()
}

pub(crate) fn reference_data() -> ReferenceData {
    ReferenceData::new(
        vec![City {
            id: 1,
            name: "Testville".to_string(),
            latitude: 61.2,
            longitude: -149.9,
            fuel_prices: BTreeMap::from([
                ("Oil1Price".to_string(), 4.0),
                ("PropanePrice".to_string(), 5.5),
            ]),
            municipal_sales_tax: None,
            borough_sales_tax: None,
            tmy_id: 7,
            elec_utilities: vec![3],
            avg_elec_usage: [550.0; 12],
        }],
        vec![Utility {
            id: 3,
            name: "Test Electric".to_string(),
            is_commercial: false,
            pce: None,
            co2: Some(1.1),
            customer_chg: Some(20.0),
            demand_charge: None,
            blocks: vec![
                RateBlock {
                    limit: Some(500.0),
                    rate: 0.25,
                },
                RateBlock {
                    limit: None,
                    rate: 0.2,
                },
            ],
        }],
        vec![
            FuelInfo {
                fuel: Fuel::Electricity,
                desc: "Electricity".to_string(),
                unit: "kWh".to_string(),
                btus: 3412.0,
                co2: None,
                price_col: None,
                dhw_effic: Some(0.92),
            },
            FuelInfo {
                fuel: Fuel::Oil1,
                desc: "#1 Oil".to_string(),
                unit: "gallon".to_string(),
                btus: 134_000.0,
                co2: Some(161.0),
                price_col: Some("Oil1Price".to_string()),
                dhw_effic: Some(0.55),
            },
            FuelInfo {
                fuel: Fuel::Propane,
                desc: "Propane".to_string(),
                unit: "gallon".to_string(),
                btus: 91_333.0,
                co2: Some(136.6),
                price_col: Some("PropanePrice".to_string()),
                dhw_effic: Some(0.55),
            },
        ],
        vec![weather()],
    )
    .unwrap()
}

/// An oil-heated home with an oil water heater and no heat pump.
pub(crate) fn building() -> BuildingDescription {
    BuildingDescription {
        city_id: 1,
        energy_prices: EnergyPrices::new(3),
        conventional_heat: ConventionalHeat {
            primary: ConventionalHeatingSystem {
                heat_fuel_id: Fuel::Oil1,
                heating_effic: 0.8,
                aux_elec_use: 3.0,
                frac_load_served: 1.0,
            },
            secondary: None,
        },
        heat_pump: None,
        building_type: Default::default(),
        garage_stall_count: 1,
        bldg_floor_area: 1500.0,
        ua_per_ft2: 0.19,
        occupant_count: 3.0,
        indoor_heat_setpoint: 70.0,
        dhw_fuel_id: Some(Fuel::Oil1),
        dhw_ef: 0.62,
        dhw_hpwh_source: Default::default(),
        clothes_drying_fuel_id: Some(Fuel::Electricity),
        cooking_fuel_id: Some(Fuel::Propane),
        misc_elec_kwh_per_day: 12.0,
        misc_elec_seasonality: 0.1,
        ev_charging_miles_per_day: 0.0,
        ev_miles_per_kwh: 3.0,
        ev_seasonality: 0.0,
        solar_kw: 0.0,
        solar_kwh_per_kw: 650.0,
    }
}

pub(crate) fn heat_pump() -> HeatPump {
    HeatPump {
        source_type: HeatPumpSource::Air,
        hspf_type: HspfType::Hspf2Reg5,
        hspf: Some(11.5),
        max_out_5f: Some(14_000.0),
        cop_32f: None,
        max_out_32f: None,
        low_temp_cutoff: Some(-5.0),
        off_months: vec![],
        frac_exposed_to_hp: 0.4,
        frac_adjacent_to_hp: 0.3,
        doors_open_to_adjacent: true,
        bedroom_temp_tolerance: TemperatureTolerance::Med,
        serves_garage: false,
    }
}

/// Actual use as billed for a building whose true properties are known, paired with a
/// description that gets the calibrated properties wrong.
pub(crate) fn billed_use(
    truth: &BuildingDescription,
    reference: &ReferenceData,
) -> EnergyModelFitInputs {
    let results = model_building(truth, reference).unwrap();
    let annual_units = results.annual_results.fuel_use_units.sum_key1();
    let electric_use_by_month = std::array::from_fn(|month| {
        results.monthly_results[month].fuel_use_units.sum_key1()[&Fuel::Electricity]
    });

    let mut guess = truth.clone();
    guess.ua_per_ft2 = 0.19;
    guess.misc_elec_kwh_per_day = 9.0;
    guess.misc_elec_seasonality = 0.0;

    EnergyModelFitInputs {
        building_description: guess,
        actual_fuel_by_type: annual_units
            .into_iter()
            .filter(|(fuel, _)| !fuel.is_electricity())
            .collect(),
        electric_use_by_month,
    }
}
