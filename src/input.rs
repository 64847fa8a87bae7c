use crate::core::units::HOURS_PER_DAY;
use crate::errors::InvalidInputError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufReader, Read};
use strum_macros::{Display, EnumIter};

/// Reads any of the request documents from JSON.
pub fn ingest_request<T: DeserializeOwned>(json: impl Read) -> Result<T, anyhow::Error> {
    let reader = BufReader::new(json);

    Ok(serde_json::from_reader(reader)?)
}

// tolerance used when checking that fractions of a whole add up
const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Fuel {
    #[serde(rename = "elec")]
    #[strum(serialize = "elec")]
    Electricity,
    #[serde(rename = "ng")]
    #[strum(serialize = "ng")]
    NaturalGas,
    Propane,
    Oil1,
    Oil2,
    Birch,
    Spruce,
    Pellets,
    Coal,
    Steam,
    HotWater,
}

impl Fuel {
    pub fn is_electricity(&self) -> bool {
        matches!(self, Fuel::Electricity)
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndUse {
    SpaceHtg,
    Dhw,
    Cooking,
    Drying,
    MiscElec,
    EvCharging,
    PvSolar,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HspfType {
    /// HSPF2, climate region 5
    #[serde(rename = "hspf2_reg5")]
    Hspf2Reg5,
    /// HSPF2, climate region 4
    #[serde(rename = "hspf2_reg4")]
    Hspf2Reg4,
    /// Original HSPF
    Hspf,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatPumpSource {
    #[default]
    Air,
    Ground,
    Water,
}

/// Only relevant for determining PCE eligibility, which is expressed directly through
/// `EnergyPrices::pce_limit`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    #[default]
    Residential,
    Commercial,
    Community,
}

/// How much cooler than the main space the rooms adjacent to the heat pump may become.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureTolerance {
    Low,
    Med,
    High,
}

impl TemperatureTolerance {
    /// Acceptable temperature drop in deg F.
    pub fn max_depression(&self) -> f64 {
        match self {
            TemperatureTolerance::Low => 2.0,
            TemperatureTolerance::Med => 5.0,
            TemperatureTolerance::High => 10.0,
        }
    }
}

/// The space a heat pump water heater extracts its heat from.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HpwhSource {
    #[default]
    MainHome,
    Garage,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeatPump {
    #[serde(default)]
    pub source_type: HeatPumpSource,
    #[serde(default = "default_hspf_type")]
    pub hspf_type: HspfType,
    #[serde(default)]
    pub hspf: Option<f64>,
    /// Air source only: maximum heat output at 5 deg F outdoors, Btu/hour
    #[serde(default)]
    pub max_out_5f: Option<f64>,
    /// Realistic (not rated) COP at 32 deg F
    #[serde(default)]
    pub cop_32f: Option<f64>,
    /// Ground/water source only: maximum heat output at 32 deg F entering water temperature, Btu/hour
    #[serde(default)]
    pub max_out_32f: Option<f64>,
    /// The heat pump does not run on days where the 20th percentile temperature is at or
    /// below this value, deg F.
    #[serde(default = "default_low_temp_cutoff")]
    pub low_temp_cutoff: Option<f64>,
    #[serde(default)]
    pub off_months: Vec<u8>,
    pub frac_exposed_to_hp: f64,
    pub frac_adjacent_to_hp: f64,
    pub doors_open_to_adjacent: bool,
    pub bedroom_temp_tolerance: TemperatureTolerance,
    #[serde(default)]
    pub serves_garage: bool,
}

fn default_hspf_type() -> HspfType {
    HspfType::Hspf2Reg5
}

fn default_low_temp_cutoff() -> Option<f64> {
    Some(5.0)
}

impl HeatPump {
    pub(crate) fn validate(&self) -> Result<(), InvalidInputError> {
        check_fraction("heat_pump.frac_exposed_to_hp", self.frac_exposed_to_hp)?;
        check_fraction("heat_pump.frac_adjacent_to_hp", self.frac_adjacent_to_hp)?;
        if self.frac_exposed_to_hp + self.frac_adjacent_to_hp > 1.0 + FRACTION_SUM_TOLERANCE {
            return Err(InvalidInputError::field(
                "heat_pump.frac_adjacent_to_hp",
                "exposed and adjacent fractions together exceed 1.0",
            ));
        }
        if let Some(month) = self.off_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(InvalidInputError::field(
                "heat_pump.off_months",
                format!("month {month} is not in 1-12"),
            ));
        }
        if let Some(hspf) = self.hspf {
            check_positive("heat_pump.hspf", hspf)?;
        }
        if let Some(cop) = self.cop_32f {
            check_positive("heat_pump.cop_32f", cop)?;
        }

        match self.source_type {
            HeatPumpSource::Air => {
                if self.hspf.is_none() && self.cop_32f.is_none() {
                    return Err(InvalidInputError::field(
                        "heat_pump.hspf",
                        "an air-source heat pump needs either an HSPF or a COP at 32 F",
                    ));
                }
                check_positive(
                    "heat_pump.max_out_5f",
                    required("heat_pump.max_out_5f", self.max_out_5f)?,
                )
            }
            HeatPumpSource::Ground | HeatPumpSource::Water => {
                required("heat_pump.cop_32f", self.cop_32f)?;
                check_positive(
                    "heat_pump.max_out_32f",
                    required("heat_pump.max_out_32f", self.max_out_32f)?,
                )
            }
        }
    }

    pub fn is_off_in_month(&self, month: u8) -> bool {
        self.off_months.contains(&month)
    }
}

/// A non-heat-pump heating system.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConventionalHeatingSystem {
    pub heat_fuel_id: Fuel,
    /// Seasonal efficiency, 0 - 1.0
    pub heating_effic: f64,
    /// Fan/pump/controls electric use, kWh per MMBTU of heat delivered
    pub aux_elec_use: f64,
    #[serde(default = "default_frac_load_served")]
    pub frac_load_served: f64,
}

fn default_frac_load_served() -> f64 {
    1.0
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConventionalHeat {
    pub primary: ConventionalHeatingSystem,
    #[serde(default)]
    pub secondary: Option<ConventionalHeatingSystem>,
}

impl ConventionalHeat {
    pub fn systems(&self) -> impl Iterator<Item = &ConventionalHeatingSystem> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    fn validate(&self) -> Result<(), InvalidInputError> {
        for (name, system) in [("primary", Some(&self.primary)), ("secondary", self.secondary.as_ref())] {
            let Some(system) = system else { continue };
            check_positive(
                &format!("conventional_heat.{name}.heating_effic"),
                system.heating_effic,
            )?;
            check_non_negative(
                &format!("conventional_heat.{name}.aux_elec_use"),
                system.aux_elec_use,
            )?;
            check_fraction(
                &format!("conventional_heat.{name}.frac_load_served"),
                system.frac_load_served,
            )?;
        }

        let total = self.systems().map(|s| s.frac_load_served).sum::<f64>();
        if (total - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(InvalidInputError::field(
                "conventional_heat.primary.frac_load_served",
                format!("load fractions of the heating systems sum to {total}, not 1.0"),
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyPrices {
    pub utility_id: u32,
    /// Monthly kWh limit for PCE assistance: 0 if the building gets no PCE, `None` if unlimited.
    #[serde(default = "default_pce_limit")]
    pub pce_limit: Option<f64>,
    /// Replaces the utility's energy and demand charges with a single rate, $/kWh
    #[serde(default)]
    pub elec_rate_override: Option<f64>,
    #[serde(default)]
    pub pce_rate_override: Option<f64>,
    #[serde(default)]
    pub customer_charge_override: Option<f64>,
    #[serde(default)]
    pub co2_lbs_per_kwh_override: Option<f64>,
    /// Pre-tax fuel prices, $/fuel unit, replacing the city's prices
    #[serde(default)]
    pub fuel_price_overrides: BTreeMap<Fuel, f64>,
    /// Replaces the city + borough sales tax, fraction
    #[serde(default)]
    pub sales_tax_override: Option<f64>,
}

fn default_pce_limit() -> Option<f64> {
    Some(750.0)
}

impl EnergyPrices {
    pub fn new(utility_id: u32) -> Self {
        Self {
            utility_id,
            pce_limit: default_pce_limit(),
            elec_rate_override: None,
            pce_rate_override: None,
            customer_charge_override: None,
            co2_lbs_per_kwh_override: None,
            fuel_price_overrides: Default::default(),
            sales_tax_override: None,
        }
    }
}

/// Full description of a building for the energy model. Values are never mutated in place
/// once a simulation is under way; modified copies are derived with struct update syntax or
/// `with_primary_load_frac`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildingDescription {
    pub city_id: u32,
    pub energy_prices: EnergyPrices,
    pub conventional_heat: ConventionalHeat,
    #[serde(default)]
    pub heat_pump: Option<HeatPump>,
    #[serde(default)]
    pub building_type: BuildingType,
    /// 0 for no garage, up to 4
    #[serde(default)]
    pub garage_stall_count: u8,
    /// Living area of the home, ft2, not counting the garage
    pub bldg_floor_area: f64,
    /// Btu/hour/deg F/ft2 for the main home
    pub ua_per_ft2: f64,
    #[serde(default = "default_occupant_count")]
    pub occupant_count: f64,
    #[serde(default = "default_indoor_heat_setpoint")]
    pub indoor_heat_setpoint: f64,
    #[serde(default)]
    pub dhw_fuel_id: Option<Fuel>,
    #[serde(default = "default_dhw_ef")]
    pub dhw_ef: f64,
    #[serde(default)]
    pub dhw_hpwh_source: HpwhSource,
    #[serde(default)]
    pub clothes_drying_fuel_id: Option<Fuel>,
    #[serde(default)]
    pub cooking_fuel_id: Option<Fuel>,
    /// Lights and miscellaneous appliances, annual average kWh/day
    pub misc_elec_kwh_per_day: f64,
    /// Fractional difference between the highest-use month and the average
    #[serde(default)]
    pub misc_elec_seasonality: f64,
    #[serde(default)]
    pub ev_charging_miles_per_day: f64,
    #[serde(default = "default_ev_miles_per_kwh")]
    pub ev_miles_per_kwh: f64,
    #[serde(default)]
    pub ev_seasonality: f64,
    #[serde(default)]
    pub solar_kw: f64,
    /// Annual kWh produced per kW of installed solar
    #[serde(default = "default_solar_kwh_per_kw")]
    pub solar_kwh_per_kw: f64,
}

fn default_occupant_count() -> f64 {
    3.0
}

fn default_indoor_heat_setpoint() -> f64 {
    70.0
}

fn default_dhw_ef() -> f64 {
    0.62
}

fn default_ev_miles_per_kwh() -> f64 {
    3.0
}

fn default_solar_kwh_per_kw() -> f64 {
    650.0
}

impl BuildingDescription {
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        check_positive("bldg_floor_area", self.bldg_floor_area)?;
        check_positive("ua_per_ft2", self.ua_per_ft2)?;
        if self.garage_stall_count > 4 {
            return Err(InvalidInputError::field(
                "garage_stall_count",
                format!("{} stalls given, maximum is 4", self.garage_stall_count),
            ));
        }
        check_non_negative("occupant_count", self.occupant_count)?;
        check_finite("indoor_heat_setpoint", self.indoor_heat_setpoint)?;
        self.conventional_heat.validate()?;
        if let Some(heat_pump) = &self.heat_pump {
            heat_pump.validate()?;
        }
        if self.dhw_fuel_id.is_some() {
            check_positive("dhw_ef", self.dhw_ef)?;
        }
        check_non_negative("misc_elec_kwh_per_day", self.misc_elec_kwh_per_day)?;
        check_finite("misc_elec_seasonality", self.misc_elec_seasonality)?;
        check_non_negative("ev_charging_miles_per_day", self.ev_charging_miles_per_day)?;
        if self.ev_charging_miles_per_day > 0.0 {
            check_positive("ev_miles_per_kwh", self.ev_miles_per_kwh)?;
        }
        check_finite("ev_seasonality", self.ev_seasonality)?;
        check_non_negative("solar_kw", self.solar_kw)?;
        check_non_negative("solar_kwh_per_kw", self.solar_kwh_per_kw)?;
        if let Some(tax) = self.energy_prices.sales_tax_override {
            check_non_negative("energy_prices.sales_tax_override", tax)?;
        }
        for (fuel, price) in &self.energy_prices.fuel_price_overrides {
            check_non_negative(&format!("energy_prices.fuel_price_overrides.{fuel}"), *price)?;
        }

        Ok(())
    }

    /// Fuels that are burned or used in the building other than through the utility meter
    /// for lights and appliances.
    pub fn fuels_used(&self) -> Vec<Fuel> {
        let mut fuels = self
            .conventional_heat
            .systems()
            .map(|s| s.heat_fuel_id)
            .chain(self.dhw_fuel_id)
            .chain(self.clothes_drying_fuel_id)
            .chain(self.cooking_fuel_id)
            .collect::<Vec<_>>();
        fuels.sort();
        fuels.dedup();
        fuels
    }

    /// Daily DHW heat load, MMBTU/day.
    pub(crate) fn dhw_load_mmbtu_per_day(&self) -> f64 {
        match self.dhw_fuel_id {
            Some(_) => 4.23 * self.occupant_count / 365.0,
            None => 0.0,
        }
    }

    /// Space heating load (Btu/hour) created by a heat pump water heater drawing heat from
    /// its surroundings, split as (main home, garage).
    pub(crate) fn hpwh_space_loads(&self) -> (f64, f64) {
        if self.dhw_fuel_id != Some(Fuel::Electricity) || self.dhw_ef <= 1.0 {
            return (0.0, 0.0);
        }
        let btu_per_hour = self.dhw_load_mmbtu_per_day() * (self.dhw_ef - 1.0) / self.dhw_ef
            * 1e6
            / HOURS_PER_DAY as f64;

        match self.dhw_hpwh_source {
            HpwhSource::MainHome => (btu_per_hour, 0.0),
            HpwhSource::Garage => (0.0, btu_per_hour),
        }
    }

    /// Assigns `primary_frac` of the conventional load to the primary system and the rest to
    /// the secondary one, if there is one.
    pub fn with_primary_load_frac(&self, primary_frac: f64) -> Self {
        let mut building = self.clone();
        match building.conventional_heat.secondary.as_mut() {
            Some(secondary) => {
                building.conventional_heat.primary.frac_load_served = primary_frac;
                secondary.frac_load_served = 1.0 - primary_frac;
            }
            None => building.conventional_heat.primary.frac_load_served = 1.0,
        }
        building
    }
}

/// Actual use of a building used to calibrate its energy model.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyModelFitInputs {
    pub building_description: BuildingDescription,
    /// Annual use of each non-electric fuel, in the fuel's units (gallons, cords, ...)
    #[serde(default)]
    pub actual_fuel_by_type: BTreeMap<Fuel, f64>,
    /// January - December electricity use, kWh
    pub electric_use_by_month: [f64; 12],
}

impl EnergyModelFitInputs {
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        self.building_description.validate()?;
        for (fuel, use_) in &self.actual_fuel_by_type {
            check_non_negative(&format!("actual_fuel_by_type.{fuel}"), *use_)?;
        }
        for (idx, kwh) in self.electric_use_by_month.iter().enumerate() {
            check_finite(&format!("electric_use_by_month[{idx}]"), *kwh)?;
        }
        Ok(())
    }
}

/// Cost of installing, operating and possibly financing a retrofit.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrofitCost {
    pub capital_cost: f64,
    #[serde(default)]
    pub rebate_amount: f64,
    #[serde(default = "default_retrofit_life")]
    pub retrofit_life: u32,
    /// Change in annual operating cost; positive means an increase
    #[serde(default)]
    pub op_cost_chg: f64,
    /// Fraction of (capital_cost - rebate_amount) that is financed, 0 - 1.0
    #[serde(default)]
    pub frac_financed: f64,
    #[serde(default)]
    pub loan_term: Option<u32>,
    #[serde(default)]
    pub loan_interest: Option<f64>,
}

fn default_retrofit_life() -> u32 {
    14
}

impl RetrofitCost {
    pub fn loan_amount(&self) -> f64 {
        self.frac_financed * (self.capital_cost - self.rebate_amount)
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidInputError> {
        check_non_negative("retrofit_cost.capital_cost", self.capital_cost)?;
        check_non_negative("retrofit_cost.rebate_amount", self.rebate_amount)?;
        check_finite("retrofit_cost.op_cost_chg", self.op_cost_chg)?;
        if self.retrofit_life == 0 {
            return Err(InvalidInputError::field(
                "retrofit_cost.retrofit_life",
                "must be at least one year",
            ));
        }
        check_fraction("retrofit_cost.frac_financed", self.frac_financed)?;
        if self.loan_amount() > 0.0 {
            match self.loan_term {
                Some(term) if term > 0 => {}
                _ => {
                    return Err(InvalidInputError::field(
                        "retrofit_cost.loan_term",
                        "a financed retrofit needs a loan term of at least one year",
                    ))
                }
            }
            let interest = required("retrofit_cost.loan_interest", self.loan_interest)?;
            check_non_negative("retrofit_cost.loan_interest", interest)?;
        }
        Ok(())
    }
}

/// Future prices given either as an annual escalation rate (e.g. 0.03 for 3%/year) or as
/// multipliers for years 1, 2, ... of the analysis, the last one extended as needed.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PriceForecast {
    EscalationRate(f64),
    Multipliers(Vec<f64>),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EconomicInputs {
    #[serde(default = "default_elec_rate_forecast")]
    pub elec_rate_forecast: PriceForecast,
    /// Applied to all non-electric fuels
    #[serde(default = "default_fuel_price_forecast")]
    pub fuel_price_forecast: PriceForecast,
    /// Nominal discount rate; 0.0537 is 3% real at 2.3% inflation
    #[serde(default = "default_discount_rate")]
    pub discount_rate: f64,
    #[serde(default = "default_inflation_rate")]
    pub inflation_rate: f64,
}

fn default_elec_rate_forecast() -> PriceForecast {
    PriceForecast::EscalationRate(0.023)
}

fn default_fuel_price_forecast() -> PriceForecast {
    PriceForecast::EscalationRate(0.033)
}

fn default_discount_rate() -> f64 {
    0.0537
}

fn default_inflation_rate() -> f64 {
    0.023
}

impl Default for EconomicInputs {
    fn default() -> Self {
        Self {
            elec_rate_forecast: default_elec_rate_forecast(),
            fuel_price_forecast: default_fuel_price_forecast(),
            discount_rate: default_discount_rate(),
            inflation_rate: default_inflation_rate(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrofitAnalysisInputs {
    #[serde(default)]
    pub bldg_name: String,
    #[serde(default)]
    pub notes: String,
    /// The existing building
    pub pre_bldg: BuildingDescription,
    /// The building after the retrofit
    pub post_bldg: BuildingDescription,
    pub retrofit_cost: RetrofitCost,
    #[serde(default)]
    pub economic_inputs: EconomicInputs,
}

impl RetrofitAnalysisInputs {
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        self.pre_bldg.validate().map_err(|e| prefix_field("pre_bldg", e))?;
        self.post_bldg.validate().map_err(|e| prefix_field("post_bldg", e))?;
        self.retrofit_cost.validate()?;
        check_finite("economic_inputs.discount_rate", self.economic_inputs.discount_rate)?;
        check_finite("economic_inputs.inflation_rate", self.economic_inputs.inflation_rate)?;
        Ok(())
    }
}

pub(crate) fn prefix_field(prefix: &str, error: InvalidInputError) -> InvalidInputError {
    match error {
        InvalidInputError::InvalidField { field, reason } => InvalidInputError::InvalidField {
            field: format!("{prefix}.{field}"),
            reason,
        },
        InvalidInputError::UnknownReference { field, kind, id } => {
            InvalidInputError::UnknownReference {
                field: format!("{prefix}.{field}"),
                kind,
                id,
            }
        }
        other => other,
    }
}

fn required(field: &str, value: Option<f64>) -> Result<f64, InvalidInputError> {
    value.ok_or_else(|| InvalidInputError::field(field, "a value is required"))
}

fn check_finite(field: &str, value: f64) -> Result<(), InvalidInputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InvalidInputError::field(field, format!("{value} is not a finite number")))
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), InvalidInputError> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(InvalidInputError::field(field, format!("{value} must be greater than zero")))
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), InvalidInputError> {
    check_finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(InvalidInputError::field(field, format!("{value} must not be negative")))
    }
}

fn check_fraction(field: &str, value: f64) -> Result<(), InvalidInputError> {
    check_non_negative(field, value)?;
    if value <= 1.0 {
        Ok(())
    } else {
        Err(InvalidInputError::field(field, format!("{value} is not a fraction between 0 and 1")))
    }
}

/// Asks for the price of a fuel in a city.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FuelPriceRequest {
    pub fuel: Fuel,
    pub city_id: u32,
}
