use crate::core::dict2d::Dict2d;
use crate::core::econ::CashFlowAnalysis;
use crate::input::{BuildingDescription, EndUse, Fuel};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Fuel use by fuel and end use.
pub type FuelUse = Dict2d<Fuel, EndUse>;

/// Summary of model results over a month ("Jan" - "Dec") or the whole year ("Annual").
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TimePeriodResults {
    pub period: String,
    /// Space heating load served by the heat pump
    pub hp_load_mmbtu: f64,
    /// Fraction of the space heating load served by the heat pump, absent when there is no load
    pub hp_load_frac: Option<f64>,
    pub hp_kwh: f64,
    /// Maximum hourly fraction of the heat pump's capacity used, 0 - 1.0
    pub hp_capacity_used_max: f64,
    /// Average COP, absent when the heat pump did not run
    pub cop: Option<f64>,
    /// Space heating load served by the conventional systems
    pub conventional_load_mmbtu: f64,
    /// (primary, secondary) split of `conventional_load_mmbtu`
    pub conventional_load_mmbtu_by_sys: (f64, f64),
    /// MMBTU, electricity included
    pub fuel_use_mmbtu: FuelUse,
    /// Peak electric demand, kW
    pub elec_demand: f64,
    /// Fuel units (kWh for electricity)
    pub fuel_use_units: FuelUse,
    /// $ including sales tax
    pub fuel_cost: IndexMap<Fuel, f64>,
    pub fuel_total_cost: f64,
    pub co2_lbs: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DetailedModelResults {
    pub monthly_results: Vec<TimePeriodResults>,
    pub annual_results: TimePeriodResults,
    /// 99% heating design temperature, deg F
    pub design_heat_temp: f64,
    /// Heating load at the design temperature, Btu/hour
    pub design_heat_load: f64,
}

/// How well the calibrated model matches the actual use of one fuel, in fuel units.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FuelFitError {
    pub fuel: Fuel,
    pub actual: f64,
    pub modeled: f64,
    /// (modeled - actual) / actual, or 0.0 when the actual use is zero
    pub rel_error: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnergyModelFitResults {
    pub building_description: BuildingDescription,
    pub fit_errors: Vec<FuelFitError>,
    /// False if the optimizer stopped at its iteration limit
    pub converged: bool,
    pub iterations: u64,
    /// Final value of the squared error objective, MMBTU^2
    pub residual: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MiscRetrofitResults {
    /// Reduction in annual CO2 emissions, lbs
    pub co2_lbs_saved: f64,
    /// Annual vehicle miles with the same emissions as `co2_lbs_saved`
    pub co2_driving_miles_saved: f64,
    /// Incremental price, including sales tax, of the primary heating fuel avoided, $/unit
    pub fuel_price_incremental: Option<f64>,
    /// Incremental price of the electricity added, $/kWh
    pub elec_rate_incremental: Option<f64>,
}

/// Change in annual use and cost of each fuel, post-retrofit minus pre-retrofit.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FuelChange {
    pub units: IndexMap<Fuel, f64>,
    pub cost: IndexMap<Fuel, f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RetrofitAnalysisResults {
    pub misc: MiscRetrofitResults,
    pub financial: CashFlowAnalysis,
    pub base_case_detail: DetailedModelResults,
    pub with_retrofit_detail: DetailedModelResults,
    pub fuel_change: FuelChange,
}

/// The price of a fuel in a city, $/unit before sales tax. `price` is absent when the city
/// has no price for the fuel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FuelPrice {
    pub fuel: Fuel,
    pub city_id: u32,
    pub price: Option<f64>,
    pub unit: String,
}

/// Somewhere a result document can be written to.
pub trait Output: Debug {
    fn writer(&self) -> anyhow::Result<impl Write>;
    /// True when nothing written here is kept, so serializing a result can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    path: PathBuf,
}

impl FileOutput {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Output for FileOutput {
    fn writer(&self) -> anyhow::Result<impl Write> {
        Ok(BufWriter::new(File::create(&self.path)?))
    }
}

#[derive(Debug, Default)]
pub struct StdoutOutput;

impl Output for StdoutOutput {
    fn writer(&self) -> anyhow::Result<impl Write> {
        Ok(io::stdout().lock())
    }
}

/// Discards every result, for runs that only care whether a request succeeds.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer(&self) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Writes `value` to the output as pretty-printed JSON.
pub fn write_json<T: Serialize>(output: &impl Output, value: &T) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }
    let mut writer = output.writer()?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
