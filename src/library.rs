/// Reference data used by the energy model: cities with their fuel prices, electric utility
/// rate schedules, fuel properties and weather. Calculations read from an immutable
/// `ReferenceData` snapshot; a `Library` hands out the current snapshot and replaces it
/// wholesale when refreshed.
use crate::errors::InvalidInputError;
use crate::input::Fuel;
use crate::read_weather_file::{weather_data_to_series, WeatherSeries, WeatherSite};
use anyhow::{anyhow, bail, Context};
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct City {
    pub id: u32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// $/unit prices keyed on the fuel's price column name, e.g. "Oil1Price"
    #[serde(default)]
    pub fuel_prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub municipal_sales_tax: Option<f64>,
    #[serde(default)]
    pub borough_sales_tax: Option<f64>,
    /// Weather site nearest the city
    pub tmy_id: u32,
    /// Rate schedules available in the city
    #[serde(default)]
    pub elec_utilities: Vec<u32>,
    /// Average residential kWh use, January - December
    #[serde(default)]
    pub avg_elec_usage: [f64; 12],
}

impl City {
    /// Borough plus municipal sales tax, fraction
    pub fn sales_tax(&self) -> f64 {
        self.borough_sales_tax.unwrap_or(0.0) + self.municipal_sales_tax.unwrap_or(0.0)
    }
}

/// One block of an electric rate: kWh up to `limit` (cumulative, `None` for the last block)
/// are charged at `rate` $/kWh.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateBlock {
    pub limit: Option<f64>,
    pub rate: f64,
}

/// An electric utility rate schedule.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Utility {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub is_commercial: bool,
    /// Power Cost Equalization assistance, $/kWh
    #[serde(default)]
    pub pce: Option<f64>,
    /// lbs of CO2 per kWh
    #[serde(default)]
    pub co2: Option<f64>,
    /// $/month
    #[serde(default)]
    pub customer_chg: Option<f64>,
    /// $/kW/month
    #[serde(default)]
    pub demand_charge: Option<f64>,
    pub blocks: Vec<RateBlock>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FuelInfo {
    pub fuel: Fuel,
    pub desc: String,
    /// e.g. "gallon"
    pub unit: String,
    /// Btu per unit of fuel
    pub btus: f64,
    /// lbs of CO2 per MMBTU
    #[serde(default)]
    pub co2: Option<f64>,
    /// Name of the city price that applies to this fuel
    #[serde(default)]
    pub price_col: Option<String>,
    #[serde(default)]
    pub dhw_effic: Option<f64>,
}

/// A label and identifier pair for presenting choices.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Choice {
    pub label: String,
    pub id: String,
}

/// A consistent, immutable set of reference data.
#[derive(Clone, Debug, Default)]
pub struct ReferenceData {
    version: u64,
    cities: IndexMap<u32, City>,
    utilities: IndexMap<u32, Utility>,
    fuels: IndexMap<Fuel, FuelInfo>,
    weather: IndexMap<u32, Arc<WeatherSeries>>,
}

impl ReferenceData {
    pub fn new(
        cities: Vec<City>,
        utilities: Vec<Utility>,
        fuels: Vec<FuelInfo>,
        weather: Vec<WeatherSeries>,
    ) -> anyhow::Result<Self> {
        let data = Self {
            version: 0,
            cities: cities.into_iter().map(|c| (c.id, c)).collect(),
            utilities: utilities.into_iter().map(|u| (u.id, u)).collect(),
            fuels: fuels.into_iter().map(|f| (f.fuel, f)).collect(),
            weather: weather
                .into_iter()
                .map(|w| (w.site().tmy_id, Arc::new(w)))
                .collect(),
        };

        for city in data.cities.values() {
            if !data.weather.contains_key(&city.tmy_id) {
                bail!("City {} refers to missing weather site {}", city.id, city.tmy_id);
            }
        }
        for fuel in data.fuels.values() {
            if fuel.btus.is_nan() || fuel.btus <= 0.0 {
                bail!("Fuel {} must have a positive Btu content", fuel.fuel);
            }
        }
        if !data.fuels.contains_key(&Fuel::Electricity) {
            bail!("Reference data must describe electricity");
        }

        Ok(data)
    }

    /// Identifies the snapshot; differs between snapshots loaded by the same `Library`.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn city(&self, city_id: u32) -> Result<&City, InvalidInputError> {
        self.cities
            .get(&city_id)
            .ok_or_else(|| InvalidInputError::unknown("city_id", "city", city_id))
    }

    pub fn utility(&self, utility_id: u32) -> Result<&Utility, InvalidInputError> {
        self.utilities.get(&utility_id).ok_or_else(|| {
            InvalidInputError::unknown("energy_prices.utility_id", "utility", utility_id)
        })
    }

    pub fn fuel(&self, fuel: Fuel) -> Result<&FuelInfo, InvalidInputError> {
        self.fuels
            .get(&fuel)
            .ok_or_else(|| InvalidInputError::unknown("fuel", "fuel", fuel))
    }

    pub fn weather(&self, tmy_id: u32) -> Result<Arc<WeatherSeries>, InvalidInputError> {
        self.weather
            .get(&tmy_id)
            .cloned()
            .ok_or_else(|| InvalidInputError::unknown("city_id", "weather site", tmy_id))
    }

    /// Price of a fuel in a city, $/unit before sales tax, if the city has one.
    pub fn fuel_price(&self, fuel: Fuel, city_id: u32) -> Result<Option<f64>, InvalidInputError> {
        let city = self.city(city_id)?;
        let fuel_info = self.fuel(fuel)?;

        Ok(fuel_info
            .price_col
            .as_ref()
            .and_then(|col| city.fuel_prices.get(col))
            .copied())
    }

    /// Cities sorted by name.
    pub fn cities(&self) -> Vec<Choice> {
        let mut cities = self
            .cities
            .values()
            .map(|c| Choice {
                label: c.name.clone(),
                id: c.id.to_string(),
            })
            .collect::<Vec<_>>();
        cities.sort_by(|a, b| a.label.cmp(&b.label));
        cities
    }

    /// Rate schedules sorted by name.
    pub fn utilities(&self) -> Vec<Choice> {
        let mut utilities = self
            .utilities
            .values()
            .map(|u| Choice {
                label: u.name.clone(),
                id: u.id.to_string(),
            })
            .collect::<Vec<_>>();
        utilities.sort_by(|a, b| a.label.cmp(&b.label));
        utilities
    }

    pub fn fuels(&self) -> Vec<Choice> {
        self.fuels
            .values()
            .map(|f| Choice {
                label: f.desc.clone(),
                id: f.fuel.to_string(),
            })
            .collect()
    }
}

/// Somewhere a fresh snapshot of reference data can be loaded from.
pub trait ReferenceDataSource: Send + Sync {
    fn load(&self) -> anyhow::Result<ReferenceData>;
}

impl<F> ReferenceDataSource for F
where
    F: Fn() -> anyhow::Result<ReferenceData> + Send + Sync,
{
    fn load(&self) -> anyhow::Result<ReferenceData> {
        self()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LibraryDocument {
    cities: Vec<City>,
    utilities: Vec<Utility>,
    fuels: Vec<FuelInfo>,
    weather_sites: Vec<WeatherSite>,
}

/// Loads reference data from a JSON library document plus one `<tmy_id>.csv` weather file
/// per weather site.
#[derive(Clone, Debug)]
pub struct FileReferenceSource {
    library_path: PathBuf,
    weather_dir: PathBuf,
}

impl FileReferenceSource {
    pub fn new(library_path: impl Into<PathBuf>, weather_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            weather_dir: weather_dir.into(),
        }
    }
}

impl ReferenceDataSource for FileReferenceSource {
    fn load(&self) -> anyhow::Result<ReferenceData> {
        let file = File::open(&self.library_path)
            .with_context(|| format!("Could not open library file {:?}", self.library_path))?;
        let document: LibraryDocument = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse library file {:?}", self.library_path))?;

        let weather = document
            .weather_sites
            .into_iter()
            .map(|site| {
                let path = self.weather_dir.join(format!("{}.csv", site.tmy_id));
                let file = File::open(&path)
                    .with_context(|| format!("Could not open weather file {path:?}"))?;
                weather_data_to_series(BufReader::new(file), site)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        ReferenceData::new(document.cities, document.utilities, document.fuels, weather)
    }
}

/// Holds the current reference snapshot. Readers always see a complete snapshot, and a
/// refresh swaps in a new one without disturbing calculations using the old one.
pub struct Library {
    current: ArcSwap<ReferenceData>,
    source: Option<Box<dyn ReferenceDataSource>>,
    refresh_lock: Mutex<()>,
}

impl Library {
    /// Loads the first snapshot from `source`.
    pub fn load(source: impl ReferenceDataSource + 'static) -> anyhow::Result<Self> {
        let mut data = source.load()?;
        data.version = 1;
        info!(
            version = data.version,
            cities = data.cities.len(),
            weather_sites = data.weather.len(),
            "Loaded reference data"
        );

        Ok(Self {
            current: ArcSwap::from_pointee(data),
            source: Some(Box::new(source)),
            refresh_lock: Mutex::new(()),
        })
    }

    /// A library over a fixed snapshot that cannot be refreshed.
    pub fn fixed(mut data: ReferenceData) -> Self {
        data.version = 1;
        Self {
            current: ArcSwap::from_pointee(data),
            source: None,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<ReferenceData> {
        self.current.load_full()
    }

    /// Loads a new snapshot from the source and makes it current, returning it. On failure the
    /// current snapshot stays in place.
    pub fn refresh(&self) -> anyhow::Result<Arc<ReferenceData>> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| anyhow!("This library has no reference data source to refresh from"))?;

        let _guard = self.refresh_lock.lock();
        let mut data = source.load()?;
        data.version = self.current.load().version + 1;
        let data = Arc::new(data);
        self.current.store(data.clone());
        info!(version = data.version, "Refreshed reference data");

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::HOURS_PER_YEAR;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reference_data(oil_price: f64) -> ReferenceData {
        let site = WeatherSite {
            tmy_id: 7,
            city: "Testville".to_string(),
            db_temp_avg: 30.0,
            heating_design_temp: -10.0,
        };
        ReferenceData::new(
            vec![City {
                id: 1,
                name: "Testville".to_string(),
                latitude: 61.2,
                longitude: -149.9,
                fuel_prices: BTreeMap::from([("Oil1Price".to_string(), oil_price)]),
                municipal_sales_tax: Some(0.02),
                borough_sales_tax: Some(0.03),
                tmy_id: 7,
                elec_utilities: vec![3],
                avg_elec_usage: [500.0; 12],
            }],
            vec![Utility {
                id: 3,
                name: "Test Electric".to_string(),
                is_commercial: false,
                pce: None,
                co2: Some(1.1),
                customer_chg: Some(20.0),
                demand_charge: None,
                blocks: vec![RateBlock {
                    limit: None,
                    rate: 0.2,
                }],
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
            ],
            vec![WeatherSeries::from_temperatures(site, &[30.0; HOURS_PER_YEAR]).unwrap()],
        )
        .unwrap()
    }

    #[rstest]
    fn should_look_up_reference_records() {
        let data = reference_data(4.0);
        assert_eq!(data.city(1).unwrap().sales_tax(), 0.05);
        assert_eq!(data.utility(3).unwrap().name, "Test Electric");
        assert_eq!(data.fuel(Fuel::Oil1).unwrap().btus, 134_000.0);
        assert_eq!(data.weather(7).unwrap().site().city, "Testville");
        assert_eq!(data.fuel_price(Fuel::Oil1, 1).unwrap(), Some(4.0));
        assert_eq!(data.fuel_price(Fuel::Electricity, 1).unwrap(), None);
        assert_eq!(data.cities()[0].id, "1");
        assert_eq!(data.fuels()[1].id, "oil1");
    }

    #[rstest]
    fn should_name_field_for_unknown_ids() {
        let data = reference_data(4.0);
        assert_eq!(data.city(99).unwrap_err().field_name(), "city_id");
        assert_eq!(
            data.utility(99).unwrap_err().field_name(),
            "energy_prices.utility_id"
        );
        assert!(data.fuel(Fuel::Coal).is_err());
    }

    #[rstest]
    fn should_reject_city_without_weather() {
        let data = reference_data(4.0);
        let mut city = data.city(1).unwrap().clone();
        city.tmy_id = 8;
        let result = ReferenceData::new(
            vec![city],
            vec![],
            data.fuels.values().cloned().collect(),
            vec![],
        );
        assert!(result.is_err());
    }

    #[rstest]
    fn should_swap_in_new_snapshot_on_refresh() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let library = Library::load(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(reference_data(4.0 + n as f64))
        })
        .unwrap();

        let before = library.snapshot();
        let refreshed = library.refresh().unwrap();

        assert_eq!(before.version(), 1);
        assert_eq!(refreshed.version(), 2);
        // a snapshot held across a refresh is unaffected by it
        assert_eq!(before.fuel_price(Fuel::Oil1, 1).unwrap(), Some(4.0));
        assert_eq!(library.snapshot().fuel_price(Fuel::Oil1, 1).unwrap(), Some(5.0));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn should_keep_snapshot_when_refresh_fails() {
        let calls = AtomicUsize::new(0);
        let library = Library::load(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(reference_data(4.0))
            } else {
                Err(anyhow!("source unavailable"))
            }
        })
        .unwrap();

        assert!(library.refresh().is_err());
        assert_eq!(library.snapshot().version(), 1);
    }

    #[rstest]
    fn should_not_refresh_fixed_library() {
        let library = Library::fixed(reference_data(4.0));
        assert!(library.refresh().is_err());
        assert_eq!(library.snapshot().version(), 1);
    }
}
