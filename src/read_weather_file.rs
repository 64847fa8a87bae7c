/// Typical-meteorological-year weather for one climate site: 8760 hourly outdoor dry-bulb
/// temperatures with their calendar position.
use crate::core::units::HOURS_PER_YEAR;
use crate::simulation_time::YearHour;
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Summary information about a weather site.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherSite {
    pub tmy_id: u32,
    pub city: String,
    /// Annual average dry-bulb temperature, deg F
    pub db_temp_avg: f64,
    /// 99% heating design temperature, deg F
    pub heating_design_temp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WeatherHour {
    /// deg F
    pub db_temp: f64,
    /// 1 = January
    pub month: u8,
    /// 1 - 365
    pub day_of_year: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSeries {
    site: WeatherSite,
    hours: Vec<WeatherHour>,
}

#[derive(Debug, Deserialize)]
struct WeatherRow {
    db_temp: f64,
    month: Option<u8>,
    day_of_year: Option<u16>,
}

impl WeatherSeries {
    pub fn new(site: WeatherSite, hours: Vec<WeatherHour>) -> anyhow::Result<Self> {
        if hours.len() != HOURS_PER_YEAR {
            bail!(
                "Weather for site {} has {} hours rather than {HOURS_PER_YEAR}",
                site.tmy_id,
                hours.len()
            );
        }
        for (idx, hour) in hours.iter().enumerate() {
            if !hour.db_temp.is_finite() {
                bail!("Weather for site {} has a non-numeric temperature at hour {idx}", site.tmy_id);
            }
            if !(1..=12).contains(&hour.month) || !(1..=365).contains(&hour.day_of_year) {
                bail!(
                    "Weather for site {} has an invalid month or day at hour {idx}",
                    site.tmy_id
                );
            }
        }

        Ok(Self { site, hours })
    }

    /// Builds a series from 8760 temperatures that start at midnight on January 1st.
    pub fn from_temperatures(site: WeatherSite, temps: &[f64]) -> anyhow::Result<Self> {
        let hours = temps
            .iter()
            .enumerate()
            .map(|(idx, db_temp)| {
                let year_hour = YearHour::from_index(idx)
                    .ok_or_else(|| anyhow!("Hour {idx} is beyond the end of the year"))?;
                Ok(WeatherHour {
                    db_temp: *db_temp,
                    month: year_hour.month,
                    day_of_year: year_hour.day_of_year,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Self::new(site, hours)
    }

    pub fn site(&self) -> &WeatherSite {
        &self.site
    }

    pub fn hours(&self) -> &[WeatherHour] {
        &self.hours
    }

    /// Mean of the hourly temperatures, deg F
    pub fn mean_temp(&self) -> f64 {
        self.hours.iter().map(|h| h.db_temp).sum::<f64>() / self.hours.len() as f64
    }
}

/// Reads a weather CSV file with a header row and a `db_temp` column. `month` and
/// `day_of_year` columns are optional; where absent, rows are taken to start at midnight on
/// January 1st.
pub fn weather_data_to_series(file: impl Read, site: WeatherSite) -> anyhow::Result<WeatherSeries> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let hours = reader
        .deserialize::<WeatherRow>()
        .enumerate()
        .map(|(idx, row)| {
            let row = row?;
            let year_hour = YearHour::from_index(idx);
            let month = row
                .month
                .or(year_hour.map(|h| h.month))
                .ok_or_else(|| anyhow!("Row {idx} of weather file has no month"))?;
            let day_of_year = row
                .day_of_year
                .or(year_hour.map(|h| h.day_of_year))
                .ok_or_else(|| anyhow!("Row {idx} of weather file has no day of year"))?;
            Ok(WeatherHour {
                db_temp: row.db_temp,
                month,
                day_of_year,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    WeatherSeries::new(site, hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    #[fixture]
    fn site() -> WeatherSite {
        WeatherSite {
            tmy_id: 702730,
            city: "Anchorage".to_string(),
            db_temp_avg: 37.0,
            heating_design_temp: -14.0,
        }
    }

    #[rstest]
    fn should_read_csv_with_calendar_columns(site: WeatherSite) {
        let mut csv = String::from("db_temp, month, day_of_year\n");
        for idx in 0..HOURS_PER_YEAR {
            let hour = YearHour::from_index(idx).unwrap();
            csv.push_str(&format!("{}, {}, {}\n", hour.month as f64, hour.month, hour.day_of_year));
        }
        let series = weather_data_to_series(Cursor::new(csv), site).unwrap();
        assert_eq!(series.hours().len(), HOURS_PER_YEAR);
        assert_eq!(series.hours()[800].month, 2);
        assert_eq!(series.hours()[800].db_temp, 2.0);
        assert_eq!(series.site().tmy_id, 702730);
    }

    #[rstest]
    fn should_infer_calendar_when_only_temperatures_given(site: WeatherSite) {
        let csv = format!("db_temp\n{}", "10.0\n".repeat(HOURS_PER_YEAR));
        let series = weather_data_to_series(Cursor::new(csv), site).unwrap();
        assert_eq!(series.hours()[8759].day_of_year, 365);
        assert_relative_eq!(series.mean_temp(), 10.0);
    }

    #[rstest]
    fn should_reject_short_year(site: WeatherSite) {
        let csv = format!("db_temp\n{}", "10.0\n".repeat(100));
        assert!(weather_data_to_series(Cursor::new(csv), site).is_err());
    }

    #[rstest]
    fn should_reject_bad_month(site: WeatherSite) {
        let mut hours = WeatherSeries::from_temperatures(site.clone(), &[0.0; HOURS_PER_YEAR])
            .unwrap()
            .hours()
            .to_vec();
        hours[10].month = 13;
        assert!(WeatherSeries::new(site, hours).is_err());
    }
}
