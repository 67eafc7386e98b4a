//! Price data ingestion.
//!
//! The CSV adapter reads the two market files (day-ahead energy and
//! regulation clearing prices), keeps only the requested month, drops rows
//! whose price column is empty, then fills every remaining (day, hour) slot
//! so the model sees a complete 24-hour grid: filled hours get price zero
//! and are recorded in the missing-hour sets that force them out of the bid.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{MissingHours, MonthPrices, PriceKey, PriceSeries, HOURS};

/// Supplies one month of prices, missing-hour sets, and available days.
pub trait PriceAdapter {
    fn load(&self, month: u32) -> Result<MonthPrices>;
}

/// Format of the `Operating Day` column in both source files.
const OPERATING_DAY_FORMAT: &str = "%m/%d/%y";

#[derive(Debug, Deserialize)]
struct EnergyRow {
    #[serde(rename = "Operating Day")]
    operating_day: String,
    #[serde(rename = "Operating Hour")]
    operating_hour: u32,
    #[serde(rename = "Price")]
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RegulationRow {
    #[serde(rename = "Operating Day")]
    operating_day: String,
    #[serde(rename = "Operating Hour")]
    operating_hour: u32,
    #[serde(rename = "Regulation Up")]
    regulation_up: Option<f64>,
    #[serde(rename = "Regulation Down")]
    regulation_down: Option<f64>,
}

/// Reads energy and regulation price CSVs from a directory.
#[derive(Debug, Clone)]
pub struct CsvPriceAdapter {
    input_dir: PathBuf,
    energy_file: String,
    regulation_file: String,
}

impl CsvPriceAdapter {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        energy_file: impl Into<String>,
        regulation_file: impl Into<String>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            energy_file: energy_file.into(),
            regulation_file: regulation_file.into(),
        }
    }

    fn read_energy(&self, month: u32, series: &mut PriceSeries) -> Result<()> {
        let path = self.input_dir.join(&self.energy_file);
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("opening energy price file {}", path.display()))?;
        for row in reader.deserialize() {
            let row: EnergyRow =
                row.with_context(|| format!("reading energy price file {}", path.display()))?;
            // Rows without a price are dropped here and re-surface as
            // missing hours after the fill.
            let Some(price) = row.price else { continue };
            if let Some(key) = row_key(&row.operating_day, row.operating_hour, month)? {
                series.insert(key, price);
            }
        }
        Ok(())
    }

    fn read_regulation(
        &self,
        month: u32,
        reg_up: &mut PriceSeries,
        reg_down: &mut PriceSeries,
    ) -> Result<()> {
        let path = self.input_dir.join(&self.regulation_file);
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("opening regulation price file {}", path.display()))?;
        for row in reader.deserialize() {
            let row: RegulationRow =
                row.with_context(|| format!("reading regulation price file {}", path.display()))?;
            let Some(key) = row_key(&row.operating_day, row.operating_hour, month)? else {
                continue;
            };
            // The two columns are cleaned independently: a row may carry a
            // reg-up price while its reg-down cell is empty.
            if let Some(price) = row.regulation_up {
                reg_up.insert(key, price);
            }
            if let Some(price) = row.regulation_down {
                reg_down.insert(key, price);
            }
        }
        Ok(())
    }
}

/// Parse one source row into a price key, or None when the row belongs to
/// another month or carries an out-of-range hour.
fn row_key(operating_day: &str, operating_hour: u32, month: u32) -> Result<Option<PriceKey>> {
    let date = NaiveDate::parse_from_str(operating_day.trim(), OPERATING_DAY_FORMAT)
        .with_context(|| format!("unparseable operating day {operating_day:?}"))?;
    if date.month() != month {
        return Ok(None);
    }
    if !(1..=HOURS as u32).contains(&operating_hour) {
        warn!(
            operating_day,
            operating_hour, "operating hour outside 1..=24, skipping row"
        );
        return Ok(None);
    }
    Ok(Some(PriceKey::new(month, operating_hour, date.day())))
}

/// Fill every absent hour of every day the series knows about with a zero
/// price, recording the filled keys as missing.
fn fill_missing_hours(month: u32, series: &mut PriceSeries, missing: &mut MissingHours) {
    for day in series.days_in_month(month) {
        for hour in 1..=HOURS as u32 {
            let key = PriceKey::new(month, hour, day);
            if !series.contains(&key) {
                series.insert(key, 0.0);
                missing.insert(key);
            }
        }
    }
}

impl PriceAdapter for CsvPriceAdapter {
    fn load(&self, month: u32) -> Result<MonthPrices> {
        let mut out = MonthPrices {
            month,
            ..MonthPrices::default()
        };
        self.read_energy(month, &mut out.energy)?;
        self.read_regulation(month, &mut out.reg_up, &mut out.reg_down)?;

        fill_missing_hours(month, &mut out.energy, &mut out.missing_energy);
        fill_missing_hours(month, &mut out.reg_up, &mut out.missing_reg_up);
        fill_missing_hours(month, &mut out.reg_down, &mut out.missing_reg_down);

        // The schedule runs over the days the energy market was priced.
        out.days = out.energy.days_in_month(month);
        debug!(
            month,
            days = out.days.len(),
            missing_energy = out.missing_energy.len(),
            missing_reg_up = out.missing_reg_up.len(),
            missing_reg_down = out.missing_reg_down.len(),
            "loaded month prices"
        );
        Ok(out)
    }
}
