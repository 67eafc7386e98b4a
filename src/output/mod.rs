//! Result output.
//!
//! Sinks receive one append per solved day and a single finalize once the
//! whole run has succeeded. The CSV sink buffers everything and only writes
//! files at finalize time, so an aborted run leaves no partial tables
//! behind.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{DayRecord, RunSummary};

pub const SCHEDULE_FILE: &str = "schedule.csv";
pub const STATE_OF_CHARGE_FILE: &str = "state_of_charge.csv";
pub const DAILY_CYCLES_FILE: &str = "total_cycles_daily.csv";
pub const DAILY_REVENUE_FILE: &str = "daily_revenue.csv";
pub const TOTAL_REVENUE_FILE: &str = "total_revenue.csv";
pub const MONTHLY_CYCLES_FILE: &str = "total_cycles.csv";

/// Append-only tabular writer for run results.
pub trait OutputSink {
    /// Called once per solved day, in processing order.
    fn append_day(&mut self, record: &DayRecord) -> Result<()>;
    /// Called exactly once, after every day of the run has solved.
    fn finalize(&mut self, summary: &RunSummary) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct ScheduleRow {
    #[serde(rename = "Hour")]
    hour: u32,
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "Energy_Charged")]
    energy_charged: f64,
    #[serde(rename = "Energy_Discharged")]
    energy_discharged: f64,
    #[serde(rename = "Regulation_Up")]
    regulation_up: f64,
    #[serde(rename = "Regulation_Down")]
    regulation_down: f64,
}

#[derive(Debug, Serialize)]
struct StateOfChargeRow {
    #[serde(rename = "Hour")]
    hour: u32,
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "State_of_Charge")]
    state_of_charge: f64,
}

#[derive(Debug, Serialize)]
struct DailyCycleRow {
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Total_Cycle")]
    total_cycle: u32,
}

#[derive(Debug, Serialize)]
struct DailyRevenueRow {
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Total_Daily_Revenue")]
    total_daily_revenue: f64,
}

#[derive(Debug, Serialize)]
struct TotalRevenueRow {
    #[serde(rename = "Total_Revenue")]
    total_revenue: f64,
}

#[derive(Debug, Serialize)]
struct MonthlyCyclesRow {
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "Total_Cycle")]
    total_cycle: u32,
}

/// Writes the run's six result tables to a directory.
#[derive(Debug)]
pub struct CsvOutputSink {
    output_dir: PathBuf,
    buffered: Vec<DayRecord>,
}

impl CsvOutputSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            buffered: Vec::new(),
        }
    }

    fn write_rows<T: Serialize>(
        &self,
        file_name: &str,
        rows: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating output file {}", path.display()))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("flushing output file {}", path.display()))?;
        Ok(())
    }
}

impl OutputSink for CsvOutputSink {
    fn append_day(&mut self, record: &DayRecord) -> Result<()> {
        self.buffered.push(record.clone());
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("creating output directory {}", self.output_dir.display())
        })?;

        self.write_rows(
            SCHEDULE_FILE,
            self.buffered.iter().flat_map(|r| {
                r.schedule.hours.iter().map(move |h| ScheduleRow {
                    hour: h.hour,
                    day: r.day,
                    month: r.month,
                    energy_charged: h.charge,
                    energy_discharged: h.discharge,
                    regulation_up: h.reg_up_deployed,
                    regulation_down: h.reg_down_deployed,
                })
            }),
        )?;

        self.write_rows(
            STATE_OF_CHARGE_FILE,
            self.buffered.iter().flat_map(|r| {
                r.schedule.hours.iter().map(move |h| StateOfChargeRow {
                    hour: h.hour,
                    day: r.day,
                    month: r.month,
                    state_of_charge: h.soc,
                })
            }),
        )?;

        self.write_rows(
            DAILY_CYCLES_FILE,
            self.buffered.iter().map(|r| DailyCycleRow {
                month: r.month,
                day: r.day,
                total_cycle: u32::from(r.full_cycle),
            }),
        )?;

        self.write_rows(
            DAILY_REVENUE_FILE,
            self.buffered.iter().map(|r| DailyRevenueRow {
                month: r.month,
                day: r.day,
                total_daily_revenue: r.revenue,
            }),
        )?;

        self.write_rows(
            TOTAL_REVENUE_FILE,
            [TotalRevenueRow {
                total_revenue: summary.total_revenue,
            }],
        )?;

        self.write_rows(
            MONTHLY_CYCLES_FILE,
            summary.monthly_cycles.iter().map(|(&month, &total_cycle)| {
                MonthlyCyclesRow { month, total_cycle }
            }),
        )?;

        Ok(())
    }
}

/// Keeps everything in memory; used by tests and callers that post-process
/// results themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub days: Vec<DayRecord>,
    pub summary: Option<RunSummary>,
}

impl OutputSink for MemorySink {
    fn append_day(&mut self, record: &DayRecord) -> Result<()> {
        self.days.push(record.clone());
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<()> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}
