use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::optimizer::{BatteryParams, Formulation};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub battery: BatteryParams,
    pub data: DataConfig,
    pub output: OutputConfig,
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Months to optimize, in chronological order.
    pub months: Vec<u32>,
    /// State of charge the battery starts the run with.
    pub initial_soc: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub input_dir: PathBuf,
    pub energy_file: String,
    pub regulation_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    pub formulation: Formulation,
    /// Per-day wall-clock budget for the LP solve, in seconds.
    pub solve_budget_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BESS__").split("__"));
        Ok(figment.extract()?)
    }
}
