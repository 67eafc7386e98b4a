//! Core data model for the dispatch optimizer.
//!
//! Prices and data gaps are keyed by a structured (month, hour, day) key;
//! the per-day dense view ([`DayInputs`]) is what the optimization model
//! consumes. Solved days are captured as [`DaySchedule`] / [`DayRecord`]
//! and aggregated into a [`RunSummary`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hours in the daily optimization horizon.
pub const HOURS: usize = 24;

/// Structured key for hourly market data: hour is 1-based (1..=24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub month: u32,
    pub hour: u32,
    pub day: u32,
}

impl PriceKey {
    pub fn new(month: u32, hour: u32, day: u32) -> Self {
        Self { month, hour, day }
    }
}

/// Hourly price mapping for one market product. Built once per month by the
/// price adapter and immutable afterwards: every (month, day) carried in the
/// schedule has an entry for all 24 hours, with source gaps filled to zero
/// and recorded separately in a [`MissingHours`] set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    prices: HashMap<PriceKey, f64>,
}

impl PriceSeries {
    pub fn insert(&mut self, key: PriceKey, price: f64) {
        self.prices.insert(key, price);
    }

    pub fn get(&self, key: &PriceKey) -> Option<f64> {
        self.prices.get(key).copied()
    }

    pub fn contains(&self, key: &PriceKey) -> bool {
        self.prices.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Calendar days this series has any entry for in the given month,
    /// in ascending order.
    pub fn days_in_month(&self, month: u32) -> BTreeSet<u32> {
        self.prices
            .keys()
            .filter(|k| k.month == month)
            .map(|k| k.day)
            .collect()
    }
}

/// Set of (month, hour, day) keys for which no source price existed before
/// the zero fill. Hours in these sets get their market activity forced to
/// zero by the model. The three instances (energy, reg-up, reg-down) are
/// not necessarily disjoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingHours {
    keys: HashSet<PriceKey>,
}

impl MissingHours {
    pub fn insert(&mut self, key: PriceKey) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: &PriceKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Everything the scheduler needs for one month of optimization: the three
/// price series, their missing-hour sets, and the days available to solve
/// (derived from the energy series).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthPrices {
    pub month: u32,
    pub energy: PriceSeries,
    pub reg_up: PriceSeries,
    pub reg_down: PriceSeries,
    pub missing_energy: MissingHours,
    pub missing_reg_up: MissingHours,
    pub missing_reg_down: MissingHours,
    pub days: BTreeSet<u32>,
}

impl MonthPrices {
    /// Dense per-day view of prices and gaps for the model.
    ///
    /// A key absent even after the zero fill (malformed adapter output) is
    /// recovered as price 0 plus a missing flag, never an error.
    pub fn day_inputs(&self, day: u32) -> DayInputs {
        let mut inputs = DayInputs::empty(self.month, day);
        for h in 0..HOURS {
            let key = PriceKey::new(self.month, (h + 1) as u32, day);
            inputs.energy[h] = Self::price_or_gap(&self.energy, &key, "energy");
            inputs.reg_up[h] = Self::price_or_gap(&self.reg_up, &key, "regulation up");
            inputs.reg_down[h] = Self::price_or_gap(&self.reg_down, &key, "regulation down");
            inputs.missing_energy[h] =
                self.missing_energy.contains(&key) || !self.energy.contains(&key);
            inputs.missing_reg_up[h] =
                self.missing_reg_up.contains(&key) || !self.reg_up.contains(&key);
            inputs.missing_reg_down[h] =
                self.missing_reg_down.contains(&key) || !self.reg_down.contains(&key);
        }
        inputs
    }

    fn price_or_gap(series: &PriceSeries, key: &PriceKey, product: &str) -> f64 {
        match series.get(key) {
            Some(price) => price,
            None => {
                warn!(
                    month = key.month,
                    day = key.day,
                    hour = key.hour,
                    product,
                    "price absent after fill, treating hour as missing"
                );
                0.0
            }
        }
    }
}

/// Dense inputs for one day's LP: one price row and one missing-hour row
/// per market product, indexed 0..24 for hours 1..=24.
#[derive(Debug, Clone, PartialEq)]
pub struct DayInputs {
    pub month: u32,
    pub day: u32,
    pub energy: [f64; HOURS],
    pub reg_up: [f64; HOURS],
    pub reg_down: [f64; HOURS],
    pub missing_energy: [bool; HOURS],
    pub missing_reg_up: [bool; HOURS],
    pub missing_reg_down: [bool; HOURS],
}

impl DayInputs {
    /// A day with every hour of every product missing (prices zero).
    pub fn empty(month: u32, day: u32) -> Self {
        Self {
            month,
            day,
            energy: [0.0; HOURS],
            reg_up: [0.0; HOURS],
            reg_down: [0.0; HOURS],
            missing_energy: [true; HOURS],
            missing_reg_up: [true; HOURS],
            missing_reg_down: [true; HOURS],
        }
    }
}

/// One hour of the solved schedule. Capacity offers are only present under
/// the capacity-aware formulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyDispatch {
    /// 1-based hour of day.
    pub hour: u32,
    pub charge: f64,
    pub discharge: f64,
    pub reg_up_deployed: f64,
    pub reg_down_deployed: f64,
    pub reg_up_capacity: Option<f64>,
    pub reg_down_capacity: Option<f64>,
    /// State of charge at the end of this hour.
    pub soc: f64,
}

/// The LP solution for one day: 24 hourly dispatch entries plus the
/// day-start boundary state of charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySchedule {
    /// State of charge the day started from (the boundary condition the
    /// model was anchored to).
    pub soc_start: f64,
    pub hours: Vec<HourlyDispatch>,
}

impl DaySchedule {
    /// Hour-24 state of charge; the only value that crosses the day
    /// boundary (as the next day's carryover).
    pub fn ending_soc(&self) -> f64 {
        self.hours.last().map_or(self.soc_start, |h| h.soc)
    }

    /// Total charge-side throughput: energy charged plus regulation-down
    /// deployed, summed over the day.
    pub fn charge_side_total(&self) -> f64 {
        self.hours
            .iter()
            .map(|h| h.charge + h.reg_down_deployed)
            .sum()
    }

    /// Total discharge-side throughput: energy discharged plus
    /// regulation-up deployed, summed over the day.
    pub fn discharge_side_total(&self) -> f64 {
        self.hours
            .iter()
            .map(|h| h.discharge + h.reg_up_deployed)
            .sum()
    }
}

/// A solved day as kept by the result accumulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRecord {
    pub month: u32,
    pub day: u32,
    pub schedule: DaySchedule,
    /// Objective value of the solved model.
    pub revenue: f64,
    /// Whether both daily throughput budgets were fully exhausted.
    pub full_cycle: bool,
}

/// Run-level aggregates, computed in memory over the accumulated days.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub days_solved: usize,
    pub total_revenue: f64,
    pub monthly_cycles: BTreeMap<u32, u32>,
}
