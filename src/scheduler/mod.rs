//! Sequential day-by-day scheduling.
//!
//! Days are strictly sequential: the constraint set for day N needs the
//! realized ending state of charge of day N-1, so there is no day-level
//! parallelism to exploit. The scheduler owns the single piece of
//! cross-iteration mutable state (the carryover scalar) and the append-only
//! accumulator.

pub mod accumulator;

pub use accumulator::*;

use std::time::Duration;

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::data::PriceAdapter;
use crate::domain::RunSummary;
use crate::error::DispatchError;
use crate::optimizer::{BatteryParams, DayModel, Formulation};
use crate::output::OutputSink;

/// Drives the month/day loop: one model built, solved, and discarded per
/// day, with the ending state of charge threaded into the next day.
pub struct DispatchScheduler<P, S> {
    adapter: P,
    sink: S,
    params: BatteryParams,
    formulation: Formulation,
    solve_budget: Duration,
}

impl<P: PriceAdapter, S: OutputSink> DispatchScheduler<P, S> {
    pub fn new(
        adapter: P,
        sink: S,
        params: BatteryParams,
        formulation: Formulation,
        solve_budget: Duration,
    ) -> Self {
        Self {
            adapter,
            sink,
            params,
            formulation,
            solve_budget,
        }
    }

    /// Run the full schedule over `months`, which must be in true
    /// chronological order for the carryover to be physically meaningful —
    /// validated before any solve. Any per-day failure aborts the run; the
    /// sink is only finalized once every day has solved, so an aborted run
    /// leaves no valid output.
    pub fn run(&mut self, months: &[u32], initial_soc: f64) -> Result<RunSummary> {
        validate_month_order(months)?;

        let mut accumulator = ResultAccumulator::new(self.params.clone());
        // Ending state of the most recently solved day; nothing has been
        // solved yet.
        let mut carryover = 0.0_f64;

        for &month in months {
            let prices = self
                .adapter
                .load(month)
                .with_context(|| format!("loading prices for month {month}"))?;
            if prices.days.is_empty() {
                warn!(month, "no priced days in month, skipping");
                continue;
            }

            for &day in &prices.days {
                let inputs = prices.day_inputs(day);
                // Calendar day 1 anchors to the run-level initial state;
                // every other day to the previous day's ending state.
                let boundary = if day == 1 { initial_soc } else { carryover };
                debug!(month, day, boundary, "building day model");

                let mut model = DayModel::build(&self.params, self.formulation, month, day);
                model.set_objective(&inputs);
                model.add_constraints(boundary, &inputs);
                let solved = model.solve(self.solve_budget)?;

                info!(
                    month,
                    day,
                    objective = solved.objective_value,
                    ending_soc = solved.schedule.ending_soc(),
                    "day solved"
                );
                carryover = accumulator.record(solved);
                if let Some(record) = accumulator.last() {
                    self.sink
                        .append_day(record)
                        .with_context(|| format!("buffering output for month {month}, day {day}"))?;
                }
            }
        }

        let summary = accumulator.summary();
        self.sink
            .finalize(&summary)
            .context("finalizing output sink")?;
        info!(
            days = summary.days_solved,
            total_revenue = summary.total_revenue,
            "run complete"
        );
        Ok(summary)
    }

    /// Hand the sink back, e.g. to inspect an in-memory sink after a run.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

fn validate_month_order(months: &[u32]) -> Result<(), DispatchError> {
    if let Some((a, b)) = months.iter().tuple_windows().find(|(a, b)| a >= b) {
        return Err(DispatchError::Sequence(format!(
            "month {b} scheduled after month {a}"
        )));
    }
    Ok(())
}
