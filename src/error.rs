use thiserror::Error;

/// Fatal per-run errors. Any of these aborts the whole scheduled run:
/// the carryover state for later days would otherwise be built on an
/// undefined prior state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The day's LP has no feasible point (e.g. a boundary state of charge
    /// above the battery's energy capacity).
    #[error("no feasible dispatch for month {month}, day {day}")]
    Infeasible { month: u32, day: u32 },

    /// Numerical or solver-internal failure, including a blown
    /// per-day solve-time budget.
    #[error("solver failure for month {month}, day {day}: {detail}")]
    Solver { month: u32, day: u32, detail: String },

    /// Months supplied out of chronological order. Detected before any
    /// solve; out-of-order carryover would be silently wrong otherwise.
    #[error("months out of chronological order: {0}")]
    Sequence(String),
}
