//! Daily dispatch optimizer for a grid-connected battery energy storage
//! system participating in wholesale energy arbitrage and
//! frequency-regulation markets.
//!
//! One linear program is built and solved per (month, day) over a 24-hour
//! horizon; the ending state of charge of each day becomes the boundary
//! condition of the next. See [`scheduler::DispatchScheduler`] for the
//! driving loop and [`optimizer::DayModel`] for the formulation.

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod optimizer;
pub mod output;
pub mod scheduler;
pub mod telemetry;
