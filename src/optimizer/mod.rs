//! Rule-based campaign optimizer.

mod engine;
pub mod rules;
pub mod schedule;

pub use engine::{OptimizationEngine, OptimizationReport, PausedCampaign};
pub use rules::OptimizationRule;
pub use schedule::{parse_schedule, spawn_optimizer_schedule};
