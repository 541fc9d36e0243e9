//! In-process cron schedule for optimization runs.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;

use super::OptimizationEngine;

/// Parse a cron expression (seconds field included).
pub fn parse_schedule(expr: &str) -> Result<Schedule, String> {
    Schedule::from_str(expr).map_err(|e| format!("invalid cron: {e}"))
}

/// Spawn a background task that runs the engine at each fire time.
pub fn spawn_optimizer_schedule(
    engine: Arc<OptimizationEngine>,
    schedule: Schedule,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::warn!("Optimizer schedule has no upcoming fire times, stopping");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::debug!(next = %next, "Next scheduled optimization");
            tokio::time::sleep(wait).await;

            match engine.run().await {
                Ok(report) => tracing::info!(
                    evaluated = report.evaluated,
                    paused = report.paused.len(),
                    "Scheduled optimization finished"
                ),
                Err(e) => tracing::error!("Scheduled optimization failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_expression() {
        let schedule = parse_schedule("0 0 */6 * * *").unwrap();
        assert!(schedule.upcoming(Utc).next().is_some());
    }

    #[test]
    fn rejects_invalid_expression() {
        assert!(parse_schedule("every six hours").is_err());
    }
}
