//! Threshold rule evaluated against a campaign's cached metrics.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::store::PerformanceMetric;

/// Pause rule for underperforming campaigns.
///
/// Only `min_roas` is evaluated. `max_cpc` and `max_cpa` are carried for
/// display but have no effect.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationRule {
    pub min_roas: f64,
    pub max_cpc: Option<Decimal>,
    pub max_cpa: Option<Decimal>,
}

impl Default for OptimizationRule {
    fn default() -> Self {
        Self {
            min_roas: 1.0,
            max_cpc: None,
            max_cpa: None,
        }
    }
}

impl OptimizationRule {
    pub fn with_min_roas(min_roas: f64) -> Self {
        Self {
            min_roas,
            ..Default::default()
        }
    }

    /// True when `0 < roas < min_roas`. A ROAS of exactly zero means no
    /// attributed revenue yet and never triggers a pause.
    pub fn should_pause(&self, metric: &PerformanceMetric) -> bool {
        metric.roas > 0.0 && metric.roas < self.min_roas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn metric(roas: f64) -> PerformanceMetric {
        PerformanceMetric::new(Uuid::new_v4(), Decimal::ONE_HUNDRED, 10, roas)
    }

    #[test]
    fn pauses_strictly_between_zero_and_threshold() {
        let rule = OptimizationRule::default();
        assert!(rule.should_pause(&metric(0.5)));
        assert!(rule.should_pause(&metric(0.99)));
        assert!(!rule.should_pause(&metric(0.0)));
        assert!(!rule.should_pause(&metric(1.0)));
        assert!(!rule.should_pause(&metric(1.5)));
        assert!(!rule.should_pause(&metric(-1.0)));
        assert!(!rule.should_pause(&metric(f64::NAN)));
    }

    #[test]
    fn custom_threshold() {
        let rule = OptimizationRule::with_min_roas(2.0);
        assert!(rule.should_pause(&metric(1.5)));
        assert!(!rule.should_pause(&metric(2.5)));
    }
}
