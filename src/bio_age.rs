//! Biological age estimation
//!
//! Combines the day's computable factor impacts into a bounded deviation from
//! chronological age, and attributes that deviation back to each factor so the
//! per-factor years always add up to the total delta (up to 0.1 rounding per
//! factor).
//!
//! A single factor is never enough: with fewer than `min_factors` computable
//! factors the estimate is absent rather than driven by one noisy metric.

use crate::config::BioAgeConfig;
use crate::impact::FactorImpactCalculator;
use crate::types::{round1, DailyRecord, FactorYearImpact};
use crate::weighted::WeightedMean;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Result of a biological age estimate for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioAgeEstimate {
    /// Estimated biological age, rounded to 0.1 years
    pub biological_age: f64,
    /// Unrounded deviation from chronological age
    pub total_delta: f64,
    /// Per-factor attribution, `None` for factors without data
    pub factor_impacts: FactorYearImpact,
    /// Number of factors that contributed
    pub factors_used: usize,
}

/// Estimator combining factor impacts into a biological age
#[derive(Debug, Clone)]
pub struct BiologicalAgeEstimator {
    impacts: FactorImpactCalculator,
    config: BioAgeConfig,
}

impl Default for BiologicalAgeEstimator {
    fn default() -> Self {
        Self::new(FactorImpactCalculator::default(), BioAgeConfig::default())
    }
}

impl BiologicalAgeEstimator {
    pub fn new(impacts: FactorImpactCalculator, config: BioAgeConfig) -> Self {
        Self { impacts, config }
    }

    /// Estimate biological age for one day; `None` when too few factors have data
    pub fn estimate(&self, record: &DailyRecord, chronological_age: f64) -> Option<BioAgeEstimate> {
        let impacts = self.impacts.impacts_for(record);
        let count = impacts.len();

        if count < self.config.min_factors {
            debug!(
                user_id = %record.user_id,
                date = %record.date,
                factors = count,
                required = self.config.min_factors,
                "insufficient factors for biological age"
            );
            return None;
        }

        let mut mean = WeightedMean::new();
        for (factor, impact) in &impacts {
            trace!(%factor, impact, "factor impact");
            mean.push(Some(*impact), 1.0);
        }
        let avg_impact = mean.value()?;

        let max_years = self.config.max_years;
        let scale = max_years / count as f64;
        let total_delta = avg_impact * max_years;

        let mut factor_impacts = FactorYearImpact::default();
        for (factor, impact) in impacts {
            factor_impacts.set(factor, Some(round1(impact * scale)));
        }

        Some(BioAgeEstimate {
            biological_age: round1(chronological_age + total_delta),
            total_delta,
            factor_impacts,
            factors_used: count,
        })
    }
}
