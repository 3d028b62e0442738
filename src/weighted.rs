//! Weighted average with dynamic renormalization
//!
//! Scores built from several optional components only average over the
//! components that have data: `Σ(value × weight) / Σ(weight)` across present
//! components, absent when none are present.

/// Accumulator for a renormalized weighted mean
#[derive(Debug, Clone, Default)]
pub struct WeightedMean {
    weighted_sum: f64,
    weight_sum: f64,
    components: usize,
}

impl WeightedMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component; `None` values are skipped along with their weight
    pub fn push(&mut self, value: Option<f64>, weight: f64) -> &mut Self {
        if let Some(v) = value {
            if weight > 0.0 && v.is_finite() {
                self.weighted_sum += v * weight;
                self.weight_sum += weight;
                self.components += 1;
            }
        }
        self
    }

    /// Number of components that contributed
    pub fn components(&self) -> usize {
        self.components
    }

    /// The renormalized mean, or `None` when no component was present
    pub fn value(&self) -> Option<f64> {
        if self.weight_sum > 0.0 {
            Some(self.weighted_sum / self.weight_sum)
        } else {
            None
        }
    }
}

/// Renormalized weighted mean over `(value, weight)` pairs
pub fn weighted_mean<I>(components: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, f64)>,
{
    let mut acc = WeightedMean::new();
    for (value, weight) in components {
        acc.push(value, weight);
    }
    acc.value()
}
