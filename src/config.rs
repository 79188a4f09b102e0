use serde::Deserialize;

use crate::chemistry::constants::{DEFAULT_ACCURACY, DEFAULT_HISTOGRAM_STEP, DEFAULT_MAX_E_VALUE};

/// Numeric parameters shared by the batch operations.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Identifications with a larger e-value are not annotated.
    pub max_e_value: f64,
    /// Relative mass tolerance used by both matching policies.
    pub accuracy: f64,
    /// Bucket width of the match statistics.
    pub histogram_step: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            max_e_value: DEFAULT_MAX_E_VALUE,
            accuracy: DEFAULT_ACCURACY,
            histogram_step: DEFAULT_HISTOGRAM_STEP,
        }
    }
}

impl AnalysisConfig {
    pub fn accepts_e_value(&self, e_value: f64) -> bool {
        e_value <= self.max_e_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historical_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_e_value, 1e-10);
        assert_eq!(config.accuracy, 1e-5);
        assert!(config.accepts_e_value(1e-10));
        assert!(!config.accepts_e_value(2e-10));
    }
}
