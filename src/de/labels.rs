//! Resistant / sensitive class assignment from drug-response percentiles

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignatureError};
use crate::stats::quantile;

/// Minimum samples required in each class
pub const MIN_CLASS_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    Sensitive,
    Resistant,
    /// Trimmed outlier or ambiguous middle response
    Excluded,
}

/// Class labels for one training subset plus the cut points that produced them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassLabels {
    pub labels: Vec<ClassLabel>,
    /// Responses strictly below this are sensitive
    pub sensitive_below: f64,
    /// Responses at or above this are resistant
    pub resistant_from: f64,
}

impl ClassLabels {
    fn count(&self, label: ClassLabel) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    pub fn n_sensitive(&self) -> usize {
        self.count(ClassLabel::Sensitive)
    }

    pub fn n_resistant(&self) -> usize {
        self.count(ClassLabel::Resistant)
    }

    pub fn n_excluded(&self) -> usize {
        self.count(ClassLabel::Excluded)
    }

    /// Positions of labelled samples, in input order
    pub fn labelled_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l != ClassLabel::Excluded)
            .map(|(i, _)| i)
            .collect()
    }

    /// Group vector over the labelled samples: `true` = sensitive
    pub fn sensitive_mask(&self) -> Vec<bool> {
        self.labels
            .iter()
            .filter(|&&l| l != ClassLabel::Excluded)
            .map(|&l| l == ClassLabel::Sensitive)
            .collect()
    }
}

/// Assign classes from drug response (lower response = more sensitive).
///
/// Responses outside the `[rm_extreme_perc, 1 - rm_extreme_perc]` percentile
/// band are dropped first. Of the remainder, responses below the
/// `de_comp_perc` percentile are sensitive, responses at or above the
/// `1 - de_comp_perc` percentile are resistant and the middle is excluded.
pub fn assign_labels(response: &[f64], de_comp_perc: f64, rm_extreme_perc: f64) -> Result<ClassLabels> {
    if !(de_comp_perc > 0.0 && de_comp_perc <= 0.5) {
        return Err(SignatureError::Configuration {
            reason: format!(
                "de_comp_perc {} makes the sensitive and resistant classes overlap",
                de_comp_perc
            ),
        });
    }
    if !(0.0..0.5).contains(&rm_extreme_perc) {
        return Err(SignatureError::Configuration {
            reason: format!("rm_extreme_perc {} leaves no samples", rm_extreme_perc),
        });
    }

    let trim_low = quantile(response, rm_extreme_perc);
    let trim_high = quantile(response, 1.0 - rm_extreme_perc);
    let eligible: Vec<bool> = response
        .iter()
        .map(|&r| r.is_finite() && r >= trim_low && r <= trim_high)
        .collect();
    let kept: Vec<f64> = response
        .iter()
        .zip(eligible.iter())
        .filter(|(_, &e)| e)
        .map(|(&r, _)| r)
        .collect();

    if kept.is_empty() {
        return Err(SignatureError::Configuration {
            reason: "trimming left zero eligible samples".to_string(),
        });
    }

    let sensitive_below = quantile(&kept, de_comp_perc);
    let resistant_from = quantile(&kept, 1.0 - de_comp_perc);
    log::debug!(
        "Response cuts: trim [{:.4}, {:.4}], sensitive < {:.4}, resistant >= {:.4}",
        trim_low,
        trim_high,
        sensitive_below,
        resistant_from
    );

    let labels = response
        .iter()
        .zip(eligible.iter())
        .map(|(&r, &e)| {
            if !e {
                ClassLabel::Excluded
            } else if r < sensitive_below {
                ClassLabel::Sensitive
            } else if r >= resistant_from {
                ClassLabel::Resistant
            } else {
                ClassLabel::Excluded
            }
        })
        .collect();

    let labels = ClassLabels {
        labels,
        sensitive_below,
        resistant_from,
    };

    if labels.n_sensitive() < MIN_CLASS_SIZE || labels.n_resistant() < MIN_CLASS_SIZE {
        return Err(SignatureError::InsufficientData {
            reason: format!(
                "{} sensitive and {} resistant samples, at least {} of each required",
                labels.n_sensitive(),
                labels.n_resistant(),
                MIN_CLASS_SIZE
            ),
        });
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_quintile_split() {
        let labels = assign_labels(&ramp(80), 0.2, 0.0).unwrap();
        assert_eq!(labels.n_sensitive(), 16);
        assert_eq!(labels.n_resistant(), 16);
        assert_eq!(labels.n_excluded(), 48);
        assert_eq!(labels.labels[0], ClassLabel::Sensitive);
        assert_eq!(labels.labels[79], ClassLabel::Resistant);
        assert_eq!(labels.labels[40], ClassLabel::Excluded);
    }

    #[test]
    fn test_extreme_trim_drops_outliers() {
        let labels = assign_labels(&ramp(100), 0.2, 0.05).unwrap();
        // values below the 5th and above the 95th percentile are excluded
        assert_eq!(labels.labels[0], ClassLabel::Excluded);
        assert_eq!(labels.labels[99], ClassLabel::Excluded);
        assert_eq!(labels.labels[10], ClassLabel::Sensitive);
        assert_eq!(labels.labels[90], ClassLabel::Resistant);
    }

    #[test]
    fn test_sensitive_mask_follows_labelled_order() {
        let response = vec![5.0, 0.0, 9.0, 1.0, 4.0, 8.0, 2.0, 3.0, 6.0, 7.0];
        let labels = assign_labels(&response, 0.2, 0.0).unwrap();
        let idx = labels.labelled_indices();
        let mask = labels.sensitive_mask();
        assert_eq!(idx.len(), mask.len());
        for (&i, &s) in idx.iter().zip(mask.iter()) {
            assert_eq!(s, response[i] < 2.0);
        }
    }

    #[test]
    fn test_too_few_samples_per_class() {
        let result = assign_labels(&ramp(6), 0.2, 0.0);
        assert!(matches!(result, Err(SignatureError::InsufficientData { .. })));
    }

    #[test]
    fn test_overlapping_split_rejected() {
        let result = assign_labels(&ramp(20), 0.6, 0.0);
        assert!(matches!(result, Err(SignatureError::Configuration { .. })));
    }
}
