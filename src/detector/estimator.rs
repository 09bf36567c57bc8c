use crate::config::DetectorConfiguration;
use crate::types::{ViewerEstimate, WindowSummary};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Fraction of the audience assumed to chat at all
    pub lurker_factor: f64,
    /// Minimum adjusted chat/viewer ratio for the lurker extrapolation
    pub min_ratio_threshold: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            lurker_factor: 0.25,
            min_ratio_threshold: 0.02,
        }
    }
}

impl From<&DetectorConfiguration> for EstimatorSettings {
    fn from(config: &DetectorConfiguration) -> Self {
        Self {
            lurker_factor: config.lurker_factor,
            min_ratio_threshold: config.min_ratio_threshold,
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Round half to even, saturating into `u64`
fn round_count(value: f64) -> u64 {
    let rounded = value.round_ties_even();
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else if rounded >= u64::MAX as f64 {
        u64::MAX
    } else {
        rounded as u64
    }
}

/// Split the reported audience into genuine and automated viewers.
///
/// Tiers, first match wins:
/// 1. no non-automated chatters: nobody is counted as real
/// 2. adjusted ratio at or above the threshold: extrapolate chatters by the lurker factor
/// 3. otherwise: scale the audience by the adjusted ratio
///
/// The result is then clamped to `[adjusted chatters, concurrent viewers]`.
pub fn estimate(concurrent_viewers: u64, summary: &WindowSummary, settings: &EstimatorSettings) -> ViewerEstimate {
    let adjusted_unique = summary.unique_authors.saturating_sub(summary.automated_authors);
    let raw_ratio = ratio(summary.unique_authors, concurrent_viewers);
    let adjusted_ratio = ratio(adjusted_unique, concurrent_viewers);

    let estimated = if adjusted_unique == 0 {
        0
    } else if adjusted_ratio >= settings.min_ratio_threshold {
        round_count(adjusted_unique as f64 / settings.lurker_factor)
    } else {
        round_count(concurrent_viewers as f64 * adjusted_ratio)
    };

    // Lower bound first, so the reported total wins when the two disagree
    let estimated_real = estimated.max(adjusted_unique).min(concurrent_viewers);

    ViewerEstimate {
        estimated_real,
        estimated_bot: concurrent_viewers - estimated_real,
        raw_ratio,
        adjusted_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(unique_authors: u64, automated_authors: u64) -> WindowSummary {
        WindowSummary {
            unique_authors,
            automated_authors,
            ..WindowSummary::default()
        }
    }

    #[test]
    fn test_sparse_chat_scales_down() {
        let est = estimate(1000, &summary(5, 0), &EstimatorSettings::default());
        assert_eq!(est.adjusted_ratio, 0.005);
        assert_eq!(est.estimated_real, 5);
        assert_eq!(est.estimated_bot, 995);
    }

    #[test]
    fn test_active_chat_uses_lurker_factor() {
        let est = estimate(1000, &summary(40, 10), &EstimatorSettings::default());
        assert_eq!(est.raw_ratio, 0.04);
        assert_eq!(est.adjusted_ratio, 0.03);
        assert_eq!(est.estimated_real, 120);
        assert_eq!(est.estimated_bot, 880);
    }

    #[test]
    fn test_all_automated_means_no_real_viewers() {
        let est = estimate(500, &summary(30, 30), &EstimatorSettings::default());
        assert_eq!(est.estimated_real, 0);
        assert_eq!(est.estimated_bot, 500);
        assert_eq!(est.adjusted_ratio, 0.0);

        // More automated than unique can't go negative
        let est = estimate(500, &summary(3, 7), &EstimatorSettings::default());
        assert_eq!(est.estimated_real, 0);
    }

    #[test]
    fn test_zero_viewers() {
        let est = estimate(0, &summary(12, 2), &EstimatorSettings::default());
        assert_eq!(est.raw_ratio, 0.0);
        assert_eq!(est.adjusted_ratio, 0.0);
        assert_eq!(est.estimated_real, 0);
        assert_eq!(est.estimated_bot, 0);
    }

    #[test]
    fn test_clamped_to_reported_total() {
        // 50 chatters / 0.25 = 200, but only 80 viewers reported
        let est = estimate(80, &summary(50, 0), &EstimatorSettings::default());
        assert_eq!(est.estimated_real, 80);
        assert_eq!(est.estimated_bot, 0);
    }

    #[test]
    fn test_rounds_half_to_even() {
        let settings = EstimatorSettings {
            lurker_factor: 0.4,
            min_ratio_threshold: 0.0,
        };
        // 1 / 0.4 = 2.5
        let est = estimate(100, &summary(1, 0), &settings);
        assert_eq!(est.estimated_real, 2);
    }

    #[test]
    fn test_bounds_hold_across_inputs() {
        let settings = EstimatorSettings::default();
        for viewers in [0u64, 1, 7, 49, 100, 1000, 25_000] {
            for unique in [0u64, 1, 3, 10, 60, 500] {
                for automated in [0u64, 1, 5, 60] {
                    let est = estimate(viewers, &summary(unique, automated), &settings);
                    let adjusted = unique.saturating_sub(automated);

                    assert!(est.estimated_real <= viewers);
                    assert_eq!(est.estimated_real + est.estimated_bot, viewers);
                    if viewers >= adjusted {
                        assert!(est.estimated_real >= adjusted);
                    }
                }
            }
        }
    }
}
