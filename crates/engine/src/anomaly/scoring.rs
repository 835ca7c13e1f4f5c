//! Per-technique scoring over forecast points aligned with actuals.
//!
//! Every score lands in `[0, 1]`: 0 is normal, 1 is maximally anomalous.

use chrono::{DateTime, Utc};

use tidewatch_core::pipeline::{AnomalyConfig, AnomalyTechnique};
use tidewatch_core::{AnomalyScore, ForecastPoint};

use crate::error::EngineError;

/// A forecast point paired with the actual observed at its timestamp.
#[derive(Debug, Clone, Copy)]
pub struct Aligned<'a> {
    pub timestamp: DateTime<Utc>,
    pub actual: f64,
    pub point: &'a ForecastPoint,
}

impl Aligned<'_> {
    fn residual(&self) -> f64 {
        self.actual - self.point.mean
    }
}

/// Quantile levels bounding a central band of coverage `confidence_level`.
pub fn band_levels(confidence_level: f64) -> (f64, f64) {
    let tail = (1.0 - confidence_level) / 2.0;
    (tail, 1.0 - tail)
}

/// Distance outside `[low, high]` relative to the band width, clipped to 1.
///
/// Values inside the band score 0. A zero-width band scores 1 for any value
/// outside it.
pub fn band_score(value: f64, low: f64, high: f64) -> f64 {
    let distance = if value > high {
        value - high
    } else if value < low {
        low - value
    } else {
        return 0.0;
    };
    let width = high - low;
    if width <= f64::EPSILON {
        return 1.0;
    }
    (distance / width).min(1.0)
}

/// `min(1, |residual| / (threshold * stddev))`; anomalous once the score hits 1.
pub fn z_score(residual: f64, stddev: f64, threshold: f64) -> (f64, bool) {
    if stddev < f64::EPSILON {
        let score = if residual.abs() < f64::EPSILON { 0.0 } else { 1.0 };
        return (score, score >= 1.0);
    }
    let score = (residual.abs() / (threshold * stddev)).min(1.0);
    (score, score >= 1.0)
}

/// Population standard deviation.
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    variance.sqrt()
}

/// Percentile of ascending data with linear interpolation between ranks.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => f64::NAN,
        [only] => *only,
        _ => {
            let index = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
            let lower = index.floor() as usize;
            let upper = index.ceil() as usize;
            if lower == upper || upper >= sorted.len() {
                sorted[lower]
            } else {
                let fraction = index - lower as f64;
                sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
            }
        }
    }
}

/// Score aligned points with one of the locally computed techniques.
pub fn score(config: &AnomalyConfig, aligned: &[Aligned<'_>]) -> Result<Vec<AnomalyScore>, EngineError> {
    match config.technique {
        AnomalyTechnique::ConfidenceInterval => confidence_interval(aligned, config.confidence_level),
        AnomalyTechnique::ZScore => Ok(rolling_z_score(aligned, config.threshold, config.residual_window)),
        AnomalyTechnique::Iqr => Ok(rolling_iqr(aligned, config.threshold, config.residual_window)),
        AnomalyTechnique::IsolationForest => Err(EngineError::UnsupportedTechnique {
            technique: AnomalyTechnique::IsolationForest,
            reason: "only the model can score this technique".to_string(),
        }),
    }
}

fn confidence_interval(
    aligned: &[Aligned<'_>],
    confidence_level: f64,
) -> Result<Vec<AnomalyScore>, EngineError> {
    let (low_level, high_level) = band_levels(confidence_level);
    aligned
        .iter()
        .map(|a| {
            let (Some(low), Some(high)) = (
                a.point.nearest_quantile(low_level),
                a.point.nearest_quantile(high_level),
            ) else {
                return Err(EngineError::UnsupportedTechnique {
                    technique: AnomalyTechnique::ConfidenceInterval,
                    reason: "forecast carries no quantiles".to_string(),
                });
            };
            let (low, high) = if low.value <= high.value {
                (low.value, high.value)
            } else {
                (high.value, low.value)
            };
            let score = band_score(a.actual, low, high);
            Ok(AnomalyScore {
                timestamp: a.timestamp,
                actual_value: a.actual,
                predicted_value: a.point.mean,
                score,
                is_anomaly: a.actual < low || a.actual > high,
            })
        })
        .collect()
}

/// Fewest residuals a rolling statistic is computed over. Points with a
/// thinner window score 0.
const MIN_RESIDUALS: usize = 2;

/// Residuals the statistic for point `i` is computed over.
///
/// `window == 0` uses every aligned residual; otherwise the trailing
/// `window` residuals ending at `i`.
fn residual_window(residuals: &[f64], i: usize, window: usize) -> &[f64] {
    if window == 0 {
        residuals
    } else {
        let start = (i + 1).saturating_sub(window);
        &residuals[start..=i]
    }
}

fn rolling_z_score(aligned: &[Aligned<'_>], threshold: f64, window: usize) -> Vec<AnomalyScore> {
    let residuals: Vec<f64> = aligned.iter().map(Aligned::residual).collect();
    aligned
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let history = residual_window(&residuals, i, window);
            let (score, is_anomaly) = if history.len() < MIN_RESIDUALS {
                (0.0, false)
            } else {
                z_score(residuals[i], population_stddev(history), threshold)
            };
            AnomalyScore {
                timestamp: a.timestamp,
                actual_value: a.actual,
                predicted_value: a.point.mean,
                score,
                is_anomaly,
            }
        })
        .collect()
}

fn rolling_iqr(aligned: &[Aligned<'_>], threshold: f64, window: usize) -> Vec<AnomalyScore> {
    let residuals: Vec<f64> = aligned.iter().map(Aligned::residual).collect();
    aligned
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let mut sorted = residual_window(&residuals, i, window).to_vec();
            if sorted.len() < MIN_RESIDUALS {
                return unscored(a);
            }
            sorted.sort_by(f64::total_cmp);
            let q1 = percentile_sorted(&sorted, 0.25);
            let q3 = percentile_sorted(&sorted, 0.75);
            let iqr = q3 - q1;
            let (low, high) = (q1 - threshold * iqr, q3 + threshold * iqr);
            let residual = residuals[i];
            AnomalyScore {
                timestamp: a.timestamp,
                actual_value: a.actual,
                predicted_value: a.point.mean,
                score: band_score(residual, low, high),
                is_anomaly: residual < low || residual > high,
            }
        })
        .collect()
}

fn unscored(a: &Aligned<'_>) -> AnomalyScore {
    AnomalyScore {
        timestamp: a.timestamp,
        actual_value: a.actual,
        predicted_value: a.point.mean,
        score: 0.0,
        is_anomaly: false,
    }
}
