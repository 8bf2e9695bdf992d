//! Reduced-footprint linear model.
//!
//! Caps both the number of training rows and the number of features
//! before delegating to [`RidgeModel`]. Rows are trimmed to the most
//! recent `max_samples` (training data arrives date-sorted), and
//! features are kept by absolute Pearson correlation with the target.

use ndarray::{Array1, Array2, s};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::ranking::RankingModel;
use crate::ridge::{RidgeConfig, RidgeModel};

/// Configuration for [`CompactLearner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactConfig {
    /// Most recent rows kept for fitting (default: 10_000).
    pub max_samples: usize,
    /// Features kept, ranked by |correlation| with the target
    /// (default: 100).
    pub max_features: usize,
    /// Settings for the inner ridge solve.
    pub ridge: RidgeConfig,
}

impl Default for CompactConfig {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            max_features: 100,
            ridge: RidgeConfig::default(),
        }
    }
}

/// Row- and feature-capped ridge model.
#[derive(Debug)]
pub struct CompactLearner {
    config: CompactConfig,
    inner: RidgeModel,
    selected: Option<Vec<usize>>,
    training_rows: usize,
}

impl CompactLearner {
    /// Create a learner, validating the configuration.
    pub fn new(config: CompactConfig) -> Result<Self> {
        if config.max_samples == 0 {
            return Err(ModelError::InvalidParameter(
                "max_samples must be >= 1".to_string(),
            ));
        }
        if config.max_features == 0 {
            return Err(ModelError::InvalidParameter(
                "max_features must be >= 1".to_string(),
            ));
        }
        let inner = RidgeModel::new(config.ridge.clone())?;
        Ok(Self {
            config,
            inner,
            selected: None,
            training_rows: 0,
        })
    }

    /// Create with the default configuration.
    pub fn try_default() -> Result<Self> {
        Self::new(CompactConfig::default())
    }

    /// Rows actually used in the last fit.
    pub const fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Feature indices kept in the last fit, ascending.
    pub fn selected_features(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }
}

/// Absolute Pearson correlation of one column with the target,
/// over finite pairs only. Zero when undefined.
fn abs_correlation(column: &[f64], target: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = column
        .iter()
        .zip(target.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return 0.0;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    (sxy / (sxx * syy).sqrt()).abs()
}

impl RankingModel for CompactLearner {
    fn name(&self) -> &str {
        "compact"
    }

    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<()> {
        let n = features.nrows();
        if n != target.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                actual: target.len(),
            });
        }
        if n < 2 {
            return Err(ModelError::InsufficientData {
                required: 2,
                actual: n,
            });
        }

        let start = n.saturating_sub(self.config.max_samples);
        let window = features.slice(s![start.., ..]);
        let window_target = target.slice(s![start..]);
        self.training_rows = window.nrows();

        let p = features.ncols();
        let selected: Vec<usize> = if p > self.config.max_features {
            let target_slice: Vec<f64> = window_target.iter().copied().collect();
            let mut ranked: Vec<(usize, f64)> = (0..p)
                .map(|j| {
                    let column: Vec<f64> = window.column(j).iter().copied().collect();
                    (j, abs_correlation(&column, &target_slice))
                })
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            let mut kept: Vec<usize> = ranked
                .into_iter()
                .take(self.config.max_features)
                .map(|(j, _)| j)
                .collect();
            kept.sort_unstable();
            kept
        } else {
            (0..p).collect()
        };

        let reduced = Array2::from_shape_fn((window.nrows(), selected.len()), |(i, jj)| {
            window[[i, selected[jj]]]
        });
        let reduced_target = window_target.to_owned();
        log::debug!(
            "compact fit: {} rows, {} of {} features",
            self.training_rows,
            selected.len(),
            p
        );
        self.selected = Some(selected);
        self.inner.fit(&reduced, &reduced_target)
    }

    fn score(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let selected = self.selected.as_ref().ok_or(ModelError::NotFitted)?;
        if let Some(max) = selected.last()
            && *max >= features.ncols()
        {
            return Err(ModelError::DimensionMismatch {
                expected: max + 1,
                actual: features.ncols(),
            });
        }
        let reduced = Array2::from_shape_fn((features.nrows(), selected.len()), |(i, jj)| {
            features[[i, selected[jj]]]
        });
        self.inner.score(&reduced)
    }
}
