//! Gradient-boosted regression trees.
//!
//! Classic residual boosting with a squared-error objective: each stage
//! fits a shallow tree to the current residuals on a row subsample, and
//! the ensemble prediction is the base score plus the learning-rate
//! weighted sum of tree outputs. Early stopping, when enabled, watches
//! the mean squared error on the temporally last slice of the training
//! rows and truncates the ensemble at its best iteration.

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::matrix::{column_means, impute_missing};
use crate::ranking::RankingModel;
use crate::tree::{RegressionTree, TreeConfig};

/// Configuration for [`GradientBoostedTrees`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbtConfig {
    /// Maximum number of boosting stages (default: 300).
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution (default: 0.05).
    pub learning_rate: f64,
    /// Depth of each tree (default: 4).
    pub max_depth: usize,
    /// Minimum rows a node needs before splitting (default: 40).
    pub min_samples_split: usize,
    /// Minimum rows per child (default: 20).
    pub min_samples_leaf: usize,
    /// Fraction of training rows drawn per stage (default: 0.8).
    pub subsample: f64,
    /// Fraction of features considered per split (default: 0.7).
    pub feature_fraction: f64,
    /// Fraction of rows held out for early stopping (default: 0.1).
    pub validation_fraction: f64,
    /// Stages without validation improvement before stopping;
    /// `None` disables early stopping (default: 30).
    pub early_stopping_rounds: Option<usize>,
    /// RNG seed for row and feature subsampling (default: 42).
    pub seed: u64,
}

impl Default for GbtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 4,
            min_samples_split: 40,
            min_samples_leaf: 20,
            subsample: 0.8,
            feature_fraction: 0.7,
            validation_fraction: 0.1,
            early_stopping_rounds: Some(30),
            seed: 42,
        }
    }
}

#[derive(Debug)]
struct FittedGbt {
    base_score: f64,
    trees: Vec<RegressionTree>,
    feature_means: Array1<f64>,
}

/// Gradient-boosted tree regressor.
#[derive(Debug)]
pub struct GradientBoostedTrees {
    config: GbtConfig,
    fitted: Option<FittedGbt>,
}

impl GradientBoostedTrees {
    /// Create a model, validating the configuration.
    pub fn new(config: GbtConfig) -> Result<Self> {
        if config.n_estimators == 0 {
            return Err(ModelError::InvalidParameter(
                "n_estimators must be >= 1".to_string(),
            ));
        }
        if config.max_depth == 0 {
            return Err(ModelError::InvalidParameter(
                "max_depth must be >= 1".to_string(),
            ));
        }
        if config.learning_rate <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "learning_rate must be > 0".to_string(),
            ));
        }
        if !(0.0 < config.subsample && config.subsample <= 1.0) {
            return Err(ModelError::InvalidParameter(
                "subsample must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 < config.feature_fraction && config.feature_fraction <= 1.0) {
            return Err(ModelError::InvalidParameter(
                "feature_fraction must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 < config.validation_fraction && config.validation_fraction < 1.0) {
            return Err(ModelError::InvalidParameter(
                "validation_fraction must be in (0, 1)".to_string(),
            ));
        }
        Ok(Self {
            config,
            fitted: None,
        })
    }

    /// Create with the default configuration.
    pub fn try_default() -> Result<Self> {
        Self::new(GbtConfig::default())
    }

    /// Number of trees kept after fitting.
    pub fn n_trees(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.trees.len())
    }

    fn tree_config(&self, n_features: usize) -> TreeConfig {
        let max_features = if self.config.feature_fraction < 1.0 {
            let k = (self.config.feature_fraction * n_features as f64).ceil() as usize;
            Some(k.clamp(1, n_features))
        } else {
            None
        };
        TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            min_gain: 1e-12,
            max_features,
        }
    }
}

impl RankingModel for GradientBoostedTrees {
    fn name(&self) -> &str {
        "gbt"
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

        let means = column_means(features);
        let mut matrix = features.clone();
        impute_missing(&mut matrix, &means);

        // Rows arrive date-sorted, so the validation slice is the most
        // recent part of the window.
        let n_valid = match self.config.early_stopping_rounds {
            Some(_) => {
                let k = (self.config.validation_fraction * n as f64).round() as usize;
                if n - k.min(n / 2) >= 2 { k.min(n / 2) } else { 0 }
            }
            None => 0,
        };
        let n_train = n - n_valid;

        let base_score = target.iter().take(n_train).sum::<f64>() / n_train as f64;
        let mut train_pred = vec![base_score; n_train];
        let mut valid_pred = vec![base_score; n_valid];
        let mut residuals = Array1::<f64>::zeros(n_train);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let tree_config = self.tree_config(features.ncols());
        let sample_size = ((self.config.subsample * n_train as f64).round() as usize)
            .clamp(1, n_train);

        let mut trees: Vec<RegressionTree> = Vec::new();
        let mut best_mse = f64::INFINITY;
        let mut best_len = 0usize;

        for stage in 0..self.config.n_estimators {
            for i in 0..n_train {
                residuals[i] = target[i] - train_pred[i];
            }
            let rows: Vec<usize> = if sample_size < n_train {
                index::sample(&mut rng, n_train, sample_size).into_vec()
            } else {
                (0..n_train).collect()
            };

            let tree = RegressionTree::fit(&matrix, &residuals, &rows, &tree_config, &mut rng);
            for (i, pred) in train_pred.iter_mut().enumerate() {
                *pred += self.config.learning_rate * tree.predict_row(matrix.row(i));
            }
            for (offset, pred) in valid_pred.iter_mut().enumerate() {
                *pred +=
                    self.config.learning_rate * tree.predict_row(matrix.row(n_train + offset));
            }
            trees.push(tree);

            if n_valid > 0 {
                let mse = valid_pred
                    .iter()
                    .enumerate()
                    .map(|(offset, pred)| {
                        let err = target[n_train + offset] - pred;
                        err * err
                    })
                    .sum::<f64>()
                    / n_valid as f64;
                if mse < best_mse {
                    best_mse = mse;
                    best_len = stage + 1;
                } else if let Some(patience) = self.config.early_stopping_rounds
                    && stage + 1 - best_len >= patience
                {
                    break;
                }
            }
        }

        if n_valid > 0 && best_len > 0 {
            trees.truncate(best_len);
        }
        log::debug!(
            "gbt fit: {} trees on {} rows ({} held out)",
            trees.len(),
            n_train,
            n_valid
        );

        self.fitted = Some(FittedGbt {
            base_score,
            trees,
            feature_means: means,
        });
        Ok(())
    }

    fn score(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        if features.ncols() != fitted.feature_means.len() {
            return Err(ModelError::DimensionMismatch {
                expected: fitted.feature_means.len(),
                actual: features.ncols(),
            });
        }
        let mut matrix = features.clone();
        impute_missing(&mut matrix, &fitted.feature_means);

        let mut scores = Array1::from_elem(features.nrows(), fitted.base_score);
        for tree in &fitted.trees {
            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.config.learning_rate * tree.predict_row(matrix.row(i));
            }
        }
        Ok(scores)
    }
}
