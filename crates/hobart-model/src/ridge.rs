//! Ridge regression with a closed-form solve.
//!
//! Fits `(XᵀX + αI) β = Xᵀy` on centered (optionally standardized)
//! features via a Cholesky factorization. The stored coefficients are
//! folded back to the raw feature scale so scoring is a single dot
//! product plus intercept.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::matrix::{column_means, impute_missing};
use crate::ranking::RankingModel;

/// Configuration for [`RidgeModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeConfig {
    /// L2 penalty strength (default: 1.0).
    pub alpha: f64,
    /// Scale features to unit variance before solving (default: true).
    pub standardize: bool,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            standardize: true,
        }
    }
}

#[derive(Debug)]
struct FittedRidge {
    coefficients: Array1<f64>,
    intercept: f64,
    feature_means: Array1<f64>,
}

/// Linear ranking model with an L2 penalty.
#[derive(Debug)]
pub struct RidgeModel {
    config: RidgeConfig,
    fitted: Option<FittedRidge>,
}

impl RidgeModel {
    /// Create a model, validating the configuration.
    pub fn new(config: RidgeConfig) -> Result<Self> {
        if !(config.alpha >= 0.0) {
            return Err(ModelError::InvalidParameter(
                "alpha must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            config,
            fitted: None,
        })
    }

    /// Create with the default configuration.
    pub fn try_default() -> Result<Self> {
        Self::new(RidgeConfig::default())
    }

    /// Fitted coefficients on the raw feature scale, if trained.
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }
}

/// Solve `a x = b` for symmetric positive-definite `a` via Cholesky.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut lower = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= lower[[i, k]] * lower[[j, k]];
            }
            if i == j {
                if sum <= 1e-12 {
                    return Err(ModelError::SingularMatrix);
                }
                lower[[i, j]] = sum.sqrt();
            } else {
                lower[[i, j]] = sum / lower[[j, j]];
            }
        }
    }

    // Forward solve L z = b, then back solve Lᵀ x = z.
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= lower[[i, k]] * z[k];
        }
        z[i] = sum / lower[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= lower[[k, i]] * x[k];
        }
        x[i] = sum / lower[[i, i]];
    }
    Ok(x)
}

impl RankingModel for RidgeModel {
    fn name(&self) -> &str {
        "ridge"
    }

    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<()> {
        let n = features.nrows();
        let p = features.ncols();
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

        // Imputed cells equal the column mean, so centering with the
        // same means zeroes them out.
        for j in 0..p {
            for i in 0..n {
                matrix[[i, j]] -= means[j];
            }
        }

        let mut scales = Array1::<f64>::ones(p);
        if self.config.standardize {
            for j in 0..p {
                let variance =
                    matrix.column(j).iter().map(|v| v * v).sum::<f64>() / n as f64;
                let sigma = variance.sqrt();
                if sigma > 1e-12 {
                    scales[j] = sigma;
                    for i in 0..n {
                        matrix[[i, j]] /= sigma;
                    }
                }
            }
        }

        let y_mean = target.sum() / n as f64;
        let centered_y = target.mapv(|v| v - y_mean);

        let mut gram = matrix.t().dot(&matrix);
        for j in 0..p {
            gram[[j, j]] += self.config.alpha;
        }
        let moment = matrix.t().dot(&centered_y);
        let beta = cholesky_solve(&gram, &moment)?;

        let coefficients = Array1::from_shape_fn(p, |j| beta[j] / scales[j]);
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(means.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();

        self.fitted = Some(FittedRidge {
            coefficients,
            intercept,
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
        Ok(matrix.dot(&fitted.coefficients) + fitted.intercept)
    }
}
