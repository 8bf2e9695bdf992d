//! The scoring interface shared by all model variants.

use ndarray::{Array1, Array2};

use crate::compact::CompactLearner;
use crate::error::{ModelError, Result};
use crate::gbt::GradientBoostedTrees;
use crate::ridge::RidgeModel;

/// A model that learns to order instruments by expected forward return.
///
/// Implementations are stateful: [`fit`](Self::fit) trains on a feature
/// matrix and target vector, after which [`score`](Self::score) maps new
/// rows to real-valued scores where higher means stronger expected
/// performance. Scores are only meaningful relative to one another
/// within a scoring batch.
pub trait RankingModel: std::fmt::Debug + Send {
    /// Identifier this variant registers under.
    fn name(&self) -> &str;

    /// Train on `features` (rows in chronological order) against
    /// `target`. Refits from scratch; prior state is discarded.
    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<()>;

    /// Score rows with the fitted state. Fails with
    /// [`ModelError::NotFitted`] before a successful fit.
    fn score(&self, features: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Identifiers accepted by [`from_spec`].
pub const AVAILABLE_MODELS: [&str; 3] = ["gbt", "ridge", "compact"];

/// Build a fresh, unfitted model from its string identifier.
///
/// Each call returns an independent instance with default
/// configuration, so callers can train one per period without state
/// bleeding across fits.
pub fn from_spec(spec: &str) -> Result<Box<dyn RankingModel>> {
    match spec {
        "gbt" => Ok(Box::new(GradientBoostedTrees::try_default()?)),
        "ridge" => Ok(Box::new(RidgeModel::try_default()?)),
        "compact" => Ok(Box::new(CompactLearner::try_default()?)),
        other => Err(ModelError::UnknownModel(other.to_string())),
    }
}
