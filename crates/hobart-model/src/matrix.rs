//! Bridging panel frames into dense model matrices.
//!
//! Models consume `ndarray` matrices; the panel lives in polars frames.
//! Nulls become NaN on the way in and are mean-imputed by each model with
//! statistics learned at fit time, so prediction rows with gaps survive
//! instead of being dropped.

use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::error::{ModelError, Result};

/// A dense feature matrix with its column names.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Row-major values, one row per panel row; nulls encoded as NaN.
    pub values: Array2<f64>,
    /// Column names in matrix order.
    pub columns: Vec<String>,
}

/// Extract the named columns from `df` into a dense matrix.
///
/// Integer columns are cast to f64; nulls become NaN.
pub fn feature_matrix(df: &DataFrame, columns: &[String]) -> Result<FeatureMatrix> {
    let mut values = Array2::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let column = df
            .column(name)
            .map_err(|_| ModelError::MissingColumn(name.clone()))?
            .cast(&DataType::Float64)?;
        let floats = column.f64()?;
        for (i, value) in floats.into_iter().enumerate() {
            values[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }
    Ok(FeatureMatrix {
        values,
        columns: columns.to_vec(),
    })
}

/// Extract a non-null target column as a vector.
pub fn target_vector(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let column = df
        .column(name)
        .map_err(|_| ModelError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;
    let floats = column.f64()?;
    let nulls = floats.null_count();
    if nulls > 0 {
        return Err(ModelError::MissingTarget { nulls });
    }
    Ok(floats.into_no_null_iter().collect())
}

/// Per-column means ignoring non-finite entries; 0.0 for empty columns.
pub fn column_means(values: &Array2<f64>) -> Array1<f64> {
    let mut means = Array1::zeros(values.ncols());
    for (j, column) in values.columns().into_iter().enumerate() {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &value in column {
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }
        means[j] = if count > 0 { sum / count as f64 } else { 0.0 };
    }
    means
}

/// Replace non-finite entries with the matching column mean.
pub fn impute_missing(values: &mut Array2<f64>, means: &Array1<f64>) {
    for ((_, j), value) in values.indexed_iter_mut() {
        if !value.is_finite() {
            *value = means[j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_feature_matrix_nulls_become_nan() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "b" => &[10i64, 20, 30],
        )
        .unwrap();
        let matrix = feature_matrix(&df, &["a".to_string(), "b".to_string()]).unwrap();

        assert_eq!(matrix.values.dim(), (3, 2));
        assert!(matrix.values[[1, 0]].is_nan());
        assert_relative_eq!(matrix.values[[2, 1]], 30.0);
    }

    #[test]
    fn test_feature_matrix_missing_column() {
        let df = df!("a" => &[1.0]).unwrap();
        let err = feature_matrix(&df, &["b".to_string()]);
        assert!(matches!(err, Err(ModelError::MissingColumn(name)) if name == "b"));
    }

    #[test]
    fn test_target_vector_rejects_nulls() {
        let df = df!("t" => &[Some(0.1), None]).unwrap();
        let err = target_vector(&df, "t");
        assert!(matches!(err, Err(ModelError::MissingTarget { nulls: 1 })));
    }

    #[test]
    fn test_impute_with_column_means() {
        let df = df!(
            "a" => &[Some(2.0), None, Some(4.0)],
        )
        .unwrap();
        let mut matrix = feature_matrix(&df, &["a".to_string()]).unwrap();
        let means = column_means(&matrix.values);
        impute_missing(&mut matrix.values, &means);

        assert_relative_eq!(means[0], 3.0);
        assert_relative_eq!(matrix.values[[1, 0]], 3.0);
    }

    #[test]
    fn test_all_missing_column_imputes_zero() {
        let df = df!("a" => &[Option::<f64>::None, None]).unwrap();
        let mut matrix = feature_matrix(&df, &["a".to_string()]).unwrap();
        let means = column_means(&matrix.values);
        impute_missing(&mut matrix.values, &means);
        assert_eq!(matrix.values[[0, 0]], 0.0);
        assert_eq!(matrix.values[[1, 0]], 0.0);
    }
}
