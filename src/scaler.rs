//! Fitted scalers mapping raw columns into the predictor's numeric range.
//!
//! Scalers are fitted offline and shipped as JSON. Both kinds store per-column
//! parameters and an optional list of the column names they were fitted on.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::Result;

/// A fitted, invertible column-wise transform.
pub trait Scaler {
    /// Number of columns the scaler was fitted on.
    fn n_features(&self) -> usize;

    /// Column names recorded at fit time, if any.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Map raw values into the scaled range.
    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Map scaled values back to raw units.
    fn inverse_transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Check that a scaler was fitted on exactly `expected` columns.
///
/// Width must always match. Names are compared, in order, only when the
/// artifact recorded them.
pub fn verify_columns(label: &str, scaler: &dyn Scaler, expected: &[String]) -> Result<()> {
    if scaler.n_features() != expected.len() {
        return Err(DataError::ShapeMismatch {
            context: format!("{label} column count"),
            expected: scaler.n_features(),
            actual: expected.len(),
        }
        .into());
    }
    if let Some(names) = scaler.feature_names() {
        if names != expected {
            return Err(DataError::SchemaMismatch {
                artifact: label.to_string(),
                expected: names.to_vec(),
                actual: expected.to_vec(),
            }
            .into());
        }
    }
    Ok(())
}

fn check_width(x: &ArrayView2<'_, f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(DataError::ShapeMismatch {
            context: "scaler input width".to_string(),
            expected: n_features,
            actual: x.ncols(),
        }
        .into());
    }
    Ok(())
}

/// Zero-width ranges scale by 1 so constant columns stay finite.
fn nonzero(values: &[f64]) -> Array1<f64> {
    values
        .iter()
        .map(|&v| if v == 0.0 { 1.0 } else { v })
        .collect()
}

/// Min-max scaler: `x * scale + min` with parameters derived from the fitted range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Per-column minimum seen at fit time
    pub data_min: Vec<f64>,

    /// Per-column maximum seen at fit time
    pub data_max: Vec<f64>,

    /// Target `(low, high)` range
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),

    /// Column names seen at fit time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

impl MinMaxScaler {
    fn scale_and_min(&self) -> Result<(Array1<f64>, Array1<f64>)> {
        if self.data_min.len() != self.data_max.len() {
            return Err(DataError::ShapeMismatch {
                context: "min-max scaler data_max length".to_string(),
                expected: self.data_min.len(),
                actual: self.data_max.len(),
            }
            .into());
        }
        let (low, high) = self.feature_range;
        let range: Vec<f64> = self
            .data_max
            .iter()
            .zip(self.data_min.iter())
            .map(|(max, min)| max - min)
            .collect();
        let scale = (high - low) / nonzero(&range);
        let min = low - Array1::from(self.data_min.clone()) * &scale;
        Ok((scale, min))
    }
}

impl Scaler for MinMaxScaler {
    fn n_features(&self) -> usize {
        self.data_min.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_width(&x, self.n_features())?;
        let (scale, min) = self.scale_and_min()?;
        Ok(&x * &scale.insert_axis(Axis(0)) + &min.insert_axis(Axis(0)))
    }

    fn inverse_transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_width(&x, self.n_features())?;
        let (scale, min) = self.scale_and_min()?;
        Ok((&x - &min.insert_axis(Axis(0))) / &scale.insert_axis(Axis(0)))
    }
}

/// Standard scaler: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    fn params(&self) -> Result<(Array1<f64>, Array1<f64>)> {
        if self.mean.len() != self.scale.len() {
            return Err(DataError::ShapeMismatch {
                context: "standard scaler scale length".to_string(),
                expected: self.mean.len(),
                actual: self.scale.len(),
            }
            .into());
        }
        Ok((Array1::from(self.mean.clone()), nonzero(&self.scale)))
    }
}

impl Scaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_width(&x, self.n_features())?;
        let (mean, scale) = self.params()?;
        Ok((&x - &mean.insert_axis(Axis(0))) / &scale.insert_axis(Axis(0)))
    }

    fn inverse_transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_width(&x, self.n_features())?;
        let (mean, scale) = self.params()?;
        Ok(&x * &scale.insert_axis(Axis(0)) + &mean.insert_axis(Axis(0)))
    }
}

/// Scaler artifact as stored on disk, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedScaler {
    MinMax(MinMaxScaler),
    Standard(StandardScaler),
}

impl FittedScaler {
    /// Load a scaler artifact from a JSON file.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open scaler: {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse scaler: {}", path.display()))
    }

    fn inner(&self) -> &dyn Scaler {
        match self {
            FittedScaler::MinMax(s) => s,
            FittedScaler::Standard(s) => s,
        }
    }
}

impl Scaler for FittedScaler {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.inner().feature_names()
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.inner().transform(x)
    }

    fn inverse_transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.inner().inverse_transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{x} != {y}");
        }
    }

    fn min_max() -> MinMaxScaler {
        MinMaxScaler {
            data_min: vec![0.0, 10.0],
            data_max: vec![10.0, 30.0],
            feature_range: (0.0, 1.0),
            feature_names: None,
        }
    }

    #[test]
    fn test_min_max_transform() {
        let x = array![[5.0, 10.0], [10.0, 30.0]];
        let scaled = min_max().transform(x.view()).unwrap();
        assert_close(&scaled, &array![[0.5, 0.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_min_max_round_trip() {
        let scaler = MinMaxScaler {
            feature_range: (-1.0, 1.0),
            ..min_max()
        };
        let x = array![[3.0, 12.5], [-4.0, 99.0], [7.25, 0.0]];
        let back = scaler
            .inverse_transform(scaler.transform(x.view()).unwrap().view())
            .unwrap();
        assert_close(&back, &x);
    }

    #[test]
    fn test_min_max_constant_column() {
        let scaler = MinMaxScaler {
            data_min: vec![4.0],
            data_max: vec![4.0],
            feature_range: (0.0, 1.0),
            feature_names: None,
        };
        let scaled = scaler.transform(array![[4.0], [5.0]].view()).unwrap();
        assert_close(&scaled, &array![[0.0], [1.0]]);
    }

    #[test]
    fn test_standard_round_trip() {
        let scaler = StandardScaler {
            mean: vec![1.0, -2.0],
            scale: vec![2.0, 0.0],
            feature_names: None,
        };
        let x = array![[3.0, 0.0], [1.0, -2.0]];
        let scaled = scaler.transform(x.view()).unwrap();
        assert_close(&scaled, &array![[1.0, 2.0], [0.0, 0.0]]);
        assert_close(&scaler.inverse_transform(scaled.view()).unwrap(), &x);
    }

    #[test]
    fn test_width_mismatch() {
        let err = min_max().transform(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_json_artifact() {
        let json = r#"{
            "kind": "min_max",
            "data_min": [1.0],
            "data_max": [3.0],
            "feature_names": ["detrended"]
        }"#;
        let scaler: FittedScaler = serde_json::from_str(json).unwrap();
        assert_eq!(scaler.n_features(), 1);
        assert_eq!(scaler.feature_names(), Some(&["detrended".to_string()][..]));
        let scaled = scaler.transform(array![[2.0]].view()).unwrap();
        assert_close(&scaled, &array![[0.5]]);
    }

    #[test]
    fn test_from_json_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler_visa.json");
        std::fs::write(&path, r#"{"kind":"standard","mean":[0.0],"scale":[2.0]}"#).unwrap();
        let scaler = FittedScaler::from_json_path(&path).unwrap();
        assert!(matches!(scaler, FittedScaler::Standard(_)));
    }

    #[test]
    fn test_verify_columns() {
        let names: Vec<String> = vec!["Close_M".into(), "Volume_M".into()];
        let scaler = MinMaxScaler {
            feature_names: Some(names.clone()),
            ..min_max()
        };
        assert!(verify_columns("feature scaler", &scaler, &names).is_ok());

        let swapped: Vec<String> = vec!["Volume_M".into(), "Close_M".into()];
        let err = verify_columns("feature scaler", &scaler, &swapped).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::SchemaMismatch { .. })
        ));

        let visa: Vec<String> = vec!["Close_V".into(), "Volume_V".into()];
        assert!(verify_columns("feature scaler", &scaler, &visa).is_err());

        let unnamed = min_max();
        assert!(verify_columns("feature scaler", &unnamed, &visa).is_ok());
        assert!(verify_columns("feature scaler", &unnamed, &visa[..1]).is_err());
    }
}
