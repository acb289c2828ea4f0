//! Trend baseline keyed on feature row offsets.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::Result;

/// Maps integer row offsets to an expected price baseline.
pub trait TrendEstimator {
    fn predict(&self, offsets: &[usize]) -> Result<Vec<f64>>;
}

/// Polynomial in the row offset: `intercept + c1*t + c2*t^2 + ...`.
///
/// A single coefficient is an ordinary linear fit on the offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialTrend {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl PolynomialTrend {
    pub fn linear(intercept: f64, slope: f64) -> Self {
        Self {
            intercept,
            coefficients: vec![slope],
        }
    }

    /// Load a trend artifact from a JSON file.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open trend model: {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse trend model: {}", path.display()))
    }

    fn evaluate(&self, offset: usize) -> f64 {
        let t = offset as f64;
        // Horner over [intercept, c1, c2, ...]
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| (acc + c) * t)
            + self.intercept
    }
}

impl TrendEstimator for PolynomialTrend {
    fn predict(&self, offsets: &[usize]) -> Result<Vec<f64>> {
        Ok(offsets.iter().map(|&o| self.evaluate(o)).collect())
    }
}

/// Subtract the trend baseline at each offset from the matching close.
pub fn detrend(closes: &[f64], offsets: &[usize], trend: &dyn TrendEstimator) -> Result<Vec<f64>> {
    let baseline = baseline(offsets, trend)?;
    if closes.len() != offsets.len() {
        return Err(DataError::ShapeMismatch {
            context: "closes for detrending".to_string(),
            expected: offsets.len(),
            actual: closes.len(),
        }
        .into());
    }
    Ok(closes.iter().zip(baseline).map(|(c, b)| c - b).collect())
}

/// Add the trend baseline at each offset back onto detrended values.
pub fn retrend(
    detrended: &[f64],
    offsets: &[usize],
    trend: &dyn TrendEstimator,
) -> Result<Vec<f64>> {
    let baseline = baseline(offsets, trend)?;
    if detrended.len() != offsets.len() {
        return Err(DataError::ShapeMismatch {
            context: "values for re-trending".to_string(),
            expected: offsets.len(),
            actual: detrended.len(),
        }
        .into());
    }
    Ok(detrended.iter().zip(baseline).map(|(d, b)| d + b).collect())
}

fn baseline(offsets: &[usize], trend: &dyn TrendEstimator) -> Result<Vec<f64>> {
    let baseline = trend.predict(offsets)?;
    if baseline.len() != offsets.len() {
        return Err(DataError::ShapeMismatch {
            context: "trend estimator output length".to_string(),
            expected: offsets.len(),
            actual: baseline.len(),
        }
        .into());
    }
    Ok(baseline)
}
