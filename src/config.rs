//! Dashboard configuration.
//!
//! Defaults match the shipped layout (`MVS.csv` and artifacts in the working
//! directory). A JSON file may override any subset of fields; command-line
//! flags are applied on top by the binary.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pipeline::{DateRange, PipelineConfig};
use crate::predictor::OnnxConfig;
use crate::Result;

/// Top-level configuration for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Price table with `Date`, `Close_M`, `Volume_M`, `Close_V`, `Volume_V`
    pub data_path: PathBuf,

    /// Directory holding the per-instrument scaler, trend and model files
    pub artifacts_dir: PathBuf,

    /// Initial start of the date range
    pub default_start: NaiveDate,

    /// Initial end of the date range
    pub default_end: NaiveDate,

    pub pipeline: PipelineConfig,

    pub onnx: OnnxConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("MVS.csv"),
            artifacts_dir: PathBuf::from("."),
            default_start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            default_end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            pipeline: PipelineConfig::default(),
            onnx: OnnxConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config: {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn default_range(&self) -> DateRange {
        DateRange::new(self.default_start, self.default_end)
    }
}
