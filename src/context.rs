//! Immutable process-wide state handed to the pipeline.

use tracing::info;

use crate::artifacts::ArtifactStore;
use crate::config::DashboardConfig;
use crate::data::PriceTable;
use crate::pipeline::PipelineConfig;
use crate::Result;

/// The loaded price table, both instruments' artifacts, and pipeline settings.
///
/// Built once at start-up and only read afterwards.
#[derive(Debug)]
pub struct DashboardContext {
    table: PriceTable,
    artifacts: ArtifactStore,
    pipeline: PipelineConfig,
}

impl DashboardContext {
    pub fn new(table: PriceTable, artifacts: ArtifactStore, pipeline: PipelineConfig) -> Self {
        Self {
            table,
            artifacts,
            pipeline,
        }
    }

    /// Load the price table and artifacts named by `config`.
    pub fn load(config: &DashboardConfig) -> Result<Self> {
        let table = PriceTable::from_csv_path(&config.data_path)?;
        let artifacts = ArtifactStore::load(&config.artifacts_dir, &config.onnx)?;
        info!(
            rows = table.len(),
            sequence_length = config.pipeline.sequence_length,
            "dashboard context ready"
        );
        Ok(Self::new(table, artifacts, config.pipeline.clone()))
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }
}
