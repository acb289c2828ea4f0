//! Sequence model inference interface.
//!
//! Provides the [`SequencePredictor`] capability and an ONNX Runtime backed
//! implementation for the exported per-instrument models.

use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::Result;

/// Maps a batch of `(batch, seq_length, features)` windows to one scaled,
/// detrended estimate per window.
pub trait SequencePredictor {
    fn predict(&self, windows: ArrayView3<'_, f32>) -> Result<Vec<f32>>;
}

/// Check that a predictor returned one value per window.
pub fn check_batch_output(batch: usize, output: &[f32]) -> Result<()> {
    if output.len() != batch {
        return Err(DataError::ShapeMismatch {
            context: "predictor output length".to_string(),
            expected: batch,
            actual: output.len(),
        }
        .into());
    }
    Ok(())
}

/// Runtime options for ONNX sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxConfig {
    /// Enable full graph optimization
    pub optimize_graph: bool,

    /// Intra-op thread count
    pub intra_threads: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            optimize_graph: true,
            intra_threads: 1, // Single-threaded for determinism
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxPredictor;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use anyhow::Context;
    use ndarray::ArrayView3;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Value;
    use tracing::debug;

    use super::{check_batch_output, OnnxConfig, SequencePredictor};
    use crate::Result;

    /// Sequence predictor backed by an ONNX Runtime session.
    ///
    /// The session needs exclusive access to run, so it sits behind a mutex
    /// and the predictor can be shared read-only with the rest of the context.
    pub struct OnnxPredictor {
        session: Mutex<Session>,
    }

    impl std::fmt::Debug for OnnxPredictor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnnxPredictor").finish_non_exhaustive()
        }
    }

    impl OnnxPredictor {
        /// Load an ONNX model.
        ///
        /// # Example
        /// ```no_run
        /// use price_overlay::predictor::{OnnxConfig, OnnxPredictor};
        /// use std::path::Path;
        ///
        /// let predictor = OnnxPredictor::new(
        ///     Path::new("lstm_model_visa.onnx"),
        ///     &OnnxConfig::default(),
        /// ).unwrap();
        /// ```
        pub fn new(model_path: &Path, config: &OnnxConfig) -> Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(if config.optimize_graph {
                    GraphOptimizationLevel::Level3
                } else {
                    GraphOptimizationLevel::Level1
                })?
                .with_intra_threads(config.intra_threads)?
                .commit_from_file(model_path)
                .with_context(|| format!("Failed to load model: {}", model_path.display()))?;

            Ok(Self {
                session: Mutex::new(session),
            })
        }
    }

    impl SequencePredictor for OnnxPredictor {
        fn predict(&self, windows: ArrayView3<'_, f32>) -> Result<Vec<f32>> {
            let batch = windows.shape()[0];
            let input_tensor = Value::from_array(windows.to_owned())?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("model session lock poisoned"))?;
            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| anyhow::anyhow!("model declares no outputs"))?;

            let outputs = session.run(ort::inputs![input_tensor])?;
            let output = outputs
                .get(&output_name)
                .ok_or_else(|| anyhow::anyhow!("missing model output `{output_name}`"))?;

            // Shape is (batch, 1); flatten to one value per window
            let (_, data) = output.try_extract_tensor::<f32>()?;
            let predictions = data.to_vec();
            check_batch_output(batch, &predictions)?;

            debug!(batch, "ran sequence model");
            Ok(predictions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// Returns the last time step's first feature.
    struct LastClose;

    impl SequencePredictor for LastClose {
        fn predict(&self, windows: ArrayView3<'_, f32>) -> Result<Vec<f32>> {
            let last = windows.shape()[1] - 1;
            Ok((0..windows.shape()[0])
                .map(|i| windows[[i, last, 0]])
                .collect())
        }
    }

    #[test]
    fn test_trait_object_predict() {
        let mut windows = Array3::<f32>::zeros((2, 3, 7));
        windows[[0, 2, 0]] = 1.5;
        windows[[1, 2, 0]] = -0.5;

        let predictor: Box<dyn SequencePredictor> = Box::new(LastClose);
        let out = predictor.predict(windows.view()).unwrap();
        assert_eq!(out, vec![1.5, -0.5]);
        assert!(check_batch_output(2, &out).is_ok());
    }

    #[test]
    fn test_check_batch_output() {
        let err = check_batch_output(3, &[0.0, 1.0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::ShapeMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_onnx_config_default() {
        let config = OnnxConfig::default();
        assert!(config.optimize_graph);
        assert_eq!(config.intra_threads, 1);
    }
}
