//! Per-instrument artifact bundles.
//!
//! Each instrument owns four fitted objects: a feature scaler, a scaler for
//! the detrended target, a trend estimator, and a sequence predictor. They are
//! loaded once and only ever used with the instrument they were fitted for.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::DataError;
use crate::instrument::Instrument;
use crate::predictor::{OnnxConfig, SequencePredictor};
use crate::scaler::{FittedScaler, Scaler};
use crate::trend::{PolynomialTrend, TrendEstimator};
use crate::Result;

/// The fitted objects for one instrument.
pub struct ArtifactBundle {
    pub instrument: Instrument,
    pub feature_scaler: Box<dyn Scaler>,
    pub target_scaler: Box<dyn Scaler>,
    pub trend: Box<dyn TrendEstimator>,
    pub predictor: Box<dyn SequencePredictor>,
}

impl std::fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("instrument", &self.instrument)
            .field("features", &self.feature_scaler.n_features())
            .finish_non_exhaustive()
    }
}

/// File locations of one instrument's artifacts inside an artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub feature_scaler: PathBuf,
    pub target_scaler: PathBuf,
    pub trend: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, instrument: Instrument) -> Self {
        let stem = instrument.artifact_stem();
        Self {
            feature_scaler: dir.join(format!("scaler_{stem}.json")),
            target_scaler: dir.join(format!("scaler_detrended_{stem}.json")),
            trend: dir.join(format!("trend_model_{stem}.json")),
            model: dir.join(format!("lstm_model_{stem}.onnx")),
        }
    }

    /// Fail with the first path that does not exist.
    pub fn ensure_exist(&self) -> Result<()> {
        for path in [
            &self.feature_scaler,
            &self.target_scaler,
            &self.trend,
            &self.model,
        ] {
            if !path.exists() {
                return Err(DataError::MissingArtifact(path.clone()).into());
            }
        }
        Ok(())
    }
}

impl ArtifactBundle {
    /// Load one instrument's artifacts from `dir`.
    pub fn load(dir: &Path, instrument: Instrument, onnx: &OnnxConfig) -> Result<Self> {
        let paths = ArtifactPaths::new(dir, instrument);
        paths.ensure_exist()?;

        let feature_scaler = FittedScaler::from_json_path(&paths.feature_scaler)?;
        let target_scaler = FittedScaler::from_json_path(&paths.target_scaler)?;
        let trend = PolynomialTrend::from_json_path(&paths.trend)?;
        let predictor = load_predictor(&paths.model, onnx)?;

        info!(
            %instrument,
            features = feature_scaler.n_features(),
            model = %paths.model.display(),
            "loaded artifacts"
        );
        Ok(Self {
            instrument,
            feature_scaler: Box::new(feature_scaler),
            target_scaler: Box::new(target_scaler),
            trend: Box::new(trend),
            predictor,
        })
    }
}

#[cfg(feature = "onnx")]
fn load_predictor(path: &Path, onnx: &OnnxConfig) -> Result<Box<dyn SequencePredictor>> {
    Ok(Box::new(crate::predictor::OnnxPredictor::new(path, onnx)?))
}

#[cfg(not(feature = "onnx"))]
fn load_predictor(path: &Path, _onnx: &OnnxConfig) -> Result<Box<dyn SequencePredictor>> {
    anyhow::bail!(
        "cannot load {}: built without the `onnx` feature",
        path.display()
    )
}

/// Artifact bundles for both instruments.
#[derive(Debug)]
pub struct ArtifactStore {
    mastercard: ArtifactBundle,
    visa: ArtifactBundle,
}

impl ArtifactStore {
    /// Pair two bundles, checking each is filed under its own instrument.
    pub fn new(mastercard: ArtifactBundle, visa: ArtifactBundle) -> Result<Self> {
        for (slot, bundle) in [
            (Instrument::Mastercard, &mastercard),
            (Instrument::Visa, &visa),
        ] {
            if bundle.instrument != slot {
                anyhow::bail!(
                    "{} artifacts supplied in the {} slot",
                    bundle.instrument,
                    slot
                );
            }
        }
        Ok(Self { mastercard, visa })
    }

    /// Load both instruments' artifacts from one directory.
    pub fn load(dir: &Path, onnx: &OnnxConfig) -> Result<Self> {
        Self::new(
            ArtifactBundle::load(dir, Instrument::Mastercard, onnx)?,
            ArtifactBundle::load(dir, Instrument::Visa, onnx)?,
        )
    }

    /// The bundle fitted for `instrument`.
    pub fn bundle(&self, instrument: Instrument) -> &ArtifactBundle {
        match instrument {
            Instrument::Mastercard => &self.mastercard,
            Instrument::Visa => &self.visa,
        }
    }
}
