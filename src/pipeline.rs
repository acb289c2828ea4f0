//! The forecast pipeline.
//!
//! features -> detrend -> scale -> window -> predict -> inverse scale ->
//! re-trend -> pair with actual closes. Every stage is keyed on feature row
//! offsets, and each prediction carries the offset and date of the row it
//! targets, so trend re-application cannot drift from the target row.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifacts::ArtifactBundle;
use crate::context::DashboardContext;
use crate::error::DataError;
use crate::features::{build_feature_table, FeatureConfig, FeatureTable};
use crate::instrument::Instrument;
use crate::predictor::check_batch_output;
use crate::scaler::verify_columns;
use crate::sequence::build_sequences;
use crate::trend::{detrend, retrend};
use crate::Result;

/// Pipeline parameters shared by both instruments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of feature rows per model input window
    pub sequence_length: usize,

    /// Indicator windows
    pub features: FeatureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sequence_length: 60,
            features: FeatureConfig::default(),
        }
    }
}

/// Inclusive date range selected by the user.
///
/// `start > end` is allowed and simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

/// One predicted row next to the actual close on the same date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub offset: usize,
    pub actual: f64,
    pub predicted: f64,
}

/// Actual and predicted closes for one instrument.
///
/// Points start at the row `sequence_length` positions into the feature table;
/// earlier rows have no full window behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    instrument: Instrument,
    points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn empty(instrument: Instrument) -> Self {
        Self {
            instrument,
            points: Vec::new(),
        }
    }

    /// Wrap precomputed points, which must already be in date order.
    pub fn from_points(instrument: Instrument, points: Vec<ForecastPoint>) -> Self {
        Self { instrument, points }
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn actual(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.actual).collect()
    }

    pub fn predicted(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted).collect()
    }

    /// Keep only points whose date falls inside `range`.
    pub fn filter(&self, range: &DateRange) -> Forecast {
        Forecast {
            instrument: self.instrument,
            points: self
                .points
                .iter()
                .filter(|p| range.contains(p.date))
                .copied()
                .collect(),
        }
    }
}

/// Run the model stages over an already-built feature table.
///
/// Returns an empty forecast when the table has no more rows than
/// `sequence_length`; the predictor is not invoked in that case.
pub fn forecast_features(
    bundle: &ArtifactBundle,
    table: &FeatureTable,
    sequence_length: usize,
) -> Result<Forecast> {
    let instrument = table.instrument();
    if bundle.instrument != instrument {
        anyhow::bail!(
            "{} artifacts cannot be applied to {} features",
            bundle.instrument,
            instrument
        );
    }

    verify_columns(
        "feature scaler",
        bundle.feature_scaler.as_ref(),
        &table.column_names(),
    )?;
    if bundle.target_scaler.n_features() != 1 {
        return Err(DataError::ShapeMismatch {
            context: "detrended scaler column count".to_string(),
            expected: 1,
            actual: bundle.target_scaler.n_features(),
        }
        .into());
    }

    if table.len() <= sequence_length {
        info!(
            %instrument,
            rows = table.len(),
            sequence_length,
            "not enough feature rows for a prediction window"
        );
        return Ok(Forecast::empty(instrument));
    }

    let offsets = table.offsets();
    let detrended = detrend(&table.closes(), &offsets, bundle.trend.as_ref())?;

    let scaled_features = bundle.feature_scaler.transform(table.to_matrix().view())?;
    let detrended = Array2::from_shape_vec((detrended.len(), 1), detrended)?;
    let scaled_target = bundle.target_scaler.transform(detrended.view())?.column(0).to_vec();

    let batch = build_sequences(
        scaled_features.view(),
        &scaled_target,
        table.rows(),
        sequence_length,
    )?;
    debug!(%instrument, windows = batch.len(), "built prediction windows");

    let raw = bundle.predictor.predict(batch.windows.view())?;
    check_batch_output(batch.len(), &raw)?;

    let raw = Array2::from_shape_vec((raw.len(), 1), raw.into_iter().map(f64::from).collect())?;
    let predicted_detrended = bundle
        .target_scaler
        .inverse_transform(raw.view())?
        .column(0)
        .to_vec();
    let predicted = retrend(
        &predicted_detrended,
        &batch.target_offsets(),
        bundle.trend.as_ref(),
    )?;

    let rows = table.rows();
    let points = batch
        .targets
        .iter()
        .zip(predicted)
        .map(|(target, predicted)| ForecastPoint {
            date: target.date,
            offset: target.offset,
            actual: rows[target.offset].close(),
            predicted,
        })
        .collect::<Vec<_>>();

    info!(
        %instrument,
        rows = table.len(),
        predictions = points.len(),
        "computed forecast"
    );
    Ok(Forecast { instrument, points })
}

/// Run the full pipeline for one instrument from the loaded price table.
pub fn forecast(ctx: &DashboardContext, instrument: Instrument) -> Result<Forecast> {
    let series = ctx.table().series(instrument);
    let table = build_feature_table(&series, instrument, &ctx.pipeline().features)?;
    forecast_features(
        ctx.artifacts().bundle(instrument),
        &table,
        ctx.pipeline().sequence_length,
    )
}

/// Unfiltered forecasts computed so far, one per instrument.
///
/// Date filtering is cheap and is redone per interaction; only the model
/// stages are memoised. Entries live for the process lifetime.
#[derive(Debug, Default)]
pub struct ForecastCache {
    entries: HashMap<Instrument, Forecast>,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the instrument's forecast, computing it on first use.
    pub fn get_or_compute(
        &mut self,
        ctx: &DashboardContext,
        instrument: Instrument,
    ) -> Result<&Forecast> {
        match self.entries.entry(instrument) {
            Entry::Occupied(entry) => {
                debug!(%instrument, "forecast cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(forecast(ctx, instrument)?)),
        }
    }

    /// Forecast restricted to `range`.
    pub fn view(
        &mut self,
        ctx: &DashboardContext,
        instrument: Instrument,
        range: &DateRange,
    ) -> Result<Forecast> {
        Ok(self.get_or_compute(ctx, instrument)?.filter(range))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
