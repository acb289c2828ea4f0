//! Actual vs predicted closing prices for Mastercard and Visa.
//!
//! Loads a daily price table, derives seven technical features per instrument,
//! runs each instrument's fitted scalers, trend model and sequence predictor
//! over sliding windows, and charts the predictions next to the actual closes
//! for a user-selected date range.

pub mod app;
pub mod artifacts;
pub mod buffer;
pub mod chart;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod features;
pub mod instrument;
pub mod pipeline;
pub mod predictor;
pub mod scaler;
pub mod sequence;
pub mod trend;

pub use artifacts::{ArtifactBundle, ArtifactStore};
pub use buffer::RollingBuffer;
pub use config::DashboardConfig;
pub use context::DashboardContext;
pub use data::{PriceSeries, PriceTable};
pub use error::DataError;
pub use features::{build_feature_table, FeatureConfig, FeatureTable};
pub use instrument::Instrument;
pub use pipeline::{forecast, DateRange, Forecast, ForecastCache, ForecastPoint, PipelineConfig};
pub use predictor::{OnnxConfig, SequencePredictor};
pub use scaler::{FittedScaler, Scaler};
pub use trend::{PolynomialTrend, TrendEstimator};

/// Library-wide error type.
pub type Result<T> = anyhow::Result<T>;
