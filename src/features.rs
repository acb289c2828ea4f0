//! Technical indicator computation for model inputs.
//!
//! Derives the seven model input columns from a close/volume series. Rolling
//! statistics follow the usual dataframe conventions: a window reports a value
//! only when it is full, the resulting leading NaNs are back-filled from the
//! first valid value, and any row still holding a NaN is dropped.
//!
//! **Critical for correctness**: the column set and order produced here must be
//! exactly what the feature scaler was fit on. Scalers carrying column names are
//! checked against [`FeatureTable::column_names`] before use.

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::RollingBuffer;
use crate::data::PriceSeries;
use crate::instrument::Instrument;
use crate::Result;

/// Number of columns in a feature row.
pub const NUM_FEATURES: usize = 7;

/// Window sizes for the derived indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Window (in trading days) for the standard deviation of daily returns
    pub volatility_window: usize,

    /// Window for the moving average applied to volatility after row dropping
    pub volatility_smoothing: usize,

    /// Window for the short moving average of close (`MA_Close`)
    pub ma_window: usize,

    /// Window for `SMA50`
    pub sma_short_window: usize,

    /// Window for `SMA200`
    pub sma_long_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            volatility_window: 20,
            volatility_smoothing: 5,
            ma_window: 20,
            sma_short_window: 50,
            sma_long_window: 200,
        }
    }
}

/// Feature columns in model input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Close,
    Volume,
    Volatility,
    MaClose,
    Sma50,
    Sma200,
    Returns,
}

impl FeatureColumn {
    /// All columns, in the order the scaler and predictor expect.
    pub const ALL: [FeatureColumn; NUM_FEATURES] = [
        FeatureColumn::Close,
        FeatureColumn::Volume,
        FeatureColumn::Volatility,
        FeatureColumn::MaClose,
        FeatureColumn::Sma50,
        FeatureColumn::Sma200,
        FeatureColumn::Returns,
    ];

    /// Position of the column inside a feature row.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Column name as stored with fitted artifacts.
    ///
    /// Close and volume carry the instrument's source column name.
    pub fn name(&self, instrument: Instrument) -> &'static str {
        match self {
            FeatureColumn::Close => instrument.close_column(),
            FeatureColumn::Volume => instrument.volume_column(),
            FeatureColumn::Volatility => "Volatility",
            FeatureColumn::MaClose => "MA_Close",
            FeatureColumn::Sma50 => "SMA50",
            FeatureColumn::Sma200 => "SMA200",
            FeatureColumn::Returns => "Returns",
        }
    }
}

/// One row of the feature table.
///
/// `offset` is the row's position inside the table (0-based, after dropping
/// incomplete rows). Trend estimation is keyed on it, never on the date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub offset: usize,
    pub date: NaiveDate,
    pub values: [f64; NUM_FEATURES],
}

impl FeatureRow {
    pub fn get(&self, column: FeatureColumn) -> f64 {
        self.values[column.index()]
    }

    pub fn close(&self) -> f64 {
        self.get(FeatureColumn::Close)
    }
}

/// Feature rows for one instrument, ordered by date with contiguous offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    instrument: Instrument,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Build a table from rows, renumbering offsets from zero.
    pub fn from_rows(
        instrument: Instrument,
        rows: impl IntoIterator<Item = (NaiveDate, [f64; NUM_FEATURES])>,
    ) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(offset, (date, values))| FeatureRow {
                offset,
                date,
                values,
            })
            .collect();
        Self { instrument, rows }
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in model input order for this table's instrument.
    pub fn column_names(&self) -> Vec<String> {
        FeatureColumn::ALL
            .iter()
            .map(|c| c.name(self.instrument).to_string())
            .collect()
    }

    /// Close prices, one per row.
    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(FeatureRow::close).collect()
    }

    /// Row offsets, `0..len()`.
    pub fn offsets(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.offset).collect()
    }

    /// Dense `(rows x 7)` matrix for scaling.
    pub fn to_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::<f64>::zeros((self.rows.len(), NUM_FEATURES));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, &value) in row.values.iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        matrix
    }

    /// Whether any cell is NaN.
    pub fn has_nan(&self) -> bool {
        self.rows
            .iter()
            .any(|row| row.values.iter().any(|v| v.is_nan()))
    }
}

/// Compute simple one-step percentage change.
///
/// Missing values are forward-filled first, so a gap yields a zero change on
/// the missing row and `values[i] / last_valid - 1` after it. Entries before
/// the first valid value, and the first valid value itself, are NaN.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut previous = f64::NAN;
    for (i, &v) in values.iter().enumerate() {
        let current = if v.is_nan() { previous } else { v };
        result[i] = current / previous - 1.0;
        previous = current;
    }
    result
}

/// Rolling mean over a trailing window.
///
/// # Returns
/// Mean values where the window is full and NaN-free, NaN elsewhere
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<f64>> {
    if window < 1 {
        anyhow::bail!("window must be at least 1");
    }

    let mut buffer = RollingBuffer::new(window);
    Ok(values
        .iter()
        .map(|&v| {
            buffer.push(v);
            buffer.mean()
        })
        .collect())
}

/// Rolling sample standard deviation over a trailing window.
///
/// # Returns
/// Standard deviations where the window is full and NaN-free, NaN elsewhere
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<f64>> {
    if window < 2 {
        anyhow::bail!("window must be at least 2 for standard deviation");
    }

    let mut buffer = RollingBuffer::new(window);
    Ok(values
        .iter()
        .map(|&v| {
            buffer.push(v);
            buffer.sample_std()
        })
        .collect())
}

/// Replace each NaN with the next valid value after it.
///
/// Trailing NaNs (no later valid value) stay NaN.
pub fn backfill(values: &[f64]) -> Vec<f64> {
    let mut result = values.to_vec();
    let mut next_valid = f64::NAN;
    for v in result.iter_mut().rev() {
        if v.is_nan() {
            *v = next_valid;
        } else {
            next_valid = *v;
        }
    }
    result
}

/// Build the feature table for one instrument.
///
/// Steps:
/// 1. daily returns, return volatility, `MA_Close`, `SMA50`, `SMA200`,
///    each rolling column back-filled over its warm-up
/// 2. drop every row that still has a NaN (the first row's return, missing
///    source values, or all rows when history is shorter than a window)
/// 3. smooth volatility with a short rolling mean over the remaining rows,
///    back-filled again
///
/// Volatility is therefore back-filled twice. Rows whose smoothed volatility
/// is still NaN (fewer rows than the smoothing window) are dropped, so the
/// returned table never contains NaN.
pub fn build_feature_table(
    series: &PriceSeries,
    instrument: Instrument,
    config: &FeatureConfig,
) -> Result<FeatureTable> {
    let closes = &series.closes;
    let volumes = &series.volumes;
    if closes.len() != series.dates.len() || volumes.len() != series.dates.len() {
        anyhow::bail!(
            "series columns must match date count ({} dates, {} closes, {} volumes)",
            series.dates.len(),
            closes.len(),
            volumes.len()
        );
    }

    let returns = pct_change(closes);
    let volatility = backfill(&rolling_std(&returns, config.volatility_window)?);
    let ma_close = backfill(&rolling_mean(closes, config.ma_window)?);
    let sma_short = backfill(&rolling_mean(closes, config.sma_short_window)?);
    let sma_long = backfill(&rolling_mean(closes, config.sma_long_window)?);

    let mut kept: Vec<(NaiveDate, [f64; NUM_FEATURES])> = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        let values = [
            closes[i],
            volumes[i],
            volatility[i],
            ma_close[i],
            sma_short[i],
            sma_long[i],
            returns[i],
        ];
        if values.iter().all(|v| !v.is_nan()) {
            kept.push((series.dates[i], values));
        }
    }
    let dropped = series.len() - kept.len();

    let vol_idx = FeatureColumn::Volatility.index();
    let raw_volatility: Vec<f64> = kept.iter().map(|(_, values)| values[vol_idx]).collect();
    let smoothed = backfill(&rolling_mean(&raw_volatility, config.volatility_smoothing)?);
    for ((_, values), &vol) in kept.iter_mut().zip(smoothed.iter()) {
        values[vol_idx] = vol;
    }
    kept.retain(|(_, values)| !values[vol_idx].is_nan());

    debug!(
        %instrument,
        input_rows = series.len(),
        dropped,
        rows = kept.len(),
        "built feature table"
    );
    if kept.is_empty() && !series.is_empty() {
        warn!(
            %instrument,
            input_rows = series.len(),
            longest_window = config.sma_long_window,
            "not enough history to fill every rolling window"
        );
    }

    Ok(FeatureTable::from_rows(instrument, kept))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: Vec<f64>) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = (0..closes.len())
            .map(|i| start + chrono::Days::new(i as u64))
            .collect();
        let volumes = closes.iter().map(|c| c * 10.0).collect();
        PriceSeries {
            dates,
            closes,
            volumes,
        }
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + i as f64 * 0.1 + (i as f64 * 0.3).sin() * 2.0)
            .collect()
    }

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            volatility_window: 3,
            volatility_smoothing: 2,
            ma_window: 2,
            sma_short_window: 3,
            sma_long_window: 4,
        }
    }

    #[test]
    fn test_pct_change_basic() {
        let result = pct_change(&[100.0, 110.0, 99.0]);
        assert!(result[0].is_nan());
        assert!((result[1] - 0.1).abs() < 1e-12);
        assert!((result[2] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_pct_change_forward_fills_gaps() {
        let result = pct_change(&[f64::NAN, 100.0, f64::NAN, 120.0]);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_eq!(result[2], 0.0);
        assert!((result[3] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_missing_close_drops_only_its_row() {
        let mut closes = wavy(30);
        closes[15] = f64::NAN;
        let config = FeatureConfig {
            volatility_window: 2,
            volatility_smoothing: 1,
            ma_window: 2,
            sma_short_window: 2,
            sma_long_window: 3,
        };
        let input = series(closes.clone());
        let table = build_feature_table(&input, Instrument::Mastercard, &config).unwrap();

        // raw rows 1..30 without row 15
        assert_eq!(table.len(), 28);
        assert!(!table.has_nan());
        assert_eq!(table.offsets(), (0..28).collect::<Vec<_>>());
        let kept: Vec<NaiveDate> = (1..30)
            .filter(|&i| i != 15)
            .map(|i| input.dates[i])
            .collect();
        let dates: Vec<NaiveDate> = table.rows().iter().map(|r| r.date).collect();
        assert_eq!(dates, kept);

        // the row after the gap compares against the last valid close
        let after = table.rows()[14];
        assert_eq!(after.date, input.dates[16]);
        let expected = closes[16] / closes[14] - 1.0;
        assert!((after.get(FeatureColumn::Returns) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_mean_basic() {
        let result = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert!(result[0].is_nan());
        assert_eq!(&result[1..], &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_rolling_std_skips_leading_nan() {
        let returns = pct_change(&[1.0, 2.0, 4.0, 8.0]);
        let result = rolling_std(&returns, 2).unwrap();
        // window over [NaN, 1.0] is incomplete
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        // returns are 1.0, 1.0, 1.0 from index 1
        assert!(result[2].abs() < 1e-12);
    }

    #[test]
    fn test_window_validation() {
        assert!(rolling_mean(&[1.0], 0).is_err());
        assert!(rolling_std(&[1.0], 1).is_err());
    }

    #[test]
    fn test_backfill() {
        let result = backfill(&[f64::NAN, f64::NAN, 3.0, f64::NAN, 5.0, f64::NAN]);
        assert_eq!(&result[..5], &[3.0, 3.0, 3.0, 5.0, 5.0]);
        assert!(result[5].is_nan());
    }

    #[test]
    fn test_feature_table_has_no_nan() {
        let table =
            build_feature_table(&series(wavy(300)), Instrument::Visa, &FeatureConfig::default())
                .unwrap();
        assert!(!table.has_nan());
        // only the first row (no previous close for returns) is dropped
        assert_eq!(table.len(), 299);
        assert_eq!(table.offsets(), (0..299).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_history_yields_empty_table() {
        let table = build_feature_table(
            &series(wavy(150)),
            Instrument::Mastercard,
            &FeatureConfig::default(),
        )
        .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_long_window_is_backfilled() {
        let closes: Vec<f64> = (1..=8).map(|v| v as f64).collect();
        let table =
            build_feature_table(&series(closes), Instrument::Mastercard, &small_config()).unwrap();
        assert_eq!(table.len(), 7);

        // first valid SMA (window 4) is at raw index 3: mean(1,2,3,4)
        let first = table.rows()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(first.close(), 2.0);
        assert!((first.get(FeatureColumn::Sma200) - 2.5).abs() < 1e-12);
        // MA window 2 at raw index 1: mean(1,2)
        assert!((first.get(FeatureColumn::MaClose) - 1.5).abs() < 1e-12);
        assert!((first.get(FeatureColumn::Returns) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_volatility_is_smoothed_after_drop() {
        let closes = wavy(12);
        let config = small_config();
        let table = build_feature_table(&series(closes.clone()), Instrument::Visa, &config).unwrap();

        let returns = pct_change(&closes);
        let vol = backfill(&rolling_std(&returns, config.volatility_window).unwrap());
        // rows kept are raw 1..12; smoothing window 2 over those
        let kept_vol = &vol[1..];
        let expected = backfill(&rolling_mean(kept_vol, 2).unwrap());

        for (row, want) in table.rows().iter().zip(expected.iter()) {
            assert!((row.get(FeatureColumn::Volatility) - want).abs() < 1e-12);
        }
        // first two kept rows share the back-filled smoothed value
        assert_eq!(
            table.rows()[0].get(FeatureColumn::Volatility),
            table.rows()[1].get(FeatureColumn::Volatility)
        );
    }

    #[test]
    fn test_missing_close_drops_row_and_renumbers() {
        let mut closes = wavy(20);
        closes[10] = f64::NAN;
        let table = build_feature_table(&series(closes), Instrument::Visa, &small_config()).unwrap();
        assert!(!table.has_nan());
        // row 0 (no return) and the blank row
        assert_eq!(table.len(), 18);
        assert_eq!(table.offsets(), (0..table.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_column_names_follow_instrument() {
        let table = build_feature_table(
            &series(wavy(10)),
            Instrument::Mastercard,
            &small_config(),
        )
        .unwrap();
        assert_eq!(
            table.column_names(),
            vec!["Close_M", "Volume_M", "Volatility", "MA_Close", "SMA50", "SMA200", "Returns"]
        );
    }

    #[test]
    fn test_to_matrix_shape() {
        let table =
            build_feature_table(&series(wavy(10)), Instrument::Visa, &small_config()).unwrap();
        let matrix = table.to_matrix();
        assert_eq!(matrix.dim(), (table.len(), NUM_FEATURES));
        assert_eq!(matrix[[0, 0]], table.rows()[0].close());
    }

    #[test]
    fn test_feature_config_default() {
        let config = FeatureConfig::default();
        assert_eq!(config.volatility_window, 20);
        assert_eq!(config.volatility_smoothing, 5);
        assert_eq!(config.sma_long_window, 200);
    }
}
