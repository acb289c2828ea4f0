//! Fixed-length sequence windows over the scaled feature matrix.

use chrono::NaiveDate;
use ndarray::{s, Array3, ArrayView2};

use crate::error::DataError;
use crate::features::FeatureRow;
use crate::Result;

/// The feature row a window predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRow {
    pub offset: usize,
    pub date: NaiveDate,
}

/// A batch of windows ready for the predictor.
///
/// `windows[i]` covers rows `[i, i + seq_length)` and is paired with
/// `targets[i]`, the row at `i + seq_length`, and `scaled_targets[i]`, that
/// row's scaled detrended value.
#[derive(Debug, Clone)]
pub struct SequenceBatch {
    pub windows: Array3<f32>,
    pub targets: Vec<TargetRow>,
    pub scaled_targets: Vec<f64>,
}

impl SequenceBatch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Offsets of the target rows, in window order.
    pub fn target_offsets(&self) -> Vec<usize> {
        self.targets.iter().map(|t| t.offset).collect()
    }
}

/// Number of windows a table of `rows` rows yields.
pub fn window_count(rows: usize, seq_length: usize) -> usize {
    rows.saturating_sub(seq_length)
}

/// Slice the scaled features into overlapping windows.
///
/// # Arguments
/// * `features` - Scaled feature matrix, one row per feature row
/// * `scaled_target` - Scaled detrended target, same length as `features`
/// * `rows` - Feature rows supplying offsets and dates, same length again
/// * `seq_length` - Window length
///
/// # Returns
/// Exactly `rows.len() - seq_length` windows, or an empty batch when there
/// are not more rows than the window length.
pub fn build_sequences(
    features: ArrayView2<'_, f64>,
    scaled_target: &[f64],
    rows: &[FeatureRow],
    seq_length: usize,
) -> Result<SequenceBatch> {
    if seq_length == 0 {
        anyhow::bail!("sequence length must be at least 1");
    }
    let n = rows.len();
    for (context, len) in [
        ("feature matrix rows", features.nrows()),
        ("scaled target length", scaled_target.len()),
    ] {
        if len != n {
            return Err(DataError::ShapeMismatch {
                context: context.to_string(),
                expected: n,
                actual: len,
            }
            .into());
        }
    }

    let count = window_count(n, seq_length);
    let n_features = features.ncols();
    let mut windows = Array3::<f32>::zeros((count, seq_length, n_features));
    let mut targets = Vec::with_capacity(count);
    let mut scaled_targets = Vec::with_capacity(count);

    for i in 0..count {
        let slice = features.slice(s![i..i + seq_length, ..]);
        windows
            .slice_mut(s![i, .., ..])
            .assign(&slice.mapv(|v| v as f32));

        let row = &rows[i + seq_length];
        targets.push(TargetRow {
            offset: row.offset,
            date: row.date,
        });
        scaled_targets.push(scaled_target[i + seq_length]);
    }

    Ok(SequenceBatch {
        windows,
        targets,
        scaled_targets,
    })
}
