//! Daily price/volume table for both instruments.
//!
//! The input is a CSV with a `Date` column and one close/volume column pair per
//! instrument. Rows are ordered by date on load and every date must be unique.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::error::DataError;
use crate::instrument::Instrument;
use crate::Result;

/// Name of the date column in the input table.
pub const DATE_COLUMN: &str = "Date";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Close and volume observations for a single instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentColumns {
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

/// One instrument's view of the table, aligned on the shared date index.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Time-indexed observations for both instruments.
#[derive(Debug, Clone)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    mastercard: InstrumentColumns,
    visa: InstrumentColumns,
}

impl PriceTable {
    /// Build a table from already-parsed columns.
    ///
    /// Validates that all columns have the same length as `dates` and that
    /// dates are strictly increasing.
    pub fn new(
        dates: Vec<NaiveDate>,
        mastercard: InstrumentColumns,
        visa: InstrumentColumns,
    ) -> Result<Self> {
        for (name, len) in [
            (Instrument::Mastercard.close_column(), mastercard.closes.len()),
            (Instrument::Mastercard.volume_column(), mastercard.volumes.len()),
            (Instrument::Visa.close_column(), visa.closes.len()),
            (Instrument::Visa.volume_column(), visa.volumes.len()),
        ] {
            if len != dates.len() {
                return Err(DataError::ShapeMismatch {
                    context: format!("length of column `{name}`"),
                    expected: dates.len(),
                    actual: len,
                }
                .into());
            }
        }

        for pair in dates.windows(2) {
            if pair[1] == pair[0] {
                return Err(DataError::DuplicateDate(pair[0]).into());
            }
            if pair[1] < pair[0] {
                return Err(DataError::UnorderedDates {
                    previous: pair[0],
                    next: pair[1],
                }
                .into());
            }
        }

        Ok(Self {
            dates,
            mastercard,
            visa,
        })
    }

    /// Load the table from a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open price table: {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to load price table: {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = table.len(),
            first = ?table.dates.first(),
            last = ?table.dates.last(),
            "loaded price table"
        );
        Ok(table)
    }

    /// Parse the table from any CSV source.
    ///
    /// Column order is free and extra columns are ignored. Empty numeric cells
    /// are read as NaN. Rows are sorted by date before validation, so an
    /// unsorted file loads as long as no date repeats.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv.headers().context("Failed to read CSV header")?.clone();

        let positions: HashMap<&str, usize> =
            headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
        let column = |name: &str| -> Result<usize> {
            positions
                .get(name)
                .copied()
                .ok_or_else(|| DataError::MissingColumn(name.to_string()).into())
        };

        let date_idx = column(DATE_COLUMN)?;
        let numeric = [
            Instrument::Mastercard.close_column(),
            Instrument::Mastercard.volume_column(),
            Instrument::Visa.close_column(),
            Instrument::Visa.volume_column(),
        ];
        let numeric_idx = numeric
            .iter()
            .map(|name| column(*name))
            .collect::<Result<Vec<_>>>()?;

        let mut rows: Vec<(NaiveDate, [f64; 4])> = Vec::new();
        for (row, record) in csv.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {row}"))?;
            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = parse_date(raw_date).ok_or_else(|| DataError::UnparseableDate {
                row,
                value: raw_date.to_string(),
            })?;

            let mut values = [f64::NAN; 4];
            for (slot, (&idx, name)) in numeric_idx.iter().zip(numeric.iter()).enumerate() {
                values[slot] = parse_number(record.get(idx).unwrap_or_default()).ok_or_else(
                    || DataError::UnparseableNumber {
                        row,
                        column: name.to_string(),
                        value: record.get(idx).unwrap_or_default().to_string(),
                    },
                )?;
            }
            rows.push((date, values));
        }

        rows.sort_by_key(|(date, _)| *date);
        debug!(rows = rows.len(), "parsed price rows");

        let mut dates = Vec::with_capacity(rows.len());
        let mut mastercard = InstrumentColumns::default();
        let mut visa = InstrumentColumns::default();
        for (date, [close_m, volume_m, close_v, volume_v]) in rows {
            dates.push(date);
            mastercard.closes.push(close_m);
            mastercard.volumes.push(volume_m);
            visa.closes.push(close_v);
            visa.volumes.push(volume_v);
        }

        Self::new(dates, mastercard, visa)
    }

    /// Number of trading days in the table.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The shared date index.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Extract one instrument's close/volume series.
    pub fn series(&self, instrument: Instrument) -> PriceSeries {
        let columns = match instrument {
            Instrument::Mastercard => &self.mastercard,
            Instrument::Visa => &self.visa,
        };
        PriceSeries {
            dates: self.dates.clone(),
            closes: columns.closes.clone(),
            volumes: columns.volumes.clone(),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}
