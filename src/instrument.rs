//! The two instruments the dashboard knows about.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A tradable instrument with its own price columns and artifact set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    Mastercard,
    Visa,
}

impl Instrument {
    /// Get all instruments in selector order.
    pub fn all() -> [Instrument; 2] {
        [Instrument::Mastercard, Instrument::Visa]
    }

    /// Human-readable name used in titles and the selector.
    pub fn display_name(&self) -> &'static str {
        match self {
            Instrument::Mastercard => "Mastercard",
            Instrument::Visa => "Visa",
        }
    }

    /// Close price column in the input table.
    pub fn close_column(&self) -> &'static str {
        match self {
            Instrument::Mastercard => "Close_M",
            Instrument::Visa => "Close_V",
        }
    }

    /// Volume column in the input table.
    pub fn volume_column(&self) -> &'static str {
        match self {
            Instrument::Mastercard => "Volume_M",
            Instrument::Visa => "Volume_V",
        }
    }

    /// Suffix used in artifact file names (`scaler_<stem>.json`, ...).
    pub fn artifact_stem(&self) -> &'static str {
        match self {
            Instrument::Mastercard => "mastercard",
            Instrument::Visa => "visa",
        }
    }

    /// The instrument the selector moves to next.
    pub fn next(&self) -> Instrument {
        match self {
            Instrument::Mastercard => Instrument::Visa,
            Instrument::Visa => Instrument::Mastercard,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
