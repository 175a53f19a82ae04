//! ==============================================================================
//! severity.rs - dust severity classification
//! ==============================================================================
//!
//! purpose:
//!     maps a particulate reading (ug/m3) to a discrete ordered category via
//!     fixed inclusive upper bounds. pure and table-driven.
//!
//! note:
//!     the device publishes its own alarm flag (led_status) computed remotely.
//!     that signal is independent of this classifier and the two may disagree;
//!     both are displayed, never reconciled.
//!
//! ==============================================================================

use serde::Serialize;

/// air-quality category, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Good,
    Moderate,
    Elevated,
    Hazardous,
}

/// inclusive upper bounds, ascending. anything above the last bound
/// (including non-finite readings, which fail every comparison) is Hazardous.
const BANDS: [(SeverityLevel, f64); 3] = [
    (SeverityLevel::Good, 37.5),
    (SeverityLevel::Moderate, 50.0),
    (SeverityLevel::Elevated, 90.0),
];

/// classify a dust reading: first level in ascending bound order whose
/// bound is >= the reading. negative readings land in Good.
pub fn classify(dust: f64) -> SeverityLevel {
    for (level, bound) in BANDS {
        if dust <= bound {
            return level;
        }
    }
    SeverityLevel::Hazardous
}

impl SeverityLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Elevated => "Elevated",
            Self::Hazardous => "Hazardous",
        }
    }

    /// color tag consumed by the dashboard shell
    pub fn color_tag(self) -> &'static str {
        match self {
            Self::Good => "emerald",
            Self::Moderate => "yellow",
            Self::Elevated => "orange",
            Self::Hazardous => "red",
        }
    }
}
