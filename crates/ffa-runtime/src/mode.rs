#![forbid(unsafe_code)]

//! Runtime mode definitions for Strict and Hardened folding.

use serde::{Deserialize, Serialize};

/// Operational mode governing how much input checking precedes a fold.
///
/// - **Strict**: fold whatever the caller hands over; NaN and infinities
///   propagate through the sums unchanged.
/// - **Hardened**: additionally reject non-finite samples before the first
///   stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuntimeMode {
    #[default]
    Strict,
    Hardened,
}

impl RuntimeMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Hardened => "Hardened",
        }
    }

    /// Whether inputs must be screened for NaN/Inf in this mode.
    #[must_use]
    pub const fn checks_finite(self) -> bool {
        matches!(self, Self::Hardened)
    }
}
