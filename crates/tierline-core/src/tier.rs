//! Tier Classification
//!
//! Classifies records as hot or cold based on age relative to a cutoff.
//! The classifier is a pure function: it takes an explicit `now` instead
//! of reading the clock, so the orchestrator and any diagnostics apply
//! exactly the same rule.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Storage tier classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Recently active, served by the primary store.
    Hot,
    /// Aged out, served by the archive store.
    Cold,
}

impl Tier {
    /// Classify a record timestamp against a cutoff.
    ///
    /// The boundary is inclusive on the hot side: a timestamp exactly
    /// equal to `now - cutoff` is still hot. Only strictly older
    /// records are cold.
    pub fn classify(timestamp_ms: i64, cutoff: Duration, now_ms: i64) -> Tier {
        let threshold = now_ms.saturating_sub(cutoff.as_millis() as i64);
        if timestamp_ms >= threshold {
            Tier::Hot
        } else {
            Tier::Cold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Cold => "cold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(Tier::Hot),
            "cold" => Ok(Tier::Cold),
            other => Err(CoreError::InvalidTier(other.to_string())),
        }
    }
}
