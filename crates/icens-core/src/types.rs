//! Value types shared by subscribers and the producer

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{FrequencyError, IdentityError};

/// A rate in packets per second
///
/// Always finite and strictly positive. Construction is the only place the
/// invariant is checked, so every `Frequency` in the system is valid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Frequency(f64);

impl Frequency {
    /// Validate a raw rate
    pub fn new(hz: f64) -> Result<Self, FrequencyError> {
        if hz.is_finite() && hz > 0.0 {
            Ok(Self(hz))
        } else {
            Err(FrequencyError::Invalid { hz })
        }
    }

    pub fn hz(self) -> f64 {
        self.0
    }

    /// Emission period in nanoseconds, never less than one
    pub fn period_nanos(self) -> u64 {
        // float-to-int casts saturate
        ((1_000_000_000.0 / self.0).round() as u64).max(1)
    }
}

impl PartialEq for Frequency {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Frequency {}

impl PartialOrd for Frequency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frequency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for Frequency {
    type Error = FrequencyError;

    fn try_from(hz: f64) -> Result<Self, Self::Error> {
        Self::new(hz)
    }
}

impl From<Frequency> for f64 {
    fn from(frequency: Frequency) -> Self {
        frequency.0
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} pps", self.0)
    }
}

/// Declared strength of a subscription
///
/// Carried through to logs and reports. Negotiation treats both modes the
/// same way: the most demanding active subscriber wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionMode {
    #[default]
    Soft,
    Hard,
}

impl SubscriptionMode {
    /// Decode the integer attribute form used by scenario scripts (1 = soft, 2 = hard)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SubscriptionMode::Soft),
            2 => Some(SubscriptionMode::Hard),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            SubscriptionMode::Soft => 1,
            SubscriptionMode::Hard => 2,
        }
    }
}

impl std::fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionMode::Soft => write!(f, "soft"),
            SubscriptionMode::Hard => write!(f, "hard"),
        }
    }
}

/// Name of the subject subscribers request and the producer publishes under
///
/// A slash-separated path such as `/icens/powerlevel`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if !name.starts_with('/') || name.len() < 2 {
            return Err(IdentityError::InvalidTopic(name));
        }
        if name[1..].split('/').any(str::is_empty) {
            return Err(IdentityError::InvalidTopic(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = IdentityError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of published content, handed to the emission sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPayload {
    /// Per-producer emission counter, starting at 0
    pub sequence: u64,
    /// Payload size in bytes
    pub size: u32,
}
