//! Error types for icens
//!
//! Every error here is a configuration defect rather than a transient
//! failure: nothing is retried, and the affected subscriber/producer pair is
//! left in its last valid state.

use thiserror::Error;

use crate::identity::SubscriberId;

/// Top-level error type for icens
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IcensError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Frequency error: {0}")]
    Frequency(#[from] FrequencyError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by subscriber registry mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Subscriber {0} is already active")]
    DuplicateActiveSubscriber(SubscriberId),

    #[error("Subscriber {0} is not active")]
    UnknownActiveSubscriber(SubscriberId),
}

/// Errors related to publish frequencies
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrequencyError {
    #[error("Invalid frequency {hz}: must be finite and greater than zero")]
    Invalid { hz: f64 },

    #[error("Emission period for {hz} pps overflows the simulated clock")]
    PeriodOverflow { hz: f64 },
}

/// Errors related to names and identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(SubscriberId),
}

/// Errors surfaced by the emission collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Topic not served by this sink: {0}")]
    UnknownTopic(String),
}

/// Convenience alias for `Result<T, IcensError>`
pub type IcensResult<T> = Result<T, IcensError>;
