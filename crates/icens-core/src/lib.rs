//! # icens Core
//!
//! Core types and the rate negotiation logic for icens pub/sub simulations.
//!
//! Subscribers join and leave a topic at different simulated times, each
//! declaring a desired data rate. The producer derives one effective publish
//! frequency from the currently active set and re-derives it on every
//! membership change.
//!
//! ## Key Types
//!
//! - [`SubscriberRegistry`]: the active subscriber set; notifies an observer
//!   synchronously on every change
//! - [`RatePolicy`] / [`MaxRatePolicy`]: pure snapshot → frequency mapping
//! - [`Producer`]: `Idle` / `Emitting(f)` state machine deciding when to emit
//! - [`EmissionSink`]: seam to the transport that sends content
//! - [`SimTime`]: integer-nanosecond simulated time

pub mod error;
pub mod event;
pub mod identity;
pub mod policy;
pub mod producer;
pub mod registry;
pub mod sink;
pub mod subscriber;
pub mod time;
pub mod types;

// Re-export main types
pub use error::*;
pub use event::*;
pub use identity::*;
pub use policy::*;
pub use producer::*;
pub use registry::*;
pub use sink::*;
pub use subscriber::*;
pub use time::*;
pub use types::*;
