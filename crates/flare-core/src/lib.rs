//! Core event model and shared primitives.
//!
//! Provides the structured event representation captured from errors and
//! messages, the scope that enriches events before they are sent, strongly
//! typed identifiers, and the clock abstraction used for timestamps and
//! cooldowns. The delivery pipeline depends on these types to produce the
//! canonical wire hash of every event.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod models;
pub mod scope;
pub mod time;

pub use error::{CoreError, Result};
pub use event::{
    ContextCapability, ErrorReport, Event, EventOptions, ExceptionInterface, ExceptionValue, Hint,
    Reportable, Sdk,
};
pub use models::{EventId, Level, WireHash};
pub use scope::Scope;
pub use time::{Clock, RealClock, TestClock};
