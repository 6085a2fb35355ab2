//! Domain types for the departure monitor.
//!
//! This module contains the core types shared by every provider: validated
//! identifiers, the unified departure record and time parsing. Types enforce
//! their invariants at construction time, so code that receives them can
//! trust their validity.

mod departure;
mod provider_id;
mod stop;
mod time;
mod transport;

pub use departure::Departure;
pub use provider_id::{InvalidProvider, ProviderId};
pub use stop::{InvalidStop, StopRef};
pub use time::{TimeError, format_hhmm, parse_provider_time, whole_minutes};
pub use transport::{InvalidTransportType, TransportType};
