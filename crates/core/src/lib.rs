//! Stayfinder core - catalog data, the availability query, and configuration
//!
//! This crate holds the only domain logic in the system:
//! - `catalog` - the static Seattle lodging records, injected wherever needed
//! - `availability` - the hotel availability query invoked as an agent tool
//! - `config` - layered application configuration (defaults, file, env)
//!
//! # Failure policy
//!
//! The availability query reports every input problem as a descriptive string
//! returned to the caller. The query is invoked by a language-model tool-use
//! layer that relays text to an end user, so a bad date must come back as a
//! message the model can repeat, not as an `Err` the transport would swallow.
//! Configuration errors are the opposite: typed, propagated, and fatal at
//! startup, since a sample program has no recovery path for a missing endpoint.

pub mod availability;
pub mod catalog;
pub mod config;

pub use availability::{find_available, StayError, StayQuote, StayRequest, DEFAULT_MAX_PRICE};
pub use catalog::{seattle_catalog, LodgingRecord};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
