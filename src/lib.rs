//! # opcflat - OPC UA publisher message flattener
//!
//! Rewrites the nested JSON produced by an OPC UA publisher into a flat
//! key/value document for downstream consumers.
//!
//! ## Key Features
//!
//! - **Latest reading per tag**: repeated readings of the same
//!   `(ApplicationUri, NodeId)` within a message collapse to the newest one
//! - **Display-name mapping**: output keys from the reading, or from an
//!   administrator supplied override table
//! - **Output templates**: every output starts from a configured base object
//! - **Freshness stamp**: newest source timestamp recorded as `TimeCreated`
//! - **Streaming path**: a token-scanning alternative that never builds a tree
//!
//! ## Quick Start
//!
//! ```rust
//! use opcflat::{Flattener, FlattenerConfig, NameOverrides};
//!
//! let overrides = NameOverrides::from_mapping_json(
//!     r#"{"NodesMapping":[{"n1":{"DisplayName":"Reactor1Temp"}}]}"#,
//! ).unwrap();
//!
//! let flattener = Flattener::with_config(FlattenerConfig::default())
//!     .with_overrides(overrides);
//!
//! let out = flattener.flatten(r#"[
//!     {"ApplicationUri":"uri1","NodeId":"n1","DisplayName":"",
//!      "Value":{"Value":21.5,"SourceTimestamp":"2024-01-01T00:00:00Z"}}
//! ]"#).unwrap();
//!
//! assert_eq!(out, r#"{"Reactor1Temp":21.5,"TimeCreated":"2024-01-01T00:00:00Z"}"#);
//! ```
//!
//! ## Modules
//!
//! - [`identity`]: `(origin, tag id)` identity key
//! - [`reading`]: validated view of one reading
//! - [`timeseries`]: per-identity, time-ordered grouping
//! - [`resolver`]: output key resolution
//! - [`flattener`]: the batch flattener and message handling
//! - [`streaming`]: the token-scanning flattener
//! - [`config`]: options, output template, name overrides
//! - [`diagnostics`]: shared message counters
//! - [`message`]: body + transport properties

// Modules
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod flattener;
pub mod identity;
pub mod message;
pub mod reading;
pub mod resolver;
pub mod streaming;
pub mod timeseries;

// Re-exports for convenient access
pub use config::{FlattenerConfig, NameOverrides, OutputTemplate};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use error::{ConfigError, ErrorKind, FlattenError, Result};
pub use flattener::{Flattener, Strategy, EMPTY_OBJECT};
pub use identity::IdentityKey;
pub use message::Message;
pub use reading::Reading;
pub use resolver::DisplayNameResolver;
pub use streaming::{JsonTokens, StreamingFlattener, Token};
pub use timeseries::{Timeseries, TimeseriesEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
