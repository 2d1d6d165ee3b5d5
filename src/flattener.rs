//! Batch flattener
//!
//! The [`Flattener`] turns one publisher message into a flat JSON object:
//!
//! 1. readings are grouped per identity ([`Timeseries`]),
//! 2. the output starts as a copy of the [`OutputTemplate`] (or empty),
//! 3. for each identity, in first-seen order, the most recent reading's
//!    payload is written under its resolved output key (last write wins on
//!    key collisions),
//! 4. the freshest source timestamp is stamped under `TimeCreated`.
//!
//! # Example
//!
//! ```rust
//! use opcflat::Flattener;
//!
//! let flattener = Flattener::new();
//! let out = flattener
//!     .flatten(r#"[{"ApplicationUri":"uri1","NodeId":"n1","DisplayName":"Temp",
//!                   "Value":{"Value":21.5,"SourceTimestamp":"2024-01-01T00:00:00Z"}}]"#)
//!     .unwrap();
//! assert_eq!(out, r#"{"uri1;Temp":21.5,"TimeCreated":"2024-01-01T00:00:00Z"}"#);
//! ```
//!
//! A `Flattener` is immutable once built and can be shared across threads;
//! the only shared mutable state is the [`Diagnostics`] passed to
//! [`Flattener::flatten_message`].

use std::io::Write;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::{log, warn, Level};
use serde_json::{Map, Value};

use crate::config::{FlattenerConfig, NameOverrides, OutputTemplate};
use crate::diagnostics::Diagnostics;
use crate::error::{FlattenError, Result};
use crate::message::Message;
use crate::resolver::DisplayNameResolver;
use crate::streaming::StreamingFlattener;
use crate::timeseries::Timeseries;

/// Output for empty or unrecognised input.
pub const EMPTY_OBJECT: &str = "{}";

/// Inputs this short (after trimming) cannot hold a reading.
const MIN_FRAGMENT_LEN: usize = 2;

/// Which flattening path to use for a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Identity-aware flattening ([`Flattener::flatten`]).
    #[default]
    Batch,
    /// Token scan ([`StreamingFlattener`]).
    Streaming,
}

/// Identity-aware flattener.
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    config: FlattenerConfig,
    template: Option<OutputTemplate>,
    overrides: NameOverrides,
}

impl Flattener {
    /// Flattener with default options, no template and no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattener with custom options.
    pub fn with_config(config: FlattenerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Builder: seed every output with `template`.
    pub fn with_template(mut self, template: OutputTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Builder: install the name override table.
    pub fn with_overrides(mut self, overrides: NameOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &FlattenerConfig {
        &self.config
    }

    pub fn template(&self) -> Option<&OutputTemplate> {
        self.template.as_ref()
    }

    pub fn overrides(&self) -> &NameOverrides {
        &self.overrides
    }

    /// Flatten raw message text.
    ///
    /// Text that is blank, too short, or does not start with `[` or `{`
    /// yields `"{}"`. Bracketed text that fails to parse is an error.
    pub fn flatten(&self, text: &str) -> Result<String> {
        self.log_input(None, text);
        self.dispatch(text)
    }

    /// Flatten with the token-scanning path, using the configured display
    /// name property.
    pub fn flatten_stream(&self, text: &str) -> Result<String> {
        self.log_input(None, text);
        let out = StreamingFlattener::new(&self.config.display_name_property).flatten(text)?;
        self.log_output(&out);
        Ok(out)
    }

    /// Token-scanning path writing straight into `sink`.
    ///
    /// Only the input is logged; the written object stays in the sink.
    pub fn flatten_stream_to<W: Write>(&self, text: &str, sink: W) -> Result<W> {
        self.log_input(None, text);
        StreamingFlattener::new(&self.config.display_name_property).flatten_to(text, sink)
    }

    /// Flatten already parsed readings and serialize the result.
    pub fn flatten_readings(&self, readings: &[Value]) -> Result<String> {
        let output = self.flatten_to_map(readings)?;
        let text =
            serde_json::to_string(&output).map_err(|e| FlattenError::Serialize(e.to_string()))?;
        self.log_output(&text);
        Ok(text)
    }

    /// Flatten already parsed readings into an object.
    pub fn flatten_to_map(&self, readings: &[Value]) -> Result<Map<String, Value>> {
        let timeseries = Timeseries::build(readings, &self.config)?;
        let resolver = DisplayNameResolver::new(&self.overrides, self.config.use_application_uri);

        let mut output = self
            .template
            .as_ref()
            .map(OutputTemplate::instantiate)
            .unwrap_or_default();
        let mut latest: Option<DateTime<Utc>> = None;

        for (_, entries) in timeseries.iter() {
            let Some(entry) = entries.last() else {
                continue;
            };

            let key = resolver.resolve(&entry.reading)?;
            let payload = entry.reading.payload()?;
            output.insert(key, payload.clone());

            // None never advances the stamp.
            if entry.timestamp > latest {
                latest = entry.timestamp;
            }
        }

        if self.config.add_time_created {
            let stamp = latest.unwrap_or_else(earliest_timestamp);
            output.insert(
                self.config.time_created_property.clone(),
                Value::String(format_timestamp(&stamp)),
            );
        }

        Ok(output)
    }

    /// Flatten a message body and copy its properties onto the result.
    ///
    /// Issues one sequence number from `diagnostics`. On failure the error is
    /// logged with that number and returned; the message should not be
    /// forwarded.
    pub fn flatten_message(&self, message: &Message, diagnostics: &Diagnostics) -> Result<Message> {
        self.flatten_message_with(message, diagnostics, Strategy::Batch)
    }

    /// [`Flattener::flatten_message`] with an explicit strategy.
    pub fn flatten_message_with(
        &self,
        message: &Message,
        diagnostics: &Diagnostics,
        strategy: Strategy,
    ) -> Result<Message> {
        let sequence = diagnostics.next_sequence();
        let text = message.body_text();
        self.log_input(Some(sequence), &text);

        let result = match strategy {
            Strategy::Batch => self.dispatch(&text),
            Strategy::Streaming => StreamingFlattener::new(&self.config.display_name_property)
                .flatten(&text)
                .map(|out| {
                    self.log_output(&out);
                    out
                }),
        };

        match result {
            Ok(body) => {
                diagnostics.record_flattened();
                Ok(message.reply(body))
            }
            Err(err) => {
                diagnostics.record_failed();
                warn!(
                    "Message {} not forwarded ({}): {}",
                    sequence,
                    err.kind(),
                    err
                );
                Err(err)
            }
        }
    }

    fn dispatch(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        let readings = match trimmed.as_bytes().first() {
            _ if trimmed.len() <= MIN_FRAGMENT_LEN => None,
            Some(b'[') => Some(serde_json::from_str::<Vec<Value>>(trimmed)?),
            Some(b'{') => Some(vec![serde_json::from_str::<Value>(trimmed)?]),
            _ => None,
        };

        match readings {
            Some(readings) => self.flatten_readings(&readings),
            None => {
                self.log_output(EMPTY_OBJECT);
                Ok(EMPTY_OBJECT.to_string())
            }
        }
    }

    fn log_level(&self) -> Level {
        if self.config.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }

    fn log_input(&self, sequence: Option<u64>, text: &str) {
        match sequence {
            Some(seq) => log!(self.log_level(), "Received message: {}, Body: [{}]", seq, text),
            None => log!(self.log_level(), "Received message: Body: [{}]", text),
        }
    }

    fn log_output(&self, text: &str) {
        log!(self.log_level(), "Flattened message: Body: [{}]", text);
    }
}

/// Stamp used when no reading carried a timestamp: `0001-01-01T00:00:00Z`.
pub fn earliest_timestamp() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// RFC 3339 with `Z`; fractional seconds only when present.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
