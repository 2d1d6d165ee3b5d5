// opcflat Module - Message pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Feeds inbound messages through the flattener and forwards the results.
//!
//! Inbound messages come from newline-delimited text (one message body per
//! line) or from whole files (one message per file). Each forwarded body is
//! written on its own line. A message that fails to flatten is counted,
//! logged by the engine and dropped; the next message is handled normally.

use crate::error::{ModuleError, Result};
use crate::metrics;
use opcflat::{Diagnostics, Flattener, Message, Strategy};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Property naming the file a message was read from.
pub const SOURCE_FILE_PROPERTY: &str = "source-file";

/// Shared flattener plus the process-wide diagnostic context.
pub struct Pipeline {
    flattener: Flattener,
    diagnostics: Arc<Diagnostics>,
    strategy: Strategy,
}

impl Pipeline {
    pub fn new(flattener: Flattener, strategy: Strategy) -> Self {
        Self {
            flattener,
            diagnostics: Arc::new(Diagnostics::new()),
            strategy,
        }
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Flatten one message. `None` when it must not be forwarded.
    pub fn process(&self, message: &Message) -> Option<Message> {
        metrics::record_received();
        match self
            .flattener
            .flatten_message_with(message, &self.diagnostics, self.strategy)
        {
            Ok(outbound) => {
                metrics::record_forwarded(count_keys(&outbound.body));
                Some(outbound)
            }
            Err(err) => {
                metrics::record_failure(err.kind());
                None
            }
        }
    }

    /// Handle every non-blank line of `input` as one message.
    ///
    /// Returns the number of messages forwarded.
    pub async fn run_lines<R, W>(&self, input: R, output: &mut W) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut forwarded = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(outbound) = self.process(&Message::new(line)) {
                emit(output, &outbound).await?;
                forwarded += 1;
            }
        }

        output.flush().await?;
        Ok(forwarded)
    }

    /// Handle each file as one message.
    pub async fn run_files<W>(&self, paths: &[PathBuf], output: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut forwarded = 0;

        for path in paths {
            let body = tokio::fs::read(path)
                .await
                .map_err(|source| ModuleError::ReadFile {
                    path: path.clone(),
                    source,
                })?;
            let inbound =
                Message::new(body).with_property(SOURCE_FILE_PROPERTY, path.display().to_string());

            if let Some(outbound) = self.process(&inbound) {
                emit(output, &outbound).await?;
                forwarded += 1;
            }
        }

        output.flush().await?;
        Ok(forwarded)
    }
}

async fn emit<W: AsyncWrite + Unpin>(output: &mut W, message: &Message) -> Result<()> {
    output.write_all(&message.body).await?;
    output.write_all(b"\n").await?;
    debug!("Message forwarded ({} bytes)", message.body.len());
    Ok(())
}

/// Top-level keys of a flattened body. Duplicate keys from the streaming
/// path count once.
fn count_keys(body: &[u8]) -> usize {
    serde_json::from_slice::<Map<String, Value>>(body)
        .map(|map| map.len())
        .unwrap_or(0)
}
