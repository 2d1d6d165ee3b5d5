// opcflat Module - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the module host.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors that stop the host. A bad message is never one of them.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A template, mapping or input file could not be read.
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template or mapping document rejected.
    #[error("Invalid configuration document {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: opcflat::ConfigError,
    },

    /// Reading stdin or writing stdout failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus encoding failed.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModuleError::Config {
            path: PathBuf::from("/etc/opcflat/mapping.json"),
            source: opcflat::ConfigError::MissingNodesMapping,
        };
        let msg = err.to_string();
        assert!(msg.contains("mapping.json"));
        assert!(msg.contains("NodesMapping"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: ModuleError = io.into();
        assert!(matches!(err, ModuleError::Io(_)));
    }
}
