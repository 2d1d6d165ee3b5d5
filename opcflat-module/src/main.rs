// opcflat Module - Edge host for the OPC UA publisher flattener
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # opcflat Module
//!
//! Reads OPC UA publisher messages, flattens them and writes one flat JSON
//! document per forwarded message to stdout.
//!
//! ## Usage
//!
//! ```bash
//! # Flatten newline-delimited messages from stdin
//! opcflat-module --mapping mapping.json < messages.ndjson
//!
//! # Flatten whole files, seed output from a template, expose metrics
//! opcflat-module --template template.json --input a.json b.json --metrics-port 9100
//! ```
//!
//! Every option can also be set through the environment. `verbose`,
//! `template` and `mapping` keep their historical variable names.

mod error;
mod loader;
mod metrics;
mod pipeline;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use clap::Parser;
use error::Result;
use opcflat::config::{
    DEFAULT_DISPLAY_NAME_PROPERTY, DEFAULT_NODE_ID_PROPERTY, DEFAULT_TIME_CREATED_PROPERTY,
};
use opcflat::{Diagnostics, FlattenerConfig, Strategy};
use pipeline::Pipeline;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// OPC UA publisher message flattener
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log raw and flattened message bodies at info level
    #[arg(long, env = "verbose")]
    verbose: bool,

    /// JSON object every output starts from
    #[arg(long, env = "template")]
    template: Option<PathBuf>,

    /// NodesMapping document with display name overrides
    #[arg(long, env = "mapping")]
    mapping: Option<PathBuf>,

    /// Reading property holding the tag id
    #[arg(long, env = "OPCFLAT_NODE_ID_PROPERTY", default_value = DEFAULT_NODE_ID_PROPERTY)]
    node_id_property: String,

    /// Reading property holding the display name
    #[arg(long, env = "OPCFLAT_DISPLAY_NAME_PROPERTY", default_value = DEFAULT_DISPLAY_NAME_PROPERTY)]
    display_name_property: String,

    /// Do not stamp the freshest source timestamp onto the output
    #[arg(long, env = "OPCFLAT_NO_TIME_CREATED")]
    no_time_created: bool,

    /// Output key for the freshness stamp
    #[arg(long, env = "OPCFLAT_TIME_CREATED_PROPERTY", default_value = DEFAULT_TIME_CREATED_PROPERTY)]
    time_created_property: String,

    /// Use the bare display name as output key, without the ApplicationUri prefix
    #[arg(long, env = "OPCFLAT_NO_APPLICATION_URI")]
    no_application_uri: bool,

    /// Use the token-scanning flattener (no template, overrides or stamp)
    #[arg(long, env = "OPCFLAT_STREAMING")]
    streaming: bool,

    /// Message files to flatten, one message per file (default: stdin lines)
    #[arg(long, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Serve /metrics and /health on this port
    #[arg(long, env = "OPCFLAT_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "OPCFLAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn flattener_config(&self) -> FlattenerConfig {
        FlattenerConfig::default()
            .with_verbose(self.verbose)
            .with_node_id_property(self.node_id_property.as_str())
            .with_display_name_property(self.display_name_property.as_str())
            .with_time_created(!self.no_time_created)
            .with_time_created_property(self.time_created_property.as_str())
            .with_application_uri(!self.no_application_uri)
    }

    fn strategy(&self) -> Strategy {
        if self.streaming {
            Strategy::Streaming
        } else {
            Strategy::Batch
        }
    }
}

/// Application state shared across handlers.
struct AppState {
    diagnostics: Arc<Diagnostics>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("opcflat module v{}", opcflat::VERSION);

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let flattener = loader::build_flattener(
        args.flattener_config(),
        args.template.as_deref(),
        args.mapping.as_deref(),
    )?;

    let strategy = args.strategy();
    if strategy == Strategy::Streaming && (args.template.is_some() || args.mapping.is_some()) {
        warn!("Streaming mode ignores the output template and name mapping");
    }

    let pipeline = Pipeline::new(flattener, strategy);

    if let Some(port) = args.metrics_port {
        let state = Arc::new(AppState {
            diagnostics: pipeline.diagnostics(),
            start_time: std::time::Instant::now(),
        });
        tokio::spawn(serve(port, state));
    }

    let mut stdout = tokio::io::stdout();
    let forwarded = if args.input.is_empty() {
        let stdin = BufReader::new(tokio::io::stdin());
        pipeline.run_lines(stdin, &mut stdout).await?
    } else {
        pipeline.run_files(&args.input, &mut stdout).await?
    };

    let snap = pipeline.diagnostics().snapshot();
    info!(
        "Input exhausted: {} received, {} forwarded, {} dropped",
        snap.received, forwarded, snap.failed
    );

    if args.metrics_port.is_some() {
        info!("Serving metrics until interrupted");
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

async fn serve(port: u16, state: Arc<AppState>) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server stopped: {}", e);
    }
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("Content-Type", "text/plain; charset=utf-8")],
            e.to_string(),
        ),
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    received: u64,
    flattened: u64,
    failed: u64,
}

/// Status handler - engine counters as JSON.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snap = state.diagnostics.snapshot();
    Json(StatusResponse {
        version: opcflat::VERSION.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        received: snap.received,
        flattened: snap.flattened,
        failed: snap.failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["opcflat-module"]).unwrap();
        let config = args.flattener_config();
        assert_eq!(config, FlattenerConfig::default());
        assert_eq!(args.strategy(), Strategy::Batch);
        assert!(args.input.is_empty());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "opcflat-module",
            "--verbose",
            "--no-application-uri",
            "--no-time-created",
            "--display-name-property",
            "Label",
            "--streaming",
            "--input",
            "a.json",
            "b.json",
        ])
        .unwrap();

        let config = args.flattener_config();
        assert!(config.verbose);
        assert!(!config.use_application_uri);
        assert!(!config.add_time_created);
        assert_eq!(config.display_name_property, "Label");
        assert_eq!(args.strategy(), Strategy::Streaming);
        assert_eq!(args.input.len(), 2);
    }
}
