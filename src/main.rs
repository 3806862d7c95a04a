//! httpnote
//!
//! Answers every request with an empty `200 OK` and logs a structured
//! snapshot of what was received.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ trace → timeout → body limit → capture → 200 OK │
//!                          │                                   │              │
//!                          │                     ┌─────────────┴──────────┐   │
//!                          │                     │ form parse (extensions)│   │
//!                          │                     │ map_request → record   │   │
//!                          │                     └─────────────┬──────────┘   │
//!                          │                                   ▼              │
//!                          │                           TracingSink            │
//!                          │                    (stderr + rotating file)      │
//!                          └──────────────────────────────────────────────────┘
//! ```
//!
//! # Configuration
//! An optional TOML file, then `PORT`, `ENCODE_BYTES` and `LOG_FILENAME`
//! (or the matching flags) on top.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use httpnote::config::{resolve_config, Overrides};
use httpnote::lifecycle::startup;

#[derive(Parser)]
#[command(name = "httpnote")]
#[command(about = "Log the full structure of every HTTP request received", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Store bodies and uploads as base64 (1/t/true or 0/f/false)
    #[arg(long, env = "ENCODE_BYTES")]
    encode_bytes: Option<String>,

    /// Log file destination
    #[arg(long, env = "LOG_FILENAME")]
    log_filename: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let overrides = Overrides {
        port: cli.port,
        encode_bytes: cli.encode_bytes,
        log_filename: cli.log_filename,
    };

    let config = match resolve_config(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("httpnote: {e}");
            return ExitCode::FAILURE;
        }
    };

    match startup::start(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            eprintln!("httpnote: {e}");
            ExitCode::FAILURE
        }
    }
}
