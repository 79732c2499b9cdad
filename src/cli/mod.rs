//! Command-line surface for the broker driver (component C10).
//!
//! Deliberately minimal: transport selection plus a handful of flag
//! overrides laid directly on top of [`crate::config::Config::default`].
//! There is no config-file surface — construction is always from an
//! in-memory record, and configuration-file lifecycle management (init,
//! validate, keygen) is out of scope for this binary.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    Stdio,
    Http,
}

/// JSON-RPC 2.0 message broker, served over stdio or HTTP/SSE.
#[derive(Debug, Parser)]
#[command(name = "mcp-broker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Which transport to serve the broker on.
    #[arg(long, value_enum, default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,

    /// Overrides `Config::address`. Ignored by the stdio transport.
    #[arg(long)]
    pub address: Option<String>,

    /// Overrides `Config::api_key`, enabling Bearer auth. Ignored by stdio.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Overrides `Config::rate_limit` (requests/second; 0 disables it).
    #[arg(long)]
    pub rate_limit: Option<f64>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    pub verbose: bool,
}
