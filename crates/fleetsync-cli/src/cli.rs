//! CLI argument definitions for fleetsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pull` | Run one incremental pull cycle |
//! | `auth` | Check vendor credentials |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML configuration file |
//! | `--log-level` | `info` | Log level unless `RUST_LOG` is set |
//! | `--log-json` | `false` | JSON log lines on stderr |
//! | `--pretty` | `false` | Pretty-print the JSON result |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Fleet telemetry puller for the Galooli SDK.
#[derive(Debug, Parser)]
#[command(
    name = "fleetsync",
    author,
    version,
    about = "Incremental Galooli telemetry puller"
)]
pub struct Cli {
    /// TOML configuration file. `FLEETSYNC_*` environment variables override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pull observations changed since the last checkpoint and send them on.
    ///
    /// # Examples
    ///
    ///   fleetsync pull --config fleetsync.toml
    ///   fleetsync pull --state-file state.json --dry-run
    Pull(PullArgs),

    /// Check that the configured credentials are accepted by the vendor.
    ///
    /// # Examples
    ///
    ///   fleetsync auth --config fleetsync.toml
    Auth(AuthArgs),
}

#[derive(Debug, Args)]
pub struct PullArgs {
    /// JSON snapshot for device state and checkpoints.
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Downstream endpoint receiving observation batches.
    #[arg(long)]
    pub sink_url: Option<String>,

    /// Write observations to stdout as NDJSON instead of the sink.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long)]
    pub look_back_hours: Option<i64>,

    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[arg(long)]
    pub look_back_hours: Option<i64>,
}
