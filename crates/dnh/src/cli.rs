//! Clap derive structures for the `dnh` CLI.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// dnh -- realtime hub for lab equipment
#[derive(Debug, Parser)]
#[command(
    name = "dnh",
    version,
    about = "Realtime hub for lab equipment",
    long_about = "Runs the DNH hub: equipment registers over a WebSocket, exchanges\n\
        typed parameter values, publishes messages by topic, and shares a\n\
        hub-wide datacache. Read-only views are served over HTTP.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (JSON, or TOML by extension). Defaults to ./config.json
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the hub and serve until interrupted
    Run(RunArgs),

    /// Inspect the effective configuration
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Address both listeners bind to
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// HTTP port for /system, /equipment and /status
    #[arg(long)]
    pub http_port: Option<u16>,

    /// WebSocket port for /realtime
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Seconds between keepalive pings (0 disables)
    #[arg(long, value_name = "SECS")]
    pub ping_interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Validate the configuration and every param definition
    Check,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
