//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Editor-to-scene bridge
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: scenelink.toml, searched upward)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Accept scene connections and run the host side of the bridge
    #[command(visible_alias = "h")]
    Host {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Resolve a source location against a scene dump
    #[command(visible_alias = "r")]
    Resolve {
        #[command(flatten)]
        args: ResolveArgs,
    },
}

/// Resolve command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Scene dump (JSON) to search
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub scene: PathBuf,

    /// Source file path of the call site
    pub path: String,

    /// Line of the call site
    pub line: i32,

    /// Column of the call site
    pub column: i32,

    /// Resolve from this node instead of listing every match
    #[arg(short, long)]
    pub node: Option<u32>,

    /// Include deleted nodes in the listing
    #[arg(short = 'd', long)]
    pub include_deleted: bool,
}
