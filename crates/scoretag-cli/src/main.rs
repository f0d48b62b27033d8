//! Scoretag CLI - batch runner for the analysis pipeline.
//!
//! Log output goes to stderr; stdout carries one JSON document per line so
//! results can be piped into other tools.

mod commands;
mod manifest;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "scoretag")]
#[command(about = "Classify soundtrack cues once and reuse the result everywhere")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze every asset listed in a manifest
    Analyze(AnalyzeArgs),

    /// Check a vocabulary file for duplicate terms and alias collisions
    ValidateVocabulary {
        /// Vocabulary JSON file
        file: PathBuf,
    },

    /// List review candidates awaiting a curator
    Candidates {
        /// Directory holding the local databases
        #[arg(long, default_value = ".scoretag")]
        data_dir: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
pub(crate) struct AnalyzeArgs {
    /// JSON manifest listing the assets to analyze
    #[arg(long)]
    pub manifest: PathBuf,

    /// Vocabulary JSON file
    #[arg(long)]
    pub vocabulary: PathBuf,

    /// Pipeline configuration JSON file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the local cache and review queue
    #[arg(long, default_value = ".scoretag")]
    pub data_dir: PathBuf,

    /// Shared record database (defaults to a file under --data-dir)
    #[arg(long, conflicts_with = "remote_url")]
    pub shared_db: Option<PathBuf>,

    /// Base URL of an HTTP shared record store
    #[arg(long)]
    pub remote_url: Option<String>,

    /// Base URL of the classifier service
    #[arg(long)]
    pub classifier_url: String,

    /// Base URL of the term generator service
    #[arg(long)]
    pub generator_url: Option<String>,

    /// Skip content hashing; identities fall back to names
    #[arg(long)]
    pub no_hash: bool,

    /// Number of assets analyzed concurrently
    #[arg(short, long)]
    pub concurrency: Option<usize>,
}

fn init_logging(debug: bool, json: bool) {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.json);

    match args.command {
        Command::Analyze(analyze) => commands::analyze(analyze).await,
        Command::ValidateVocabulary { file } => commands::validate_vocabulary(&file),
        Command::Candidates { data_dir } => commands::candidates(&data_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_shared_db_conflicts_with_remote_url() {
        let result = Args::try_parse_from([
            "scoretag",
            "analyze",
            "--manifest",
            "assets.json",
            "--vocabulary",
            "vocab.json",
            "--classifier-url",
            "http://localhost:9000",
            "--shared-db",
            "shared.sqlite",
            "--remote-url",
            "http://localhost:9001",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["scoretag", "candidates", "--debug"]).unwrap();
        assert!(args.debug);
        assert!(matches!(args.command, Command::Candidates { .. }));
    }
}
