use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// PromptMarket analytics pipeline
#[derive(Parser, Debug)]
#[command(name = "promptmarket-analytics")]
#[command(about = "Run the analytics flush workers and scheduler, and operate the event buffer")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML, YAML or JSON); defaults to ./analytics.*
    #[arg(short, long, env = "ANALYTICS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Consume analytics jobs until interrupted
    Worker {
        /// Parallel consumers; overrides worker.concurrency
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Publish the periodic flush and retention jobs until interrupted
    Beat,

    /// Drain and persist the buffer now, in this process
    Flush,

    /// Print the number of buffered events
    QueueSize,

    /// Buffer a single event
    Track(TrackArgs),

    /// Delete persisted events older than the retention window
    Cleanup {
        /// Days to keep; overrides retention.days_to_keep
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Event name, e.g. prompt_viewed
    #[arg(long)]
    pub event_type: String,

    /// Subject kind, e.g. prompt
    #[arg(long)]
    pub entity_type: String,

    #[arg(long)]
    pub entity_id: Option<String>,

    #[arg(long)]
    pub user_id: Option<Uuid>,

    #[arg(long)]
    pub session_id: Option<String>,

    /// JSON object attached as event metadata
    #[arg(long)]
    pub metadata: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_track_command() {
        let cli = Cli::parse_from([
            "promptmarket-analytics",
            "track",
            "--event-type",
            "prompt_viewed",
            "--entity-type",
            "prompt",
            "--metadata",
            r#"{"source":"cli"}"#,
        ]);
        match cli.command {
            Command::Track(args) => {
                assert_eq!(args.event_type, "prompt_viewed");
                assert_eq!(args.metadata.as_deref(), Some(r#"{"source":"cli"}"#));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_worker_override() {
        let cli = Cli::parse_from(["promptmarket-analytics", "--verbose", "worker", "--concurrency", "8"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Worker { concurrency: Some(8) }));
    }
}
