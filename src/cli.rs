use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "logstash-notifier",
    about = "Supervisor event listener that forwards process state changes to Logstash",
    version,
    after_help = "Run `logstash-notifier listen` as a supervisor [eventlistener:x] command.\nDiagnostics go to stderr unless log_file is configured."
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to notifier.yaml config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve supervisor events on stdin/stdout
    Listen(ListenArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Send one synthetic record to the collector
    SendTest {
        /// Process name to report
        #[arg(long, default_value = "logstash-notifier")]
        process: String,

        /// Event name to report
        #[arg(long, default_value = "PROCESS_STATE_RUNNING")]
        event: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Overrides applied on top of the config file for a listener run
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListenArgs {
    /// Event names to forward (trailing `*` matches a prefix)
    #[arg(long, value_delimiter = ',')]
    pub events: Vec<String>,

    /// Also forward process stdout/stderr log events
    #[arg(long = "capture-output", alias = "coe")]
    pub capture_output: bool,

    /// Environment variables attached to every record as user_data
    #[arg(long, num_args = 1.., value_name = "VAR")]
    pub include: Vec<String>,

    /// Terminate each datagram with a newline
    #[arg(long)]
    pub append_newline: bool,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },
}
