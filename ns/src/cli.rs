//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nodesync - shared synchronization primitives for distributed test nodes
#[derive(Parser)]
#[command(
    name = "nodesync",
    about = "Controller and tools for synchronization primitives shared across test nodes",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the controller until interrupted
    Serve {
        /// Address to listen on (overrides controller.bind)
        #[arg(short, long)]
        bind: Option<String>,

        /// Port to listen on (overrides controller.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that the controller is up and print its version
    Ping,

    /// List join proxies parked on the controller
    Proxies,

    /// Print the configured node roster
    Nodes,

    /// Halt the node registered under ID
    Terminate {
        /// Identifier the node registered its halt target under
        id: String,

        /// Exit status for the halted process
        #[arg(short, long, default_value_t = -1, allow_hyphen_values = true)]
        exit_code: i32,
    },
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nodesync")
        .join("logs")
        .join("nodesync.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["nodesync", "serve", "--bind", "127.0.0.1", "--port", "2000"]).unwrap();
        match cli.command {
            Command::Serve { bind, port } => {
                assert_eq!(bind.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(2000));
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn test_terminate_defaults_to_minus_one() {
        let cli = Cli::try_parse_from(["nodesync", "terminate", "node-1"]).unwrap();
        match cli.command {
            Command::Terminate { id, exit_code } => {
                assert_eq!(id, "node-1");
                assert_eq!(exit_code, -1);
            }
            other => panic!("expected terminate, got {other:?}"),
        }
    }

    #[test]
    fn test_terminate_accepts_negative_code() {
        let cli = Cli::try_parse_from(["nodesync", "terminate", "node-1", "--exit-code", "-5"]).unwrap();
        assert!(matches!(cli.command, Command::Terminate { exit_code: -5, .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nodesync", "ping", "-l", "DEBUG", "-c", "/tmp/x.yml"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.yml")));
    }

    #[test]
    fn test_log_path_ends_with_log_file() {
        assert!(get_log_path().ends_with("nodesync/logs/nodesync.log"));
    }
}
