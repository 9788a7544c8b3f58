//! Command-line interface for alertrelay.
//!
//! This module provides the CLI structure for the `alertrelay` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ServeCommand, StatusCommand, VapidKeysCommand};

/// alertrelay - Relay vehicle alerts to their owners' browsers
///
/// Vehicle owners sign up and register a browser push subscription; alerts
/// posted to the webhook are delivered to that browser as notifications.
#[derive(Debug, Parser)]
#[command(name = "alertrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// Generate a fresh VAPID key pair
    VapidKeys(VapidKeysCommand),

    /// Show database statistics
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "alertrelay");
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["alertrelay", "serve"]).unwrap();
        let Command::Serve(serve) = cli.command else {
            panic!("expected serve");
        };
        assert!(serve.host.is_none());
        assert!(serve.port.is_none());
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli =
            Cli::try_parse_from(["alertrelay", "serve", "--host", "127.0.0.1", "-p", "8080"])
                .unwrap();
        let Command::Serve(serve) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(serve.port, Some(8080));
    }

    #[test]
    fn test_parse_vapid_keys() {
        let cli = Cli::try_parse_from(["alertrelay", "vapid-keys", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::VapidKeys(VapidKeysCommand { json: true })
        ));
    }

    #[test]
    fn test_parse_status() {
        let cli = Cli::try_parse_from(["alertrelay", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status(_)));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["alertrelay", "config", "validate", "/etc/alertrelay.toml"])
                .unwrap();
        let Command::Config(ConfigCommand::Validate { file }) = cli.command else {
            panic!("expected config validate");
        };
        assert_eq!(file, Some(PathBuf::from("/etc/alertrelay.toml")));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["alertrelay", "-c", "/custom/config.toml", "-vv", "status"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["alertrelay", "status", "-q"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Cli::try_parse_from(["alertrelay", "serve", "--port", "99999"]).is_err());
    }
}
