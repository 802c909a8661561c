// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `layerdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "layerdag",
    version,
    about = "Rebuild container images incrementally and start linked services.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAYERDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Rebuild whatever is out of date in the target's dependency closure.
    Build {
        target: String,
    },

    /// Build the target's closure, then start the target service.
    Run {
        target: String,

        /// Start in the background and print the container id.
        #[arg(long, short)]
        detach: bool,
    },

    /// Show which nodes of the target's closure are out of date.
    Status {
        target: String,
    },

    /// Remove the images built for the target's closure.
    Wipe {
        target: String,
    },

    /// Parse + validate, print the node graph, but don't touch the engine.
    List,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_detach() {
        let args = CliArgs::try_parse_from(["layerdag", "--config", "x.toml", "run", "-d", "web"])
            .unwrap();
        assert_eq!(args.config, PathBuf::from("x.toml"));
        assert!(matches!(args.command, Command::Run { target, detach: true } if target == "web"));
    }

    #[test]
    fn config_defaults_to_layerdag_toml() {
        let args = CliArgs::try_parse_from(["layerdag", "list"]).unwrap();
        assert_eq!(args.config, default_config_path());
        assert_eq!(args.config, PathBuf::from("Layerdag.toml"));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["layerdag"]).is_err());
    }
}
