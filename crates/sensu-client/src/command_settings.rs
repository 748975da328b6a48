// Command-line parsing for the client binary.

use clap::{Args, Parser, Subcommand};
use sensu_common::constants::{variables, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sensu-client", version, about = "Runs checks requested over a pub-sub transport")]
pub struct CommandSettings {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Subscribe to every configured subscription until interrupted (default).
    ///
    /// With the built-in `memory` transport no request can reach the client
    /// from outside the process; use `exec` to run a request locally.
    Run(ConfigArgs),
    /// Handle one check request locally and print the result that would be published.
    Exec {
        #[command(flatten)]
        config: ConfigArgs,
        /// Request JSON, e.g. '{"name":"disk","issued":1700000000}'.
        request: String,
    },
    /// Print the client version.
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ConfigArgs {
    /// Path of the client configuration file.
    #[arg(short, long, env = variables::CONFIG_PATH, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

impl CommandSettings {
    /// The command to run; `run` with the default configuration when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_else(|| {
            Command::Run(ConfigArgs {
                config: std::env::var_os(variables::CONFIG_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_config() {
        let settings =
            CommandSettings::try_parse_from(["sensu-client", "run", "--config", "/tmp/c.json"]).unwrap();
        assert_eq!(
            settings.command(),
            Command::Run(ConfigArgs {
                config: PathBuf::from("/tmp/c.json")
            })
        );
    }

    #[test]
    fn parses_exec_request() {
        let settings = CommandSettings::try_parse_from([
            "sensu-client",
            "exec",
            "-c",
            "/tmp/c.json",
            r#"{"name":"disk"}"#,
        ])
        .unwrap();
        match settings.command() {
            Command::Exec { config, request } => {
                assert_eq!(config.config, PathBuf::from("/tmp/c.json"));
                assert_eq!(request, r#"{"name":"disk"}"#);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn no_command_means_run() {
        let settings = CommandSettings::try_parse_from(["sensu-client"]).unwrap();
        assert!(matches!(settings.command(), Command::Run(_)));
    }

    #[test]
    fn run_help_explains_memory_transport() {
        let cli = <CommandSettings as clap::CommandFactory>::command();
        let run = cli.find_subcommand("run").unwrap();
        let help = run.get_long_about().unwrap().to_string();
        assert!(help.contains("`memory` transport"));
        assert!(help.contains("exec"));
    }

    #[test]
    fn exec_requires_request() {
        assert!(CommandSettings::try_parse_from(["sensu-client", "exec"]).is_err());
    }
}
