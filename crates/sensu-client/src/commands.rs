// Command dispatch for the client binary: run / exec / version.

use crate::checks::CheckStore;
use crate::client::{install_signal_handlers, Client};
use crate::command_settings::{Command, CommandSettings};
use crate::transport::{build_transport, MemoryTransport, MEMORY_TRANSPORT};

use anyhow::Result;
use sensu_common::constants::return_code;
use sensu_common::{ClientConfig, ClientContext, ConfigurationStore};
use sensu_sdk::{ClientPackage, TraceWriter};
use std::path::Path;
use std::sync::Arc;

/// Run the parsed command and return the process exit code.
pub async fn execute_command(settings: &CommandSettings) -> Result<i32> {
    match settings.command() {
        Command::Run(args) => {
            let Some(config) = load_config(&args.config) else {
                return Ok(return_code::CONFIGURATION_ERROR);
            };
            run(config).await
        }
        Command::Exec { config, request } => {
            let Some(config) = load_config(&config.config) else {
                return Ok(return_code::CONFIGURATION_ERROR);
            };
            match exec_request(config, &request).await {
                Some(payload) => {
                    println!("{}", String::from_utf8_lossy(&payload));
                    Ok(return_code::SUCCESS)
                }
                None => {
                    eprintln!("The request was dropped; see the log for the reason.");
                    Ok(return_code::TERMINATED_ERROR)
                }
            }
        }
        Command::Version => {
            println!("{} ({})", ClientPackage::VERSION, ClientPackage::COMMIT_HASH);
            Ok(return_code::SUCCESS)
        }
    }
}

fn load_config(path: &Path) -> Option<ClientConfig> {
    match ConfigurationStore::new(path).get_config() {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Unable to load configuration: {:#}", e);
            None
        }
    }
}

async fn run(config: ClientConfig) -> Result<i32> {
    let transport = build_transport(&config.transport)?;
    let context = ClientContext::new(config);
    let trace = context.get_trace("Commands");
    trace.info(&format!(
        "Starting client '{}' ({}) version {}",
        context.name(),
        context.config().address.as_deref().unwrap_or("no address"),
        ClientPackage::VERSION
    ));
    if context.config().transport.name == MEMORY_TRANSPORT {
        trace.warning(
            "The memory transport only carries requests from inside this process; \
             no external check request will reach this client",
        );
    }

    install_signal_handlers(context.clone());

    let client = Client::new(context, transport, Arc::new(CheckStore::new()));
    client.register_configured_checks();
    client.run().await?;

    Ok(return_code::SUCCESS)
}

/// Handle `request` the way a subscriber would and return the payload it
/// would have published, or `None` if the request was dropped.
pub async fn exec_request(config: ClientConfig, request: &str) -> Option<Vec<u8>> {
    let transport = Arc::new(MemoryTransport::new());
    let client = Client::new(
        ClientContext::new(config),
        transport.clone(),
        Arc::new(CheckStore::new()),
    );
    client.register_configured_checks();

    client
        .subscriber("exec")
        .handle_message(request.as_bytes())
        .await;

    transport.published().into_iter().next().map(|m| m.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensu_common::CheckDefinition;

    fn config() -> ClientConfig {
        let mut config = ClientConfig {
            name: "host1".into(),
            ..Default::default()
        };
        config.checks.insert(
            "greeting".into(),
            CheckDefinition {
                command: "echo hello from config".into(),
                timeout: None,
            },
        );
        config
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_runs_configured_check() {
        let payload = exec_request(config(), r#"{"name":"greeting","issued":3}"#)
            .await
            .unwrap();
        let result: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(result["client"], "host1");
        assert_eq!(result["check"]["name"], "greeting");
        assert_eq!(result["check"]["output"], "hello from config");
        assert_eq!(result["check"]["issued"], 3);
    }

    #[tokio::test]
    async fn exec_drops_request_without_name() {
        assert!(exec_request(config(), r#"{"command":"echo hi"}"#).await.is_none());
    }

    #[tokio::test]
    async fn missing_config_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        let settings = <CommandSettings as clap::Parser>::try_parse_from([
            "sensu-client",
            "run",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(
            execute_command(&settings).await.unwrap(),
            return_code::CONFIGURATION_ERROR
        );
    }
}
