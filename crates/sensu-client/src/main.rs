// Entry point for the Sensu client process.

use clap::Parser;
use sensu_client::command_settings::CommandSettings;
use sensu_common::constants::return_code;
use sensu_sdk::ClientPackage;

fn main() {
    let settings = CommandSettings::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    let exit_code = runtime.block_on(async move { run(settings).await });

    std::process::exit(exit_code);
}

async fn run(settings: CommandSettings) -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "Sensu client {} (commit {})",
        ClientPackage::VERSION,
        ClientPackage::COMMIT_HASH
    );

    match sensu_client::commands::execute_command(&settings).await {
        Ok(exit_code) => {
            tracing::debug!("Client exiting with code {}", exit_code);
            exit_code
        }
        Err(e) => {
            tracing::error!("Client failed with error: {:?}", e);
            return_code::TERMINATED_ERROR
        }
    }
}
