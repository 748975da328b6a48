// ClientContext: the client's identity, trace sources and shutdown coordination,
// shared by every subscriber of the process.

use crate::config_store::ClientConfig;
use crate::constants;
use crate::secret_masker::SecretMasker;
use crate::tracing::{TraceManager, TraceSetting, Tracing};

use parking_lot::Mutex;
use sensu_sdk::TraceWriter;
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The reason the client is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    UserCancelled,
    OperatingSystemShutdown,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::UserCancelled => write!(f, "UserCancelled"),
            ShutdownReason::OperatingSystemShutdown => write!(f, "OperatingSystemShutdown"),
        }
    }
}

/// Application context handed to the client and its subscribers.
pub struct ClientContext {
    config: ClientConfig,
    trace_manager: TraceManager,
    shutdown_token: CancellationToken,
    shutdown_reason: Mutex<Option<ShutdownReason>>,
}

impl ClientContext {
    /// Build the context for `config`, registering its redact values as secrets.
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let secret_masker = Arc::new(SecretMasker::new());
        for value in &config.redact {
            secret_masker.add_value(value);
        }

        let print_to_stdout = env::var(constants::variables::PRINT_LOG_TO_STDOUT)
            .ok()
            .and_then(|v| constants::convert_to_bool(&v))
            .unwrap_or(false);

        let trace_setting = TraceSetting {
            print_to_stdout,
            ..TraceSetting::default()
        };

        Arc::new(Self {
            config,
            trace_manager: TraceManager::with_setting(secret_masker, trace_setting),
            shutdown_token: CancellationToken::new(),
            shutdown_reason: Mutex::new(None),
        })
    }

    /// The client name, used as `client` in results and as the funnel prefix.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a named trace source.
    pub fn get_trace(&self, name: &str) -> Tracing {
        self.trace_manager.get(name)
    }

    pub fn secret_masker(&self) -> &Arc<SecretMasker> {
        self.trace_manager.secret_masker()
    }

    /// Token cancelled once `shutdown` is called.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        *self.shutdown_reason.lock()
    }

    /// Initiate client shutdown. Only the first reason is kept.
    pub fn shutdown(&self, reason: ShutdownReason) {
        let mut current = self.shutdown_reason.lock();
        if current.is_none() {
            self.get_trace("ClientContext")
                .info(&format!("Client will be shutdown for {}", reason));
            *current = Some(reason);
        }
        self.shutdown_token.cancel();
    }
}
