// Client: runs one subscriber per configured subscription and stops them all
// when the client context is shut down.

use crate::checks::{CheckStore, ExternalCheck};
use crate::subscriber::{Subscriber, SubscriberError};
use crate::transport::Transport;

use anyhow::Result;
use sensu_common::{ClientContext, ShutdownReason, Tracing};
use sensu_sdk::TraceWriter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct Client {
    context: Arc<ClientContext>,
    transport: Arc<dyn Transport>,
    store: Arc<CheckStore>,
    trace: Tracing,
}

impl Client {
    pub fn new(
        context: Arc<ClientContext>,
        transport: Arc<dyn Transport>,
        store: Arc<CheckStore>,
    ) -> Self {
        let trace = context.get_trace("Client");
        Self {
            context,
            transport,
            store,
            trace,
        }
    }

    pub fn store(&self) -> &Arc<CheckStore> {
        &self.store
    }

    /// Register the command checks defined in configuration.
    ///
    /// Returns how many checks were registered.
    pub fn register_configured_checks(&self) -> usize {
        let trace: Arc<dyn TraceWriter> = Arc::new(self.context.get_trace("ExternalCheck"));
        for (name, definition) in &self.context.config().checks {
            let mut check = ExternalCheck::new(&definition.command).with_trace(trace.clone());
            if let Some(secs) = definition.timeout {
                check = check.with_timeout(Duration::from_secs(secs));
            }
            self.trace
                .verbose(&format!("Registering check '{}': {}", name, definition.command));
            self.store.register(name.clone(), Arc::new(check));
        }
        self.context.config().checks.len()
    }

    /// Build a subscriber for `subscription` sharing this client's transport and checks.
    pub fn subscriber(&self, subscription: &str) -> Subscriber {
        Subscriber::new(
            subscription,
            self.context.clone(),
            self.transport.clone(),
            self.store.clone(),
        )
    }

    /// Run every configured subscription until the context is shut down.
    pub async fn run(&self) -> Result<()> {
        let subscriptions = &self.context.config().subscriptions;
        if subscriptions.is_empty() {
            self.trace
                .warning("No subscriptions configured; waiting for shutdown");
        }

        let subscribers: Vec<Arc<Subscriber>> = subscriptions
            .iter()
            .map(|s| Arc::new(self.subscriber(s)))
            .collect();

        let handles: Vec<JoinHandle<Result<(), SubscriberError>>> = subscribers
            .iter()
            .map(|subscriber| {
                let subscriber = subscriber.clone();
                tokio::spawn(async move { subscriber.start().await })
            })
            .collect();

        self.trace.info(&format!(
            "Client '{}' running {} subscription(s) with {} registered check(s)",
            self.context.name(),
            subscribers.len(),
            self.store.len()
        ));

        self.context.shutdown_token().cancelled().await;
        self.trace.info(&format!(
            "Stopping subscribers ({})",
            self.context
                .shutdown_reason()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown reason".to_string())
        ));

        let closed = futures::future::join_all(subscribers.iter().map(|s| s.close())).await;
        for (subscriber, result) in subscribers.iter().zip(closed) {
            if let Err(e) = result {
                self.trace
                    .warning(&format!("Closing {}: {}", subscriber.subscription(), e));
            }
        }

        for (subscriber, handle) in subscribers.iter().zip(handles) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self
                    .trace
                    .error(&format!("Subscriber {} failed: {}", subscriber.subscription(), e)),
                Err(e) => self
                    .trace
                    .error(&format!("Subscriber {} panicked: {}", subscriber.subscription(), e)),
            }
        }

        self.trace.info("All subscribers stopped");
        Ok(())
    }
}

/// Shut the context down on Ctrl-C or SIGTERM.
pub fn install_signal_handlers(context: Arc<ClientContext>) {
    let context_for_signal = context.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, initiating graceful shutdown");
                context_for_signal.shutdown(ShutdownReason::UserCancelled);
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    tracing::info!("SIGTERM received, initiating graceful shutdown");
                    context.shutdown(ShutdownReason::OperatingSystemShutdown);
                }
                Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use sensu_common::{CheckDefinition, ClientConfig};

    const WAIT: Duration = Duration::from_secs(10);

    fn config(subscriptions: &[&str]) -> ClientConfig {
        let mut config = ClientConfig {
            name: "host1".into(),
            subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        config.checks.insert(
            "hello".into(),
            CheckDefinition {
                command: "echo hello".into(),
                timeout: Some(5),
            },
        );
        config
    }

    #[test]
    fn registers_configured_checks() {
        let context = ClientContext::new(config(&[]));
        let client = Client::new(
            context,
            Arc::new(MemoryTransport::new()),
            Arc::new(CheckStore::new()),
        );

        assert_eq!(client.register_configured_checks(), 1);
        assert!(client.store().contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_subscriptions_until_shutdown() {
        let context = ClientContext::new(config(&["default", "webservers"]));
        let transport = Arc::new(MemoryTransport::new());
        let client = Arc::new(Client::new(
            context.clone(),
            transport.clone(),
            Arc::new(CheckStore::new()),
        ));
        client.register_configured_checks();

        let runner = client.clone();
        let run = tokio::spawn(async move { runner.run().await });

        for subscription in ["default", "webservers"] {
            tokio::time::timeout(WAIT, transport.wait_for_consumer(subscription))
                .await
                .unwrap();
        }

        transport
            .deliver("webservers", br#"{"name":"hello","issued":7}"#.to_vec())
            .await
            .unwrap();
        let published = tokio::time::timeout(WAIT, transport.wait_for_published(1))
            .await
            .unwrap();
        let result = published[0].json().unwrap();
        assert_eq!(result["client"], "host1");
        assert_eq!(result["check"]["output"], "hello");
        assert_eq!(result["check"]["issued"], 7);

        context.shutdown(ShutdownReason::UserCancelled);
        tokio::time::timeout(WAIT, run).await.unwrap().unwrap().unwrap();

        assert!(transport.bound_funnel("default").is_none());
        assert!(transport.bound_funnel("webservers").is_none());
    }

    #[tokio::test]
    async fn run_without_subscriptions_returns_on_shutdown() {
        let context = ClientContext::new(config(&[]));
        let client = Client::new(
            context.clone(),
            Arc::new(MemoryTransport::new()),
            Arc::new(CheckStore::new()),
        );

        context.shutdown(ShutdownReason::OperatingSystemShutdown);
        tokio::time::timeout(WAIT, client.run()).await.unwrap().unwrap();
    }
}
