// Subscriber: owns one subscription. Keeps the transport subscription alive,
// runs every check request it receives and publishes the result.
//
//   Transport ──bytes──▶ handle_message ──▶ Check ──▶ CheckResult ──▶ Transport::publish

use crate::check_message::{CheckRequest, CheckResult};
use crate::checks::{Check, CheckStore, ExternalCheck};
use crate::transport::Transport;

use sensu_common::constants::routing;
use sensu_common::ClientContext;
use sensu_sdk::{ClientPackage, TraceWriter};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A close request; answered once the receive loop has stopped.
type CloseRequest = oneshot::Sender<()>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("subscriber is already started")]
    AlreadyStarted,
    #[error("subscriber is not running")]
    NotRunning,
}

/// Consumer tag for a client: `<name>-<version>-<unix seconds>`.
pub fn funnel_for(client_name: &str, version: &str, started_at: i64) -> String {
    [client_name, version, &started_at.to_string()].join("-")
}

pub struct Subscriber {
    subscription: String,
    context: Arc<ClientContext>,
    transport: Arc<dyn Transport>,
    store: Arc<CheckStore>,
    trace: Arc<dyn TraceWriter>,
    close_tx: mpsc::Sender<CloseRequest>,
    close_rx: parking_lot::Mutex<Option<mpsc::Receiver<CloseRequest>>>,
}

impl Subscriber {
    pub fn new(
        subscription: impl Into<String>,
        context: Arc<ClientContext>,
        transport: Arc<dyn Transport>,
        store: Arc<CheckStore>,
    ) -> Self {
        let subscription = subscription.into();
        let trace = Arc::new(context.get_trace(&format!("Subscriber[{}]", subscription)));
        let (close_tx, close_rx) = mpsc::channel(1);
        Self {
            subscription,
            context,
            transport,
            store,
            trace,
            close_tx,
            close_rx: parking_lot::Mutex::new(Some(close_rx)),
        }
    }

    /// Replace the trace writer.
    pub fn with_trace(mut self, trace: Arc<dyn TraceWriter>) -> Self {
        self.trace = trace;
        self
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    /// Run the receive loop until `close` is called.
    ///
    /// Messages are handled one at a time, in delivery order; a message is
    /// fully handled (check run, result published) before the next is taken.
    pub async fn start(&self) -> Result<(), SubscriberError> {
        let mut close_rx = self
            .close_rx
            .lock()
            .take()
            .ok_or(SubscriberError::AlreadyStarted)?;

        let funnel = funnel_for(
            self.context.name(),
            ClientPackage::VERSION,
            chrono::Utc::now().timestamp(),
        );

        let (mut msg_rx, stop, subscribe_task) = self.subscribe(funnel);
        self.trace
            .info(&format!("Subscribed to {}", self.subscription));

        let ack = loop {
            tokio::select! {
                biased;

                Some(ack) = close_rx.recv() => break ack,

                Some(blob) = msg_rx.recv() => {
                    self.handle_message(&blob).await;
                }
            }
        };

        self.trace
            .warning(&format!("Graceful stop of {}", self.subscription));
        stop.cancel();
        // Unblocks a transport waiting to hand over a message.
        drop(msg_rx);
        if let Err(e) = subscribe_task.await {
            self.trace
                .error(&format!("Subscribe loop of {} panicked: {}", self.subscription, e));
        }
        let _ = ack.send(());
        Ok(())
    }

    /// Ask the receive loop to stop and wait until it has.
    ///
    /// Waits for an in-flight message to finish. A close issued before
    /// `start` is honored as soon as the loop begins listening.
    pub async fn close(&self) -> Result<(), SubscriberError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.close_tx
            .send(ack_tx)
            .await
            .map_err(|_| SubscriberError::NotRunning)?;
        ack_rx.await.map_err(|_| SubscriberError::NotRunning)
    }

    /// Keep a transport subscription open until `stop` is cancelled,
    /// resubscribing every time the connection drops.
    fn subscribe(
        &self,
        funnel: String,
    ) -> (mpsc::Receiver<Vec<u8>>, CancellationToken, JoinHandle<()>) {
        let (msg_tx, msg_rx) = mpsc::channel(1);
        let stop = CancellationToken::new();

        let transport = self.transport.clone();
        let subscription = self.subscription.clone();
        let trace = self.trace.clone();
        let task_stop = stop.clone();

        let task = tokio::spawn(async move {
            trace.verbose(&format!("Binding {} with consumer tag {}", subscription, funnel));
            while !task_stop.is_cancelled() {
                if let Err(e) = transport
                    .subscribe(
                        routing::SUBSCRIBE_TOPIC,
                        &subscription,
                        &funnel,
                        msg_tx.clone(),
                        task_stop.clone(),
                    )
                    .await
                {
                    trace.warning(&format!("Subscription {} interrupted: {:#}", subscription, e));
                }
                tokio::task::yield_now().await;
            }
        });

        (msg_rx, stop, task)
    }

    /// Run the check a request names and publish its result.
    ///
    /// Malformed requests are logged and dropped; nothing is published for them.
    pub async fn handle_message(&self, blob: &[u8]) {
        self.trace
            .info(&format!("Check received: {}", String::from_utf8_lossy(blob)));

        let request = CheckRequest::decode(blob).unwrap_or_else(|e| {
            self.trace
                .warning(&format!("Check request is not a JSON object: {}", e));
            CheckRequest::default()
        });

        let Some(name) = request.name.as_deref() else {
            self.trace.error("The name field is not filled");
            return;
        };

        let output = if let Some(check) = self.store.get(name) {
            check.execute().await
        } else if let Some(command) = request.command.as_deref() {
            ExternalCheck::new(command)
                .with_trace(self.trace.clone())
                .execute()
                .await
        } else {
            self.trace.error("The command field is not filled");
            return;
        };

        let response = CheckResult::new(self.context.name(), name, request.issued, output);
        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                self.trace.error(&format!("Something went wrong: {}", e));
                return;
            }
        };

        self.trace
            .info(&format!("Payload sent: {}", String::from_utf8_lossy(&payload)));

        if let Err(e) = self
            .transport
            .publish(
                routing::RESULTS_EXCHANGE,
                routing::RESULTS_ROUTING_KEY,
                routing::RESULTS_EXTRA_KEY,
                payload,
            )
            .await
        {
            self.trace
                .warning(&format!("Unable to publish result of {}: {:#}", name, e));
        }
    }
}
