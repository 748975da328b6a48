// Check that runs a shell command and reports its exit code and output.

use super::check_output::round_duration;
use super::{Check, CheckOutput};
use async_trait::async_trait;
use sensu_common::constants::check_status;
use sensu_sdk::trace::TracingTraceWriter;
use sensu_sdk::{ProcessInvoker, TraceWriter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Runs `command` through the platform shell.
///
/// The exit code becomes the status and stdout/stderr become the output.
/// A command that cannot be spawned, or that outlives its timeout, reports
/// UNKNOWN.
pub struct ExternalCheck {
    command: String,
    timeout: Option<Duration>,
    trace: Arc<dyn TraceWriter>,
}

impl ExternalCheck {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
            trace: Arc::new(TracingTraceWriter),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceWriter>) -> Self {
        self.trace = trace;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Check for ExternalCheck {
    async fn execute(&self) -> CheckOutput {
        let executed = chrono::Utc::now().timestamp();
        let start = Instant::now();
        let cancel = CancellationToken::new();

        let timer = self.timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        });

        let invoker = ProcessInvoker::new(self.trace.clone());
        let result = invoker.execute_shell(&self.command, None, cancel).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        let duration = round_duration(start.elapsed().as_secs_f64());

        match result {
            Ok(outcome) if outcome.cancelled => {
                let secs = self.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                self.trace
                    .warning(&format!("Check command '{}' timed out after {secs}s", self.command));
                CheckOutput::unknown(format!("Execution timed out after {secs}s"), duration, executed)
            }
            Ok(outcome) => CheckOutput {
                output: outcome.output(),
                duration,
                // Killed by a signal: no exit code to report.
                status: if outcome.exit_code < 0 {
                    check_status::UNKNOWN
                } else {
                    outcome.exit_code
                },
                executed,
            },
            Err(e) => {
                self.trace
                    .error(&format!("Unable to run check command '{}': {:#}", self.command, e));
                CheckOutput::unknown(format!("{:#}", e), duration, executed)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use sensu_sdk::trace::NullTraceWriter;

    fn check(command: &str) -> ExternalCheck {
        ExternalCheck::new(command).with_trace(Arc::new(NullTraceWriter))
    }

    #[tokio::test]
    async fn echo_reports_ok() {
        let before = chrono::Utc::now().timestamp();
        let output = check("echo hi").execute().await;
        assert_eq!(output.status, 0);
        assert_eq!(output.output, "hi");
        assert!(output.duration >= 0.0);
        assert!(output.executed >= before);
    }

    #[tokio::test]
    async fn exit_code_becomes_status() {
        let output = check("echo 'disk at 95%'; exit 2").execute().await;
        assert_eq!(output.status, 2);
        assert_eq!(output.output, "disk at 95%");
    }

    #[tokio::test]
    async fn missing_binary_reported_by_shell() {
        let output = check("definitely_not_a_command_xyz").execute().await;
        assert_eq!(output.status, 127);
    }

    #[tokio::test]
    async fn timeout_reports_unknown() {
        let output = check("sleep 30")
            .with_timeout(Duration::from_millis(100))
            .execute()
            .await;
        assert_eq!(output.status, check_status::UNKNOWN);
        assert!(output.output.contains("timed out"));
        assert!(output.duration < 10.0);
    }

    #[tokio::test]
    async fn timeout_covers_background_children_holding_output() {
        let started = Instant::now();
        let output = check("echo hi; sleep 6 &")
            .with_timeout(Duration::from_millis(300))
            .execute()
            .await;
        assert_eq!(output.status, check_status::UNKNOWN);
        assert!(output.output.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn each_execute_runs_again() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("runs");
        let check = check(&format!(
            "echo run >> '{0}'; wc -l < '{0}' | tr -d ' '",
            counter.display()
        ));

        let first = check.execute().await;
        let second = check.execute().await;
        assert_eq!(first.output, "1");
        assert_eq!(second.output, "2");
    }
}
