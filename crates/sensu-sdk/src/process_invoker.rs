use crate::trace::TraceWriter;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The duration to wait after sending SIGINT before escalating to SIGTERM.
const SIGINT_TIMEOUT: Duration = Duration::from_millis(7500);
/// The duration to wait after sending SIGTERM before escalating to SIGKILL.
const SIGTERM_TIMEOUT: Duration = Duration::from_millis(2500);
/// How long to keep draining output after a cancelled process exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Error type for non-zero process exit codes.
#[derive(Debug, thiserror::Error)]
#[error(
    "Exit code {exit_code} returned from process: file name '{file_name}', arguments '{arguments}'."
)]
pub struct ProcessExitCodeError {
    pub exit_code: i32,
    pub file_name: String,
    pub arguments: String,
}

/// What a finished (or cancelled) process left behind.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code, or -1 when the process was killed by a signal.
    pub exit_code: i32,
    /// Stdout and stderr lines, in the order they were read.
    pub lines: Vec<String>,
    /// Wall time between spawn and exit.
    pub elapsed: Duration,
    /// Whether the cancellation token fired before the process exited.
    pub cancelled: bool,
}

impl ProcessOutcome {
    /// Output lines joined with newlines.
    pub fn output(&self) -> String {
        self.lines.join("\n")
    }
}

/// Spawns a child process, reads stdout/stderr on separate tasks, and supports
/// graceful cancellation (SIGINT → SIGTERM → SIGKILL) of its whole process group.
pub struct ProcessInvoker {
    trace: Arc<dyn TraceWriter>,
}

impl ProcessInvoker {
    /// Create a new `ProcessInvoker` with the given trace writer.
    pub fn new(trace: Arc<dyn TraceWriter>) -> Self {
        Self { trace }
    }

    /// Run `command` through the platform shell (`sh -c` / `cmd /C`).
    pub async fn execute_shell(
        &self,
        command: &str,
        environment: Option<&HashMap<String, String>>,
        cancellation_token: CancellationToken,
    ) -> Result<ProcessOutcome> {
        let (file_name, arguments) = shell_invocation(command);
        self.execute("", file_name, &arguments, environment, false, false, cancellation_token)
            .await
    }

    /// Execute a process with the given parameters.
    ///
    /// # Arguments
    /// * `working_directory` - The working directory for the process (ignored if empty or missing).
    /// * `file_name` - The executable to run.
    /// * `arguments` - Command-line arguments.
    /// * `environment` - Optional environment variable overrides.
    /// * `require_exit_code_zero` - If true, returns an error on non-zero exit.
    /// * `kill_process_on_cancel` - If true, skip graceful shutdown and SIGKILL immediately.
    /// * `cancellation_token` - Token to cancel/kill the process.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        working_directory: &str,
        file_name: &str,
        arguments: &[String],
        environment: Option<&HashMap<String, String>>,
        require_exit_code_zero: bool,
        kill_process_on_cancel: bool,
        cancellation_token: CancellationToken,
    ) -> Result<ProcessOutcome> {
        anyhow::ensure!(!file_name.is_empty(), "file_name must not be empty");

        self.trace.verbose(&format!(
            "Starting process: file name '{file_name}', arguments '{}', working directory '{working_directory}'",
            arguments.join(" ")
        ));

        let mut cmd = Command::new(file_name);
        cmd.args(arguments);

        if !working_directory.is_empty() && Path::new(working_directory).is_dir() {
            cmd.current_dir(working_directory);
        }

        if let Some(env) = environment {
            cmd.envs(env);
        }

        // Own process group so signals reach the shell and everything it started.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.stdin(std::process::Stdio::null());
        cmd.kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().with_context(|| {
            format!(
                "Failed to start process '{file_name}' with arguments '{}'",
                arguments.join(" ")
            )
        })?;

        let pid = child.id().unwrap_or(0);
        self.trace
            .verbose(&format!("Process started with process id {pid}, waiting for process exit."));

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(forward_lines(stdout, line_tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_lines(stderr, line_tx.clone())));
        drop(line_tx);

        let exit_code: i32;
        let mut cancelled;

        tokio::select! {
            status = child.wait() => {
                cancelled = false;
                exit_code = status.context("Failed to wait for process")?.code().unwrap_or(-1);
            }
            _ = cancellation_token.cancelled() => {
                cancelled = true;
                self.trace.info(&format!("Cancellation requested for process {pid}."));
                exit_code = self.cancel_and_kill_process(&mut child, kill_process_on_cancel).await;
            }
        }

        let output_tasks: Vec<_> = [stdout_task, stderr_task].into_iter().flatten().collect();
        let drain = async move {
            for task in output_tasks {
                let _ = task.await;
            }
        };
        tokio::pin!(drain);

        // Background children can keep the pipes open after the shell exits.
        if !cancelled {
            tokio::select! {
                _ = &mut drain => {}
                _ = cancellation_token.cancelled() => {
                    cancelled = true;
                    self.trace.info(&format!(
                        "Cancellation requested while process group {pid} still holds its output open."
                    ));
                    kill_process_group(pid);
                }
            }
        }

        if cancelled && tokio::time::timeout(DRAIN_TIMEOUT, &mut drain).await.is_err() {
            self.trace
                .warning(&format!("Output of process {pid} still open after kill."));
        }

        let mut lines = Vec::new();
        while let Ok(line) = line_rx.try_recv() {
            lines.push(line);
        }

        let elapsed = start.elapsed();
        self.trace.verbose(&format!(
            "Finished process {pid} with exit code {exit_code}, and elapsed time {elapsed:.2?}."
        ));

        if !cancelled && exit_code != 0 && require_exit_code_zero {
            return Err(ProcessExitCodeError {
                exit_code,
                file_name: file_name.to_string(),
                arguments: arguments.join(" "),
            }
            .into());
        }

        Ok(ProcessOutcome {
            exit_code,
            lines,
            elapsed,
            cancelled,
        })
    }

    /// Attempt graceful cancellation: SIGINT → SIGTERM → SIGKILL.
    /// If `kill_immediately` is true, skip signals and go straight to kill.
    async fn cancel_and_kill_process(
        &self,
        child: &mut tokio::process::Child,
        kill_immediately: bool,
    ) -> i32 {
        if !kill_immediately {
            if self.send_signal_and_wait(child, Signal::Int, SIGINT_TIMEOUT).await {
                self.trace.info("Process cancelled successfully through SIGINT.");
                return wait_exit_code(child).await;
            }

            if self.send_signal_and_wait(child, Signal::Term, SIGTERM_TIMEOUT).await {
                self.trace.info("Process terminated successfully through SIGTERM.");
                return wait_exit_code(child).await;
            }
        }

        self.trace
            .info("Kill entire process group since both cancel and terminate signals have been ignored.");
        if let Some(pid) = child.id() {
            kill_process_group(pid);
        }
        let _ = child.kill().await;
        wait_exit_code(child).await
    }

    /// Send a signal to the child's process group and wait up to `timeout` for it to exit.
    /// Returns `true` if the process exited within the timeout.
    #[cfg(unix)]
    async fn send_signal_and_wait(
        &self,
        child: &mut tokio::process::Child,
        signal: Signal,
        timeout: Duration,
    ) -> bool {
        let pid = match child.id() {
            Some(id) => id,
            // Already reaped.
            None => return true,
        };

        let sig = match signal {
            Signal::Int => nix::sys::signal::Signal::SIGINT,
            Signal::Term => nix::sys::signal::Signal::SIGTERM,
        };

        self.trace
            .verbose(&format!("Sending {sig:?} to process group {pid}."));

        if nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pid as i32), sig).is_err() {
            self.trace
                .info(&format!("{sig:?} signal failed to send to process group {pid}."));
            return false;
        }

        tokio::select! {
            result = child.wait() => result.is_ok(),
            _ = tokio::time::sleep(timeout) => {
                self.trace.info(&format!(
                    "Process did not honor {sig:?} within {:.1}s.",
                    timeout.as_secs_f64()
                ));
                false
            }
        }
    }

    #[cfg(not(unix))]
    async fn send_signal_and_wait(
        &self,
        child: &mut tokio::process::Child,
        _signal: Signal,
        timeout: Duration,
    ) -> bool {
        // No POSIX signals: give the process the same grace period, then kill.
        tokio::select! {
            result = child.wait() => result.is_ok(),
            _ = tokio::time::sleep(timeout) => false,
        }
    }
}

/// Internal signal type for cross-platform abstraction.
#[derive(Debug, Clone, Copy)]
enum Signal {
    Int,
    Term,
}

/// SIGKILL every process left in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // Group 0 would be our own.
    if pid == 0 {
        return;
    }
    let _ = nix::sys::signal::killpg(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    );
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

async fn wait_exit_code(child: &mut tokio::process::Child) -> i32 {
    child
        .wait()
        .await
        .map(|s| s.code().unwrap_or(-1))
        .unwrap_or(-1)
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

/// The executable and arguments used to run `command` through the platform shell.
pub fn shell_invocation(command: &str) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        ("cmd", vec!["/C".to_string(), command.to_string()])
    } else {
        ("sh", vec!["-c".to_string(), command.to_string()])
    }
}
