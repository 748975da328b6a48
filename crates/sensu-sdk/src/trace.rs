/// Diagnostic output abstraction shared by every client component.
///
/// Components log through this trait rather than calling the `tracing` macros
/// directly, so tests can swap in a collecting writer and assert on what a
/// subscriber reported.
pub trait TraceWriter: Send + Sync {
    /// Log an informational message.
    fn info(&self, message: &str);

    /// Log a verbose / debug message.
    fn verbose(&self, message: &str);

    /// Log a warning message.
    fn warning(&self, message: &str) {
        self.info(&format!("[warning] {message}"));
    }

    /// Log an error message.
    fn error(&self, message: &str) {
        self.info(&format!("[error] {message}"));
    }
}

/// Forwards every message to the `tracing` crate at the matching level.
#[derive(Debug, Clone)]
pub struct TracingTraceWriter;

impl TraceWriter for TracingTraceWriter {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn verbose(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Discards all messages.
#[derive(Debug, Clone)]
pub struct NullTraceWriter;

impl TraceWriter for NullTraceWriter {
    fn info(&self, _message: &str) {}
    fn verbose(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// The level of a collected trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Info,
    Verbose,
    Warning,
    Error,
}

/// Keeps every message in memory, in emission order.
#[derive(Debug)]
pub struct CollectingTraceWriter {
    messages: parking_lot::Mutex<Vec<(TraceLevel, String)>>,
}

impl CollectingTraceWriter {
    pub fn new() -> Self {
        Self {
            messages: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Return all collected messages.
    pub fn messages(&self) -> Vec<(TraceLevel, String)> {
        self.messages.lock().clone()
    }

    /// Whether a message at `level` containing `needle` was collected.
    pub fn contains(&self, level: TraceLevel, needle: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    /// Number of messages collected at `level`.
    pub fn count(&self, level: TraceLevel) -> usize {
        self.messages.lock().iter().filter(|(l, _)| *l == level).count()
    }

    /// Clear collected messages.
    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    fn push(&self, level: TraceLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}

impl Default for CollectingTraceWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceWriter for CollectingTraceWriter {
    fn info(&self, message: &str) {
        self.push(TraceLevel::Info, message);
    }

    fn verbose(&self, message: &str) {
        self.push(TraceLevel::Verbose, message);
    }

    fn warning(&self, message: &str) {
        self.push(TraceLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(TraceLevel::Error, message);
    }
}
