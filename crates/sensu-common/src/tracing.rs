// Per-component trace sources. Every line is secret-masked, prefixed with the
// component name and forwarded to the `tracing` crate.

use crate::secret_masker::SecretMasker;
use chrono::Utc;
use sensu_sdk::TraceWriter;
use std::sync::Arc;

/// Trace event severity level, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceEventType {
    Verbose,
    Information,
    Warning,
    Error,
}

impl std::fmt::Display for TraceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEventType::Verbose => write!(f, "VERB"),
            TraceEventType::Information => write!(f, "INFO"),
            TraceEventType::Warning => write!(f, "WARN"),
            TraceEventType::Error => write!(f, "ERR "),
        }
    }
}

/// Configuration for trace output.
#[derive(Debug, Clone)]
pub struct TraceSetting {
    /// Minimum severity level to emit.
    pub level: TraceEventType,
    /// Whether to also print to stdout.
    pub print_to_stdout: bool,
}

impl Default for TraceSetting {
    fn default() -> Self {
        Self {
            level: TraceEventType::Verbose,
            print_to_stdout: false,
        }
    }
}

/// A named trace source that masks secrets before emitting log lines.
///
/// Each component (a subscriber, the client, the check runner) gets its own
/// `Tracing` with a specific name; they all share the same `SecretMasker`.
#[derive(Clone)]
pub struct Tracing {
    name: String,
    secret_masker: Arc<SecretMasker>,
    setting: TraceSetting,
}

impl Tracing {
    pub fn new(name: impl Into<String>, secret_masker: Arc<SecretMasker>, setting: TraceSetting) -> Self {
        Self {
            name: name.into(),
            secret_masker,
            setting,
        }
    }

    fn trace(&self, event_type: TraceEventType, message: &str) {
        if event_type < self.setting.level {
            return;
        }

        let masked = self.secret_masker.mask_secrets(message);

        match event_type {
            TraceEventType::Error => ::tracing::error!(component = %self.name, "{}", masked),
            TraceEventType::Warning => ::tracing::warn!(component = %self.name, "{}", masked),
            TraceEventType::Information => ::tracing::info!(component = %self.name, "{}", masked),
            TraceEventType::Verbose => ::tracing::debug!(component = %self.name, "{}", masked),
        }

        if self.setting.print_to_stdout {
            let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
            println!("[{}][{}] {}: {}", timestamp, self.name, event_type, masked);
        }
    }

    /// Get the name of this trace source.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TraceWriter for Tracing {
    fn info(&self, message: &str) {
        self.trace(TraceEventType::Information, message);
    }

    fn verbose(&self, message: &str) {
        self.trace(TraceEventType::Verbose, message);
    }

    fn warning(&self, message: &str) {
        self.trace(TraceEventType::Warning, message);
    }

    fn error(&self, message: &str) {
        self.trace(TraceEventType::Error, message);
    }
}

/// Hands out named trace sources sharing one `SecretMasker`.
pub struct TraceManager {
    secret_masker: Arc<SecretMasker>,
    default_setting: TraceSetting,
}

impl TraceManager {
    pub fn new(secret_masker: Arc<SecretMasker>) -> Self {
        Self::with_setting(secret_masker, TraceSetting::default())
    }

    pub fn with_setting(secret_masker: Arc<SecretMasker>, setting: TraceSetting) -> Self {
        Self {
            secret_masker,
            default_setting: setting,
        }
    }

    /// Get (create) a named trace source.
    pub fn get(&self, name: &str) -> Tracing {
        Tracing::new(name, self.secret_masker.clone(), self.default_setting.clone())
    }

    /// Access the underlying secret masker.
    pub fn secret_masker(&self) -> &Arc<SecretMasker> {
        &self.secret_masker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(TraceEventType::Verbose < TraceEventType::Information);
        assert!(TraceEventType::Warning < TraceEventType::Error);
    }

    #[test]
    fn manager_names_sources() {
        let manager = TraceManager::new(Arc::new(SecretMasker::new()));
        let trace = manager.get("Subscriber:default");
        assert_eq!(trace.name(), "Subscriber:default");
        trace.info("does not panic without a subscriber installed");
    }

    #[test]
    fn sources_share_masker() {
        let manager = TraceManager::new(Arc::new(SecretMasker::new()));
        let _a = manager.get("a");
        manager.secret_masker().add_value("s3cret");
        assert_eq!(manager.secret_masker().mask_secrets("x s3cret"), "x ***");
    }
}
