// Checks: the unit of monitoring work a subscriber runs on request, and the
// registry subscribers resolve check names against.

pub mod check_output;
pub mod external_check;
pub mod fn_check;

pub use check_output::CheckOutput;
pub use external_check::ExternalCheck;
pub use fn_check::FnCheck;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Something that can be executed to produce a check result.
///
/// `execute` never fails: problems running the check are reported through the
/// returned status and output, the way a monitoring plugin would.
#[async_trait]
pub trait Check: Send + Sync {
    async fn execute(&self) -> CheckOutput;
}

/// Name → check registry shared by every subscriber of a client.
///
/// Read-mostly: checks are registered at startup and looked up per request.
#[derive(Default)]
pub struct CheckStore {
    checks: RwLock<HashMap<String, Arc<dyn Check>>>,
}

impl CheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, check: Arc<dyn Check>) {
        self.checks.write().insert(name.into(), check);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.checks.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checks.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.checks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(output: &str) -> Arc<dyn Check> {
        let output = output.to_string();
        Arc::new(FnCheck::new(move || CheckOutput {
            output: output.clone(),
            duration: 0.0,
            status: 0,
            executed: 0,
        }))
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let store = CheckStore::new();
        assert!(store.is_empty());

        store.register("cpu-check", fixed("cpu OK"));
        store.register("disk-check", fixed("disk OK"));

        assert_eq!(store.len(), 2);
        assert!(store.contains("cpu-check"));
        assert!(store.get("memory-check").is_none());
        assert_eq!(store.names(), vec!["cpu-check", "disk-check"]);

        let output = store.get("cpu-check").unwrap().execute().await;
        assert_eq!(output.output, "cpu OK");
    }

    #[tokio::test]
    async fn register_replaces_existing() {
        let store = CheckStore::new();
        store.register("cpu-check", fixed("old"));
        store.register("cpu-check", fixed("new"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("cpu-check").unwrap().execute().await.output, "new");
    }
}
