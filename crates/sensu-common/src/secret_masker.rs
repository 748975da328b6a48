// Thread-safe store of secret values (transport passwords, configured redact
// values) replaced in every trace line before it is emitted.

use parking_lot::RwLock;
use std::sync::Arc;

/// Replacement text used when a secret is found.
const MASK: &str = "***";

/// Replaces registered secret values in arbitrary strings with `***`.
#[derive(Debug, Clone, Default)]
pub struct SecretMasker {
    inner: Arc<RwLock<Vec<String>>>,
}

impl SecretMasker {
    /// Create a new empty `SecretMasker`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret value. Empty or whitespace-only values are ignored.
    pub fn add_value(&self, secret: &str) {
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            return;
        }

        let mut secrets = self.inner.write();
        if !secrets.iter().any(|s| s == trimmed) {
            secrets.push(trimmed.to_string());
            // Longest first, so a secret containing another is masked whole.
            secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        }
    }

    /// Replace all registered secret values in `input` with `***`.
    pub fn mask_secrets(&self, input: &str) -> String {
        let secrets = self.inner.read();
        let mut result = input.to_string();
        for secret in secrets.iter() {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), MASK);
            }
        }
        result
    }

    /// Returns the number of registered secrets.
    pub fn secret_count(&self) -> usize {
        self.inner.read().len()
    }
}
