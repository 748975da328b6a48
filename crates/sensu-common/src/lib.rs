// sensu-common: Shared services for the Sensu client.
// Depends on `sensu-sdk`; provides configuration loading, the client context
// and per-component tracing.

pub mod client_context;
pub mod config_store;
pub mod constants;
pub mod secret_masker;
pub mod tracing;

// ---------------------------------------------------------------------------
// Re-exports for convenient access
// ---------------------------------------------------------------------------

pub use client_context::{ClientContext, ShutdownReason};
pub use config_store::{CheckDefinition, ClientConfig, ConfigError, ConfigurationStore, TransportSettings};
pub use secret_masker::SecretMasker;
pub use tracing::{TraceEventType, TraceManager, TraceSetting, Tracing};
