// sensu-sdk: Foundation layer for the Sensu client.
// This crate has no dependencies on the other client crates and provides the
// trace-writer abstraction, the process invoker used by command checks, and
// build constants.

pub mod build_constants;
pub mod process_invoker;
pub mod trace;

// Re-export commonly used items at crate root
pub use build_constants::ClientPackage;
pub use process_invoker::{ProcessExitCodeError, ProcessInvoker, ProcessOutcome};
pub use trace::TraceWriter;
