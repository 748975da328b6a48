// sensu-client: subscribes to check requests, runs the requested checks and
// publishes their results. Depends on `sensu-sdk` and `sensu-common`.
//
// Architecture:
//   main → commands::execute_command → run / exec / version
//   Client::run → one Subscriber per subscription → Transport::subscribe
//   Subscriber::handle_message → CheckStore / ExternalCheck → Transport::publish

pub mod check_message;
pub mod checks;
pub mod client;
pub mod command_settings;
pub mod commands;
pub mod subscriber;
pub mod transport;

pub use check_message::{CheckRequest, CheckResult};
pub use checks::{Check, CheckOutput, CheckStore, ExternalCheck, FnCheck};
pub use client::Client;
pub use subscriber::{Subscriber, SubscriberError};
pub use transport::{MemoryTransport, Transport};
