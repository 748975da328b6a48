// In-process check backed by a closure.

use super::{Check, CheckOutput};
use async_trait::async_trait;

/// Wraps a closure so it can be registered in the check store.
pub struct FnCheck<F> {
    f: F,
}

impl<F> FnCheck<F>
where
    F: Fn() -> CheckOutput + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Check for FnCheck<F>
where
    F: Fn() -> CheckOutput + Send + Sync,
{
    async fn execute(&self) -> CheckOutput {
        (self.f)()
    }
}
