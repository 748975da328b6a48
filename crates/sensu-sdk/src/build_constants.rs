/// Build constants for the client package.
/// Values come from compile-time environment variables with defaults.

/// Client package metadata.
#[derive(Debug, Clone)]
pub struct ClientPackage;

impl ClientPackage {
    /// The semantic version of the client, also used as the protocol version
    /// component of consumer tags.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// The commit hash from which this binary was built.
    /// Set via the `SENSU_CLIENT_COMMIT_HASH` env var at compile time, or "N/A".
    pub const COMMIT_HASH: &'static str = match option_env!("SENSU_CLIENT_COMMIT_HASH") {
        Some(h) => h,
        None => "N/A",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!ClientPackage::VERSION.is_empty());
    }

    #[test]
    fn commit_hash_has_default() {
        assert!(!ClientPackage::COMMIT_HASH.is_empty());
    }
}
