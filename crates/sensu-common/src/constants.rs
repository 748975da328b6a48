// Well-known names shared by the client crates: wire routing, environment
// variables and process exit codes.

/// Routing used when talking to the transport.
pub mod routing {
    /// Topic pattern every subscription binds with.
    pub const SUBSCRIBE_TOPIC: &str = "#";

    /// Exchange check results are published to.
    pub const RESULTS_EXCHANGE: &str = "direct";

    /// Routing key check results are published with.
    pub const RESULTS_ROUTING_KEY: &str = "results";

    /// Extra routing key for results (unused by the broker, always empty).
    pub const RESULTS_EXTRA_KEY: &str = "";
}

/// Check status codes, following the Nagios plugin convention.
pub mod check_status {
    pub const OK: i32 = 0;
    pub const WARNING: i32 = 1;
    pub const CRITICAL: i32 = 2;
    pub const UNKNOWN: i32 = 3;
}

/// Environment variables read by the client.
pub mod variables {
    /// Default configuration file path when `--config` is not given.
    pub const CONFIG_PATH: &str = "SENSU_CLIENT_CONFIG";

    /// Mirror every trace line to stdout.
    pub const PRINT_LOG_TO_STDOUT: &str = "SENSU_PRINT_LOG_TO_STDOUT";
}

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sensu/client.json";

/// Process exit codes.
pub mod return_code {
    pub const SUCCESS: i32 = 0;
    pub const TERMINATED_ERROR: i32 = 1;
    pub const CONFIGURATION_ERROR: i32 = 2;
}

/// Parse a boolean-ish environment value ("1", "true", "yes", "on").
pub fn convert_to_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_to_bool_accepts_common_spellings() {
        assert_eq!(convert_to_bool("TRUE"), Some(true));
        assert_eq!(convert_to_bool(" yes "), Some(true));
        assert_eq!(convert_to_bool("0"), Some(false));
        assert_eq!(convert_to_bool("maybe"), None);
    }
}
