//! ID generation utilities for Ralph
//!
//! Provides timestamps and unique identifiers for runs.

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Generate a unique run ID
///
/// Format: `{timestamp_ms}-{pid_hex}`
/// Example: `1738300800123-4e2f`
pub fn generate_run_id() -> String {
    let timestamp = now_ms();
    let pid = std::process::id();
    format!("{}-{:04x}", timestamp, pid & 0xffff)
}
