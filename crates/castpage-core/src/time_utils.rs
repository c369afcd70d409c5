/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns true when `timestamp_ms` has left the trailing window `(now_ms - window_ms, now_ms]`.
pub fn is_outside_window(timestamp_ms: u64, now_ms: u64, window_ms: u64) -> bool {
    timestamp_ms.saturating_add(window_ms) <= now_ms
}
