/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `expires_unix` is present and no longer in the future.
pub fn is_expired_unix(expires_unix: Option<u64>, now_unix: u64) -> bool {
    matches!(expires_unix, Some(value) if value <= now_unix)
}

#[cfg(test)]
mod tests {
    use super::{current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix};

    #[test]
    fn unit_is_expired_unix_handles_missing_and_future_deadlines() {
        assert!(!is_expired_unix(None, 1_000));
        assert!(!is_expired_unix(Some(2_000), 1_000));
        assert!(is_expired_unix(Some(1_000), 1_000));
        assert!(is_expired_unix(Some(500), 1_000));
    }

    #[test]
    fn unit_timestamp_helpers_agree_on_scale() {
        let seconds = current_unix_timestamp();
        let millis = current_unix_timestamp_ms();
        assert!(millis / 1000 >= seconds.saturating_sub(1));
        assert!(millis / 1000 <= seconds.saturating_add(1));
    }
}
