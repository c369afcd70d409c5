use std::time::Duration;

pub(crate) fn is_retryable_feed_status(status: u16) -> bool {
    status == 429 || status >= 500
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub(crate) fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after_ms: Option<u64>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let backoff_ms = base_delay_ms.saturating_mul(1_u64 << exponent);
    Duration::from_millis(retry_after_ms.map_or(backoff_ms, |after| after.max(backoff_ms)))
}

pub(crate) fn truncate_for_error(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let mut truncated = raw.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

const CAST_ELLIPSIS: char = '…';

/// Cuts `text` to at most `max_bytes` UTF-8 bytes on a char boundary, ending with an ellipsis
/// when shortened.
pub(crate) fn truncate_for_cast(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes.saturating_sub(CAST_ELLIPSIS.len_utf8());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = text[..cut].to_string();
    truncated.push(CAST_ELLIPSIS);
    truncated
}

pub(crate) fn sanitize_for_path(raw: &str) -> String {
    let sanitized = raw
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}
