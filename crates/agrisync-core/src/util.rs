//! Shared utility functions used across multiple modules.

use std::sync::atomic::{AtomicI64, Ordering};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

static LAST_RECORD_ID: AtomicI64 = AtomicI64::new(0);

/// Id for a newly created record.
///
/// Based on the clock in milliseconds, but strictly increasing within the
/// process so records created in the same millisecond never share an id.
/// Two devices can still pick the same id; the server treats that as one
/// record.
pub fn next_record_id() -> i64 {
    let now = now_millis();
    let mut last = LAST_RECORD_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_RECORD_ID.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// Parse a `YYYY-MM-DD` date and reject dates after today (UTC).
pub fn parse_past_date(value: &str) -> Result<chrono::NaiveDate, String> {
    let date = chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))?;
    if date > chrono::Utc::now().date_naive() {
        return Err(format!("{date} is in the future"));
    }
    Ok(date)
}
