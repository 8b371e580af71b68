//! Human-readable sizes and fixed-width text helpers

use chrono::{DateTime, Local, Utc};

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte count using decimal units
///
/// Zero yields an empty string. With `force_bytes` the raw count is printed.
pub fn format_size(bytes: u64, force_bytes: bool) -> String {
    if bytes == 0 {
        return String::new();
    }

    if force_bytes {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value > 1000.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    format!("{value:.1} {}", SIZE_UNITS[unit])
}

/// Format a timestamp in local time as `YYYY-MM-DD HH:MM:SS`
pub fn format_datetime(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Format an elapsed duration compactly, e.g. `1m2.5s` or `350ms`
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        return format!("{millis}ms");
    }

    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }

    let minutes = elapsed.as_secs() / 60;
    let rest = secs - (minutes * 60) as f64;
    format!("{minutes}m{rest:.1}s")
}

/// Minimum width [`truncate_middle`] will shorten to
pub const MIN_TRUNCATE_WIDTH: usize = 9;

/// Shorten `text` to `max_width` characters by replacing its middle with `...`
///
/// Widths of zero or below [`MIN_TRUNCATE_WIDTH`] leave the text unchanged.
pub fn truncate_middle(text: &str, max_width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if max_width < MIN_TRUNCATE_WIDTH || chars.len() <= max_width {
        return text.to_string();
    }

    let keep = max_width - 3;
    let head = keep / 2;
    let tail = keep - head;

    let mut out: String = chars[..head].iter().collect();
    out.push_str("...");
    out.extend(&chars[chars.len() - tail..]);
    out
}
