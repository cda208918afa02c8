use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

static SIZE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(b|kb|mb|gb|tb)?\s*$").ok());

/// Parses `<number>[B|KB|MB|GB|TB]` (case-insensitive, 1024-based). A bare number is bytes.
pub fn parse_size(s: &str) -> Option<u64> {
    let caps = SIZE_RE.as_ref()?.captures(s)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "b".to_string());
    let multiplier: f64 = match unit.as_str() {
        "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    let bytes = value * multiplier;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return None;
    }
    Some(bytes.round() as u64)
}

/// The skip threshold to use. Malformed overrides fall back to the default.
pub fn resolve_threshold(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_THRESHOLD_BYTES;
    };
    match parse_size(raw) {
        Some(bytes) => bytes,
        None => {
            tracing::debug!(value = raw, "しきい値を解釈できないため既定値を使います");
            DEFAULT_THRESHOLD_BYTES
        }
    }
}
