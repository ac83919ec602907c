//! Field cleanup and numeric coercion shared by all readers

use crate::error::SkipReason;

/// Trim whitespace and strip stray surrounding quotes
pub fn clean_field(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Parse a numeric-looking cell. Tolerates thousands separators and a
/// trailing percent sign. Non-finite values are rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = clean_field(raw).chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim_end_matches('%').trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a cell to a number, defaulting to 0 for missing or unparsable cells
pub fn coerce_number(raw: &str) -> f64 {
    parse_number(raw).unwrap_or(0.0)
}

/// Upper-case a team code; empty cells become `None`
pub fn normalize_team(raw: &str) -> Option<String> {
    let team = clean_field(raw);
    if team.is_empty() {
        None
    } else {
        Some(team.to_ascii_uppercase())
    }
}

/// Parse a week number cell. Empty means a season aggregate.
pub fn parse_week(raw: &str) -> Result<Option<u32>, SkipReason> {
    let cleaned = clean_field(raw);
    if cleaned.is_empty() {
        return Ok(None);
    }
    match parse_number(cleaned) {
        Some(v) if v >= 1.0 && v.fract() == 0.0 && v <= 25.0 => Ok(Some(v as u32)),
        _ => Err(SkipReason::InvalidWeek(cleaned.to_string())),
    }
}

/// Turn a header like "RZ Target Share %" into "rz_target_share"
pub fn stat_key(header: &str) -> String {
    let mut key = String::with_capacity(header.len());
    for c in clean_field(header).chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
        } else if c != '%' && !key.ends_with('_') {
            key.push('_');
        }
    }
    key.trim_matches('_').to_string()
}
