use std::env;
use std::time::Duration;

use crate::error::{LedgerError, Result};

/// Reads a string environment variable, falling back to a default.
pub fn env_string(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// Reads a required string environment variable.
pub fn env_required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| LedgerError::MissingEnvVar(key.to_string()))
}

/// Reads a numeric environment variable, falling back to a default.
pub fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Reads a duration environment variable. Accepts bare seconds (`90`) and
/// single-unit suffixed values (`30s`, `15m`, `6h`).
pub fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => {
            parse_duration(&value).ok_or_else(|| LedgerError::InvalidConfig {
                key: key.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}

/// Parses `90`, `30s`, `15m` or `6h` into a duration.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (digits, unit) = match trimmed.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let value: u64 = digits.parse().ok()?;

    match unit {
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}
