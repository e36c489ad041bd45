//! Human readable byte sizes and durations as found in the configuration file.

use crate::consts::MEMORY_SIZE_FACTOR;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error as ThisError;

/// A configuration value that may be written either as a bare number or as a string with a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(u64),
    Text(String),
}

impl From<&str> for NumberOrString {
    fn from(value: &str) -> Self {
        NumberOrString::Text(value.to_string())
    }
}

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum UnitError {
    #[error("invalid size: '{0}'")]
    InvalidSize(String),
    #[error("unknown size unit '{unit}' in '{value}'")]
    UnknownSizeUnit { unit: String, value: String },
    #[error("size out of range: '{0}'")]
    SizeOutOfRange(String),
    #[error("number is not a factor of 64, {bytes} bytes (user value: {value})")]
    NotFactorOf64 { bytes: u64, value: String },
    #[error("invalid duration: '{0}'")]
    InvalidDuration(String),
    #[error("missing unit in duration: '{0}'")]
    MissingDurationUnit(String),
    #[error("unknown duration unit '{unit}' in '{value}'")]
    UnknownDurationUnit { unit: String, value: String },
    #[error("negative duration: '{0}'")]
    NegativeDuration(String),
    #[error("duration must be positive: '{0}'")]
    ZeroDuration(String),
}

/// Memory size in bytes, guaranteed to be a multiple of 64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemSizeFactor64(u64);

impl MemSizeFactor64 {
    /// Converts a size defined in a human readable format into bytes and ensures that the value
    /// is a factor of 64.
    pub fn unpack(value: &NumberOrString) -> Result<Self, UnitError> {
        let (bytes, user_value) = match value {
            NumberOrString::Number(bytes) => {
                warn_raw_bytes(&bytes.to_string());
                (*bytes, bytes.to_string())
            }
            NumberOrString::Text(text) => {
                if is_raw_bytes(text) {
                    warn_raw_bytes(text);
                }
                (parse_bytes(text)?, text.clone())
            }
        };

        if bytes % MEMORY_SIZE_FACTOR != 0 {
            return Err(UnitError::NotFactorOf64 {
                bytes,
                value: user_value,
            });
        }

        Ok(Self(bytes))
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }
}

fn warn_raw_bytes(value: &str) {
    tracing::warn!(
        %value,
        "Size without a unit is deprecated, use a unit (KiB, MiB, etc...)."
    );
}

fn is_raw_bytes(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Parses sizes like `128`, `128B`, `64 KiB`, `1.5GB`.
///
/// Decimal units (`KB`, `MB`, ...) are powers of 1000, binary units (`KiB`, `MiB`, ...) are
/// powers of 1024. Units are case insensitive.
pub fn parse_bytes(value: &str) -> Result<u64, UnitError> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let number: f64 = number
        .parse()
        .map_err(|_| UnitError::InvalidSize(value.to_string()))?;

    let unit = unit.trim();
    let multiplier = size_multiplier(unit).ok_or_else(|| UnitError::UnknownSizeUnit {
        unit: unit.to_string(),
        value: value.to_string(),
    })?;

    let bytes = number * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(UnitError::SizeOutOfRange(value.to_string()));
    }

    Ok(bytes as u64)
}

fn size_multiplier(unit: &str) -> Option<u64> {
    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "ki" | "kib" => 1 << 10,
        "m" | "mb" => 1_000_000,
        "mi" | "mib" => 1 << 20,
        "g" | "gb" => 1_000_000_000,
        "gi" | "gib" => 1 << 30,
        "t" | "tb" => 1_000_000_000_000,
        "ti" | "tib" => 1 << 40,
        _ => return None,
    };
    Some(multiplier)
}

/// Unpacks a duration. Bare numbers are seconds, strings use the `1h2m3.5s` notation.
pub fn unpack_duration(value: &NumberOrString) -> Result<Duration, UnitError> {
    match value {
        NumberOrString::Number(seconds) => Ok(Duration::from_secs(*seconds)),
        NumberOrString::Text(text) => parse_duration(text),
    }
}

/// Parses durations like `5s`, `500ms`, `1m30s` or `1.5h`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A lone `0` needs no unit.
/// Like [`parse_duration`], rejecting zero.
pub fn parse_positive_duration(value: &str) -> Result<Duration, UnitError> {
    let duration = parse_duration(value)?;
    if duration.is_zero() {
        return Err(UnitError::ZeroDuration(value.to_string()));
    }
    Ok(duration)
}

pub fn parse_duration(value: &str) -> Result<Duration, UnitError> {
    let trimmed = value.trim();
    let invalid = || UnitError::InvalidDuration(value.to_string());

    if trimmed.starts_with('-') {
        return Err(UnitError::NegativeDuration(value.to_string()));
    }

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_len);
        let number: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(UnitError::MissingDurationUnit(value.to_string()));
        }

        let unit_nanos = duration_unit_nanos(unit).ok_or_else(|| UnitError::UnknownDurationUnit {
            unit: unit.to_string(),
            value: value.to_string(),
        })?;

        total_nanos += number * unit_nanos as f64;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos >= u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

fn duration_unit_nanos(unit: &str) -> Option<u64> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

/// Formats a duration as seconds the way the functions API expects it, e.g. `60s` or `1.5s`.
pub fn format_seconds(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        return format!("{seconds}s");
    }

    let fraction = format!("{nanos:09}");
    format!("{seconds}.{}s", fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_size_must_be_a_factor_of_64() {
        assert_eq!(
            MemSizeFactor64::unpack(&"128B".into()).map(|m| m.bytes()),
            Ok(128)
        );
        assert!(matches!(
            MemSizeFactor64::unpack(&"100B".into()),
            Err(UnitError::NotFactorOf64 { bytes: 100, .. })
        ));
    }

    #[test]
    fn memory_size_units() {
        let unpack = |v: &str| MemSizeFactor64::unpack(&v.into()).map(|m| m.bytes());

        assert_eq!(unpack("128MiB"), Ok(128 * 1024 * 1024));
        assert_eq!(unpack("256 mib"), Ok(256 * 1024 * 1024));
        assert_eq!(unpack("1GiB"), Ok(1024 * 1024 * 1024));
        assert_eq!(unpack("64KB"), Ok(64_000));
        assert_eq!(unpack("2Mi"), Ok(2 * 1024 * 1024));
        assert!(unpack("12 parsecs").is_err());
        assert!(unpack("MiB").is_err());
    }

    #[test]
    fn memory_size_raw_number() {
        let size = MemSizeFactor64::unpack(&NumberOrString::Number(1024)).unwrap();
        assert_eq!(size.bytes(), 1024);

        assert!(MemSizeFactor64::unpack(&NumberOrString::Number(1000)).is_err());
    }

    #[test]
    fn positive_durations() {
        assert_eq!(parse_positive_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(
            parse_positive_duration("0s"),
            Err(UnitError::ZeroDuration(String::from("0s")))
        );
        assert!(parse_positive_duration("-1s").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("10µs"), Ok(Duration::from_micros(10)));
    }

    #[test]
    fn invalid_durations() {
        assert!(matches!(
            parse_duration("5"),
            Err(UnitError::MissingDurationUnit(_))
        ));
        assert!(matches!(
            parse_duration("5d"),
            Err(UnitError::UnknownDurationUnit { .. })
        ));
        assert!(matches!(
            parse_duration("-5s"),
            Err(UnitError::NegativeDuration(_))
        ));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn bare_number_duration_is_seconds() {
        assert_eq!(
            unpack_duration(&NumberOrString::Number(60)),
            Ok(Duration::from_secs(60))
        );
    }

    #[test]
    fn seconds_formatting() {
        assert_eq!(format_seconds(Duration::from_secs(5)), "5s");
        assert_eq!(format_seconds(Duration::from_secs(90)), "90s");
        assert_eq!(format_seconds(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_seconds(Duration::from_millis(1)), "0.001s");
    }
}
