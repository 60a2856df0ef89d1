use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid duration '{input}': {reason}")]
pub struct DurationParseError {
    input: String,
    reason: String,
}

impl DurationParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse human-readable duration strings.
/// Supports formats like: "1s", "500ms", "2m", "1.5s", "30" (milliseconds)
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let input = input.trim();

    // Plain numbers are milliseconds
    if let Ok(ms) = input.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| DurationParseError::new(input, "not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DurationParseError::new(input, "must be a positive number"));
    }

    let multiplier = match unit_part.trim() {
        "ms" | "milliseconds" | "millisecond" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        other => {
            return Err(DurationParseError::new(
                input,
                format!("unknown time unit '{other}'"),
            ))
        }
    };

    Ok(Duration::from_millis((value * multiplier) as u64))
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str), DurationParseError> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number_part = &input[..split_pos];
    if number_part.trim().is_empty() {
        return Err(DurationParseError::new(input, "no numeric value"));
    }

    Ok((number_part, &input[split_pos..]))
}

/// Formats a duration the way `parse_duration` reads it back.
pub fn format_duration(duration: &Duration) -> String {
    let ms = duration.as_millis();
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

/// serde adapter for `Duration` fields written as "500ms" / "30s".
pub mod serde_duration {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
