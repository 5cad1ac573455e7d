//! Go-style duration strings.
//!
//! The surrounding provisioning tooling writes durations the way Go and
//! Kubernetes do (`10s`, `5m`, `1h30m`). Bare non-negative integers are
//! accepted as seconds, matching the `*Seconds` knobs the tooling exposes.

use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize as _, Deserializer, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DurationParseError(String);

/// Parse `10s`-style Go durations, or a bare integer as seconds.
pub fn parse(text: &str) -> Result<Duration, DurationParseError> {
    if let Ok(seconds) = text.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    match go_parse_duration::parse_duration(text) {
        Ok(nanos) if nanos >= 0 => Ok(Duration::from_nanos(nanos as u64)),
        Ok(_) => Err(DurationParseError(format!("negative duration `{text}`"))),
        Err(_) => Err(DurationParseError(format!("invalid duration `{text}`"))),
    }
}

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.subsec_nanos() == 0 {
        serializer.serialize_str(&format!("{}s", value.as_secs()))
    } else {
        serializer.serialize_str(&format!("{}ns", value.as_nanos()))
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn accepts_bare_integers_as_seconds() {
        assert_eq!(parse("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("soon").is_err());
        assert!(parse("").is_err());
        assert!(parse("-5s").is_err());
    }
}
