//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serde helper module for Duration serialization as seconds
pub mod serde_duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

/// Serde helper for the run time, accepting seconds or a `30m`-style string
pub mod serde_run_time {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RunTimeRepr {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RunTimeRepr::deserialize(deserializer)? {
            RunTimeRepr::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            RunTimeRepr::Text(text) => parse_run_time(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// Parse a run time.
///
/// Accepts the `<minutes>m` form used by the perf-test pipelines, any
/// humantime duration (`1h 30m`, `90s`), or a bare number of seconds.
pub fn parse_run_time(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("run time cannot be empty".to_string());
    }

    if let Some(minutes) = value.strip_suffix('m') {
        if let Ok(minutes) = minutes.parse::<u64>() {
            return Ok(Duration::from_secs(minutes * 60));
        }
    }

    if let Ok(seconds) = value.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    humantime::parse_duration(value).map_err(|e| format!("invalid run time '{}': {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_time_forms() {
        assert_eq!(parse_run_time("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_run_time("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_run_time("1h 5m").unwrap(), Duration::from_secs(3900));
        assert_eq!(parse_run_time("90s").unwrap(), Duration::from_secs(90));
        assert!(parse_run_time("").is_err());
        assert!(parse_run_time("soon").is_err());
    }
}
