//! Shared Serde deserializers
//!
//! Time intervals in configuration files may be written as:
//! - seconds: `90`, `2.5`
//! - clock offsets: `"01:30"`, `"00:01:30"`, `"00:00:02.5"` (optional `+`/`-`)
//! - maps: `{ minutes: 1, seconds: 30 }` with any of
//!   `days`, `hours`, `minutes`, `seconds`, `milliseconds`

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

const TIME_PERIOD_ERROR: &str = "should be format 'HH:MM', 'HH:MM:SS' or 'HH:MM:SS.F'";

const PERIOD_UNITS: [(&str, f64); 5] = [
    ("days", 86_400.0),
    ("hours", 3_600.0),
    ("minutes", 60.0),
    ("seconds", 1.0),
    ("milliseconds", 0.001),
];

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInterval {
    Int(i64),
    Float(f64),
    Text(String),
    Map(BTreeMap<String, f64>),
}

/// Parse a clock offset like `"HH:MM"` or `"-HH:MM:SS.F"` into signed seconds
pub fn parse_time_period(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(format!("offset '{}' {}", value, TIME_PERIOD_ERROR));
    }

    let hours: u64 = parts[0]
        .parse()
        .map_err(|_| format!("offset '{}' {}", value, TIME_PERIOD_ERROR))?;
    let minutes: u64 = parts[1]
        .parse()
        .map_err(|_| format!("offset '{}' {}", value, TIME_PERIOD_ERROR))?;
    let seconds: f64 = match parts.get(2) {
        Some(s) => s
            .parse()
            .map_err(|_| format!("offset '{}' {}", value, TIME_PERIOD_ERROR))?,
        None => 0.0,
    };

    let whole = hours
        .checked_mul(3_600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .ok_or_else(|| format!("offset '{}' is out of range", value))?;

    Ok(sign * (whole as f64 + seconds))
}

fn period_from_map(map: &BTreeMap<String, f64>) -> Result<f64, String> {
    if map.is_empty() {
        return Err(format!(
            "must contain at least one of {}",
            PERIOD_UNITS.map(|(unit, _)| unit).join(", ")
        ));
    }
    let mut total = 0.0;
    for (key, value) in map {
        let factor = PERIOD_UNITS
            .iter()
            .find(|(unit, _)| unit == key)
            .map(|(_, factor)| *factor)
            .ok_or_else(|| format!("unknown time unit '{}'", key))?;
        total += value * factor;
    }
    Ok(total)
}

fn positive_interval(seconds: f64) -> Result<Duration, String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!(
            "time period should be greater zero, got {}s",
            seconds
        ));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| format!("time period {}s is out of range: {}", seconds, e))
}

fn raw_to_interval(raw: RawInterval) -> Result<Duration, String> {
    let seconds = match raw {
        RawInterval::Int(i) => i as f64,
        RawInterval::Float(f) => f,
        RawInterval::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) => f,
            Err(_) => parse_time_period(&s)?,
        },
        RawInterval::Map(map) => period_from_map(&map)?,
    };
    positive_interval(seconds)
}

/// Deserialize a strictly positive time interval
pub fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    raw_to_interval(RawInterval::deserialize(deserializer)?).map_err(D::Error::custom)
}

/// Deserialize an optional strictly positive time interval (`null` → None)
pub fn deserialize_optional_interval<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Option::<RawInterval>::deserialize(deserializer)? {
        Some(raw) => raw_to_interval(raw).map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}

/// Custom deserializer for boolean fields that supports multiple input formats
///
/// - native booleans: true, false
/// - integers: 0 (false), anything else (true)
/// - strings: "1"/"0", "true"/"false", "yes"/"no", "on"/"off", "enable"/"disable"
pub fn deserialize_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrStringOrInt {
        Bool(bool),
        Int(i64),
        String(String),
    }

    match BoolOrStringOrInt::deserialize(deserializer)? {
        BoolOrStringOrInt::Bool(b) => Ok(b),
        BoolOrStringOrInt::Int(i) => Ok(i != 0),
        BoolOrStringOrInt::String(s) => {
            let t = s.trim();
            if ["1", "true", "yes", "on", "enable"]
                .iter()
                .any(|v| t.eq_ignore_ascii_case(v))
            {
                Ok(true)
            } else if ["0", "false", "no", "off", "disable"]
                .iter()
                .any(|v| t.eq_ignore_ascii_case(v))
            {
                Ok(false)
            } else {
                Err(D::Error::custom(format!(
                    "invalid boolean value '{}'",
                    s
                )))
            }
        },
    }
}
