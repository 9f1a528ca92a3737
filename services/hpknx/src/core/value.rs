//! Data point values, value kinds and change detection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::HpKnxError;

/// Value exchanged between the heat pump and the bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Numeric(f64),
}

impl Value {
    /// Numeric view of the value (`true` → 1.0)
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            },
            Value::Numeric(v) => v,
        }
    }

    /// Boolean view of the value (numbers are `true` when non-zero)
    pub fn as_bool(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Numeric(v) => v != 0.0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Numeric(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Numeric(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Numeric(f64::from(v))
    }
}

/// Physical quantity of a numeric data point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericType {
    Temperature,
    TemperatureDifference,
    Percent,
    Pulse,
    Counter,
    TimePeriodHrs,
    Power,
    Pressure,
    VolumeFlow,
}

impl NumericType {
    const ALL: [NumericType; 9] = [
        NumericType::Temperature,
        NumericType::TemperatureDifference,
        NumericType::Percent,
        NumericType::Pulse,
        NumericType::Counter,
        NumericType::TimePeriodHrs,
        NumericType::Power,
        NumericType::Pressure,
        NumericType::VolumeFlow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NumericType::Temperature => "temperature",
            NumericType::TemperatureDifference => "temperature_difference",
            NumericType::Percent => "percent",
            NumericType::Pulse => "pulse",
            NumericType::Counter => "counter",
            NumericType::TimePeriodHrs => "time_period_hrs",
            NumericType::Power => "power",
            NumericType::Pressure => "pressure",
            NumericType::VolumeFlow => "volume_flow",
        }
    }

    /// Unit of measurement for display
    pub fn unit(self) -> &'static str {
        match self {
            NumericType::Temperature => "°C",
            NumericType::TemperatureDifference => "K",
            NumericType::Percent => "%",
            NumericType::Pulse | NumericType::Counter => "",
            NumericType::TimePeriodHrs => "h",
            NumericType::Power => "W",
            NumericType::Pressure => "Pa",
            NumericType::VolumeFlow => "l/h",
        }
    }
}

/// Kind of a data point: binary (switch) or numeric (sensor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Binary,
    Numeric(NumericType),
}

impl ValueKind {
    pub fn is_binary(self) -> bool {
        matches!(self, ValueKind::Binary)
    }

    pub fn unit(self) -> &'static str {
        match self {
            ValueKind::Binary => "",
            ValueKind::Numeric(t) => t.unit(),
        }
    }

    /// Convert a value into this kind
    pub fn coerce(self, value: Value) -> Value {
        match self {
            ValueKind::Binary => Value::Bool(value.as_bool()),
            ValueKind::Numeric(_) => Value::Numeric(value.as_f64()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Binary => f.write_str("binary"),
            ValueKind::Numeric(t) => f.write_str(t.as_str()),
        }
    }
}

impl FromStr for ValueKind {
    type Err = HpKnxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "binary" {
            return Ok(ValueKind::Binary);
        }
        NumericType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .map(|t| ValueKind::Numeric(*t))
            .ok_or_else(|| HpKnxError::config(format!("Unknown value type '{}'", s)))
    }
}

impl<'de> Deserialize<'de> for ValueKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

/// Send-on-change policy of a data point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeRule {
    /// Any difference (binary points)
    Differs,
    /// `|new - last| >= |threshold|`
    Absolute(f64),
    /// Relative change in percent of the last sent value
    Relative(f64),
}

impl ChangeRule {
    /// Whether `value` differs enough from `last_sent` to be sent
    pub fn is_change(self, last_sent: Value, value: Value) -> bool {
        match (self, last_sent, value) {
            (ChangeRule::Absolute(t), Value::Numeric(last), Value::Numeric(v)) => {
                (v - last).abs() >= t.abs()
            },
            (ChangeRule::Relative(r), Value::Numeric(last), Value::Numeric(v)) => {
                if last == 0.0 {
                    v != 0.0
                } else {
                    (v - last).abs() / last.abs() * 100.0 >= r.abs()
                }
            },
            _ => last_sent != value,
        }
    }

    pub fn is_threshold(self) -> bool {
        !matches!(self, ChangeRule::Differs)
    }
}
