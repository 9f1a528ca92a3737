//! KNX addressing
//!
//! Group addresses are stored as the raw 16-bit value and displayed in
//! 3-level notation (`main/middle/sub`). Parsing also accepts 2-level
//! (`main/sub`) and free (`0..=65535`) notation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::HpKnxError;

/// KNX group address (destination of a group telegram)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// Build a 3-level group address
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self, HpKnxError> {
        if main > 31 {
            return Err(HpKnxError::address(format!(
                "Main group must be 0-31, got {}",
                main
            )));
        }
        if middle > 7 {
            return Err(HpKnxError::address(format!(
                "Middle group must be 0-7, got {}",
                middle
            )));
        }
        Ok(Self(
            (u16::from(main) << 11) | (u16::from(middle) << 8) | u16::from(sub),
        ))
    }

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn main(self) -> u8 {
        ((self.0 >> 11) & 0x1F) as u8
    }

    pub fn middle(self) -> u8 {
        ((self.0 >> 8) & 0x07) as u8
    }

    pub fn sub(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

fn parse_part<T: FromStr>(part: &str, what: &str, addr: &str) -> Result<T, HpKnxError> {
    part.trim()
        .parse()
        .map_err(|_| HpKnxError::address(format!("Invalid {} in '{}'", what, addr)))
}

impl FromStr for GroupAddress {
    type Err = HpKnxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [main, middle, sub] => {
                let main: u8 = parse_part(main, "main group", s)?;
                let middle: u8 = parse_part(middle, "middle group", s)?;
                let sub: u8 = parse_part(sub, "sub group", s)?;
                Self::new(main, middle, sub)
            },
            [main, sub] => {
                let main: u8 = parse_part(main, "main group", s)?;
                let sub: u16 = parse_part(sub, "sub group", s)?;
                if main > 31 {
                    return Err(HpKnxError::address(format!(
                        "Main group must be 0-31, got {}",
                        main
                    )));
                }
                if sub > 2047 {
                    return Err(HpKnxError::address(format!(
                        "Sub group must be 0-2047, got {}",
                        sub
                    )));
                }
                Ok(Self((u16::from(main) << 11) | sub))
            },
            [free] => Ok(Self(parse_part(free, "free group address", s)?)),
            _ => Err(HpKnxError::address(format!(
                "Invalid group address format: '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Int(u16),
    Text(String),
}

impl<'de> Deserialize<'de> for GroupAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        match RawAddress::deserialize(deserializer)? {
            RawAddress::Int(raw) => Ok(Self(raw)),
            RawAddress::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }
}

/// KNX individual address (`area.line.device`) of a bus device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndividualAddress(u16);

impl IndividualAddress {
    pub fn new(area: u8, line: u8, device: u8) -> Result<Self, HpKnxError> {
        if area > 15 || line > 15 {
            return Err(HpKnxError::address(format!(
                "Area and line must be 0-15, got {}.{}",
                area, line
            )));
        }
        Ok(Self(
            (u16::from(area) << 12) | (u16::from(line) << 8) | u16::from(device),
        ))
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

impl Default for IndividualAddress {
    fn default() -> Self {
        // 15.15.250
        Self(0xFFFA)
    }
}

impl FromStr for IndividualAddress {
    type Err = HpKnxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [area, line, device] => Self::new(
                parse_part(area, "area", s)?,
                parse_part(line, "line", s)?,
                parse_part(device, "device", s)?,
            ),
            _ => Err(HpKnxError::address(format!(
                "Invalid individual address format: '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            (self.0 >> 12) & 0x0F,
            (self.0 >> 8) & 0x0F,
            self.0 & 0xFF
        )
    }
}

impl<'de> Deserialize<'de> for IndividualAddress {
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

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_three_level_group_address() {
        let ga: GroupAddress = "1/2/3".parse().unwrap();
        assert_eq!(ga.raw(), (1 << 11) | (2 << 8) | 3);
        assert_eq!(ga.to_string(), "1/2/3");

        let max: GroupAddress = "31/7/255".parse().unwrap();
        assert_eq!(max.raw(), 0xFFFF);
    }

    #[test]
    fn test_two_level_and_free_notation() {
        let two: GroupAddress = "1/515".parse().unwrap();
        assert_eq!(two, "1/2/3".parse().unwrap());

        let free: GroupAddress = "2563".parse().unwrap();
        assert_eq!(free, "1/2/3".parse().unwrap());
    }

    #[test]
    fn test_invalid_group_addresses() {
        assert!("32/0/0".parse::<GroupAddress>().is_err());
        assert!("1/8/0".parse::<GroupAddress>().is_err());
        assert!("1/0/256".parse::<GroupAddress>().is_err());
        assert!("1/2048".parse::<GroupAddress>().is_err());
        assert!("1/2/3/4".parse::<GroupAddress>().is_err());
        assert!("a/b/c".parse::<GroupAddress>().is_err());
        assert!("65536".parse::<GroupAddress>().is_err());
    }

    #[test]
    fn test_individual_address() {
        let ia: IndividualAddress = "15.15.250".parse().unwrap();
        assert_eq!(ia, IndividualAddress::default());
        assert_eq!(ia.to_string(), "15.15.250");

        assert!("16.0.1".parse::<IndividualAddress>().is_err());
        assert!("1.1".parse::<IndividualAddress>().is_err());
    }
}
