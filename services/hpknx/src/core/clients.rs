//! Heat pump and bus client abstractions
//!
//! The gateway core talks to both transports only through these traits.
//! Real serial/KNXnet-IP clients and the in-process virtual ones in
//! [`crate::core::virt`] implement them.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::broadcast;

use crate::core::address::GroupAddress;
use crate::core::value::Value;
use crate::error::Result;

/// Maximum length of a bus text payload (14-byte string)
pub const MAX_TEXT_LEN: usize = 14;

/// Entry of the heat pump fault log
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRecord {
    pub index: u32,
    pub code: u32,
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR #{} [{}]: {}, {}",
            self.index,
            self.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            self.code,
            self.message
        )
    }
}

/// Heat pump parameter client
#[async_trait]
pub trait HeatPumpClient: Send + Sync {
    async fn open_connection(&self) -> Result<()>;

    async fn close_connection(&self) -> Result<()>;

    async fn login(&self) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    async fn serial_number(&self) -> Result<u32>;

    async fn version(&self) -> Result<String>;

    /// Query several parameters at once; names that could not be read are omitted
    async fn query(&self, names: &[String]) -> Result<HashMap<String, Value>>;

    /// Write a parameter and return the value confirmed by the heat pump
    async fn set_param(&self, name: &str, value: Value) -> Result<Value>;

    /// Whether the heat pump currently reports a malfunction
    async fn in_error(&self) -> Result<bool>;

    /// Most recent entry of the fault log
    async fn last_fault(&self) -> Result<FaultRecord>;
}

/// Group telegram payload
#[derive(Debug, Clone, PartialEq)]
pub enum BusPayload {
    Value(Value),
    Text(String),
}

impl BusPayload {
    /// Text payload cropped to [`MAX_TEXT_LEN`] characters
    pub fn text(message: &str) -> Self {
        BusPayload::Text(message.chars().take(MAX_TEXT_LEN).collect())
    }
}

impl fmt::Display for BusPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusPayload::Value(v) => write!(f, "{}", v),
            BusPayload::Text(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramDirection {
    /// Received from the bus
    Incoming,
    /// Sent by this gateway (local echo)
    Outgoing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TelegramKind {
    GroupRead,
    GroupWrite(BusPayload),
    GroupResponse(BusPayload),
}

/// Group telegram as seen by the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Telegram {
    pub group_address: GroupAddress,
    pub direction: TelegramDirection,
    pub kind: TelegramKind,
}

impl Telegram {
    pub fn incoming(group_address: GroupAddress, kind: TelegramKind) -> Self {
        Self {
            group_address,
            direction: TelegramDirection::Incoming,
            kind,
        }
    }

    pub fn outgoing(group_address: GroupAddress, kind: TelegramKind) -> Self {
        Self {
            group_address,
            direction: TelegramDirection::Outgoing,
            kind,
        }
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == TelegramDirection::Outgoing
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            TelegramDirection::Incoming => "incoming",
            TelegramDirection::Outgoing => "outgoing",
        };
        match &self.kind {
            TelegramKind::GroupRead => {
                write!(f, "<Telegram {} {} GroupRead>", direction, self.group_address)
            },
            TelegramKind::GroupWrite(p) => write!(
                f,
                "<Telegram {} {} GroupWrite {}>",
                direction, self.group_address, p
            ),
            TelegramKind::GroupResponse(p) => write!(
                f,
                "<Telegram {} {} GroupResponse {}>",
                direction, self.group_address, p
            ),
        }
    }
}

/// Group-addressed bus client
#[async_trait]
pub trait BusClient: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Send a group write, or a group response when `is_response` is set
    async fn send(
        &self,
        group_address: GroupAddress,
        payload: BusPayload,
        is_response: bool,
    ) -> Result<()>;

    /// Subscribe to group telegrams, including echoes of our own
    fn subscribe(&self) -> broadcast::Receiver<Telegram>;
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_text_payload_is_cropped() {
        assert_eq!(
            BusPayload::text("Hochdruckstoerung Verdichter"),
            BusPayload::Text("Hochdruckstoer".to_string())
        );
        assert_eq!(BusPayload::text("kurz"), BusPayload::Text("kurz".to_string()));
    }

    #[test]
    fn test_fault_record_display() {
        let record = FaultRecord {
            index: 29,
            code: 20,
            timestamp: chrono::NaiveDate::from_ymd_opt(2021, 3, 1)
                .unwrap()
                .and_hms_opt(12, 30, 0)
                .unwrap(),
            message: "EQ_Spreizung".to_string(),
        };
        assert_eq!(
            record.to_string(),
            "ERROR #29 [2021-03-01T12:30:00]: 20, EQ_Spreizung"
        );
    }
}
