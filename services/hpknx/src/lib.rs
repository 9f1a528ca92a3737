//! Heat pump KNX gateway (hpknx)
//!
//! Polls heat pump parameters and mirrors them onto KNX group addresses,
//! forwards bus writes to the heat pump and announces heat pump faults on
//! the bus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  query/set   ┌─────────────────┐  send   ┌─────────────────┐
//! │   Heat pump     │◄────────────►│   Publisher     │────────►│   KNX bus       │
//! │   client        │              │   + Registry    │         │   client        │
//! └─────────────────┘              └─────────────────┘         └─────────────────┘
//!          ▲                                ▲                           │
//!          │          set_param             │     telegrams             │
//!          └──────────────────────  TelegramDispatcher ◄────────────────┘
//! ```
//!
//! - **`core`**: data points, fault notification, registry, publisher, dispatch
//! - **`runtime`**: lifecycle wiring of the components
//! - **`error`**: gateway error type

pub mod core;
pub mod error;
pub mod runtime;

pub use crate::core::address::GroupAddress;
pub use crate::core::clients::{BusClient, BusPayload, HeatPumpClient, Telegram, TelegramKind};
pub use crate::core::config::GatewayConfig;
pub use crate::core::datapoint::DataPoint;
pub use crate::core::fault::FaultNotifier;
pub use crate::core::publisher::Publisher;
pub use crate::core::registry::Registry;
pub use crate::core::value::Value;
pub use error::{HpKnxError, Result};
