//! Core gateway components
//!
//! - **`address`** / **`value`**: KNX group addresses, data point values and change rules
//! - **`clients`**: heat pump and bus client traits, telegram types
//! - **`config`**: configuration loading and validation
//! - **`datapoint`** / **`fault`**: per-address state machines
//! - **`registry`**: data points and notifiers keyed by name and group address
//! - **`publisher`**: periodic login, update and cyclic sending loops
//! - **`dispatch`**: routing of inbound telegrams
//! - **`virt`**: in-process heat pump and loopback bus

pub mod address;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod datapoint;
pub mod dispatch;
pub mod fault;
pub mod publisher;
pub mod registry;
pub mod value;
pub mod virt;
