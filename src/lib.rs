//! BLE Current Time Service client.
//!
//! The GATT state machine (connection tracking, CTS discovery, CCCD
//! subscription), the Current Time decoder and the user trigger live here
//! and run on the host for testing. The `embedded` feature adds the
//! nRF52840 SoftDevice transport and the button task used by `main.rs`.
//!
//! Usage: `cargo test`

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod cts;
pub mod error;
pub mod ui;

pub use ble::client::{CtsClient, SharedClient, UserAction};
pub use ble::event::{ClientEvent, EventSink, GattEvent};
pub use ble::transport::GattTransport;
pub use config::ClientConfig;
pub use cts::CurrentTime;
pub use error::Error;
