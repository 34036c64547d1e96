//! Application-wide constants and runtime client configuration.
//!
//! Assigned numbers, handle ranges, pool sizes and timing parameters
//! live here so they can be tuned in one place.

use crate::ble::{HandleRange, Uuid16};

// BLE assigned numbers

/// Current Time Service.
pub const CURRENT_TIME_SERVICE_UUID: Uuid16 = Uuid16(0x1805);

/// Current Time characteristic (exact time 256 + adjust reason).
pub const CURRENT_TIME_CHAR_UUID: Uuid16 = Uuid16(0x2A2B);

/// Client Characteristic Configuration Descriptor.
pub const CCCD_UUID: Uuid16 = Uuid16(0x2902);

/// Whole attribute handle space, searched during service discovery.
pub const FULL_HANDLE_RANGE: HandleRange = HandleRange::new(0x0001, 0xFFFF);

// GATT client

/// Number of CCCD write buffers that may be in flight at once.
pub const WRITE_BUFFER_POOL_SIZE: usize = 2;

/// Depth of the user-visible event queue on target.
pub const CLIENT_EVENT_QUEUE_DEPTH: usize = 8;

/// ATT MTU requested from the SoftDevice.
pub const ATT_MTU: u16 = 23;

// Advertising

/// Complete local name placed in the advertisement.
pub const DEVICE_NAME: &str = "CTS Client";

// User input

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// How failed discovery requests are handled.
///
/// The default never retries: a failed phase stops discovery until the
/// peer reconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Extra attempts per phase after the first one fails.
    pub max_retries: u8,
}

impl RetryPolicy {
    pub const NONE: Self = Self { max_retries: 0 };

    pub const fn attempts(max_retries: u8) -> Self {
        Self { max_retries }
    }
}

/// Identifiers and policies the client is built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClientConfig {
    pub service_uuid: Uuid16,
    pub characteristic_uuid: Uuid16,
    pub cccd_uuid: Uuid16,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_uuid: CURRENT_TIME_SERVICE_UUID,
            characteristic_uuid: CURRENT_TIME_CHAR_UUID,
            cccd_uuid: CCCD_UUID,
            retry: RetryPolicy::NONE,
        }
    }
}
