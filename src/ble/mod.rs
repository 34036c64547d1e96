//! Bluetooth Low Energy subsystem.
//!
//! The device advertises, accepts a single connection and then acts as a
//! **GATT client** towards the connected peer:
//!
//! 1. **Connection Tracker** - current link identity, advertise-first mode.
//! 2. **Discovery** - Current Time Service, then its Current Time
//!    characteristic, then that characteristic's CCCD.
//! 3. **Subscription** - CCCD writes that enable/disable time notifications.
//! 4. **Client** - owns all of the above and routes stack events to them.
//!
//! The radio stack itself sits behind [`transport::GattTransport`]; on target
//! that is [`softdevice`], in tests a recording mock.

pub mod buffer;
pub mod client;
pub mod connection;
pub mod discovery;
pub mod event;
#[cfg(feature = "embedded")]
pub mod softdevice;
pub mod subscription;
pub mod transport;

use core::fmt;

/// Identifier the stack assigns to an established link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionId(pub u16);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 48-bit device address, least significant byte first (over-the-air order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PeerAddress(pub [u8; 6]);

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PeerAddress {
    fn format(&self, f: defmt::Formatter) {
        let b = &self.0;
        defmt::write!(
            f,
            "{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}",
            b[5],
            b[4],
            b[3],
            b[2],
            b[1],
            b[0]
        )
    }
}

/// 16-bit Bluetooth SIG assigned number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid16(pub u16);

impl Uuid16 {
    /// Little-endian wire representation.
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Inclusive attribute handle range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// `None` when `start > end` (nothing left to search).
    pub fn checked(start: u16, end: u16) -> Option<Self> {
        (start <= end && start != 0).then_some(Self { start, end })
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }
}

/// One of the three request/response cycles of GATT discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryPhase {
    Service,
    Characteristic,
    Descriptor,
}

/// Status codes exchanged with the stack.
///
/// ATT error responses keep their protocol code; the remaining variants are
/// local (host/stack) conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattStatus {
    Success,
    InvalidHandle,
    ReadNotPermitted,
    WriteNotPermitted,
    InsufficientAuthentication,
    RequestNotSupported,
    InvalidOffset,
    AttributeNotFound,
    InsufficientResources,
    /// Another procedure is already outstanding on this link.
    Busy,
    /// Request issued without a connection.
    NotConnected,
    /// Request not valid in the current state.
    InvalidState,
    /// Any other ATT or stack code.
    Other(u16),
}

impl GattStatus {
    pub fn is_success(self) -> bool {
        self == GattStatus::Success
    }

    /// Map an ATT error code (Bluetooth Core Vol 3, Part F, 3.4.1.1).
    pub fn from_att(code: u8) -> Self {
        match code {
            0x00 => GattStatus::Success,
            0x01 => GattStatus::InvalidHandle,
            0x02 => GattStatus::ReadNotPermitted,
            0x03 => GattStatus::WriteNotPermitted,
            0x05 => GattStatus::InsufficientAuthentication,
            0x06 => GattStatus::RequestNotSupported,
            0x07 => GattStatus::InvalidOffset,
            0x0A => GattStatus::AttributeNotFound,
            0x11 => GattStatus::InsufficientResources,
            other => GattStatus::Other(other as u16),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GattStatus::Success => "SUCCESS",
            GattStatus::InvalidHandle => "INVALID_HANDLE",
            GattStatus::ReadNotPermitted => "READ_NOT_PERMITTED",
            GattStatus::WriteNotPermitted => "WRITE_NOT_PERMITTED",
            GattStatus::InsufficientAuthentication => "INSUFFICIENT_AUTHENTICATION",
            GattStatus::RequestNotSupported => "REQUEST_NOT_SUPPORTED",
            GattStatus::InvalidOffset => "INVALID_OFFSET",
            GattStatus::AttributeNotFound => "ATTRIBUTE_NOT_FOUND",
            GattStatus::InsufficientResources => "INSUFFICIENT_RESOURCES",
            GattStatus::Busy => "BUSY",
            GattStatus::NotConnected => "NOT_CONNECTED",
            GattStatus::InvalidState => "INVALID_STATE",
            GattStatus::Other(_) => "ERROR",
        }
    }
}

/// Why a link went down (HCI error codes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    ConnectionTimeout,
    RemoteUserTerminated,
    RemoteLowResources,
    RemotePowerOff,
    LocalHostTerminated,
    FailedToEstablish,
    Other(u8),
}

impl DisconnectReason {
    pub fn from_hci(code: u8) -> Self {
        match code {
            0x08 => DisconnectReason::ConnectionTimeout,
            0x13 => DisconnectReason::RemoteUserTerminated,
            0x14 => DisconnectReason::RemoteLowResources,
            0x15 => DisconnectReason::RemotePowerOff,
            0x16 => DisconnectReason::LocalHostTerminated,
            0x3E => DisconnectReason::FailedToEstablish,
            other => DisconnectReason::Other(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DisconnectReason::ConnectionTimeout => "CONNECTION_TIMEOUT",
            DisconnectReason::RemoteUserTerminated => "REMOTE_USER_TERMINATED",
            DisconnectReason::RemoteLowResources => "REMOTE_LOW_RESOURCES",
            DisconnectReason::RemotePowerOff => "REMOTE_POWER_OFF",
            DisconnectReason::LocalHostTerminated => "LOCAL_HOST_TERMINATED",
            DisconnectReason::FailedToEstablish => "FAILED_TO_ESTABLISH",
            DisconnectReason::Other(_) => "UNKNOWN",
        }
    }
}

/// Advertising state as reported by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingMode {
    Off,
    UndirectedHigh,
    UndirectedLow,
}
