//! Unified error type for cts-client.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use crate::ble::{ConnectionId, DiscoveryPhase, GattStatus};
use crate::cts::DecodeError;

/// Top-level error type used across the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Connection
    /// No peer is connected.
    NotConnected,

    /// Event refers to a link that is no longer the current one.
    StaleConnection(ConnectionId),

    // Discovery / subscription
    /// CTS discovery has not completed on this link.
    ServiceNotReady,

    /// A completion arrived for a phase the state machine is not in.
    UnexpectedPhase {
        expected: Option<DiscoveryPhase>,
        got: DiscoveryPhase,
    },

    /// The stack refused a request synchronously.
    Rejected(GattStatus),

    /// Every CCCD write buffer is still held by the transport.
    BufferUnavailable,

    // Notifications
    /// Time notification payload could not be decoded.
    Decode(DecodeError),
}

// Convenience conversions

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<GattStatus> for Error {
    fn from(status: GattStatus) -> Self {
        Error::Rejected(status)
    }
}

impl Error {
    /// Status reported back to the stack for this failure.
    pub fn status(self) -> GattStatus {
        match self {
            Error::NotConnected | Error::StaleConnection(_) => GattStatus::NotConnected,
            Error::ServiceNotReady | Error::UnexpectedPhase { .. } => GattStatus::InvalidState,
            Error::Rejected(status) => status,
            Error::BufferUnavailable => GattStatus::InsufficientResources,
            // ATT "invalid attribute value length"
            Error::Decode(_) => GattStatus::Other(0x0D),
        }
    }
}
