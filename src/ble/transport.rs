//! Command side of the stack boundary.
//!
//! Every request is fire-and-forget: the return value only says whether the
//! stack accepted it. Results arrive later as [`GattEvent`]s.
//!
//! [`GattEvent`]: crate::ble::event::GattEvent

use crate::ble::buffer::WriteBuffer;
use crate::ble::{ConnectionId, DiscoveryPhase, GattStatus, HandleRange, Uuid16};

/// One discovery request: which phase, over which handles, for which UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryRequest {
    pub phase: DiscoveryPhase,
    pub range: HandleRange,
    pub uuid: Uuid16,
}

/// A write the stack refused; the payload comes straight back.
#[derive(Debug, PartialEq, Eq)]
pub struct WriteRejected {
    pub status: GattStatus,
    pub buffer: WriteBuffer,
}

/// The stack operations the client issues.
pub trait GattTransport {
    fn request_discovery(
        &mut self,
        conn: ConnectionId,
        request: &DiscoveryRequest,
    ) -> Result<(), GattStatus>;

    /// Hand `payload` to the stack. On acceptance the stack owns the buffer
    /// until it reports [`GattEvent::BufferTransmitted`].
    ///
    /// [`GattEvent::BufferTransmitted`]: crate::ble::event::GattEvent::BufferTransmitted
    fn request_write(
        &mut self,
        conn: ConnectionId,
        handle: u16,
        payload: WriteBuffer,
        confirmed: bool,
    ) -> Result<(), WriteRejected>;

    fn request_start_advertising(&mut self) -> Result<(), GattStatus>;
}
