//! Events crossing the client boundary.
//!
//! [`GattEvent`] flows in from the stack; [`ClientEvent`] flows out to
//! whatever presents status to the user (console, display, log sink).

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::ble::buffer::WriteBuffer;
use crate::ble::{
    AdvertisingMode, ConnectionId, DisconnectReason, DiscoveryPhase, GattStatus, PeerAddress,
    Uuid16,
};
use crate::cts::{CurrentTime, DecodeError};

/// One attribute matched during a discovery phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryResult {
    Service {
        uuid: Uuid16,
        start_handle: u16,
        end_handle: u16,
    },
    Characteristic {
        uuid: Uuid16,
        decl_handle: u16,
        value_handle: u16,
    },
    Descriptor {
        uuid: Uuid16,
        handle: u16,
    },
}

impl DiscoveryResult {
    pub fn phase(&self) -> DiscoveryPhase {
        match self {
            DiscoveryResult::Service { .. } => DiscoveryPhase::Service,
            DiscoveryResult::Characteristic { .. } => DiscoveryPhase::Characteristic,
            DiscoveryResult::Descriptor { .. } => DiscoveryPhase::Descriptor,
        }
    }
}

/// Inbound stack callbacks.
#[derive(Debug, PartialEq, Eq)]
pub enum GattEvent<'a> {
    Connected {
        peer: PeerAddress,
        conn: ConnectionId,
    },
    Disconnected {
        peer: PeerAddress,
        conn: ConnectionId,
        reason: DisconnectReason,
    },
    DiscoveryResult {
        conn: ConnectionId,
        result: DiscoveryResult,
    },
    DiscoveryComplete {
        conn: ConnectionId,
        phase: DiscoveryPhase,
        status: GattStatus,
    },
    /// Response to a confirmed write.
    WriteComplete {
        conn: ConnectionId,
        handle: u16,
        status: GattStatus,
    },
    /// The stack is done with a write payload.
    BufferTransmitted(WriteBuffer),
    Notification {
        conn: ConnectionId,
        handle: u16,
        payload: &'a [u8],
    },
    AdvertisingStateChanged(AdvertisingMode),
    ConnectionParamsUpdated {
        status: GattStatus,
        interval: u16,
        latency: u16,
        supervision_timeout: u16,
    },
    /// Anything the client has no handler for.
    Unhandled(u8),
}

/// What the client reports for the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientEvent {
    Connected(PeerAddress),
    Disconnected(DisconnectReason),
    AdvertisingChanged(AdvertisingMode),
    /// CCCD located; notifications can be toggled.
    ServiceReady,
    /// Discovery stopped without reaching the CCCD.
    ServiceNotFound(DiscoveryPhase),
    /// Peer confirmed a CCCD write; `true` means notifications are on.
    NotificationsChanged(bool),
    CccdUpdateFailed(GattStatus),
    TimeReceived(CurrentTime),
    MalformedTime(DecodeError),
}

/// Receiver of [`ClientEvent`]s. Must not block.
pub trait EventSink {
    fn publish(&mut self, event: ClientEvent);
}

/// Discards everything.
impl EventSink for () {
    fn publish(&mut self, _event: ClientEvent) {}
}

impl<const N: usize> EventSink for heapless::Vec<ClientEvent, N> {
    /// Keeps the first `N` events; later ones are dropped.
    fn publish(&mut self, event: ClientEvent) {
        let _ = self.push(event);
    }
}

/// Forwards events into a bounded channel for a reporter task.
///
/// Publishing never waits: when the channel is full the event is dropped.
pub struct ChannelSink<'a, M: RawMutex, const N: usize> {
    channel: &'a Channel<M, ClientEvent, N>,
}

impl<'a, M: RawMutex, const N: usize> ChannelSink<'a, M, N> {
    pub const fn new(channel: &'a Channel<M, ClientEvent, N>) -> Self {
        Self { channel }
    }
}

impl<M: RawMutex, const N: usize> EventSink for ChannelSink<'_, M, N> {
    fn publish(&mut self, event: ClientEvent) {
        if self.channel.try_send(event).is_err() {
            warn!("Client event queue full - dropping {:?}", event);
        }
    }
}
