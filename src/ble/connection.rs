//! Connection Tracker.
//!
//! Holds the identity of the single link this client serves and whether the
//! next user trigger should start advertising.

use crate::ble::{AdvertisingMode, ConnectionId, PeerAddress};
use crate::error::Error;

/// Snapshot of the link state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionState {
    pub connection_id: Option<ConnectionId>,
    pub is_connected: bool,
}

#[derive(Debug)]
pub struct ConnectionTracker {
    state: ConnectionState,
    peer: Option<PeerAddress>,
    advertise_on_trigger: bool,
    advertising: AdvertisingMode,
}

impl ConnectionTracker {
    pub const fn new() -> Self {
        Self {
            state: ConnectionState {
                connection_id: None,
                is_connected: false,
            },
            peer: None,
            advertise_on_trigger: true,
            advertising: AdvertisingMode::Off,
        }
    }

    /// Record a new link. Returns the state it replaced.
    pub fn on_connected(&mut self, peer: PeerAddress, conn: ConnectionId) -> ConnectionState {
        let previous = self.state;
        self.state = ConnectionState {
            connection_id: Some(conn),
            is_connected: true,
        };
        self.peer = Some(peer);
        self.advertise_on_trigger = false;
        // Connecting stops a connectable advertiser.
        self.advertising = AdvertisingMode::Off;
        previous
    }

    /// Clear the link if `conn` is the current one.
    ///
    /// A disconnect for another id is stale and leaves everything untouched.
    /// With no current link the reset still happens, so a repeated
    /// disconnect is harmless.
    pub fn on_disconnected(&mut self, conn: ConnectionId) -> Result<ConnectionState, Error> {
        if let Some(current) = self.state.connection_id {
            if current != conn {
                return Err(Error::StaleConnection(conn));
            }
        }
        let previous = self.state;
        self.state = ConnectionState::default();
        self.peer = None;
        self.advertise_on_trigger = true;
        Ok(previous)
    }

    /// `true` when `conn` is the live link.
    pub fn is_current(&self, conn: ConnectionId) -> bool {
        self.state.is_connected && self.state.connection_id == Some(conn)
    }

    pub fn current(&self) -> Option<ConnectionId> {
        self.state.connection_id.filter(|_| self.state.is_connected)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<PeerAddress> {
        self.peer
    }

    pub fn advertise_on_trigger(&self) -> bool {
        self.advertise_on_trigger
    }

    pub fn advertising(&self) -> AdvertisingMode {
        self.advertising
    }

    pub fn set_advertising(&mut self, mode: AdvertisingMode) {
        self.advertising = mode;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: PeerAddress = PeerAddress([1, 2, 3, 4, 5, 6]);

    #[test]
    fn starts_disconnected_in_advertise_mode() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.state(), ConnectionState::default());
        assert!(tracker.advertise_on_trigger());
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn connect_returns_previous_state() {
        let mut tracker = ConnectionTracker::new();
        let prev = tracker.on_connected(PEER, ConnectionId(1));
        assert!(!prev.is_connected);
        assert!(tracker.is_current(ConnectionId(1)));
        assert!(!tracker.is_current(ConnectionId(2)));
        assert!(!tracker.advertise_on_trigger());
        assert_eq!(tracker.peer(), Some(PEER));
    }

    #[test]
    fn disconnect_clears_and_rearms_advertising() {
        let mut tracker = ConnectionTracker::new();
        tracker.on_connected(PEER, ConnectionId(1));
        let prev = tracker.on_disconnected(ConnectionId(1)).unwrap();
        assert_eq!(prev.connection_id, Some(ConnectionId(1)));
        assert_eq!(tracker.current(), None);
        assert!(tracker.advertise_on_trigger());
        assert_eq!(tracker.peer(), None);
    }

    #[test]
    fn stale_disconnect_is_rejected() {
        let mut tracker = ConnectionTracker::new();
        tracker.on_connected(PEER, ConnectionId(2));
        assert_eq!(
            tracker.on_disconnected(ConnectionId(1)),
            Err(Error::StaleConnection(ConnectionId(1)))
        );
        assert!(tracker.is_current(ConnectionId(2)));
    }

    #[test]
    fn disconnect_without_connection_is_idempotent() {
        let mut tracker = ConnectionTracker::new();
        assert!(tracker.on_disconnected(ConnectionId(7)).is_ok());
        assert!(tracker.on_disconnected(ConnectionId(7)).is_ok());
        assert!(tracker.advertise_on_trigger());
    }
}
