//! Subscription Controller.
//!
//! Each user toggle flips the *desired* notification state and writes it to
//! the peer's CCCD. The *confirmed* state only follows write responses, so
//! after several quick toggles it settles on the last write the peer
//! acknowledged, which may lag the last request.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::Deque;

use crate::ble::buffer::{BufferPool, WriteBuffer};
use crate::ble::discovery::ServiceHandles;
use crate::ble::transport::GattTransport;
use crate::ble::{ConnectionId, GattStatus};
use crate::config::WRITE_BUFFER_POOL_SIZE;
use crate::error::Error;

/// Desired notification state.
///
/// Written by whichever context issues toggles and read when a write is
/// built, so it is kept in an atomic rather than behind the client lock.
#[derive(Debug, Default)]
pub struct SubscriptionIntent(AtomicBool);

impl SubscriptionIntent {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn desired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

/// CCCD payload: bit 0 enables notifications, bit 1 (indications) stays clear.
pub fn cccd_value(enabled: bool) -> [u8; 2] {
    [enabled as u8, 0x00]
}

/// How a write response was interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    /// Peer accepted the write; notifications are now in this state.
    Confirmed(bool),
    /// Peer refused the write; confirmed state unchanged.
    Failed(GattStatus),
    /// Response does not belong to an outstanding CCCD write.
    Unmatched,
}

#[derive(Debug)]
pub struct SubscriptionController {
    intent: SubscriptionIntent,
    confirmed: bool,
    /// Values written, oldest first, awaiting their response.
    in_flight: Deque<bool, WRITE_BUFFER_POOL_SIZE>,
    pool: BufferPool<WRITE_BUFFER_POOL_SIZE>,
}

impl SubscriptionController {
    pub const fn new() -> Self {
        Self {
            intent: SubscriptionIntent::new(),
            confirmed: false,
            in_flight: Deque::new(),
            pool: BufferPool::new(),
        }
    }

    pub fn intent(&self) -> &SubscriptionIntent {
        &self.intent
    }

    /// Notification state last acknowledged by the peer.
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn pending_writes(&self) -> usize {
        self.in_flight.len()
    }

    /// Buffers currently owned by the transport.
    pub fn outstanding_buffers(&self) -> usize {
        self.pool.outstanding()
    }

    /// Flip the desired state and write it to the CCCD.
    ///
    /// Returns the value written. Without a link or before discovery has
    /// completed nothing is written.
    pub fn toggle_notifications<T: GattTransport>(
        &mut self,
        conn: Option<ConnectionId>,
        handles: &ServiceHandles,
        transport: &mut T,
    ) -> Result<bool, Error> {
        let Some(conn) = conn else {
            info!("Notification toggle skipped: not connected");
            return Err(Error::NotConnected);
        };
        let Some(cccd) = handles.cccd() else {
            info!("Notification toggle skipped: service not discovered");
            return Err(Error::ServiceNotReady);
        };
        if self.in_flight.is_full() {
            return Err(Error::BufferUnavailable);
        }

        let desired = !self.intent.desired();
        let buffer = self
            .pool
            .lease(cccd_value(desired))
            .ok_or(Error::BufferUnavailable)?;

        match transport.request_write(conn, cccd, buffer, true) {
            Ok(()) => {
                self.intent.set(desired);
                // Capacity checked above.
                let _ = self.in_flight.push_back(desired);
                debug!("CCCD write issued: {}", desired);
                Ok(desired)
            }
            Err(rejected) => {
                error!("CCCD write rejected: {}", rejected.status.name());
                self.pool.release(rejected.buffer);
                Err(Error::Rejected(rejected.status))
            }
        }
    }

    /// Apply a write response for `handle`.
    pub fn on_write_complete(
        &mut self,
        handle: u16,
        status: GattStatus,
        handles: &ServiceHandles,
    ) -> WriteOutcome {
        if handles.cccd() != Some(handle) {
            warn!("Write response for unexpected handle {}", handle);
            return WriteOutcome::Unmatched;
        }
        let Some(written) = self.in_flight.pop_front() else {
            warn!("Write response with no CCCD write outstanding");
            return WriteOutcome::Unmatched;
        };

        if status.is_success() {
            self.confirmed = written;
            if written {
                info!("Notifications enabled");
            } else {
                info!("Notifications disabled");
            }
            WriteOutcome::Confirmed(written)
        } else {
            warn!("CCCD update failed: {}", status.name());
            if self.in_flight.is_empty() {
                self.intent.set(self.confirmed);
            }
            WriteOutcome::Failed(status)
        }
    }

    /// The transport is finished with `buffer`.
    pub fn on_buffer_transmitted(&mut self, buffer: WriteBuffer) {
        self.pool.release(buffer);
    }

    /// Forget the link. Buffers still held by the transport come back
    /// through [`Self::on_buffer_transmitted`] as usual.
    pub fn reset(&mut self) {
        self.intent.set(false);
        self.confirmed = false;
        self.in_flight.clear();
    }
}

impl Default for SubscriptionController {
    fn default() -> Self {
        Self::new()
    }
}
