//! The CTS client session and its event dispatcher.
//!
//! [`CtsClient`] owns all per-link state plus the transport and event sink.
//! The stack feeds it through [`CtsClient::dispatch`]; the user-intent
//! worker calls [`CtsClient::on_user_trigger`]. On target both reach it
//! through a [`SharedClient`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;

use crate::ble::connection::ConnectionTracker;
use crate::ble::discovery::{DiscoveryMachine, DiscoveryProgress};
use crate::ble::event::{ClientEvent, EventSink, GattEvent};
use crate::ble::subscription::{SubscriptionController, WriteOutcome};
use crate::ble::transport::GattTransport;
use crate::ble::{AdvertisingMode, ConnectionId, GattStatus, PeerAddress};
use crate::config::ClientConfig;
use crate::cts::CurrentTime;
use crate::error::Error;

/// Client behind a blocking mutex, shared by the stack callbacks and the
/// user-intent worker.
pub type SharedClient<M, T, S> = Mutex<M, RefCell<CtsClient<T, S>>>;

/// What a user trigger turned into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UserAction {
    StartAdvertising,
    /// CCCD write issued with this value.
    ToggleNotifications(bool),
    /// Nothing to do in the current state.
    Ignored,
}

pub struct CtsClient<T, S> {
    config: ClientConfig,
    transport: T,
    sink: S,
    connection: ConnectionTracker,
    discovery: DiscoveryMachine,
    subscription: SubscriptionController,
}

impl<T: GattTransport, S: EventSink> CtsClient<T, S> {
    pub fn new(config: ClientConfig, transport: T, sink: S) -> Self {
        Self {
            config,
            transport,
            sink,
            connection: ConnectionTracker::new(),
            discovery: DiscoveryMachine::new(config),
            subscription: SubscriptionController::new(),
        }
    }

    /// Route one stack event. The returned status goes back to the stack.
    pub fn dispatch(&mut self, event: GattEvent<'_>) -> GattStatus {
        let result = match event {
            GattEvent::Connected { peer, conn } => {
                self.on_connected(peer, conn);
                Ok(())
            }
            GattEvent::Disconnected { peer, conn, reason } => self
                .connection
                .on_disconnected(conn)
                .map(|_| {
                    info!("Disconnected from {} (reason: {})", peer, reason.name());
                    self.discovery.reset();
                    self.subscription.reset();
                    self.sink.publish(ClientEvent::Disconnected(reason));
                }),
            GattEvent::DiscoveryResult { conn, result } => self
                .check_current(conn)
                .and_then(|()| self.discovery.on_result(&result))
                .map(|_| ()),
            GattEvent::DiscoveryComplete {
                conn,
                phase,
                status,
            } => self.check_current(conn).and_then(|()| {
                let progress =
                    self.discovery
                        .on_complete(conn, phase, status, &mut self.transport)?;
                match progress {
                    DiscoveryProgress::Ready => self.sink.publish(ClientEvent::ServiceReady),
                    DiscoveryProgress::Stopped(phase) => {
                        self.sink.publish(ClientEvent::ServiceNotFound(phase))
                    }
                    DiscoveryProgress::Requested(_) => {}
                }
                Ok(())
            }),
            GattEvent::WriteComplete {
                conn,
                handle,
                status,
            } => self.check_current(conn).map(|()| {
                match self
                    .subscription
                    .on_write_complete(handle, status, self.discovery.handles())
                {
                    WriteOutcome::Confirmed(enabled) => self
                        .sink
                        .publish(ClientEvent::NotificationsChanged(enabled)),
                    WriteOutcome::Failed(status) => {
                        self.sink.publish(ClientEvent::CccdUpdateFailed(status))
                    }
                    WriteOutcome::Unmatched => {}
                }
            }),
            // Released whatever the link state, so no slot is ever leaked.
            GattEvent::BufferTransmitted(buffer) => {
                self.subscription.on_buffer_transmitted(buffer);
                Ok(())
            }
            GattEvent::Notification {
                conn,
                handle,
                payload,
            } => self
                .check_current(conn)
                .and_then(|()| self.on_notification(handle, payload)),
            GattEvent::AdvertisingStateChanged(mode) => {
                match mode {
                    AdvertisingMode::Off => info!("Advertising stopped"),
                    _ => info!("Advertising started ({:?})", mode),
                }
                self.connection.set_advertising(mode);
                self.sink.publish(ClientEvent::AdvertisingChanged(mode));
                Ok(())
            }
            GattEvent::ConnectionParamsUpdated {
                status,
                interval,
                latency,
                supervision_timeout,
            } => {
                info!(
                    "Connection parameters updated ({}): interval {} latency {} timeout {}",
                    status.name(),
                    interval,
                    latency,
                    supervision_timeout
                );
                Ok(())
            }
            GattEvent::Unhandled(kind) => {
                trace!("Unhandled stack event {}", kind);
                Ok(())
            }
        };

        match result {
            Ok(()) => GattStatus::Success,
            Err(Error::StaleConnection(conn)) => {
                debug!("Dropping event for stale connection {}", conn);
                GattStatus::Success
            }
            Err(e) => {
                debug!("Event handling failed: {:?}", e);
                e.status()
            }
        }
    }

    /// Button press or other user request.
    ///
    /// While disconnected and not yet advertising this starts advertising;
    /// once connected it toggles notifications. Anything else is ignored,
    /// so coalesced or spurious triggers are harmless.
    pub fn on_user_trigger(&mut self) -> Result<UserAction, Error> {
        if self.connection.current().is_none() {
            if !self.connection.advertise_on_trigger()
                || self.connection.advertising() != AdvertisingMode::Off
            {
                debug!("Trigger ignored: already advertising");
                return Ok(UserAction::Ignored);
            }
            self.transport.request_start_advertising().map_err(|status| {
                error!("Advertising request rejected: {}", status.name());
                Error::Rejected(status)
            })?;
            return Ok(UserAction::StartAdvertising);
        }

        match self.toggle_notifications() {
            Ok(enabled) => Ok(UserAction::ToggleNotifications(enabled)),
            Err(Error::NotConnected) | Err(Error::ServiceNotReady) => {
                info!("Trigger ignored: Current Time Service not discovered yet");
                Ok(UserAction::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    /// Flip the desired notification state and write it to the peer.
    pub fn toggle_notifications(&mut self) -> Result<bool, Error> {
        self.subscription.toggle_notifications(
            self.connection.current(),
            self.discovery.handles(),
            &mut self.transport,
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionTracker {
        &self.connection
    }

    pub fn discovery(&self) -> &DiscoveryMachine {
        &self.discovery
    }

    pub fn subscription(&self) -> &SubscriptionController {
        &self.subscription
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn on_connected(&mut self, peer: PeerAddress, conn: ConnectionId) {
        let previous = self.connection.on_connected(peer, conn);
        if let Some(old) = previous.connection_id {
            warn!("Connection {} replaced by {}", old, conn);
        }
        info!("Connected to {} (conn {})", peer, conn);
        self.subscription.reset();
        self.sink.publish(ClientEvent::Connected(peer));
        // A rejected start is logged inside; the link stays up but idle.
        let _ = self.discovery.start(conn, &mut self.transport);
    }

    fn on_notification(&mut self, handle: u16, payload: &[u8]) -> Result<(), Error> {
        if self.discovery.handles().value() != Some(handle) {
            trace!("Notification on handle {} ignored", handle);
            return Ok(());
        }
        match CurrentTime::decode(payload) {
            Ok(time) => {
                info!("Current time: {}", time);
                self.sink.publish(ClientEvent::TimeReceived(time));
                Ok(())
            }
            Err(e) => {
                warn!("Malformed current time notification ({} bytes)", payload.len());
                self.sink.publish(ClientEvent::MalformedTime(e));
                Err(e.into())
            }
        }
    }

    fn check_current(&self, conn: ConnectionId) -> Result<(), Error> {
        if self.connection.is_current(conn) {
            Ok(())
        } else {
            Err(Error::StaleConnection(conn))
        }
    }
}
