//! Single-slot user trigger and the worker that serves it.
//!
//! Firing the trigger several times before the worker wakes collapses to a
//! single wake-up. The worker re-reads client state on every wake-up, so a
//! lost or spurious press only means one action more or less, never an
//! inconsistent one.

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::signal::Signal;

use crate::ble::client::{SharedClient, UserAction};
use crate::ble::event::EventSink;
use crate::ble::transport::GattTransport;
use crate::error::Error;

pub struct UserTrigger<M: RawMutex = CriticalSectionRawMutex> {
    signal: Signal<M, ()>,
}

impl<M: RawMutex> UserTrigger<M> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Request service. Safe from any context.
    pub fn fire(&self) {
        self.signal.signal(());
    }

    /// `true` if a request is waiting for the worker.
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }

    pub async fn wait(&self) {
        self.signal.wait().await
    }
}

impl<M: RawMutex> Default for UserTrigger<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one user request to the client.
pub fn serve_one<M, T, S>(client: &SharedClient<M, T, S>) -> Result<UserAction, Error>
where
    M: RawMutex,
    T: GattTransport,
    S: EventSink,
{
    client.lock(|c| c.borrow_mut().on_user_trigger())
}

/// Wait for the next trigger and serve it.
pub async fn serve_next<TM, M, T, S>(
    trigger: &UserTrigger<TM>,
    client: &SharedClient<M, T, S>,
) -> Result<UserAction, Error>
where
    TM: RawMutex,
    M: RawMutex,
    T: GattTransport,
    S: EventSink,
{
    trigger.wait().await;
    serve_one(client)
}

/// Worker loop: serve triggers forever.
pub async fn run_worker<TM, M, T, S>(trigger: &UserTrigger<TM>, client: &SharedClient<M, T, S>) -> !
where
    TM: RawMutex,
    M: RawMutex,
    T: GattTransport,
    S: EventSink,
{
    loop {
        match serve_next(trigger, client).await {
            Ok(action) => debug!("User trigger: {:?}", action),
            Err(e) => warn!("User trigger failed: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;

    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::blocking_mutex::Mutex;

    use super::*;
    use crate::ble::buffer::WriteBuffer;
    use crate::ble::client::CtsClient;
    use crate::ble::transport::{DiscoveryRequest, WriteRejected};
    use crate::ble::{ConnectionId, GattStatus};
    use crate::config::ClientConfig;

    #[derive(Default)]
    struct Counter {
        advertise_requests: usize,
    }

    impl GattTransport for Counter {
        fn request_discovery(
            &mut self,
            _conn: ConnectionId,
            _request: &DiscoveryRequest,
        ) -> Result<(), GattStatus> {
            Ok(())
        }

        fn request_write(
            &mut self,
            _conn: ConnectionId,
            _handle: u16,
            payload: WriteBuffer,
            _confirmed: bool,
        ) -> Result<(), WriteRejected> {
            Err(WriteRejected {
                status: GattStatus::NotConnected,
                buffer: payload,
            })
        }

        fn request_start_advertising(&mut self) -> Result<(), GattStatus> {
            self.advertise_requests += 1;
            Ok(())
        }
    }

    fn shared() -> SharedClient<NoopRawMutex, Counter, ()> {
        Mutex::new(RefCell::new(CtsClient::new(
            ClientConfig::default(),
            Counter::default(),
            (),
        )))
    }

    #[test]
    fn fire_sets_pending() {
        let trigger: UserTrigger = UserTrigger::new();
        assert!(!trigger.is_pending());
        trigger.fire();
        assert!(trigger.is_pending());
    }

    #[futures_test::test]
    async fn rapid_fires_coalesce_into_one_wakeup() {
        let trigger: UserTrigger = UserTrigger::new();
        let client = shared();

        trigger.fire();
        trigger.fire();
        trigger.fire();

        let action = serve_next(&trigger, &client).await;
        assert_eq!(action, Ok(UserAction::StartAdvertising));
        assert!(!trigger.is_pending());
        client.lock(|c| assert_eq!(c.borrow().transport().advertise_requests, 1));
    }

    #[futures_test::test]
    async fn each_drained_trigger_rechecks_state() {
        let trigger: UserTrigger<NoopRawMutex> = UserTrigger::new();
        let client = shared();

        trigger.fire();
        assert_eq!(
            serve_next(&trigger, &client).await,
            Ok(UserAction::StartAdvertising)
        );
        trigger.fire();
        // Not connected yet and the advertiser never reported starting,
        // so another request goes out.
        assert_eq!(
            serve_next(&trigger, &client).await,
            Ok(UserAction::StartAdvertising)
        );
        client.lock(|c| assert_eq!(c.borrow().transport().advertise_requests, 2));
    }
}
