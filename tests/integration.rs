//! Integration tests for the CTS client driven purely through `dispatch`.

use cts_client::ble::buffer::WriteBuffer;
use cts_client::ble::discovery::DiscoveryState;
use cts_client::ble::event::DiscoveryResult;
use cts_client::ble::transport::{DiscoveryRequest, WriteRejected};
use cts_client::ble::{
    ConnectionId, DisconnectReason, DiscoveryPhase, GattStatus, HandleRange, PeerAddress,
};
use cts_client::config::{RetryPolicy, CCCD_UUID, CURRENT_TIME_CHAR_UUID, CURRENT_TIME_SERVICE_UUID};
use cts_client::cts::{AdjustReason, DayOfWeek};
use cts_client::{
    ClientConfig, ClientEvent, CtsClient, EventSink, GattEvent, GattTransport, UserAction,
};

const PEER: PeerAddress = PeerAddress([0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6]);
const SERVICE_START: u16 = 0x0020;
const SERVICE_END: u16 = 0x0025;
const CHAR_DECL: u16 = 0x0021;
const CHAR_VALUE: u16 = 0x0022;
const CCCD: u16 = 0x0023;

const TIME_2021: [u8; 10] = [0xE5, 0x07, 0x06, 0x0F, 0x0A, 0x1E, 0x00, 0x03, 0x80, 0x01];

#[derive(Default)]
struct MockStack {
    discoveries: Vec<(ConnectionId, DiscoveryRequest)>,
    writes: Vec<(ConnectionId, u16, Vec<u8>, bool)>,
    /// Payloads the "stack" still owns.
    held: Vec<WriteBuffer>,
    advertise_requests: usize,
}

impl GattTransport for MockStack {
    fn request_discovery(
        &mut self,
        conn: ConnectionId,
        request: &DiscoveryRequest,
    ) -> Result<(), GattStatus> {
        self.discoveries.push((conn, *request));
        Ok(())
    }

    fn request_write(
        &mut self,
        conn: ConnectionId,
        handle: u16,
        payload: WriteBuffer,
        confirmed: bool,
    ) -> Result<(), WriteRejected> {
        self.writes
            .push((conn, handle, payload.as_bytes().to_vec(), confirmed));
        self.held.push(payload);
        Ok(())
    }

    fn request_start_advertising(&mut self) -> Result<(), GattStatus> {
        self.advertise_requests += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Events(Vec<ClientEvent>);

impl EventSink for Events {
    fn publish(&mut self, event: ClientEvent) {
        self.0.push(event);
    }
}

type Client = CtsClient<MockStack, Events>;

fn client_with(config: ClientConfig) -> Client {
    CtsClient::new(config, MockStack::default(), Events::default())
}

fn client() -> Client {
    client_with(ClientConfig::default())
}

fn complete(c: &mut Client, conn: ConnectionId, phase: DiscoveryPhase) -> GattStatus {
    c.dispatch(GattEvent::DiscoveryComplete {
        conn,
        phase,
        status: GattStatus::Success,
    })
}

fn connect_and_discover(c: &mut Client, conn: ConnectionId) {
    c.dispatch(GattEvent::Connected { peer: PEER, conn });
    c.dispatch(GattEvent::DiscoveryResult {
        conn,
        result: DiscoveryResult::Service {
            uuid: CURRENT_TIME_SERVICE_UUID,
            start_handle: SERVICE_START,
            end_handle: SERVICE_END,
        },
    });
    complete(c, conn, DiscoveryPhase::Service);
    c.dispatch(GattEvent::DiscoveryResult {
        conn,
        result: DiscoveryResult::Characteristic {
            uuid: CURRENT_TIME_CHAR_UUID,
            decl_handle: CHAR_DECL,
            value_handle: CHAR_VALUE,
        },
    });
    complete(c, conn, DiscoveryPhase::Characteristic);
    c.dispatch(GattEvent::DiscoveryResult {
        conn,
        result: DiscoveryResult::Descriptor {
            uuid: CCCD_UUID,
            handle: CCCD,
        },
    });
    complete(c, conn, DiscoveryPhase::Descriptor);
}

/// Acknowledge the oldest write and hand its buffer back.
fn ack_write(c: &mut Client, conn: ConnectionId, status: GattStatus) {
    c.dispatch(GattEvent::WriteComplete {
        conn,
        handle: CCCD,
        status,
    });
    let buffer = c.transport_mut().held.remove(0);
    c.dispatch(GattEvent::BufferTransmitted(buffer));
}

#[test]
fn full_session_cycle() {
    let mut c = client();
    let conn = ConnectionId(1);

    assert_eq!(c.on_user_trigger(), Ok(UserAction::StartAdvertising));
    assert_eq!(c.transport().advertise_requests, 1);

    connect_and_discover(&mut c, conn);
    assert_eq!(c.discovery().state(), DiscoveryState::Complete);

    let requests: Vec<_> = c.transport().discoveries.iter().map(|(_, r)| *r).collect();
    assert_eq!(
        requests,
        vec![
            DiscoveryRequest {
                phase: DiscoveryPhase::Service,
                range: HandleRange::new(0x0001, 0xFFFF),
                uuid: CURRENT_TIME_SERVICE_UUID,
            },
            DiscoveryRequest {
                phase: DiscoveryPhase::Characteristic,
                range: HandleRange::new(SERVICE_START, SERVICE_END),
                uuid: CURRENT_TIME_CHAR_UUID,
            },
            DiscoveryRequest {
                phase: DiscoveryPhase::Descriptor,
                range: HandleRange::new(CHAR_VALUE + 1, SERVICE_END),
                uuid: CCCD_UUID,
            },
        ]
    );

    // Enable notifications.
    assert_eq!(c.on_user_trigger(), Ok(UserAction::ToggleNotifications(true)));
    assert_eq!(c.transport().writes, vec![(conn, CCCD, vec![0x01, 0x00], true)]);
    ack_write(&mut c, conn, GattStatus::Success);
    assert!(c.subscription().confirmed());
    assert_eq!(c.subscription().outstanding_buffers(), 0);

    // Receive a time.
    c.dispatch(GattEvent::Notification {
        conn,
        handle: CHAR_VALUE,
        payload: &TIME_2021,
    });
    let time = c
        .sink()
        .0
        .iter()
        .find_map(|e| match e {
            ClientEvent::TimeReceived(t) => Some(*t),
            _ => None,
        })
        .expect("time event");
    assert_eq!(time.year, 2021);
    assert_eq!(time.day_of_week, DayOfWeek::Wednesday);
    assert_eq!(time.adjust_reason, AdjustReason::MANUAL);

    // Disable again.
    assert_eq!(c.on_user_trigger(), Ok(UserAction::ToggleNotifications(false)));
    assert_eq!(c.transport().writes[1].2, vec![0x00, 0x00]);
    ack_write(&mut c, conn, GattStatus::Success);
    assert!(!c.subscription().confirmed());

    c.dispatch(GattEvent::Disconnected {
        peer: PEER,
        conn,
        reason: DisconnectReason::RemoteUserTerminated,
    });

    assert_eq!(
        c.sink().0,
        vec![
            ClientEvent::Connected(PEER),
            ClientEvent::ServiceReady,
            ClientEvent::NotificationsChanged(true),
            ClientEvent::TimeReceived(time),
            ClientEvent::NotificationsChanged(false),
            ClientEvent::Disconnected(DisconnectReason::RemoteUserTerminated),
        ]
    );
}

#[test]
fn disconnect_always_resets_handles() {
    // Mid-discovery, complete, and with no connection at all.
    for stop_after in 0..4 {
        let mut c = client();
        let conn = ConnectionId(4);
        c.dispatch(GattEvent::Connected { peer: PEER, conn });
        if stop_after > 0 {
            c.dispatch(GattEvent::DiscoveryResult {
                conn,
                result: DiscoveryResult::Service {
                    uuid: CURRENT_TIME_SERVICE_UUID,
                    start_handle: SERVICE_START,
                    end_handle: SERVICE_END,
                },
            });
        }
        if stop_after > 1 {
            complete(&mut c, conn, DiscoveryPhase::Service);
        }
        if stop_after > 2 {
            c = client();
            connect_and_discover(&mut c, conn);
        }

        c.dispatch(GattEvent::Disconnected {
            peer: PEER,
            conn,
            reason: DisconnectReason::ConnectionTimeout,
        });
        let handles = c.discovery().handles();
        assert!(!handles.service_found);
        assert_eq!(handles.start_handle, None);
        assert_eq!(handles.cccd_handle, None);
        assert_eq!(c.discovery().state(), DiscoveryState::Idle);
    }

    let mut c = client();
    c.dispatch(GattEvent::Disconnected {
        peer: PEER,
        conn: ConnectionId(9),
        reason: DisconnectReason::Other(0),
    });
    assert!(!c.discovery().handles().service_found);
}

#[test]
fn toggle_is_noop_until_service_found() {
    let mut c = client();

    // Not connected: the trigger asks for advertising, a direct toggle is refused.
    assert!(c.toggle_notifications().is_err());

    let conn = ConnectionId(2);
    c.dispatch(GattEvent::Connected { peer: PEER, conn });
    assert_eq!(c.on_user_trigger(), Ok(UserAction::Ignored));
    assert!(c.toggle_notifications().is_err());
    assert!(c.transport().writes.is_empty());
    assert!(!c.subscription().intent().desired());
}

#[test]
fn late_result_from_old_connection_is_discarded() {
    let mut c = client();
    let old = ConnectionId(1);
    let new = ConnectionId(2);

    c.dispatch(GattEvent::Connected { peer: PEER, conn: old });
    c.dispatch(GattEvent::Disconnected {
        peer: PEER,
        conn: old,
        reason: DisconnectReason::RemoteUserTerminated,
    });
    c.dispatch(GattEvent::Connected { peer: PEER, conn: new });

    c.dispatch(GattEvent::DiscoveryResult {
        conn: old,
        result: DiscoveryResult::Service {
            uuid: CURRENT_TIME_SERVICE_UUID,
            start_handle: 0x0100,
            end_handle: 0x0110,
        },
    });
    assert_eq!(c.discovery().handles().start_handle, None);

    // A late completion must not advance the new link either.
    complete(&mut c, old, DiscoveryPhase::Service);
    assert_eq!(c.discovery().state(), DiscoveryState::ServiceDiscovery);
    assert_eq!(c.transport().discoveries.len(), 2);
    assert!(c.transport().discoveries.iter().all(|(_, r)| r.phase == DiscoveryPhase::Service));
}

#[test]
fn phases_never_skip_or_regress() {
    let mut c = client();
    let conn = ConnectionId(5);
    c.dispatch(GattEvent::Connected { peer: PEER, conn });

    // Completion for a later phase while still in service discovery.
    let status = complete(&mut c, conn, DiscoveryPhase::Descriptor);
    assert_eq!(status, GattStatus::InvalidState);
    assert_eq!(c.discovery().state(), DiscoveryState::ServiceDiscovery);

    // Characteristic results are not accepted during service discovery.
    c.dispatch(GattEvent::DiscoveryResult {
        conn,
        result: DiscoveryResult::Characteristic {
            uuid: CURRENT_TIME_CHAR_UUID,
            decl_handle: CHAR_DECL,
            value_handle: CHAR_VALUE,
        },
    });
    assert_eq!(c.discovery().handles().char_value_handle, None);
    assert_eq!(c.transport().discoveries.len(), 1);
}

#[test]
fn missing_service_is_reported_and_stops() {
    let mut c = client();
    let conn = ConnectionId(6);
    c.dispatch(GattEvent::Connected { peer: PEER, conn });
    c.dispatch(GattEvent::DiscoveryComplete {
        conn,
        phase: DiscoveryPhase::Service,
        status: GattStatus::AttributeNotFound,
    });

    assert_eq!(c.discovery().state(), DiscoveryState::Idle);
    assert_eq!(
        c.sink().0.last(),
        Some(&ClientEvent::ServiceNotFound(DiscoveryPhase::Service))
    );
    assert_eq!(c.on_user_trigger(), Ok(UserAction::Ignored));
}

#[test]
fn rapid_toggles_confirm_last_acknowledged_write() {
    let mut c = client();
    let conn = ConnectionId(7);
    connect_and_discover(&mut c, conn);

    assert_eq!(c.on_user_trigger(), Ok(UserAction::ToggleNotifications(true)));
    assert_eq!(c.on_user_trigger(), Ok(UserAction::ToggleNotifications(false)));
    assert!(!c.subscription().intent().desired());

    // First write lands, second is refused by the peer.
    ack_write(&mut c, conn, GattStatus::Success);
    ack_write(&mut c, conn, GattStatus::WriteNotPermitted);

    assert!(c.subscription().confirmed());
    assert!(c.subscription().intent().desired());
    assert_eq!(c.subscription().outstanding_buffers(), 0);
    assert!(c
        .sink()
        .0
        .contains(&ClientEvent::CccdUpdateFailed(GattStatus::WriteNotPermitted)));
}

#[test]
fn buffer_returned_after_disconnect_is_still_released() {
    let mut c = client();
    let conn = ConnectionId(8);
    connect_and_discover(&mut c, conn);
    c.on_user_trigger().unwrap();
    assert_eq!(c.subscription().outstanding_buffers(), 1);

    c.dispatch(GattEvent::Disconnected {
        peer: PEER,
        conn,
        reason: DisconnectReason::RemotePowerOff,
    });
    let buffer = c.transport_mut().held.pop().unwrap();
    c.dispatch(GattEvent::BufferTransmitted(buffer));
    assert_eq!(c.subscription().outstanding_buffers(), 0);
    assert!(!c.subscription().confirmed());
}

#[test]
fn retry_policy_reissues_failed_discovery() {
    let mut c = client_with(ClientConfig {
        retry: RetryPolicy::attempts(2),
        ..ClientConfig::default()
    });
    let conn = ConnectionId(10);
    c.dispatch(GattEvent::Connected { peer: PEER, conn });
    for _ in 0..2 {
        c.dispatch(GattEvent::DiscoveryComplete {
            conn,
            phase: DiscoveryPhase::Service,
            status: GattStatus::InsufficientResources,
        });
        assert_eq!(c.discovery().state(), DiscoveryState::ServiceDiscovery);
    }
    assert_eq!(c.transport().discoveries.len(), 3);

    c.dispatch(GattEvent::DiscoveryComplete {
        conn,
        phase: DiscoveryPhase::Service,
        status: GattStatus::InsufficientResources,
    });
    assert_eq!(c.discovery().state(), DiscoveryState::Idle);
    assert_eq!(c.transport().discoveries.len(), 3);
}

#[test]
fn notifications_from_stale_link_are_dropped() {
    let mut c = client();
    connect_and_discover(&mut c, ConnectionId(11));
    let before = c.sink().0.len();
    c.dispatch(GattEvent::Notification {
        conn: ConnectionId(12),
        handle: CHAR_VALUE,
        payload: &TIME_2021,
    });
    assert_eq!(c.sink().0.len(), before);
}

#[test]
fn write_result_from_previous_link_is_ignored() {
    let mut c = client();
    let old = ConnectionId(13);
    connect_and_discover(&mut c, old);
    c.on_user_trigger().unwrap();
    c.dispatch(GattEvent::Disconnected {
        peer: PEER,
        conn: old,
        reason: DisconnectReason::RemoteUserTerminated,
    });

    let new = ConnectionId(14);
    connect_and_discover(&mut c, new);
    c.on_user_trigger().unwrap();
    assert_eq!(c.subscription().pending_writes(), 1);

    let status = c.dispatch(GattEvent::WriteComplete {
        conn: old,
        handle: CCCD,
        status: GattStatus::Success,
    });
    assert_eq!(status, GattStatus::Success);
    assert!(!c.subscription().confirmed());
    assert_eq!(c.subscription().pending_writes(), 1);

    ack_write(&mut c, new, GattStatus::Success);
    assert!(c.subscription().confirmed());
    assert_eq!(c.subscription().pending_writes(), 0);
}
