//! SoftDevice S140 glue.
//!
//! [`SoftdeviceTransport`] issues the client's requests with the flex GATT
//! client calls. [`GattBridge`] receives the flex callbacks for one link and
//! turns them into [`GattEvent`]s for the shared client. [`run_peripheral`]
//! advertises on request and runs each link until it drops.

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementBuilder, AdvertisementPayload, Flag,
};
use nrf_softdevice::ble::gatt_client::{
    self, FlexCharacteristic, FlexClient, FlexClientError, FlexDescriptor, HvxType, Service,
};
use nrf_softdevice::ble::{peripheral, Connection, Uuid};
use nrf_softdevice::{raw, RawError, Softdevice};

use crate::ble::buffer::WriteBuffer;
use crate::ble::client::{CtsClient, SharedClient};
use crate::ble::event::{DiscoveryResult, EventSink, GattEvent};
use crate::ble::transport::{DiscoveryRequest, GattTransport, WriteRejected};
use crate::ble::{
    AdvertisingMode, ConnectionId, DisconnectReason, DiscoveryPhase, GattStatus, PeerAddress,
    Uuid16,
};
use crate::config::{ClientConfig, ATT_MTU, DEVICE_NAME};

/// Raised by the transport when the client wants to advertise.
pub type AdvertiseSignal = Signal<CriticalSectionRawMutex, ()>;

/// Configure and enable the SoftDevice: one peripheral link, no GATT server.
pub fn enable_softdevice() -> &'static mut Softdevice {
    let config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as *const u8 as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    info!("Enabling SoftDevice");
    Softdevice::enable(&config)
}

fn flex_status(err: FlexClientError) -> GattStatus {
    match err {
        FlexClientError::Disconnected => GattStatus::NotConnected,
        FlexClientError::Raw(RawError::Busy) => GattStatus::Busy,
        FlexClientError::Raw(RawError::NoMem) => GattStatus::InsufficientResources,
        FlexClientError::Raw(_) | FlexClientError::Gatt(_) | FlexClientError::Timeout => {
            GattStatus::InvalidState
        }
    }
}

struct PendingWrite {
    handle: u16,
    buffer: WriteBuffer,
}

/// Requests go straight to the SoftDevice; at most one write is outstanding.
pub struct SoftdeviceTransport {
    link: Option<Connection>,
    pending_write: Option<PendingWrite>,
    advertise: &'static AdvertiseSignal,
}

impl SoftdeviceTransport {
    pub const fn new(advertise: &'static AdvertiseSignal) -> Self {
        Self {
            link: None,
            pending_write: None,
            advertise,
        }
    }

    pub fn attach(&mut self, link: Connection) {
        self.link = Some(link);
    }

    /// Forget the link, handing back a write payload the stack never
    /// answered.
    pub fn detach(&mut self) -> Option<WriteBuffer> {
        self.link = None;
        self.pending_write.take().map(|pending| pending.buffer)
    }

    fn take_write(&mut self) -> Option<PendingWrite> {
        self.pending_write.take()
    }

    fn link_for(&self, conn: ConnectionId) -> Result<&Connection, GattStatus> {
        self.link
            .as_ref()
            .filter(|link| link.handle() == Some(conn.0))
            .ok_or(GattStatus::NotConnected)
    }
}

impl GattTransport for SoftdeviceTransport {
    fn request_discovery(
        &mut self,
        conn: ConnectionId,
        request: &DiscoveryRequest,
    ) -> Result<(), GattStatus> {
        let link = self.link_for(conn)?;
        let range = request.range;
        let issued = match request.phase {
            DiscoveryPhase::Service => gatt_client::flex_discover_service(
                link,
                range.start,
                Some(Uuid::new_16(request.uuid.0)),
            ),
            DiscoveryPhase::Characteristic => {
                gatt_client::flex_discover_characteristic(link, range.start, range.end)
            }
            DiscoveryPhase::Descriptor => {
                gatt_client::flex_discover_descriptors(link, range.start, range.end)
            }
        };
        issued.map_err(flex_status)
    }

    fn request_write(
        &mut self,
        conn: ConnectionId,
        handle: u16,
        payload: WriteBuffer,
        confirmed: bool,
    ) -> Result<(), WriteRejected> {
        let reject = |status, buffer| Err(WriteRejected { status, buffer });

        // Only write requests get a response to release the buffer on.
        if !confirmed {
            return reject(GattStatus::RequestNotSupported, payload);
        }
        if self.pending_write.is_some() {
            return reject(GattStatus::Busy, payload);
        }
        let link = match self.link_for(conn) {
            Ok(link) => link.clone(),
            Err(status) => return reject(status, payload),
        };

        // The SoftDevice reads the payload in place, so it is parked here
        // before the call and stays put until the write response.
        let pending = self.pending_write.insert(PendingWrite {
            handle,
            buffer: payload,
        });
        if let Err(err) = gatt_client::flex_write(&link, handle, pending.buffer.as_bytes()) {
            if let Some(pending) = self.pending_write.take() {
                return reject(flex_status(err), pending.buffer);
            }
        }
        Ok(())
    }

    fn request_start_advertising(&mut self) -> Result<(), GattStatus> {
        if self.link.is_some() {
            return Err(GattStatus::InvalidState);
        }
        self.advertise.signal(());
        Ok(())
    }
}

/// Flex client callbacks for one link.
pub struct GattBridge<'a, M: RawMutex, S: EventSink> {
    client: &'a SharedClient<M, SoftdeviceTransport, S>,
    link: &'a Connection,
    conn: ConnectionId,
    config: ClientConfig,
}

impl<'a, M: RawMutex, S: EventSink> GattBridge<'a, M, S> {
    pub fn new(
        client: &'a SharedClient<M, SoftdeviceTransport, S>,
        link: &'a Connection,
        conn: ConnectionId,
    ) -> Self {
        let config = client.lock(|c| *c.borrow().config());
        Self {
            client,
            link,
            conn,
            config,
        }
    }

    /// Discovered UUIDs are only forwarded when they are one we search for.
    fn known(&self, uuid: &Uuid) -> Option<Uuid16> {
        [
            self.config.service_uuid,
            self.config.characteristic_uuid,
            self.config.cccd_uuid,
        ]
        .into_iter()
        .find(|known| *uuid == Uuid::new_16(known.0))
    }

    fn with_client<R>(
        &self,
        f: impl FnOnce(&mut CtsClient<SoftdeviceTransport, S>) -> R,
    ) -> R {
        self.client.lock(|c| f(&mut *c.borrow_mut()))
    }

    fn complete(&self, phase: DiscoveryPhase, status: GattStatus) {
        let conn = self.conn;
        self.with_client(|c| {
            c.dispatch(GattEvent::DiscoveryComplete {
                conn,
                phase,
                status,
            })
        });
    }
}

impl<M: RawMutex, S: EventSink> FlexClient for GattBridge<'_, M, S> {
    fn on_exchange_mtu_response(&self, mtu: u16) {
        debug!("ATT MTU {}", mtu);
    }

    fn on_service(&self, data: Service) {
        if let Some(uuid) = self.known(&data.uuid) {
            let conn = self.conn;
            self.with_client(|c| {
                c.dispatch(GattEvent::DiscoveryResult {
                    conn,
                    result: DiscoveryResult::Service {
                        uuid,
                        start_handle: data.start_handle,
                        end_handle: data.end_handle,
                    },
                })
            });
        }
        self.complete(DiscoveryPhase::Service, GattStatus::Success);
    }

    fn on_characteristics(&self, data: impl Iterator<Item = FlexCharacteristic>) {
        let conn = self.conn;
        for characteristic in data {
            let Some(uuid) = self.known(&characteristic.uuid) else {
                continue;
            };
            // The declaration always directly precedes the value.
            let value_handle = characteristic.handle;
            self.with_client(|c| {
                c.dispatch(GattEvent::DiscoveryResult {
                    conn,
                    result: DiscoveryResult::Characteristic {
                        uuid,
                        decl_handle: value_handle.saturating_sub(1),
                        value_handle,
                    },
                })
            });
        }
        self.complete(DiscoveryPhase::Characteristic, GattStatus::Success);
    }

    fn on_descriptors(&self, data: impl Iterator<Item = FlexDescriptor>) {
        let conn = self.conn;
        for descriptor in data {
            let Some(uuid) = self.known(&descriptor.uuid) else {
                continue;
            };
            self.with_client(|c| {
                c.dispatch(GattEvent::DiscoveryResult {
                    conn,
                    result: DiscoveryResult::Descriptor {
                        uuid,
                        handle: descriptor.handle,
                    },
                })
            });
        }
        self.complete(DiscoveryPhase::Descriptor, GattStatus::Success);
    }

    fn on_discovery_failed(&self) {
        // The flex API does not say which procedure failed; only one can be
        // outstanding, so it is whatever the client is waiting on.
        let phase = self.with_client(|c| c.discovery().state().phase());
        if let Some(phase) = phase {
            self.complete(phase, GattStatus::AttributeNotFound);
        }
    }

    fn on_write_response(&self) {
        let conn = self.conn;
        self.with_client(|c| {
            let Some(pending) = c.transport_mut().take_write() else {
                warn!("Write response without a pending write");
                return;
            };
            c.dispatch(GattEvent::WriteComplete {
                conn,
                handle: pending.handle,
                status: GattStatus::Success,
            });
            c.dispatch(GattEvent::BufferTransmitted(pending.buffer));
        });
    }

    fn on_hvx(&self, type_: HvxType, handle: u16, data: &[u8]) {
        if type_ == HvxType::Indication {
            if let Err(e) = gatt_client::flex_hv_confirm(self.link, handle) {
                warn!("Indication confirm failed: {:?}", e);
            }
        }
        let conn = self.conn;
        self.with_client(|c| {
            c.dispatch(GattEvent::Notification {
                conn,
                handle,
                payload: data,
            })
        });
    }
}

/// Advertise whenever the transport asks for it, then serve the resulting
/// link until it drops. Never returns.
pub async fn run_peripheral<M: RawMutex, S: EventSink>(
    sd: &'static Softdevice,
    client: &SharedClient<M, SoftdeviceTransport, S>,
    advertise: &AdvertiseSignal,
) -> ! {
    let adv_data: AdvertisementPayload<31> = AdvertisementBuilder::new()
        .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
        .full_name(DEVICE_NAME)
        .build();
    let scan_data: AdvertisementPayload<4> = AdvertisementBuilder::new().build();
    let adv_config = peripheral::Config::default();

    loop {
        advertise.wait().await;

        let dispatch = |event: GattEvent<'_>| {
            client.lock(|c| c.borrow_mut().dispatch(event));
        };

        dispatch(GattEvent::AdvertisingStateChanged(
            AdvertisingMode::UndirectedHigh,
        ));
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };
        let link = match peripheral::advertise_connectable(sd, adv, &adv_config).await {
            Ok(link) => link,
            Err(e) => {
                warn!("Advertising failed: {:?}", e);
                dispatch(GattEvent::AdvertisingStateChanged(AdvertisingMode::Off));
                continue;
            }
        };
        let Some(handle) = link.handle() else {
            warn!("Link dropped before it could be served");
            dispatch(GattEvent::AdvertisingStateChanged(AdvertisingMode::Off));
            continue;
        };

        let conn = ConnectionId(handle);
        let peer = PeerAddress(link.peer_address().bytes());
        client.lock(|c| {
            let mut c = c.borrow_mut();
            c.transport_mut().attach(link.clone());
            c.dispatch(GattEvent::Connected { peer, conn });
        });

        let bridge = GattBridge::new(client, &link, conn);
        let reason = match gatt_client::run_flex(&link, &bridge).await {
            FlexClientError::Timeout => {
                // A GATT timeout leaves the link unusable.
                let _ = link.disconnect();
                DisconnectReason::LocalHostTerminated
            }
            // The flex loop does not report the HCI reason.
            _ => DisconnectReason::Other(0),
        };

        client.lock(|c| {
            let mut c = c.borrow_mut();
            let unanswered = c.transport_mut().detach();
            c.dispatch(GattEvent::Disconnected { peer, conn, reason });
            if let Some(buffer) = unanswered {
                c.dispatch(GattEvent::BufferTransmitted(buffer));
            }
        });
    }
}
