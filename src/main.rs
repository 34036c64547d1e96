//! nRF52840 firmware: Current Time Service client.
//!
//! Press button 1 to start advertising. Once a peer connects, its Current
//! Time Service is discovered; each further press toggles time
//! notifications. Received times are printed over RTT.

#![no_std]
#![no_main]

use core::cell::RefCell;

use cts_client::ble::client::{CtsClient, SharedClient};
use cts_client::ble::event::{ChannelSink, ClientEvent};
use cts_client::ble::softdevice::{self, AdvertiseSignal, SoftdeviceTransport};
use cts_client::config::{ClientConfig, CLIENT_EVENT_QUEUE_DEPTH};
use cts_client::ui::buttons::button_task;
use cts_client::ui::trigger::{self, UserTrigger};
use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Pin};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::Softdevice;
use panic_probe as _;
use static_cell::StaticCell;

type EventChannel = Channel<CriticalSectionRawMutex, ClientEvent, CLIENT_EVENT_QUEUE_DEPTH>;
type Sink = ChannelSink<'static, CriticalSectionRawMutex, CLIENT_EVENT_QUEUE_DEPTH>;
type Client = SharedClient<CriticalSectionRawMutex, SoftdeviceTransport, Sink>;

static ADVERTISE: AdvertiseSignal = AdvertiseSignal::new();
static TRIGGER: UserTrigger = UserTrigger::new();
static EVENTS: EventChannel = Channel::new();
static CLIENT: StaticCell<Client> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("CTS client starting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    let sd: &'static Softdevice = softdevice::enable_softdevice();

    let client: &'static Client = CLIENT.init(Mutex::new(RefCell::new(CtsClient::new(
        ClientConfig::default(),
        SoftdeviceTransport::new(&ADVERTISE),
        ChannelSink::new(&EVENTS),
    ))));

    spawner.must_spawn(softdevice_task(sd));
    spawner.must_spawn(peripheral_task(sd, client));
    spawner.must_spawn(worker_task(client));
    spawner.must_spawn(reporter_task());
    // Button 1 on the nRF52840 DK.
    spawner.must_spawn(button(p.P0_11.degrade()));

    info!("Press button 1 to start advertising");
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn peripheral_task(sd: &'static Softdevice, client: &'static Client) -> ! {
    softdevice::run_peripheral(sd, client, &ADVERTISE).await
}

#[embassy_executor::task]
async fn worker_task(client: &'static Client) -> ! {
    trigger::run_worker(&TRIGGER, client).await
}

#[embassy_executor::task]
async fn button(pin: AnyPin) -> ! {
    button_task(pin, &TRIGGER).await
}

#[embassy_executor::task]
async fn reporter_task() -> ! {
    loop {
        match EVENTS.receive().await {
            ClientEvent::Connected(peer) => info!("Connected to {}", peer),
            ClientEvent::Disconnected(reason) => {
                info!("Disconnected: {}", reason.name());
                info!("Press button 1 to advertise again");
            }
            ClientEvent::AdvertisingChanged(mode) => info!("Advertising: {}", mode),
            ClientEvent::ServiceReady => {
                info!("Current Time Service found; press button 1 to toggle notifications")
            }
            ClientEvent::ServiceNotFound(phase) => {
                warn!("Current Time Service not found ({} discovery)", phase)
            }
            ClientEvent::NotificationsChanged(true) => info!("Time notifications enabled"),
            ClientEvent::NotificationsChanged(false) => info!("Time notifications disabled"),
            ClientEvent::CccdUpdateFailed(status) => {
                warn!("Could not update notification state: {}", status.name())
            }
            ClientEvent::TimeReceived(time) => {
                info!(
                    "Date: {=u16}/{=u8:02}/{=u8:02} Time: {=u8:02}:{=u8:02}:{=u8:02} ({=u8}/256)",
                    time.year,
                    time.month,
                    time.day,
                    time.hours,
                    time.minutes,
                    time.seconds,
                    time.fractions_256
                );
                info!("Day of week: {}", time.day_of_week.name());
                if time.adjust_reason.is_empty() {
                    info!("Adjust reason: none");
                }
                for reason in time.adjust_reason.describe() {
                    info!("Adjust reason: {}", reason);
                }
            }
            ClientEvent::MalformedTime(e) => warn!("Malformed time notification: {}", e),
        }
    }
}
