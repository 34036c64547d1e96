//! Discovery State Machine.
//!
//! ```text
//! Idle -> ServiceDiscovery -> CharacteristicDiscovery -> DescriptorDiscovery -> Complete
//! ```
//!
//! Result events only fill in [`ServiceHandles`]; the next request is issued
//! when the stack reports the current phase complete. A phase that ends
//! without its attribute stops the machine in `Idle`. Nothing is retried
//! unless the [`RetryPolicy`] allows it, and only failed completions are
//! retried, never missing attributes.

use crate::ble::event::DiscoveryResult;
use crate::ble::transport::{DiscoveryRequest, GattTransport};
use crate::ble::{ConnectionId, DiscoveryPhase, GattStatus, HandleRange};
use crate::config::{ClientConfig, RetryPolicy, FULL_HANDLE_RANGE};
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    #[default]
    Idle,
    ServiceDiscovery,
    CharacteristicDiscovery,
    DescriptorDiscovery,
    Complete,
}

impl DiscoveryState {
    /// Phase awaiting completion, if any.
    pub fn phase(self) -> Option<DiscoveryPhase> {
        match self {
            DiscoveryState::ServiceDiscovery => Some(DiscoveryPhase::Service),
            DiscoveryState::CharacteristicDiscovery => Some(DiscoveryPhase::Characteristic),
            DiscoveryState::DescriptorDiscovery => Some(DiscoveryPhase::Descriptor),
            DiscoveryState::Idle | DiscoveryState::Complete => None,
        }
    }

    fn awaiting(phase: DiscoveryPhase) -> Self {
        match phase {
            DiscoveryPhase::Service => DiscoveryState::ServiceDiscovery,
            DiscoveryPhase::Characteristic => DiscoveryState::CharacteristicDiscovery,
            DiscoveryPhase::Descriptor => DiscoveryState::DescriptorDiscovery,
        }
    }
}

/// Handles found on the peer. Only trustworthy once `service_found` is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceHandles {
    pub start_handle: Option<u16>,
    pub end_handle: Option<u16>,
    pub char_decl_handle: Option<u16>,
    pub char_value_handle: Option<u16>,
    pub cccd_handle: Option<u16>,
    pub service_found: bool,
}

impl ServiceHandles {
    /// CCCD handle, once discovery has completed.
    pub fn cccd(&self) -> Option<u16> {
        self.cccd_handle.filter(|_| self.service_found)
    }

    /// Current Time value handle, once discovery has completed.
    pub fn value(&self) -> Option<u16> {
        self.char_value_handle.filter(|_| self.service_found)
    }

    fn service_range(&self) -> Option<HandleRange> {
        HandleRange::checked(self.start_handle?, self.end_handle?)
    }

    /// Everything after the value handle up to the end of the service.
    fn descriptor_range(&self) -> Option<HandleRange> {
        let value = self.char_value_handle?;
        HandleRange::checked(value.checked_add(1)?, self.end_handle?)
    }
}

/// What a discovery step led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryProgress {
    /// A request for this phase is outstanding.
    Requested(DiscoveryPhase),
    /// CCCD located.
    Ready,
    /// This phase ended without its attribute; the machine is idle.
    Stopped(DiscoveryPhase),
}

#[derive(Debug)]
pub struct DiscoveryMachine {
    config: ClientConfig,
    state: DiscoveryState,
    handles: ServiceHandles,
    last_request: Option<DiscoveryRequest>,
    retries_left: u8,
}

impl DiscoveryMachine {
    pub const fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: DiscoveryState::Idle,
            handles: ServiceHandles {
                start_handle: None,
                end_handle: None,
                char_decl_handle: None,
                char_value_handle: None,
                cccd_handle: None,
                service_found: false,
            },
            last_request: None,
            retries_left: 0,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn handles(&self) -> &ServiceHandles {
        &self.handles
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    /// Drop everything learned about the peer.
    pub fn reset(&mut self) {
        self.state = DiscoveryState::Idle;
        self.handles = ServiceHandles::default();
        self.last_request = None;
        self.retries_left = 0;
    }

    /// Reset and search the whole handle space for the service.
    pub fn start<T: GattTransport>(
        &mut self,
        conn: ConnectionId,
        transport: &mut T,
    ) -> Result<DiscoveryProgress, Error> {
        self.reset();
        info!("Service discovery started");
        self.request(
            conn,
            transport,
            DiscoveryRequest {
                phase: DiscoveryPhase::Service,
                range: FULL_HANDLE_RANGE,
                uuid: self.config.service_uuid,
            },
        )
    }

    /// Record a matched attribute.
    ///
    /// Returns `Ok(false)` when the result is for the current phase but not
    /// for the attribute being looked for.
    pub fn on_result(&mut self, result: &DiscoveryResult) -> Result<bool, Error> {
        let expected = self.state.phase();
        if expected != Some(result.phase()) {
            return Err(Error::UnexpectedPhase {
                expected,
                got: result.phase(),
            });
        }

        match *result {
            DiscoveryResult::Service {
                uuid,
                start_handle,
                end_handle,
            } => {
                if uuid != self.config.service_uuid || self.handles.start_handle.is_some() {
                    return Ok(false);
                }
                info!(
                    "Service found: start handle {} end handle {}",
                    start_handle, end_handle
                );
                self.handles.start_handle = Some(start_handle);
                self.handles.end_handle = Some(end_handle);
            }
            DiscoveryResult::Characteristic {
                uuid,
                decl_handle,
                value_handle,
            } => {
                if uuid != self.config.characteristic_uuid
                    || self.handles.char_value_handle.is_some()
                {
                    return Ok(false);
                }
                info!(
                    "Characteristic found: decl handle {} value handle {}",
                    decl_handle, value_handle
                );
                self.handles.char_decl_handle = Some(decl_handle);
                self.handles.char_value_handle = Some(value_handle);
            }
            DiscoveryResult::Descriptor { uuid, handle } => {
                if uuid != self.config.cccd_uuid || self.handles.cccd_handle.is_some() {
                    return Ok(false);
                }
                info!("CCCD found: handle {}", handle);
                self.handles.cccd_handle = Some(handle);
            }
        }
        Ok(true)
    }

    /// Advance after the stack reports `phase` complete.
    pub fn on_complete<T: GattTransport>(
        &mut self,
        conn: ConnectionId,
        phase: DiscoveryPhase,
        status: GattStatus,
        transport: &mut T,
    ) -> Result<DiscoveryProgress, Error> {
        let expected = self.state.phase();
        if expected != Some(phase) {
            return Err(Error::UnexpectedPhase {
                expected,
                got: phase,
            });
        }

        // "Attribute not found" is how an empty search ends.
        if !status.is_success() && status != GattStatus::AttributeNotFound {
            warn!("{:?} discovery failed: {}", phase, status.name());
            if let Some(request) = self.last_request.filter(|_| self.retries_left > 0) {
                self.retries_left -= 1;
                debug!("Retrying {:?} discovery", phase);
                return self.issue(conn, transport, request);
            }
            return Ok(self.stop(phase));
        }

        match phase {
            DiscoveryPhase::Service => match self.handles.service_range() {
                Some(range) => self.request(
                    conn,
                    transport,
                    DiscoveryRequest {
                        phase: DiscoveryPhase::Characteristic,
                        range,
                        uuid: self.config.characteristic_uuid,
                    },
                ),
                None => Ok(self.stop(phase)),
            },
            DiscoveryPhase::Characteristic => match self.handles.descriptor_range() {
                Some(range) => self.request(
                    conn,
                    transport,
                    DiscoveryRequest {
                        phase: DiscoveryPhase::Descriptor,
                        range,
                        uuid: self.config.cccd_uuid,
                    },
                ),
                None => Ok(self.stop(phase)),
            },
            DiscoveryPhase::Descriptor => {
                if self.handles.cccd_handle.is_none() {
                    return Ok(self.stop(phase));
                }
                self.handles.service_found = true;
                self.state = DiscoveryState::Complete;
                self.last_request = None;
                info!("Current Time Service ready");
                Ok(DiscoveryProgress::Ready)
            }
        }
    }

    /// Issue the first request of a phase with a fresh retry budget.
    fn request<T: GattTransport>(
        &mut self,
        conn: ConnectionId,
        transport: &mut T,
        request: DiscoveryRequest,
    ) -> Result<DiscoveryProgress, Error> {
        self.retries_left = self.config.retry.max_retries;
        self.issue(conn, transport, request)
    }

    fn issue<T: GattTransport>(
        &mut self,
        conn: ConnectionId,
        transport: &mut T,
        request: DiscoveryRequest,
    ) -> Result<DiscoveryProgress, Error> {
        match transport.request_discovery(conn, &request) {
            Ok(()) => {
                self.state = DiscoveryState::awaiting(request.phase);
                self.last_request = Some(request);
                Ok(DiscoveryProgress::Requested(request.phase))
            }
            Err(status) => {
                error!(
                    "{:?} discovery request rejected: {}",
                    request.phase,
                    status.name()
                );
                self.state = DiscoveryState::Idle;
                self.last_request = None;
                Err(Error::Rejected(status))
            }
        }
    }

    fn stop(&mut self, phase: DiscoveryPhase) -> DiscoveryProgress {
        warn!("{:?} discovery ended without a match; stopping", phase);
        self.state = DiscoveryState::Idle;
        self.last_request = None;
        DiscoveryProgress::Stopped(phase)
    }
}
