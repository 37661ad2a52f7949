//! USB connection state machine
//!
//! Tracks the physical connection lifecycle across four states:
//!
//! ```text
//! Disconnected        Connected
//!                    /         \
//!              Configured   Suspended
//! ```
//!
//! `Configured` and `Suspended` are children of `Connected`: a per-state run
//! function either handles an event or propagates it, and a propagated event
//! is re-run against the parent state. Cable removal is handled once at
//! `Connected` and thereby covers both children.
//!
//! The monitor owns the enable/disable decision for the device stack and
//! drives the line control bridge while configured. Event delivery takes
//! `&mut self`, so one event is processed at a time by construction.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::driver::{BusControl, BusEvent};
use crate::error::LinkError;
use crate::line;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// No cable; waiting for bus power
    Disconnected,
    /// Cable present; waiting for enumeration
    Connected,
    /// Enumeration complete; data transfer possible
    Configured,
    /// Host suspended the bus
    Suspended,
}

/// Result of running one state's handler against an event
enum Outcome {
    /// Event consumed; dispatch stops
    Handled,
    /// Event not handled here; re-run against the parent state
    Propagate,
}

/// Parent lookup encoding the state hierarchy
const fn parent(state: ConnectionState) -> Option<ConnectionState> {
    match state {
        ConnectionState::Configured | ConnectionState::Suspended => {
            Some(ConnectionState::Connected)
        }
        ConnectionState::Disconnected | ConnectionState::Connected => None,
    }
}

/// Hierarchical state machine over bus-level connection events.
///
/// One monitor exists per device; it is driven from a single dispatch
/// context and its handlers never block.
pub struct ConnectionMonitor {
    bus: Arc<dyn BusControl>,
    state: ConnectionState,
    device_enabled: bool,
}

impl ConnectionMonitor {
    /// Create a monitor in `Disconnected` with the device stack disabled
    pub fn new(bus: Arc<dyn BusControl>) -> Self {
        Self {
            bus,
            state: ConnectionState::Disconnected,
            device_enabled: false,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the device stack is currently enabled
    pub fn device_enabled(&self) -> bool {
        self.device_enabled
    }

    /// Deliver one bus event.
    ///
    /// The event runs against the current state's handler and climbs the
    /// hierarchy while handlers propagate; an event no state handles is
    /// logged and dropped.
    pub fn handle(&mut self, event: BusEvent) {
        debug!("bus event {:?} in {:?}", event, self.state);

        let mut at = self.state;
        loop {
            let outcome = match at {
                ConnectionState::Disconnected => self.run_disconnected(event),
                ConnectionState::Connected => self.run_connected(event),
                ConnectionState::Configured => self.run_configured(event),
                ConnectionState::Suspended => self.run_suspended(event),
            };
            match outcome {
                Outcome::Handled => return,
                Outcome::Propagate => match parent(at) {
                    Some(up) => at = up,
                    None => {
                        warn!("unexpected event {:?} in {:?}", event, self.state);
                        return;
                    }
                },
            }
        }
    }

    /// Waiting for the cable to be plugged in
    fn run_disconnected(&mut self, event: BusEvent) -> Outcome {
        match event {
            BusEvent::CableConnected => {
                self.state = ConnectionState::Connected;
                self.enable_device();
                Outcome::Handled
            }
            _ => Outcome::Propagate,
        }
    }

    /// Cable present; also the shared handler for both child states
    fn run_connected(&mut self, event: BusEvent) -> Outcome {
        match event {
            BusEvent::CableRemoved => {
                self.state = ConnectionState::Disconnected;
                self.disable_device();
                Outcome::Handled
            }
            BusEvent::ConfigurationChanged(value) => {
                info!("configuration value {value}");
                if value != 0 {
                    self.state = ConnectionState::Configured;
                }
                Outcome::Handled
            }
            BusEvent::Reset => {
                // Re-enumeration follows; stay put.
                debug!("bus reset while awaiting enumeration");
                Outcome::Handled
            }
            _ => Outcome::Propagate,
        }
    }

    /// Enumerated and ready for data transfer
    fn run_configured(&mut self, event: BusEvent) -> Outcome {
        match event {
            BusEvent::Suspend => {
                self.state = ConnectionState::Suspended;
                Outcome::Handled
            }
            BusEvent::Reset => {
                self.state = ConnectionState::Connected;
                Outcome::Handled
            }
            BusEvent::ConfigurationChanged(value) => {
                debug!("configuration value {value}");
                if value == 0 {
                    self.state = ConnectionState::Connected;
                }
                Outcome::Handled
            }
            BusEvent::ControlLineStateChanged => {
                line::sync_modem_signals(self.bus.as_ref());
                Outcome::Handled
            }
            BusEvent::LineCodingChanged => {
                line::log_line_coding(self.bus.as_ref());
                Outcome::Handled
            }
            _ => Outcome::Propagate,
        }
    }

    /// Bus suspended by the host
    fn run_suspended(&mut self, event: BusEvent) -> Outcome {
        match event {
            BusEvent::Resume => {
                self.state = ConnectionState::Configured;
                Outcome::Handled
            }
            BusEvent::Reset => {
                // Straight back to Connected; re-enumeration delivers a
                // fresh ConfigurationChanged that revisits Configured.
                self.state = ConnectionState::Connected;
                Outcome::Handled
            }
            _ => Outcome::Propagate,
        }
    }

    /// Enable the device stack once.
    ///
    /// A timeout usually means the cable went away before the enable took
    /// effect; the stack stays disabled until the next plug event.
    fn enable_device(&mut self) {
        if self.device_enabled {
            return;
        }
        match self.bus.enable() {
            Ok(()) => {
                info!("device stack enabled");
                self.device_enabled = true;
            }
            Err(LinkError::Timeout) => warn!("device stack enable timed out"),
            Err(err) => error!("failed to enable device stack: {err}"),
        }
    }

    /// Disable the device stack once; the flag clears even if the driver
    /// reports a failure, matching the plug-event retry path
    fn disable_device(&mut self) {
        if !self.device_enabled {
            return;
        }
        self.device_enabled = false;
        match self.bus.disable() {
            Ok(()) => info!("device stack disabled"),
            Err(err) => error!("failed to disable device stack: {err}"),
        }
    }
}
