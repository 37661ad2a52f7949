//! Driver and bus-stack interfaces
//!
//! The transport does not talk to hardware directly. The asynchronous serial
//! driver sits behind [`SerialDriver`] and reports back through
//! [`DriverEvent`]s; the USB device stack sits behind [`BusControl`] and
//! reports through [`BusEvent`]s. Platform glue implements the traits and
//! routes the events; the test suite substitutes mocks.

use core::time::Duration;

use bitflags::bitflags;

use crate::error::{LinkError, Result};
use crate::pool::Block;

bitflags! {
    /// Modem control line signals exchanged over the emulated serial link.
    ///
    /// `DTR` and `RTS` are driven by the host; `DCD` and `DSR` are driven by
    /// the device in response.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineState: u8 {
        /// Data terminal ready (host)
        const DTR = 1 << 0;
        /// Request to send (host)
        const RTS = 1 << 1;
        /// Data carrier detect (device)
        const DCD = 1 << 2;
        /// Data set ready (device)
        const DSR = 1 << 3;
    }
}

/// Device power states requested by the power controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Normal operating power
    Active,
    /// Low-power state, receive path torn down
    Suspend,
}

/// Events delivered by the serial driver from callback context.
///
/// The handler must not block and must not hold on to `buf` past the call;
/// the borrow makes the latter a compile-time fact.
#[derive(Debug)]
pub enum DriverEvent<'a> {
    /// Received bytes are ready in the active DMA block
    ReceiveReady {
        /// The driver's active DMA block contents
        buf: &'a [u8],
        /// Offset of the newly delivered bytes within `buf`
        offset: usize,
        /// Number of newly delivered bytes
        len: usize,
    },
    /// The driver wants the next DMA target before the active block fills
    ReceiveBufferRequested,
    /// The driver is done with a block; it goes back to the pool
    ReceiveBufferReleased(Block),
    /// The last transmit completed
    TransmitDone {
        /// Number of bytes placed on the wire
        len: usize,
    },
    /// The last transmit was aborted by the driver
    TransmitAborted,
    /// The receive path was disabled
    ReceiveDisabled,
    /// The receive path stopped on a line error
    ReceiveStopped,
}

/// A rejected receive enable, handing the would-be DMA target back.
#[derive(Debug)]
pub struct EnableRejected {
    /// Why the driver refused to enable reception
    pub error: LinkError,
    /// The block that was offered, returned to the caller
    pub block: Block,
}

/// Asynchronous serial driver interface.
///
/// Transmit completion and all receive activity are reported through
/// [`DriverEvent`]s; the methods here only start or stop operations.
pub trait SerialDriver: Send + Sync {
    /// Issue an asynchronous transmit of `data`.
    ///
    /// At most one transmit is in flight at a time; the caller waits for
    /// [`DriverEvent::TransmitDone`] or [`DriverEvent::TransmitAborted`]
    /// before issuing the next.
    fn transmit(&self, data: &[u8]) -> Result<()>;

    /// Enable reception with `block` as the first DMA target.
    ///
    /// The driver flushes a partially filled block after
    /// `inactivity_timeout` with no new bytes. On rejection the block comes
    /// back in the error.
    fn enable_receive(
        &self,
        block: Block,
        inactivity_timeout: Duration,
    ) -> core::result::Result<(), EnableRejected>;

    /// Disable the receive path.
    ///
    /// Blocks still held by the driver are returned afterwards through
    /// [`DriverEvent::ReceiveBufferReleased`].
    fn disable_receive(&self) -> Result<()>;

    /// Hand the driver its next DMA target, answering
    /// [`DriverEvent::ReceiveBufferRequested`]
    fn supply_receive_buffer(&self, block: Block) -> Result<()>;

    /// Request a device power state change
    fn set_power(&self, state: PowerState) -> Result<()>;

    /// Whether the platform power-manages the device automatically.
    ///
    /// When true, [`set_power`](Self::set_power) is never called; the device
    /// suspends and resumes on its own once the receive path is down.
    fn runtime_power_managed(&self) -> bool {
        false
    }
}

/// Bus-level connection events from the USB device stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// Cable plugged in, bus power present
    CableConnected,
    /// Cable removed, bus power gone
    CableRemoved,
    /// Host selected a configuration; zero means deconfigured
    ConfigurationChanged(u8),
    /// Bus reset, re-enumeration follows
    Reset,
    /// Host suspended the bus
    Suspend,
    /// Host resumed the bus
    Resume,
    /// Host changed the control line state (DTR/RTS)
    ControlLineStateChanged,
    /// Host changed the line coding (bit rate, framing)
    LineCodingChanged,
}

/// USB device stack interface consumed by the connection state machine
pub trait BusControl: Send + Sync {
    /// Enable the device stack.
    ///
    /// A [`LinkError::Timeout`] usually means the cable went away before the
    /// enable took effect; the connection monitor tolerates it and leaves
    /// the stack disabled until the next plug event.
    fn enable(&self) -> Result<()>;

    /// Disable the device stack
    fn disable(&self) -> Result<()>;

    /// Read the host-driven control lines (DTR, RTS)
    fn line_state(&self) -> Result<LineState>;

    /// Assert or deassert device-driven control lines (DCD, DSR)
    fn set_line_state(&self, lines: LineState, asserted: bool) -> Result<()>;

    /// Read the active bit rate from the current line coding
    fn bit_rate(&self) -> Result<u32>;
}
