#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Asynchronous serial transport link for UART and USB-CDC-ACM devices
//!
//! This crate moves bytes between an asynchronous serial driver and
//! application code, bridging driver-callback context to worker-thread
//! context with owned buffers, while a hierarchical state machine tracks the
//! USB connection lifecycle and adapts link behavior to it.
//!
//! # Core Components
//!
//! - [`pool`] - Fixed-count pool of receive DMA blocks with by-value handles
//! - [`transport`] - Receive/transmit pipelines: bounded packet queues,
//!   completion synchronization, and the worker threads that drain them
//! - [`power`] - Suspend/resume of the receive path
//! - [`connection`] - Connection state machine over bus events, with virtual
//!   modem-control signal mirroring
//! - [`driver`] - The [`SerialDriver`] and [`BusControl`] seams platform glue
//!   implements, and the events it delivers
//! - [`framing`] - CR-LF frame assembly for consumers that want line-shaped
//!   packets
//!
//! # Usage
//!
//! Platform glue owns a [`SerialDriver`] implementation and routes its
//! callbacks into [`SerialLink::on_driver_event`]; bus-stack glue routes
//! connection events into [`ConnectionMonitor::handle`]. Application code
//! sees only [`SerialLink::register_consumer`], [`SerialLink::transmit`],
//! and the suspend/resume pair:
//!
//! ```no_run
//! use std::sync::Arc;
//! use uart_link::{LinkConfig, SerialLink};
//!
//! # fn wire(driver: Arc<dyn uart_link::SerialDriver>) -> uart_link::Result<()> {
//! let link = SerialLink::start(driver, LinkConfig::default())?;
//! link.register_consumer(|bytes| {
//!     // runs on the receive worker thread; blocking is fine here
//!     println!("{} bytes in", bytes.len());
//! });
//! link.transmit(b"UART EXAMPLE START\r\n")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod framing;
mod line;
pub mod pool;
pub mod power;
pub mod transport;

pub use config::{timing, LinkConfig};
pub use connection::{ConnectionMonitor, ConnectionState};
pub use driver::{
    BusControl, BusEvent, DriverEvent, EnableRejected, LineState, PowerState, SerialDriver,
};
pub use error::{LinkError, Result};
pub use framing::LineAssembler;
pub use pool::{Block, BlockPool, PoolStats};
pub use power::PowerController;
pub use transport::SerialLink;
