//! Transport pipelines
//!
//! [`SerialLink`] is the one context object tying the transport together:
//! the receive block pool, the bounded packet queues in each direction, the
//! transmit completion signal, and the registered consumer. Driver callbacks
//! enter through [`SerialLink::on_driver_event`] and never block; the two
//! worker threads own the consuming ends of the queues and do all the
//! blocking work.
//!
//! Payloads cross the callback/thread boundary as packets, owned copies that
//! are moved into a queue once and out once. A pool
//! [`Block`](crate::pool::Block) is never queued; its contents are copied out
//! while the driver callback is still on the stack, because the driver may
//! reclaim the block as soon as the callback returns.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::driver::{DriverEvent, SerialDriver};
use crate::error::{LinkError, Result};
use crate::pool::{BlockPool, PoolStats};
use crate::power::PowerController;

/// An owned unit of payload moved between callback and thread context.
///
/// Created by copy, consumed (and freed) by exactly one worker.
struct Packet {
    data: Box<[u8]>,
}

impl Packet {
    /// Copy `bytes` into a fresh packet without assuming the allocation
    /// succeeds
    fn copy_from(bytes: &[u8]) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|_| LinkError::AllocationFailure)?;
        data.extend_from_slice(bytes);
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

type Consumer = Arc<dyn Fn(&[u8]) + Send + Sync>;
type ConsumerSlot = Arc<Mutex<Option<Consumer>>>;

/// Asynchronous serial transport link.
///
/// Constructed once per device with [`start`](SerialLink::start), which
/// enables reception and spawns the worker threads. Dropping the link
/// disconnects the queues and the workers run off the end;
/// [`shutdown`](SerialLink::shutdown) additionally waits for them.
pub struct SerialLink {
    driver: Arc<dyn SerialDriver>,
    pool: Arc<BlockPool>,
    power: PowerController,
    /// Producer end of the inbound packet queue
    rx_submit: Sender<Packet>,
    /// Producer end of the outbound packet queue
    tx_submit: Sender<Packet>,
    /// Give side of the transmit completion signal
    tx_done: Sender<()>,
    consumer: ConsumerSlot,
    rx_worker: Option<JoinHandle<()>>,
    tx_worker: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Build the link, enable reception with an initial pool block, and
    /// spawn the receive and transmit workers.
    pub fn start(driver: Arc<dyn SerialDriver>, config: LinkConfig) -> Result<Self> {
        let pool = Arc::new(BlockPool::new(config.block_size, config.block_count));
        let (rx_submit, rx_drain) = bounded(config.rx_queue_depth);
        let (tx_submit, tx_drain) = bounded(config.tx_queue_depth);
        let (tx_done, tx_done_wait) = bounded(1);
        let consumer: ConsumerSlot = Arc::new(Mutex::new(None));

        // Reception runs from here on; the driver asks for replacement
        // blocks through ReceiveBufferRequested events.
        let block = pool.acquire().ok_or(LinkError::Exhausted)?;
        if let Err(rejected) = driver.enable_receive(block, config.rx_inactivity_timeout) {
            error!("failed to enable reception: {}", rejected.error);
            pool.release(rejected.block);
            return Err(rejected.error);
        }

        let rx_handle = thread::Builder::new()
            .name("uart-link-rx".into())
            .spawn({
                let consumer = Arc::clone(&consumer);
                move || run_rx_worker(rx_drain, consumer)
            })
            .map_err(|err| {
                error!("failed to spawn receive worker: {err}");
                LinkError::Device
            })?;

        let tx_handle = thread::Builder::new()
            .name("uart-link-tx".into())
            .spawn({
                let driver = Arc::clone(&driver);
                move || run_tx_worker(tx_drain, driver, tx_done_wait)
            })
            .map_err(|err| {
                error!("failed to spawn transmit worker: {err}");
                LinkError::Device
            })?;

        let power = PowerController::new(Arc::clone(&driver), Arc::clone(&pool), &config);

        Ok(Self {
            driver,
            pool,
            power,
            rx_submit,
            tx_submit,
            tx_done,
            consumer,
            rx_worker: Some(rx_handle),
            tx_worker: Some(tx_handle),
        })
    }

    /// Register the packet consumer, replacing any previous registration.
    ///
    /// The callback runs on the receive worker thread and may block. While
    /// no consumer is registered, received packets are dropped with a
    /// warning.
    pub fn register_consumer<F>(&self, consumer: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let previous = self.consumer.lock().unwrap().replace(Arc::new(consumer));
        if previous.is_some() {
            info!("replacing registered packet consumer");
        }
    }

    /// Queue `bytes` for transmission and return immediately.
    ///
    /// The input is copied; the caller keeps its buffer. Rejects empty input
    /// with [`LinkError::InvalidArgument`] and reports a full outbound queue
    /// as [`LinkError::QueueFull`].
    pub fn transmit(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            warn!("rejecting empty transmit");
            return Err(LinkError::InvalidArgument);
        }

        let packet = Packet::copy_from(bytes).map_err(|err| {
            error!("failed to allocate tx packet for {} bytes", bytes.len());
            err
        })?;

        match self.tx_submit.try_send(packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                error!("tx queue full, dropping {} bytes", bytes.len());
                Err(LinkError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("transmit worker unavailable");
                Err(LinkError::Device)
            }
        }
    }

    /// Tear down the receive path and put the device in low power.
    ///
    /// See [`PowerController::suspend`].
    pub fn suspend(&self) -> Result<()> {
        self.power.suspend()
    }

    /// Wake the device and re-enable reception with a fresh pool block.
    ///
    /// See [`PowerController::resume`].
    pub fn resume(&self) -> Result<()> {
        self.power.resume()
    }

    /// Receive block pool utilization
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Driver-facing event entry point, called from callback context.
    ///
    /// Must not block; every arm here either hands off through a
    /// non-blocking queue operation or does brief pool bookkeeping.
    pub fn on_driver_event(&self, event: DriverEvent<'_>) {
        match event {
            DriverEvent::ReceiveReady { buf, offset, len } => {
                let chunk = offset.checked_add(len).and_then(|end| buf.get(offset..end));
                match chunk {
                    Some(chunk) => self.receive_ready(chunk),
                    None => error!(
                        "rx range {}+{} out of bounds for {} byte block",
                        offset,
                        len,
                        buf.len()
                    ),
                }
            }
            DriverEvent::ReceiveBufferRequested => self.replenish_receive_buffer(),
            DriverEvent::ReceiveBufferReleased(block) => {
                debug!("rx block {} released", block.slot());
                self.pool.release(block);
            }
            DriverEvent::TransmitDone { len } => {
                debug!("tx done, {len} bytes");
                let _ = self.tx_done.try_send(());
            }
            DriverEvent::TransmitAborted => {
                warn!("tx aborted");
                let _ = self.tx_done.try_send(());
            }
            DriverEvent::ReceiveDisabled => info!("rx disabled"),
            DriverEvent::ReceiveStopped => warn!("rx stopped"),
        }
    }

    /// Copy delivered bytes out of the driver's block and queue them.
    ///
    /// The block may be reclaimed the moment the callback returns, so the
    /// copy happens here, not in the worker.
    fn receive_ready(&self, chunk: &[u8]) {
        debug!("rx ready, {} bytes", chunk.len());

        let packet = match Packet::copy_from(chunk) {
            Ok(packet) => packet,
            Err(_) => {
                error!("failed to allocate rx packet, dropping {} bytes", chunk.len());
                return;
            }
        };

        match self.rx_submit.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => error!("rx queue full, dropping {} bytes", chunk.len()),
            Err(TrySendError::Disconnected(_)) => warn!("receive worker unavailable, dropping packet"),
        }
    }

    /// Hand the driver its next DMA target.
    ///
    /// The pool is sized so a free block always exists here (see
    /// [`BlockPool`]); running dry is a sizing bug and fatal by design.
    fn replenish_receive_buffer(&self) {
        debug!("rx buffer request");
        let Some(block) = self.pool.acquire() else {
            panic!(
                "receive pool exhausted on buffer request: \
                 pool must hold one more block than the driver keeps outstanding"
            );
        };
        if let Err(err) = self.driver.supply_receive_buffer(block) {
            panic!("driver rejected replacement receive buffer: {err}");
        }
    }

    /// Disconnect the queues and wait for both workers to exit
    pub fn shutdown(mut self) {
        let rx_handle = self.rx_worker.take();
        let tx_handle = self.tx_worker.take();
        drop(self);
        for handle in [rx_handle, tx_handle].into_iter().flatten() {
            let _ = handle.join();
        }
    }
}

/// Receive worker: drain the inbound queue and hand packets to the consumer.
///
/// Runs until the producing side of the queue is dropped. The consumer is
/// invoked with no lock held, so it is free to block or call back into the
/// link.
fn run_rx_worker(inbound: Receiver<Packet>, consumer: ConsumerSlot) {
    while let Ok(packet) = inbound.recv() {
        let callback = current_consumer(&consumer);
        let Some(callback) = callback else {
            warn!("no consumer registered, dropping {} byte packet", packet.len());
            continue;
        };
        debug!("delivering {} bytes: {:02x?}", packet.len(), packet.as_slice());
        callback(packet.as_slice());
    }
    debug!("receive worker exiting");
}

/// Clone the registered consumer out of its slot, holding the lock only for
/// the clone
fn current_consumer(slot: &ConsumerSlot) -> Option<Consumer> {
    slot.lock().unwrap().clone()
}

/// Transmit worker: issue packets to the driver one at a time.
///
/// After a successful issue the worker parks on the completion signal, which
/// callback context gives on `TransmitDone` or `TransmitAborted`; the next
/// packet is never issued before then.
fn run_tx_worker(outbound: Receiver<Packet>, driver: Arc<dyn SerialDriver>, done: Receiver<()>) {
    while let Ok(packet) = outbound.recv() {
        if let Err(err) = driver.transmit(packet.as_slice()) {
            error!("failed to issue transmit: {err}");
            continue;
        }
        if done.recv().is_err() {
            // Link torn down mid-transmit; abandon the wait.
            break;
        }
    }
    debug!("transmit worker exiting");
}
