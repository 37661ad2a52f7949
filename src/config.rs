//! Link sizing and timing configuration

use core::time::Duration;

/// Fixed timing constants for link operation
pub mod timing {
    use core::time::Duration;

    /// Receive inactivity timeout: a partially filled block is flushed after
    /// this long with no new bytes
    pub const RX_INACTIVITY_TIMEOUT: Duration = Duration::from_micros(1_000_000);
    /// Delay before requesting device suspend, letting an in-flight receive
    /// callback complete
    pub const SUSPEND_GRACE: Duration = Duration::from_millis(10);
}

/// Sizing and timing knobs for a [`SerialLink`](crate::SerialLink).
///
/// The defaults mirror a small UART bridge: 64-byte DMA blocks, a three-block
/// pool, and depth-16 packet queues in each direction.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Size of each receive DMA block in bytes
    pub block_size: usize,
    /// Number of blocks in the receive pool.
    ///
    /// Must be at least the maximum number of blocks outstanding at the
    /// driver plus one, so a replacement block can always be supplied on a
    /// buffer request (see [`BlockPool`](crate::BlockPool)).
    pub block_count: usize,
    /// Capacity of the inbound packet queue
    pub rx_queue_depth: usize,
    /// Capacity of the outbound packet queue
    pub tx_queue_depth: usize,
    /// Receive inactivity timeout passed to the driver at enable time
    pub rx_inactivity_timeout: Duration,
    /// Grace delay before an explicit device suspend
    pub suspend_grace: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            block_size: 64,
            block_count: 3,
            rx_queue_depth: 16,
            tx_queue_depth: 16,
            rx_inactivity_timeout: timing::RX_INACTIVITY_TIMEOUT,
            suspend_grace: timing::SUSPEND_GRACE,
        }
    }
}
