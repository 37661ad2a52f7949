//! Receive path power control
//!
//! Suspends and resumes the receive side of the link in step with the
//! device's power state. On platforms with runtime device power management
//! the device handles its own power transitions and only the receive path is
//! touched; otherwise the controller requests the power state explicitly.

use std::sync::Arc;
use std::thread;

use core::time::Duration;

use log::error;

use crate::config::LinkConfig;
use crate::driver::{PowerState, SerialDriver};
use crate::error::{LinkError, Result};
use crate::pool::BlockPool;

/// Suspend/resume coordinator for the receive path.
///
/// Owned by [`SerialLink`](crate::SerialLink); every failure is reported to
/// the caller and never retried here.
pub struct PowerController {
    driver: Arc<dyn SerialDriver>,
    pool: Arc<BlockPool>,
    rx_inactivity_timeout: Duration,
    suspend_grace: Duration,
}

impl PowerController {
    pub(crate) fn new(
        driver: Arc<dyn SerialDriver>,
        pool: Arc<BlockPool>,
        config: &LinkConfig,
    ) -> Self {
        Self {
            driver,
            pool,
            rx_inactivity_timeout: config.rx_inactivity_timeout,
            suspend_grace: config.suspend_grace,
        }
    }

    /// Disable reception and, without runtime power management, put the
    /// device in low power after a short grace delay.
    ///
    /// Blocks still held by the driver come back through
    /// [`DriverEvent::ReceiveBufferReleased`](crate::DriverEvent::ReceiveBufferReleased)
    /// while the disable takes effect.
    pub fn suspend(&self) -> Result<()> {
        self.driver.disable_receive().map_err(|err| {
            error!("failed to disable rx: {err}");
            err
        })?;

        if !self.driver.runtime_power_managed() {
            // Give an in-flight receive callback time to complete.
            thread::sleep(self.suspend_grace);
            self.driver.set_power(PowerState::Suspend).map_err(|err| {
                error!("failed to suspend device: {err}");
                err
            })?;
        }

        Ok(())
    }

    /// Wake the device if needed, then re-enable reception with a fresh pool
    /// block and the configured inactivity timeout.
    ///
    /// A rejected enable hands its block back and the block returns to the
    /// pool before the error is reported.
    pub fn resume(&self) -> Result<()> {
        if !self.driver.runtime_power_managed() {
            self.driver.set_power(PowerState::Active).map_err(|err| {
                error!("failed to resume device: {err}");
                err
            })?;
        }

        let Some(block) = self.pool.acquire() else {
            error!("no free block to resume reception");
            return Err(LinkError::Exhausted);
        };

        if let Err(rejected) = self.driver.enable_receive(block, self.rx_inactivity_timeout) {
            error!("failed to re-enable reception: {}", rejected.error);
            self.pool.release(rejected.block);
            return Err(rejected.error);
        }

        Ok(())
    }
}
