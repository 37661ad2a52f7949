//! Mock serial driver and bus stack for testing without real hardware
//!
//! Both mocks record every call and can be scripted to fail the next
//! operation, which is how the error paths of the power controller and the
//! connection monitor are exercised.

use std::sync::Mutex;
use std::time::Duration;

use uart_link::{
    Block, BusControl, EnableRejected, LineState, LinkError, PowerState, Result, SerialDriver,
};

#[derive(Default)]
struct DriverState {
    rx_enabled: bool,
    rx_timeout: Option<Duration>,
    /// Blocks currently held as DMA targets
    rx_blocks: Vec<Block>,
    /// Issued transmit payloads, in order
    transmits: Vec<Vec<u8>>,
    /// Power state requests, in order
    power_requests: Vec<PowerState>,
    fail_next_transmit: Option<LinkError>,
    fail_next_enable: Option<LinkError>,
    fail_next_disable: Option<LinkError>,
    fail_next_power: Option<LinkError>,
}

/// Scriptable in-memory stand-in for the asynchronous serial driver
pub struct MockSerialDriver {
    state: Mutex<DriverState>,
    runtime_pm: bool,
}

impl MockSerialDriver {
    /// Driver on a platform without runtime power management
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DriverState::default()),
            runtime_pm: false,
        }
    }

    /// Driver on a platform that power-manages the device automatically
    pub fn with_runtime_pm() -> Self {
        Self {
            state: Mutex::new(DriverState::default()),
            runtime_pm: true,
        }
    }

    pub fn rx_enabled(&self) -> bool {
        self.state.lock().unwrap().rx_enabled
    }

    pub fn rx_timeout(&self) -> Option<Duration> {
        self.state.lock().unwrap().rx_timeout
    }

    /// Number of blocks the driver currently holds
    pub fn held_blocks(&self) -> usize {
        self.state.lock().unwrap().rx_blocks.len()
    }

    /// Take every held block, e.g. to feed back as release events
    pub fn take_rx_blocks(&self) -> Vec<Block> {
        std::mem::take(&mut self.state.lock().unwrap().rx_blocks)
    }

    /// Take only the longest-held block, as a draining DMA target would be
    /// handed back
    pub fn take_oldest_rx_block(&self) -> Option<Block> {
        let mut state = self.state.lock().unwrap();
        if state.rx_blocks.is_empty() {
            None
        } else {
            Some(state.rx_blocks.remove(0))
        }
    }

    /// Copy of the issued transmit payloads, in order
    pub fn issued(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().transmits.clone()
    }

    pub fn issued_count(&self) -> usize {
        self.state.lock().unwrap().transmits.len()
    }

    /// Copy of the requested power states, in order
    pub fn power_requests(&self) -> Vec<PowerState> {
        self.state.lock().unwrap().power_requests.clone()
    }

    pub fn fail_next_transmit(&self, err: LinkError) {
        self.state.lock().unwrap().fail_next_transmit = Some(err);
    }

    pub fn fail_next_enable(&self, err: LinkError) {
        self.state.lock().unwrap().fail_next_enable = Some(err);
    }

    pub fn fail_next_disable(&self, err: LinkError) {
        self.state.lock().unwrap().fail_next_disable = Some(err);
    }

    pub fn fail_next_power(&self, err: LinkError) {
        self.state.lock().unwrap().fail_next_power = Some(err);
    }
}

impl SerialDriver for MockSerialDriver {
    fn transmit(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_next_transmit.take() {
            return Err(err);
        }
        state.transmits.push(data.to_vec());
        Ok(())
    }

    fn enable_receive(
        &self,
        block: Block,
        inactivity_timeout: Duration,
    ) -> core::result::Result<(), EnableRejected> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_next_enable.take() {
            return Err(EnableRejected { error, block });
        }
        state.rx_enabled = true;
        state.rx_timeout = Some(inactivity_timeout);
        state.rx_blocks.push(block);
        Ok(())
    }

    fn disable_receive(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_next_disable.take() {
            return Err(err);
        }
        state.rx_enabled = false;
        Ok(())
    }

    fn supply_receive_buffer(&self, block: Block) -> Result<()> {
        self.state.lock().unwrap().rx_blocks.push(block);
        Ok(())
    }

    fn set_power(&self, power: PowerState) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_next_power.take() {
            return Err(err);
        }
        state.power_requests.push(power);
        Ok(())
    }

    fn runtime_power_managed(&self) -> bool {
        self.runtime_pm
    }
}

struct BusState {
    enabled: bool,
    enable_attempts: u32,
    disable_calls: u32,
    /// Control lines as driven by the host
    host_lines: LineState,
    /// Control lines as driven by the device (via set_line_state)
    device_lines: LineState,
    bit_rate: u32,
    bit_rate_reads: u32,
    fail_next_enable: Option<LinkError>,
    fail_next_line_read: Option<LinkError>,
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            enabled: false,
            enable_attempts: 0,
            disable_calls: 0,
            host_lines: LineState::empty(),
            device_lines: LineState::empty(),
            bit_rate: 115_200,
            bit_rate_reads: 0,
            fail_next_enable: None,
            fail_next_line_read: None,
        }
    }
}

/// Scriptable in-memory stand-in for the USB device stack
pub struct MockBus {
    state: Mutex<BusState>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState::default()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    pub fn enable_attempts(&self) -> u32 {
        self.state.lock().unwrap().enable_attempts
    }

    pub fn disable_calls(&self) -> u32 {
        self.state.lock().unwrap().disable_calls
    }

    /// Drive the host-side control lines for subsequent reads
    pub fn set_host_lines(&self, lines: LineState) {
        self.state.lock().unwrap().host_lines = lines;
    }

    /// Device-side control lines as last written by the bridge
    pub fn device_lines(&self) -> LineState {
        self.state.lock().unwrap().device_lines
    }

    pub fn set_bit_rate(&self, rate: u32) {
        self.state.lock().unwrap().bit_rate = rate;
    }

    pub fn bit_rate_reads(&self) -> u32 {
        self.state.lock().unwrap().bit_rate_reads
    }

    pub fn fail_next_enable(&self, err: LinkError) {
        self.state.lock().unwrap().fail_next_enable = Some(err);
    }

    pub fn fail_next_line_read(&self, err: LinkError) {
        self.state.lock().unwrap().fail_next_line_read = Some(err);
    }
}

impl BusControl for MockBus {
    fn enable(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.enable_attempts += 1;
        if let Some(err) = state.fail_next_enable.take() {
            return Err(err);
        }
        state.enabled = true;
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.disable_calls += 1;
        state.enabled = false;
        Ok(())
    }

    fn line_state(&self) -> Result<LineState> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_next_line_read.take() {
            return Err(err);
        }
        Ok(state.host_lines)
    }

    fn set_line_state(&self, lines: LineState, asserted: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if asserted {
            state.device_lines |= lines;
        } else {
            state.device_lines &= !lines;
        }
        Ok(())
    }

    fn bit_rate(&self) -> Result<u32> {
        let mut state = self.state.lock().unwrap();
        state.bit_rate_reads += 1;
        Ok(state.bit_rate)
    }
}
