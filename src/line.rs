//! Line control bridge
//!
//! Stateless translation between host control-line activity and the virtual
//! modem signals the device presents back. A host terminal asserting DTR is
//! the conventional "connect" gesture; mirroring it onto DCD and DSR lets
//! the device observe carrier the way a modem peer would.

use log::{info, warn};

use crate::driver::{BusControl, LineState};

/// Mirror the host's DTR assertion onto DCD and DSR.
///
/// Read and write failures are logged and otherwise ignored; there is no
/// state here to get out of sync.
pub(crate) fn sync_modem_signals(bus: &dyn BusControl) {
    let lines = match bus.line_state() {
        Ok(lines) => lines,
        Err(err) => {
            warn!("failed to read control lines: {err}");
            return;
        }
    };

    let dtr = lines.contains(LineState::DTR);
    info!(
        "control line state: DTR={}, RTS={}",
        dtr as u8,
        lines.contains(LineState::RTS) as u8
    );

    if let Err(err) = bus.set_line_state(LineState::DCD | LineState::DSR, dtr) {
        warn!("failed to update DCD/DSR: {err}");
    }
}

/// Read and log the bit rate from the active line coding
pub(crate) fn log_line_coding(bus: &dyn BusControl) {
    match bus.bit_rate() {
        Ok(rate) => info!("bit rate {rate}"),
        Err(err) => warn!("failed to read bit rate: {err}"),
    }
}
