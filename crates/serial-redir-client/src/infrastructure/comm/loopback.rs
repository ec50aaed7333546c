//! In-memory serial driver whose ports echo written bytes back to reads.
//!
//! # Why a loopback driver?
//!
//! Real serial tests need hardware and a null-modem cable.  The
//! [`LoopbackDriver`] replaces the device with a shared byte buffer so the
//! whole request path (queue, worker, handlers, completion) can be exercised
//! in integration tests and by `serial-redir probe --loopback`.
//!
//! Clones share state, so a test keeps one clone to inspect and inject
//! failures while the device's worker owns another.
//!
//! ```ignore
//! let driver = LoopbackDriver::new();
//! let probe = driver.clone();
//! manager.register_serial("COM1", "loop", Box::new(driver), ShutdownPolicy::Drain)?;
//! // ... submit Create + Write ...
//! assert_eq!(probe.written(), b"PING");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serial_redir_core::protocol::ioctl::{
    purge, IOCTL_SERIAL_CLR_DTR, IOCTL_SERIAL_CLR_RTS, IOCTL_SERIAL_GET_DTRRTS,
    IOCTL_SERIAL_GET_MODEMSTATUS, IOCTL_SERIAL_PURGE, IOCTL_SERIAL_SET_DTR, IOCTL_SERIAL_SET_RTS,
};

use super::serial::modem_status_bits;
use super::{get_u32, put_u32};
use crate::application::comm::{CommDriver, CommError, CommPort};

/// `IOCTL_SERIAL_GET_DTRRTS` output bits.
const SERIAL_DTR_STATE: u32 = 0x01;
const SERIAL_RTS_STATE: u32 = 0x02;

#[derive(Debug, Default)]
struct LoopbackState {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    dtr: bool,
    rts: bool,
    opens: u32,
    closes: u32,
    fail_open: bool,
    fail_next_read: bool,
    fail_next_write: bool,
    fail_next_close: bool,
}

/// Opens loopback ports that all share one echo buffer.
#[derive(Debug, Clone, Default)]
pub struct LoopbackDriver {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `open` fail until reset.
    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn fail_next_read(&self) {
        self.lock().fail_next_read = true;
    }

    pub fn fail_next_write(&self) {
        self.lock().fail_next_write = true;
    }

    pub fn fail_next_close(&self) {
        self.lock().fail_next_close = true;
    }

    /// Queues bytes as if the remote end of the line had sent them.
    pub fn inject(&self, data: &[u8]) {
        self.lock().rx.extend(data);
    }

    /// Every byte successfully written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Bytes waiting to be read.
    pub fn pending(&self) -> usize {
        self.lock().rx.len()
    }

    pub fn dtr(&self) -> bool {
        self.lock().dtr
    }

    pub fn rts(&self) -> bool {
        self.lock().rts
    }

    pub fn opens(&self) -> u32 {
        self.lock().opens
    }

    pub fn closes(&self) -> u32 {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        lock(&self.state)
    }
}

impl CommDriver for LoopbackDriver {
    fn open(&self, path: &str) -> Result<Box<dyn CommPort>, CommError> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(CommError::NotFound(path.to_string()));
        }
        state.opens += 1;
        Ok(Box::new(LoopbackPort {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct LoopbackPort {
    state: Arc<Mutex<LoopbackState>>,
    open: bool,
}

impl LoopbackPort {
    fn state(&self) -> Result<MutexGuard<'_, LoopbackState>, CommError> {
        if !self.open {
            return Err(CommError::InvalidHandle);
        }
        Ok(lock(&self.state))
    }
}

impl CommPort for LoopbackPort {
    /// Never blocks: an empty buffer reads as zero bytes, like a timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CommError> {
        let mut state = self.state()?;
        if std::mem::take(&mut state.fail_next_read) {
            return Err(CommError::Device("injected read failure".into()));
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), CommError> {
        let mut state = self.state()?;
        if std::mem::take(&mut state.fail_next_write) {
            return Err(CommError::Device("injected write failure".into()));
        }
        state.written.extend_from_slice(data);
        state.rx.extend(data);
        Ok(())
    }

    fn control(&mut self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize, CommError> {
        let mut state = self.state()?;
        match code {
            IOCTL_SERIAL_SET_DTR => state.dtr = true,
            IOCTL_SERIAL_CLR_DTR => state.dtr = false,
            IOCTL_SERIAL_SET_RTS => state.rts = true,
            IOCTL_SERIAL_CLR_RTS => state.rts = false,
            IOCTL_SERIAL_PURGE => {
                if get_u32(input)? & (purge::RXCLEAR | purge::RXABORT) != 0 {
                    state.rx.clear();
                }
            }
            // A looped-back line sees its own DTR as DSR/DCD and RTS as CTS.
            IOCTL_SERIAL_GET_MODEMSTATUS => {
                let bits = modem_status_bits(state.rts, state.dtr, false, state.dtr);
                return put_u32(output, bits);
            }
            IOCTL_SERIAL_GET_DTRRTS => {
                let mut bits = 0;
                if state.dtr {
                    bits |= SERIAL_DTR_STATE;
                }
                if state.rts {
                    bits |= SERIAL_RTS_STATE;
                }
                return put_u32(output, bits);
            }
            other => return Err(CommError::NotSupported(format!("control code 0x{other:08X}"))),
        }
        Ok(0)
    }

    fn close(&mut self) -> Result<(), CommError> {
        let mut state = self.state()?;
        if std::mem::take(&mut state.fail_next_close) {
            return Err(CommError::Device("injected close failure".into()));
        }
        state.closes += 1;
        drop(state);
        self.open = false;
        Ok(())
    }
}

fn lock(state: &Mutex<LoopbackState>) -> MutexGuard<'_, LoopbackState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
