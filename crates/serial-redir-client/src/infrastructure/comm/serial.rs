//! Real serial hardware through the `serialport` crate.
//!
//! # Timeouts (for beginners)
//!
//! `serialport` reads block for at most the configured timeout and then fail
//! with `TimedOut`.  A redirected Read must still complete, so a timeout is
//! reported as a successful read of zero bytes and the peer simply asks again.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serial_redir_core::protocol::ioctl::{
    modem_status, purge, IOCTL_SERIAL_CLR_DTR, IOCTL_SERIAL_CLR_RTS, IOCTL_SERIAL_GET_BAUD_RATE,
    IOCTL_SERIAL_GET_MODEMSTATUS, IOCTL_SERIAL_PURGE, IOCTL_SERIAL_SET_BREAK_OFF,
    IOCTL_SERIAL_SET_BREAK_ON, IOCTL_SERIAL_SET_DTR, IOCTL_SERIAL_SET_RTS,
};
use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use super::{get_u32, put_u32};
use crate::application::comm::{CommDriver, CommError, CommPort};

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens real serial ports with a fixed baud rate and read timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialPortDriver {
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortDriver {
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }
}

impl Default for SerialPortDriver {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT)
    }
}

impl CommDriver for SerialPortDriver {
    fn open(&self, path: &str) -> Result<Box<dyn CommPort>, CommError> {
        let port = serialport::new(path, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => CommError::NotFound(path.to_string()),
                _ => comm_error(e),
            })?;
        debug!(path, baud_rate = self.baud_rate, "serial port opened");
        Ok(Box::new(NativeSerialPort { port: Some(port) }))
    }
}

/// An open `serialport` handle.  `None` once closed.
struct NativeSerialPort {
    port: Option<Box<dyn SerialPort>>,
}

impl NativeSerialPort {
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, CommError> {
        self.port.as_mut().ok_or(CommError::InvalidHandle)
    }
}

impl CommPort for NativeSerialPort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CommError> {
        let port = self.port()?;
        if buf.is_empty() {
            return Ok(0);
        }
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), CommError> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn control(&mut self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize, CommError> {
        let port = self.port()?;
        match code {
            IOCTL_SERIAL_SET_DTR => port.write_data_terminal_ready(true).map_err(comm_error)?,
            IOCTL_SERIAL_CLR_DTR => port.write_data_terminal_ready(false).map_err(comm_error)?,
            IOCTL_SERIAL_SET_RTS => port.write_request_to_send(true).map_err(comm_error)?,
            IOCTL_SERIAL_CLR_RTS => port.write_request_to_send(false).map_err(comm_error)?,
            IOCTL_SERIAL_SET_BREAK_ON => port.set_break().map_err(comm_error)?,
            IOCTL_SERIAL_SET_BREAK_OFF => port.clear_break().map_err(comm_error)?,
            IOCTL_SERIAL_PURGE => {
                if let Some(target) = purge_target(get_u32(input)?) {
                    port.clear(target).map_err(comm_error)?;
                }
            }
            IOCTL_SERIAL_GET_MODEMSTATUS => {
                let bits = modem_status_bits(
                    port.read_clear_to_send().map_err(comm_error)?,
                    port.read_data_set_ready().map_err(comm_error)?,
                    port.read_ring_indicator().map_err(comm_error)?,
                    port.read_carrier_detect().map_err(comm_error)?,
                );
                return put_u32(output, bits);
            }
            IOCTL_SERIAL_GET_BAUD_RATE => {
                let baud = port.baud_rate().map_err(comm_error)?;
                return put_u32(output, baud);
            }
            other => return Err(CommError::NotSupported(format!("control code 0x{other:08X}"))),
        }
        Ok(0)
    }

    fn close(&mut self) -> Result<(), CommError> {
        // Dropping the handle closes the descriptor.
        self.port.take().map(drop).ok_or(CommError::InvalidHandle)
    }
}

/// Which buffers a purge mask clears.  Abort flags clear the same buffer as
/// their matching clear flag since no request is ever left pending natively.
fn purge_target(mask: u32) -> Option<ClearBuffer> {
    let rx = mask & (purge::RXCLEAR | purge::RXABORT) != 0;
    let tx = mask & (purge::TXCLEAR | purge::TXABORT) != 0;
    match (rx, tx) {
        (true, true) => Some(ClearBuffer::All),
        (true, false) => Some(ClearBuffer::Input),
        (false, true) => Some(ClearBuffer::Output),
        (false, false) => None,
    }
}

pub(crate) fn modem_status_bits(cts: bool, dsr: bool, ring: bool, dcd: bool) -> u32 {
    [
        (cts, modem_status::CTS),
        (dsr, modem_status::DSR),
        (ring, modem_status::RING),
        (dcd, modem_status::DCD),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(0, |bits, (_, bit)| bits | bit)
}

fn comm_error(e: serialport::Error) -> CommError {
    match e.kind() {
        serialport::ErrorKind::Io(ErrorKind::Unsupported) => CommError::NotSupported(e.description),
        serialport::ErrorKind::Io(kind) => CommError::Io(std::io::Error::new(kind, e.description)),
        serialport::ErrorKind::InvalidInput => CommError::InvalidInput(e.description),
        serialport::ErrorKind::NoDevice => CommError::InvalidHandle,
        _ => CommError::Device(e.description),
    }
}
