//! The five serial operation handlers.
//!
//! A [`SerialSession`] is the worker thread's private state for one device:
//! the driver used to open the port, the single open handle slot, and the
//! FileId counter.  Each handler decodes its input layout, drives the
//! [`CommPort`], sets `io_status`, and appends its output layout.  Handlers
//! never complete the request; the dispatcher does that exactly once.
//!
//! Every failure becomes a status code.  Nothing here panics on peer input.
//!
//! # Buffer sizes chosen by the peer
//!
//! Read and DeviceControl carry lengths of up to `u32::MAX`.  [`BufferLimits`]
//! bounds what one request may allocate: a Read is served in at most
//! `read_chunk` bytes (returning fewer bytes than asked is always allowed),
//! and any buffer above `max_allocation` is answered with `NoMemory` before
//! anything is allocated.

use std::collections::TryReserveError;
use std::sync::Arc;

use serial_redir_core::protocol::ioctl::ioctl_name;
use serial_redir_core::protocol::wire::{
    decode_close_request, encode_close_response, encode_create_response, encode_read_response,
    encode_write_response, CreateRequest, DeviceControlRequest, ReadRequest, WriteRequest,
};
use serial_redir_core::{status_for_control_failure, FileIdCounter, NtStatus};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::comm::{CommDriver, CommPort};
use crate::application::irp::Irp;

/// The five operations a serial device answers.
///
/// The dispatcher routes to this trait so routing can be tested without a device.
#[cfg_attr(test, mockall::automock)]
pub trait SerialOperations {
    fn create(&mut self, irp: &mut Irp);
    fn close(&mut self, irp: &mut Irp);
    fn read(&mut self, irp: &mut Irp);
    fn write(&mut self, irp: &mut Irp);
    fn device_control(&mut self, irp: &mut Irp);
}

/// Largest Read handed to the port by default.  Serial drivers buffer far less.
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Largest buffer a single request may allocate by default.
pub const DEFAULT_MAX_ALLOCATION: usize = 64 * 1024;

/// Upper bounds on buffers whose size the peer chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    /// A Read asking for more is served with at most this many bytes.
    pub read_chunk: usize,
    /// Buffers above this size fail with `NoMemory`.
    pub max_allocation: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            read_chunk: DEFAULT_READ_CHUNK,
            max_allocation: DEFAULT_MAX_ALLOCATION,
        }
    }
}

#[derive(Debug, Error)]
enum BufferError {
    #[error("{requested} bytes exceeds the {limit}-byte allocation limit")]
    OverLimit { requested: usize, limit: usize },
    #[error(transparent)]
    Alloc(#[from] TryReserveError),
}

/// Worker-owned state of one redirected serial device.
pub struct SerialSession {
    driver: Box<dyn CommDriver>,
    path: String,
    port: Option<Box<dyn CommPort>>,
    file_ids: Arc<FileIdCounter>,
    limits: BufferLimits,
}

impl SerialSession {
    /// Creates a session with no open handle.
    ///
    /// `file_ids` is shared so the owning device can observe it; only this
    /// session ever allocates from it.
    pub fn new(driver: Box<dyn CommDriver>, path: impl Into<String>, file_ids: Arc<FileIdCounter>) -> Self {
        Self {
            driver,
            path: path.into(),
            port: None,
            file_ids,
            limits: BufferLimits::default(),
        }
    }

    /// Replaces the default [`BufferLimits`].
    pub fn with_limits(mut self, limits: BufferLimits) -> Self {
        self.limits = limits;
        self
    }

    /// `true` while a Create has succeeded without a matching Close.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn perform_create(&mut self, input: &[u8]) -> Result<u32, NtStatus> {
        let request = CreateRequest::decode(input).map_err(|e| {
            warn!(error = %e, "Create request rejected");
            NtStatus::InvalidParameter
        })?;
        request.validate().map_err(|e| {
            warn!(error = %e, "Create contract violated");
            NtStatus::InvalidParameter
        })?;

        if let Some(mut previous) = self.port.take() {
            warn!(path = %self.path, "Create while a session is open; closing previous handle");
            if let Err(e) = previous.close() {
                warn!(error = %e, "closing previous handle failed");
            }
        }

        let mut port = self.driver.open(&self.path).map_err(|e| {
            warn!(path = %self.path, error = %e, "open failed");
            NtStatus::Unsuccessful
        })?;

        let Some(file_id) = self.file_ids.next() else {
            warn!(path = %self.path, "FileId space exhausted");
            if let Err(e) = port.close() {
                warn!(error = %e, "closing unused handle failed");
            }
            return Err(NtStatus::Unsuccessful);
        };

        self.port = Some(port);
        info!(path = %self.path, file_id, "created");
        Ok(file_id)
    }

    fn perform_close(&mut self, input: &[u8]) -> NtStatus {
        if let Err(e) = decode_close_request(input) {
            warn!(error = %e, "Close request rejected");
            return NtStatus::InvalidParameter;
        }
        let Some(port) = self.port.as_mut() else {
            warn!(path = %self.path, "Close without an open session");
            return NtStatus::Unsuccessful;
        };
        match port.close() {
            Ok(()) => {
                self.port = None;
                info!(path = %self.path, "closed");
                NtStatus::Success
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "close failed");
                NtStatus::Unsuccessful
            }
        }
    }

    fn perform_read(&mut self, input: &[u8]) -> (NtStatus, Vec<u8>) {
        let request = match ReadRequest::decode(input) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Read request rejected");
                return (NtStatus::InvalidParameter, Vec::new());
            }
        };
        let Some(port) = self.port.as_mut() else {
            warn!("Read without an open session");
            return (NtStatus::Unsuccessful, Vec::new());
        };
        let wanted = (request.length as usize).min(self.limits.read_chunk);
        let mut buffer = match self.limits.zeroed(wanted) {
            Ok(b) => b,
            Err(e) => {
                warn!(length = request.length, error = %e, "read buffer allocation failed");
                return (NtStatus::NoMemory, Vec::new());
            }
        };

        match port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                debug!(
                    offset = request.offset,
                    requested = request.length,
                    read = buffer.len(),
                    "read"
                );
                (NtStatus::Success, buffer)
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "read failed");
                (NtStatus::Unsuccessful, Vec::new())
            }
        }
    }

    fn perform_write(&mut self, input: &[u8]) -> (NtStatus, u32) {
        let request = match WriteRequest::decode(input) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Write request rejected");
                return (NtStatus::InvalidParameter, 0);
            }
        };
        let Some(port) = self.port.as_mut() else {
            warn!("Write without an open session");
            return (NtStatus::Unsuccessful, 0);
        };

        // A failed write reports 0 even if the device took some bytes.
        match port.write_all(request.data) {
            Ok(()) => {
                debug!(offset = request.offset, length = request.length, "wrote");
                (NtStatus::Success, request.length)
            }
            Err(e) => {
                warn!(path = %self.path, length = request.length, error = %e, "write failed");
                (NtStatus::Unsuccessful, 0)
            }
        }
    }

    fn perform_device_control(&mut self, input: &[u8]) -> (NtStatus, Vec<u8>) {
        let request = match DeviceControlRequest::decode(input) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "DeviceControl request rejected");
                return (NtStatus::InvalidParameter, Vec::new());
            }
        };
        let Some(port) = self.port.as_mut() else {
            warn!("DeviceControl without an open session");
            return (NtStatus::Unsuccessful, Vec::new());
        };

        let mut output = match self.limits.zeroed(request.output_buffer_length as usize) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "control output allocation failed");
                return (NtStatus::NoMemory, Vec::new());
            }
        };
        let mut control_input = match self.limits.zeroed(request.input_buffer_length as usize) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "control input allocation failed");
                return (NtStatus::NoMemory, Vec::new());
            }
        };
        control_input[..request.input.len()].copy_from_slice(request.input);

        let code = request.io_control_code;
        match port.control(code, &control_input, &mut output) {
            Ok(returned) => {
                output.truncate(returned);
                debug!(
                    code = %format_args!("0x{code:08X}"),
                    name = ioctl_name(code),
                    returned = output.len(),
                    "control"
                );
                (NtStatus::Success, output)
            }
            Err(e) => {
                let status = status_for_control_failure(e.failure());
                debug!(
                    code = %format_args!("0x{code:08X}"),
                    name = ioctl_name(code),
                    error = %e,
                    %status,
                    "control failed"
                );
                (status, Vec::new())
            }
        }
    }
}

impl SerialOperations for SerialSession {
    fn create(&mut self, irp: &mut Irp) {
        let file_id = match self.perform_create(&irp.input) {
            Ok(id) => {
                irp.io_status = NtStatus::Success;
                id
            }
            Err(status) => {
                irp.io_status = status;
                0
            }
        };
        encode_create_response(&mut irp.output, file_id);
    }

    fn close(&mut self, irp: &mut Irp) {
        irp.io_status = self.perform_close(&irp.input);
        encode_close_response(&mut irp.output);
    }

    fn read(&mut self, irp: &mut Irp) {
        let (status, data) = self.perform_read(&irp.input);
        irp.io_status = status;
        encode_read_response(&mut irp.output, &data);
    }

    fn write(&mut self, irp: &mut Irp) {
        let (status, length) = self.perform_write(&irp.input);
        irp.io_status = status;
        encode_write_response(&mut irp.output, length);
    }

    fn device_control(&mut self, irp: &mut Irp) {
        let (status, returned) = self.perform_device_control(&irp.input);
        irp.io_status = status;
        irp.output.extend_from_slice(&returned);
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        if let Some(mut port) = self.port.take() {
            info!(path = %self.path, "closing handle left open at teardown");
            if let Err(e) = port.close() {
                warn!(path = %self.path, error = %e, "close at teardown failed");
            }
        }
    }
}

impl BufferLimits {
    /// Allocates `len` zero bytes, reporting failure instead of aborting.
    fn zeroed(&self, len: usize) -> Result<Vec<u8>, BufferError> {
        if len > self.max_allocation {
            return Err(BufferError::OverLimit {
                requested: len,
                limit: self.max_allocation,
            });
        }
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len)?;
        buffer.resize(len, 0);
        Ok(buffer)
    }
}
