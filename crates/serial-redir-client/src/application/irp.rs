//! The I/O request record and its one-shot completion.
//!
//! # Ownership (for beginners)
//!
//! An [`Irp`] is moved, never shared: the transport builds it, `submit` moves
//! it into the device queue, the worker takes it out, and
//! [`Irp::complete`] consumes it while handing the status and output to the
//! completion callback.  Because `complete` takes `self` by value the compiler
//! rejects any later use, so "completed exactly once, never touched again"
//! is enforced at compile time rather than by convention.

use std::fmt;

use serial_redir_core::protocol::pdu::{decode_io_request, encode_io_completion, IoRequestHeader};
use serial_redir_core::{NtStatus, ProtocolError};
use tracing::warn;

/// Callback invoked with the finished request.
pub type CompletionFn = Box<dyn FnOnce(IrpCompletion) + Send + 'static>;

/// What the completion callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrpCompletion {
    pub device_id: u32,
    pub completion_id: u32,
    pub major_function: u32,
    pub status: NtStatus,
    pub output: Vec<u8>,
}

impl IrpCompletion {
    /// Encodes the device I/O completion PDU for the transport.
    pub fn to_pdu(&self) -> Vec<u8> {
        encode_io_completion(self.device_id, self.completion_id, self.status, &self.output)
    }
}

/// One pending device operation.
pub struct Irp {
    pub device_id: u32,
    /// FileId quoted by the peer; 0 for Create.
    pub file_id: u32,
    pub completion_id: u32,
    pub major_function: u32,
    pub minor_function: u32,
    /// Operation input: fixed layout header plus optional payload.
    pub input: Vec<u8>,
    /// Operation output, appended to by the handler.
    pub output: Vec<u8>,
    pub io_status: NtStatus,
    completion: Option<CompletionFn>,
}

impl Irp {
    /// Builds a request from a decoded header and its input bytes.
    pub fn new<F>(header: IoRequestHeader, input: Vec<u8>, on_complete: F) -> Self
    where
        F: FnOnce(IrpCompletion) + Send + 'static,
    {
        Self {
            device_id: header.device_id,
            file_id: header.file_id,
            completion_id: header.completion_id,
            major_function: header.major_function,
            minor_function: header.minor_function,
            input,
            output: Vec::new(),
            io_status: NtStatus::Unsuccessful,
            completion: Some(Box::new(on_complete)),
        }
    }

    /// Decodes a device I/O request PDU into a request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the PDU header is malformed.
    pub fn from_pdu<F>(bytes: &[u8], on_complete: F) -> Result<Self, ProtocolError>
    where
        F: FnOnce(IrpCompletion) + Send + 'static,
    {
        let (header, input) = decode_io_request(bytes)?;
        Ok(Self::new(header, input.to_vec(), on_complete))
    }

    /// Finalises the request, handing status and output to the callback.
    pub fn complete(mut self) {
        let completion = IrpCompletion {
            device_id: self.device_id,
            completion_id: self.completion_id,
            major_function: self.major_function,
            status: self.io_status,
            output: std::mem::take(&mut self.output),
        };
        if let Some(callback) = self.completion.take() {
            callback(completion);
        }
    }

    /// Sets `status` and completes.
    pub fn complete_with(mut self, status: NtStatus) {
        self.io_status = status;
        self.complete();
    }
}

impl Drop for Irp {
    fn drop(&mut self) {
        if self.completion.is_some() {
            warn!(
                device_id = self.device_id,
                completion_id = self.completion_id,
                major_function = self.major_function,
                "IRP dropped without completion"
            );
        }
    }
}

impl fmt::Debug for Irp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Irp")
            .field("device_id", &self.device_id)
            .field("file_id", &self.file_id)
            .field("completion_id", &self.completion_id)
            .field("major_function", &self.major_function)
            .field("minor_function", &self.minor_function)
            .field("input_len", &self.input.len())
            .field("output_len", &self.output.len())
            .field("io_status", &self.io_status)
            .field("completed", &self.completion.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn header(major: u32) -> IoRequestHeader {
        IoRequestHeader {
            device_id: 4,
            file_id: 0,
            completion_id: 99,
            major_function: major,
            minor_function: 0,
        }
    }

    #[test]
    fn test_complete_hands_status_and_output_to_callback() {
        // Arrange
        let (tx, rx) = mpsc::channel();
        let mut irp = Irp::new(header(0x03), vec![0u8; 32], move |c| tx.send(c).unwrap());
        irp.output.extend_from_slice(&[1, 2, 3]);
        irp.io_status = NtStatus::Success;

        // Act
        irp.complete();

        // Assert
        let completion = rx.recv().expect("callback must fire");
        assert_eq!(completion.device_id, 4);
        assert_eq!(completion.completion_id, 99);
        assert_eq!(completion.status, NtStatus::Success);
        assert_eq!(completion.output, vec![1, 2, 3]);
        assert!(rx.try_recv().is_err(), "callback must fire exactly once");
    }

    #[test]
    fn test_dropped_irp_never_calls_back() {
        let (tx, rx) = mpsc::channel::<IrpCompletion>();
        let irp = Irp::new(header(0x02), Vec::new(), move |c| tx.send(c).unwrap());

        drop(irp);

        assert!(rx.recv().is_err(), "sender dropped without sending");
    }

    #[test]
    fn test_from_pdu_splits_header_and_input() {
        let bytes = header(0x04).encode_with_input(&[7u8; 40]);

        let irp = Irp::from_pdu(&bytes, |_| {}).unwrap();

        assert_eq!(irp.major_function, 0x04);
        assert_eq!(irp.completion_id, 99);
        assert_eq!(irp.input, vec![7u8; 40]);
        irp.complete();
    }

    #[test]
    fn test_completion_to_pdu() {
        let completion = IrpCompletion {
            device_id: 1,
            completion_id: 2,
            major_function: 0x02,
            status: NtStatus::Success,
            output: vec![0; 5],
        };
        let pdu = completion.to_pdu();
        assert_eq!(pdu.len(), 16 + 5);
        assert_eq!(&pdu[4..8], &1u32.to_le_bytes());
        assert_eq!(&pdu[8..12], &2u32.to_le_bytes());
    }

    #[test]
    fn test_complete_with_overrides_status() {
        let (tx, rx) = mpsc::channel();
        let irp = Irp::new(header(0x0E), Vec::new(), move |c| tx.send(c.status).unwrap());
        irp.complete_with(NtStatus::Cancelled);
        assert_eq!(rx.recv().unwrap(), NtStatus::Cancelled);
    }
}
