//! Native device adapter port: the traits the handlers drive.
//!
//! The application layer never talks to an OS serial API directly.  It calls a
//! [`CommDriver`] to open a path and then a [`CommPort`] for blocking reads,
//! writes, and control codes.  Implementations live in the infrastructure
//! layer (`SerialPortDriver` for real hardware, `LoopbackDriver` for tests).

use serial_redir_core::NativeFailure;
use thiserror::Error;

/// Error type for native device operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// The handle is closed or was never valid.
    #[error("invalid handle")]
    InvalidHandle,

    /// The device does not implement the requested operation or control code.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// The caller's output buffer is too small for the result.
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    InsufficientBuffer { needed: usize, available: usize },

    /// The control input does not carry what the control code expects.
    #[error("invalid control input: {0}")]
    InvalidInput(String),

    /// The device path does not exist.
    #[error("device not found: {0}")]
    NotFound(String),

    /// An OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other driver-reported failure.
    #[error("device error: {0}")]
    Device(String),
}

impl CommError {
    /// Classifies the error for the status mapping table.
    pub fn failure(&self) -> NativeFailure {
        match self {
            CommError::InvalidHandle => NativeFailure::InvalidHandle,
            CommError::NotSupported(_) => NativeFailure::NotSupported,
            CommError::InsufficientBuffer { .. } => NativeFailure::InsufficientBuffer,
            CommError::Io(e) if e.kind() == std::io::ErrorKind::Unsupported => {
                NativeFailure::NotSupported
            }
            CommError::Io(e) => NativeFailure::Other(e.raw_os_error()),
            CommError::InvalidInput(_) | CommError::NotFound(_) | CommError::Device(_) => {
                NativeFailure::Other(None)
            }
        }
    }
}

/// Opens native serial devices by path.
#[cfg_attr(test, mockall::automock)]
pub trait CommDriver: Send {
    /// Opens `path` for exclusive read/write access.
    fn open(&self, path: &str) -> Result<Box<dyn CommPort>, CommError>;
}

/// One open native serial handle.
///
/// Every call blocks the calling thread until the device answers.
#[cfg_attr(test, mockall::automock)]
pub trait CommPort: Send {
    /// Reads up to `buf.len()` bytes, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CommError>;

    /// Writes every byte of `data` or fails.
    fn write_all(&mut self, data: &[u8]) -> Result<(), CommError>;

    /// Performs the control operation `code`.
    ///
    /// Returns how many bytes of `output` were filled.
    fn control(&mut self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize, CommError>;

    /// Closes the handle.  A closed port answers every call with
    /// [`CommError::InvalidHandle`].
    fn close(&mut self) -> Result<(), CommError>;
}
