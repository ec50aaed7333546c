//! # serial-redir-core
//!
//! Shared library for serial-port redirection containing the byte layouts of
//! the five serial operations, the protocol status codes, the device I/O PDU
//! headers, and the per-device file identifier counter.
//!
//! This crate has zero dependencies on OS APIs, threads, or serial drivers.
//! Everything here can be unit-tested on any platform.
//!
//! # Architecture overview (for beginners)
//!
//! A remote-desktop server can ask the client machine to lend it a local
//! serial port (for example `/dev/ttyUSB0` exposed to the server as `COM1`).
//! The server then sends *I/O requests* ("IRPs") over the device redirection
//! channel: open the port, write some bytes, read some bytes, toggle DTR, close
//! the port.  The client executes each request on the real device and answers
//! with an *I/O completion* that carries a status code and the output bytes.
//!
//! This crate (`serial-redir-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel.  The fixed little-endian input layout
//!   of each operation (`CreateRequest`, `ReadRequest`, ...), the matching
//!   output encoders, the NTSTATUS values, IOCTL codes, and the PDU headers
//!   that wrap a request and a completion.
//!
//! - **`domain`** – Pure rules with no OS dependencies: the monotonically
//!   increasing [`FileIdCounter`] and the mapping from native failure kinds to
//!   protocol status codes.

pub mod domain;
pub mod protocol;

pub use domain::error_map::{status_for_control_failure, NativeFailure};
pub use domain::file_id::FileIdCounter;
pub use protocol::codec::ProtocolError;
pub use protocol::status::NtStatus;
pub use protocol::wire::MajorFunction;
