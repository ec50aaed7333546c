//! Protocol module containing status codes, operation layouts, and PDU headers.

pub mod codec;
pub mod ioctl;
pub mod pdu;
pub mod status;
pub mod wire;

pub use codec::ProtocolError;
pub use pdu::{decode_io_request, encode_io_completion, IoRequestHeader};
pub use status::NtStatus;
pub use wire::*;
