//! Device I/O request and completion PDU headers.
//!
//! Wire format:
//! ```text
//! request:    [Component:2][PacketId:2][DeviceId:4][FileId:4][CompletionId:4]
//!             [MajorFunction:4][MinorFunction:4][operation input...]
//! completion: [Component:2][PacketId:2][DeviceId:4][CompletionId:4][IoStatus:4]
//!             [operation output...]
//! ```
//! Component is always `RDPDR_CTYP_CORE`.  All integers are little-endian.

use crate::protocol::codec::{write_u16, write_u32, ByteReader, ProtocolError};
use crate::protocol::status::NtStatus;

/// `RDPDR_CTYP_CORE` component id ("rD").
pub const RDPDR_CTYP_CORE: u16 = 0x4472;
/// `PAKID_CORE_DEVICE_IOREQUEST` packet id ("IR").
pub const PAKID_CORE_DEVICE_IOREQUEST: u16 = 0x4952;
/// `PAKID_CORE_DEVICE_IOCOMPLETION` packet id ("IC").
pub const PAKID_CORE_DEVICE_IOCOMPLETION: u16 = 0x4943;

/// Size of the I/O request header including the shared 4-byte header.
pub const IO_REQUEST_HEADER_LEN: usize = 24;
/// Size of the I/O completion header including the shared 4-byte header.
pub const IO_COMPLETION_HEADER_LEN: usize = 16;

/// Fields of a device I/O request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequestHeader {
    pub device_id: u32,
    pub file_id: u32,
    pub completion_id: u32,
    pub major_function: u32,
    pub minor_function: u32,
}

impl IoRequestHeader {
    /// Encodes the header (shared header included) followed by `input`.
    pub fn encode_with_input(&self, input: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(IO_REQUEST_HEADER_LEN + input.len());
        write_u16(&mut buf, RDPDR_CTYP_CORE);
        write_u16(&mut buf, PAKID_CORE_DEVICE_IOREQUEST);
        write_u32(&mut buf, self.device_id);
        write_u32(&mut buf, self.file_id);
        write_u32(&mut buf, self.completion_id);
        write_u32(&mut buf, self.major_function);
        write_u32(&mut buf, self.minor_function);
        buf.extend_from_slice(input);
        buf
    }
}

/// Decodes a device I/O request PDU.
///
/// Returns the header and the operation input that follows it.
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedPacket`] for any component/packet other
/// than a core I/O request, and [`ProtocolError::InsufficientData`] when the
/// header is truncated.
pub fn decode_io_request(bytes: &[u8]) -> Result<(IoRequestHeader, &[u8]), ProtocolError> {
    let mut r = ByteReader::new(bytes, "DeviceIoRequest");
    let component = r.read_u16()?;
    let packet_id = r.read_u16()?;
    if component != RDPDR_CTYP_CORE || packet_id != PAKID_CORE_DEVICE_IOREQUEST {
        return Err(ProtocolError::UnexpectedPacket {
            component,
            packet_id,
        });
    }
    let header = IoRequestHeader {
        device_id: r.read_u32()?,
        file_id: r.read_u32()?,
        completion_id: r.read_u32()?,
        major_function: r.read_u32()?,
        minor_function: r.read_u32()?,
    };
    Ok((header, r.rest()))
}

/// Encodes a device I/O completion PDU carrying `output`.
pub fn encode_io_completion(
    device_id: u32,
    completion_id: u32,
    status: NtStatus,
    output: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(IO_COMPLETION_HEADER_LEN + output.len());
    write_u16(&mut buf, RDPDR_CTYP_CORE);
    write_u16(&mut buf, PAKID_CORE_DEVICE_IOCOMPLETION);
    write_u32(&mut buf, device_id);
    write_u32(&mut buf, completion_id);
    write_u32(&mut buf, status.code());
    buf.extend_from_slice(output);
    buf
}
