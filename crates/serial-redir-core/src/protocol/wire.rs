//! Fixed input and output layouts of the five serial operations.
//!
//! Input layouts (all integers little-endian):
//! ```text
//! Create:        [DesiredAccess:4][AllocationSize:8][FileAttributes:4][SharedAccess:4]
//!                [CreateDisposition:4][CreateOptions:4][PathLength:4][Path:PathLength]
//! Close:         [Padding:32]
//! Read:          [Length:4][Offset:8][Padding:20]
//! Write:         [Length:4][Offset:8][Padding:20][Data:Length]
//! DeviceControl: [OutputBufferLength:4][InputBufferLength:4][IoControlCode:4][Padding:20]
//!                [InputBuffer:InputBufferLength]
//! ```
//!
//! Output layouts:
//! ```text
//! Create:        [FileId:4][Information:1]
//! Close:         [Padding:5]
//! Read:          [Length:4][Data:Length]
//! Write:         [Length:4][Padding:1]
//! DeviceControl: [returned bytes]
//! ```

use serde::{Deserialize, Serialize};

use crate::protocol::codec::{write_u32, write_zeros, ByteReader, ProtocolError};

// ── Constants ─────────────────────────────────────────────────────────────────

/// `GENERIC_READ` access right.
pub const GENERIC_READ: u32 = 0x8000_0000;
/// `GENERIC_WRITE` access right.
pub const GENERIC_WRITE: u32 = 0x4000_0000;
/// `OPEN_EXISTING` create disposition.
pub const OPEN_EXISTING: u32 = 3;

/// Device type announced for redirected serial ports.
pub const DEVICE_TYPE_SERIAL: u32 = 0x0000_0001;

/// Size of the fixed part of the Create input.
pub const CREATE_HEADER_LEN: usize = 32;
/// Size of the Close input.
pub const CLOSE_PADDING_LEN: usize = 32;
/// Size of the fixed Read/Write input header.
pub const RW_HEADER_LEN: usize = 32;
/// Size of the fixed DeviceControl input header.
pub const IOCTL_HEADER_LEN: usize = 32;

// ── Major function codes ──────────────────────────────────────────────────────

/// IRP major function codes the serial device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum MajorFunction {
    Create = 0x00,
    Close = 0x02,
    Read = 0x03,
    Write = 0x04,
    DeviceControl = 0x0E,
}

impl TryFrom<u32> for MajorFunction {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MajorFunction::Create),
            0x02 => Ok(MajorFunction::Close),
            0x03 => Ok(MajorFunction::Read),
            0x04 => Ok(MajorFunction::Write),
            0x0E => Ok(MajorFunction::DeviceControl),
            other => Err(other),
        }
    }
}

// ── Create ────────────────────────────────────────────────────────────────────

/// Decoded Create input.  Ignored fields are skipped, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateRequest {
    pub desired_access: u32,
    pub shared_access: u32,
    pub create_disposition: u32,
    pub path_length: u32,
}

impl CreateRequest {
    /// Decodes the Create layout, skipping the (ignored) path bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] when the input is truncated.
    pub fn decode(input: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = ByteReader::new(input, "CreateRequest");
        let desired_access = r.read_u32()?;
        r.skip(8)?; // AllocationSize
        r.skip(4)?; // FileAttributes
        let shared_access = r.read_u32()?;
        let create_disposition = r.read_u32()?;
        r.skip(4)?; // CreateOptions
        let path_length = r.read_u32()?;
        r.skip(path_length as usize)?;
        Ok(Self {
            desired_access,
            shared_access,
            create_disposition,
            path_length,
        })
    }

    /// Checks the fixed-field contract of a serial-port open.
    ///
    /// A serial port is always opened read/write, unshared, as an existing
    /// device, and with an empty path.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] naming the first field that
    /// breaks the contract.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.path_length != 0 {
            return Err(ProtocolError::MalformedPayload(format!(
                "PathLength must be 0, got {}",
                self.path_length
            )));
        }
        if self.desired_access != GENERIC_READ | GENERIC_WRITE {
            return Err(ProtocolError::MalformedPayload(format!(
                "DesiredAccess must be GENERIC_READ|GENERIC_WRITE, got 0x{:08X}",
                self.desired_access
            )));
        }
        if self.shared_access != 0 {
            return Err(ProtocolError::MalformedPayload(format!(
                "SharedAccess must be 0, got 0x{:08X}",
                self.shared_access
            )));
        }
        if self.create_disposition != OPEN_EXISTING {
            return Err(ProtocolError::MalformedPayload(format!(
                "CreateDisposition must be OPEN_EXISTING, got {}",
                self.create_disposition
            )));
        }
        Ok(())
    }

    /// Encodes a Create input with the given fields and zeroed ignored fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CREATE_HEADER_LEN + self.path_length as usize);
        write_u32(&mut buf, self.desired_access);
        write_zeros(&mut buf, 8);
        write_zeros(&mut buf, 4);
        write_u32(&mut buf, self.shared_access);
        write_u32(&mut buf, self.create_disposition);
        write_zeros(&mut buf, 4);
        write_u32(&mut buf, self.path_length);
        write_zeros(&mut buf, self.path_length as usize);
        buf
    }
}

impl Default for CreateRequest {
    /// The only Create a serial port accepts.
    fn default() -> Self {
        Self {
            desired_access: GENERIC_READ | GENERIC_WRITE,
            shared_access: 0,
            create_disposition: OPEN_EXISTING,
            path_length: 0,
        }
    }
}

/// Appends the Create output: FileId followed by a zero Information byte.
pub fn encode_create_response(buf: &mut Vec<u8>, file_id: u32) {
    write_u32(buf, file_id);
    buf.push(0);
}

// ── Close ─────────────────────────────────────────────────────────────────────

/// Checks that the Close input carries its 32 padding bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when fewer than 32 bytes are present.
pub fn decode_close_request(input: &[u8]) -> Result<(), ProtocolError> {
    ByteReader::new(input, "CloseRequest").skip(CLOSE_PADDING_LEN)
}

/// Appends the Close output: five zero bytes.
pub fn encode_close_response(buf: &mut Vec<u8>) {
    write_zeros(buf, 5);
}

// ── Read ──────────────────────────────────────────────────────────────────────

/// Decoded Read input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub length: u32,
    /// Carried for logging only; serial streams are not seekable.
    pub offset: u64,
}

impl ReadRequest {
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] when the 32-byte header is truncated.
    pub fn decode(input: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = ByteReader::new(input, "ReadRequest");
        let length = r.read_u32()?;
        let offset = r.read_u64()?;
        r.skip(20)?;
        Ok(Self { length, offset })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RW_HEADER_LEN);
        write_u32(&mut buf, self.length);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        write_zeros(&mut buf, 20);
        buf
    }
}

/// Appends the Read output: `data.len()` as u32 then the data itself.
///
/// The data section is naturally absent when `data` is empty.
pub fn encode_read_response(buf: &mut Vec<u8>, data: &[u8]) {
    write_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

// ── Write ─────────────────────────────────────────────────────────────────────

/// Decoded Write input.  `data` borrows straight from the request buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest<'a> {
    pub length: u32,
    pub offset: u64,
    pub data: &'a [u8],
}

impl<'a> WriteRequest<'a> {
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] when the header is truncated
    /// or fewer than `Length` data bytes follow it.
    pub fn decode(input: &'a [u8]) -> Result<Self, ProtocolError> {
        let mut r = ByteReader::new(input, "WriteRequest");
        let length = r.read_u32()?;
        let offset = r.read_u64()?;
        r.skip(20)?;
        let data = r.take(length as usize)?;
        Ok(Self {
            length,
            offset,
            data,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RW_HEADER_LEN + self.data.len());
        write_u32(&mut buf, self.data.len() as u32);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        write_zeros(&mut buf, 20);
        buf.extend_from_slice(self.data);
        buf
    }
}

/// Appends the Write output: reported length then one padding byte.
pub fn encode_write_response(buf: &mut Vec<u8>, length: u32) {
    write_u32(buf, length);
    buf.push(0);
}

// ── DeviceControl ─────────────────────────────────────────────────────────────

/// Decoded DeviceControl input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceControlRequest<'a> {
    pub output_buffer_length: u32,
    pub input_buffer_length: u32,
    pub io_control_code: u32,
    /// Control input bytes present after the header, at most
    /// `input_buffer_length` of them.  May be shorter than declared.
    pub input: &'a [u8],
}

impl<'a> DeviceControlRequest<'a> {
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] when the 32-byte header is truncated.
    pub fn decode(input: &'a [u8]) -> Result<Self, ProtocolError> {
        let mut r = ByteReader::new(input, "DeviceControlRequest");
        let output_buffer_length = r.read_u32()?;
        let input_buffer_length = r.read_u32()?;
        let io_control_code = r.read_u32()?;
        r.skip(20)?;
        let rest = r.rest();
        let present = rest.len().min(input_buffer_length as usize);
        Ok(Self {
            output_buffer_length,
            input_buffer_length,
            io_control_code,
            input: &rest[..present],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(IOCTL_HEADER_LEN + self.input.len());
        write_u32(&mut buf, self.output_buffer_length);
        write_u32(&mut buf, self.input_buffer_length);
        write_u32(&mut buf, self.io_control_code);
        write_zeros(&mut buf, 20);
        buf.extend_from_slice(self.input);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_function_codes() {
        assert_eq!(MajorFunction::try_from(0x00), Ok(MajorFunction::Create));
        assert_eq!(MajorFunction::try_from(0x02), Ok(MajorFunction::Close));
        assert_eq!(MajorFunction::try_from(0x03), Ok(MajorFunction::Read));
        assert_eq!(MajorFunction::try_from(0x04), Ok(MajorFunction::Write));
        assert_eq!(MajorFunction::try_from(0x0E), Ok(MajorFunction::DeviceControl));
        // IRP_MJ_QUERY_INFORMATION is not handled by serial devices
        assert_eq!(MajorFunction::try_from(0x05), Err(0x05));
    }

    #[test]
    fn test_create_decode_reads_fields_at_fixed_offsets() {
        // Arrange
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(GENERIC_READ | GENERIC_WRITE).to_le_bytes());
        bytes.extend_from_slice(&0xFFFF_FFFF_FFFF_FFFFu64.to_le_bytes()); // AllocationSize
        bytes.extend_from_slice(&0xAAAA_AAAAu32.to_le_bytes()); // FileAttributes
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&OPEN_EXISTING.to_le_bytes());
        bytes.extend_from_slice(&0xBBBB_BBBBu32.to_le_bytes()); // CreateOptions
        bytes.extend_from_slice(&0u32.to_le_bytes());

        // Act
        let req = CreateRequest::decode(&bytes).unwrap();

        // Assert
        assert_eq!(req, CreateRequest::default());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_decode_skips_path_bytes() {
        let req = CreateRequest {
            path_length: 6,
            ..CreateRequest::default()
        };
        let bytes = req.encode();
        assert_eq!(bytes.len(), CREATE_HEADER_LEN + 6);
        assert_eq!(CreateRequest::decode(&bytes).unwrap().path_length, 6);
    }

    #[test]
    fn test_create_decode_truncated_path_fails() {
        let mut bytes = CreateRequest::default().encode();
        // claim a 10-byte path but provide none
        bytes[28..32].copy_from_slice(&10u32.to_le_bytes());
        assert!(CreateRequest::decode(&bytes).is_err());
    }

    #[test]
    fn test_create_validate_rejects_each_contract_field() {
        let cases = [
            CreateRequest { path_length: 2, ..Default::default() },
            CreateRequest { desired_access: GENERIC_READ, ..Default::default() },
            CreateRequest { shared_access: 1, ..Default::default() },
            CreateRequest { create_disposition: 1, ..Default::default() },
        ];
        for req in cases {
            assert!(
                matches!(req.validate(), Err(ProtocolError::MalformedPayload(_))),
                "{req:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_create_response_layout() {
        let mut buf = Vec::new();
        encode_create_response(&mut buf, 0x0102_0304);
        assert_eq!(buf, vec![0x04, 0x03, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_close_requires_32_padding_bytes() {
        assert!(decode_close_request(&[0u8; 32]).is_ok());
        assert!(decode_close_request(&[0u8; 31]).is_err());
        let mut buf = Vec::new();
        encode_close_response(&mut buf);
        assert_eq!(buf, vec![0u8; 5]);
    }

    #[test]
    fn test_read_request_decode() {
        let bytes = ReadRequest { length: 8, offset: 42 }.encode();
        assert_eq!(bytes.len(), RW_HEADER_LEN);
        assert_eq!(
            ReadRequest::decode(&bytes).unwrap(),
            ReadRequest { length: 8, offset: 42 }
        );
    }

    #[test]
    fn test_read_response_omits_data_when_empty() {
        let mut empty = Vec::new();
        encode_read_response(&mut empty, &[]);
        assert_eq!(empty, vec![0, 0, 0, 0]);

        let mut full = Vec::new();
        encode_read_response(&mut full, b"hi");
        assert_eq!(full, vec![2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn test_write_request_borrows_data_after_header() {
        // Arrange
        let bytes = WriteRequest { length: 3, offset: 0, data: b"abc" }.encode();

        // Act
        let req = WriteRequest::decode(&bytes).unwrap();

        // Assert
        assert_eq!(req.length, 3);
        assert_eq!(req.data, b"abc");
        assert_eq!(req.data.as_ptr(), bytes[RW_HEADER_LEN..].as_ptr(), "no copy");
    }

    #[test]
    fn test_write_request_with_short_data_fails() {
        let mut bytes = WriteRequest { length: 3, offset: 0, data: b"abc" }.encode();
        bytes.truncate(RW_HEADER_LEN + 2);
        assert!(WriteRequest::decode(&bytes).is_err());
    }

    #[test]
    fn test_write_response_layout() {
        let mut buf = Vec::new();
        encode_write_response(&mut buf, 16);
        assert_eq!(buf, vec![16, 0, 0, 0, 0]);
    }

    #[test]
    fn test_device_control_decode_clamps_input_to_declared_length() {
        // Arrange: declared 2 input bytes, 4 present
        let mut bytes = DeviceControlRequest {
            output_buffer_length: 4,
            input_buffer_length: 2,
            io_control_code: 0x001B_0068,
            input: &[],
        }
        .encode();
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        // Act
        let req = DeviceControlRequest::decode(&bytes).unwrap();

        // Assert
        assert_eq!(req.output_buffer_length, 4);
        assert_eq!(req.io_control_code, 0x001B_0068);
        assert_eq!(req.input, &[1, 2]);
    }

    #[test]
    fn test_device_control_decode_truncated_header_fails() {
        assert!(DeviceControlRequest::decode(&[0u8; 31]).is_err());
    }
}
