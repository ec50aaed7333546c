//! Little-endian field readers and writers shared by every wire layout.
//!
//! All multi-byte integers on the device redirection channel are
//! little-endian, and every variable-length field has an explicit length.
//! Nothing is NUL-terminated on the wire.

use thiserror::Error;

/// Errors that can occur while decoding a request or a PDU header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the layout requires.
    #[error("insufficient data for {context}: need {needed} bytes, got {available}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// The PDU header names a component or packet this engine does not handle.
    #[error("unexpected packet: component 0x{component:04X}, packet id 0x{packet_id:04X}")]
    UnexpectedPacket { component: u16, packet_id: u16 },

    /// A field value breaks the layout's contract.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Sequential reader over a borrowed input buffer.
///
/// Every read checks the remaining length first, so a truncated request
/// surfaces as [`ProtocolError::InsufficientData`] instead of a panic.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    ///
    /// `context` names the layout being decoded and appears in errors.
    pub fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            context,
        }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Advances past `n` bytes without interpreting them (padding, ignored fields).
    pub fn skip(&mut self, n: usize) -> Result<(), ProtocolError> {
        self.take(n).map(|_| ())
    }

    /// Borrows the next `n` bytes and advances past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(ProtocolError::InsufficientData {
                context: self.context,
                needed: self.pos.saturating_add(n),
                available: self.buf.len(),
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Borrows everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends `n` zero bytes (reserved fields and padding).
pub fn write_zeros(buf: &mut Vec<u8>, n: usize) {
    buf.resize(buf.len() + n, 0);
}
