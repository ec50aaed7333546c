//! NTSTATUS values reported back to the remote peer in every I/O completion.
//!
//! The values must match the peer bit-for-bit, so each variant carries its
//! exact 32-bit code as the enum discriminant.

use serde::{Deserialize, Serialize};

/// The fixed set of status codes this engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum NtStatus {
    Success = 0x0000_0000,
    Unsuccessful = 0xC000_0001,
    NotSupported = 0xC000_00BB,
    NoMemory = 0xC000_0017,
    InvalidDeviceRequest = 0xC000_0010,
    InvalidParameter = 0xC000_000D,
    BufferTooSmall = 0xC000_0023,
    /// Reported only for requests completed by the shutdown drain phase.
    Cancelled = 0xC000_0120,
}

impl NtStatus {
    /// Returns the raw 32-bit value written to the wire.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// `true` for [`NtStatus::Success`] only.
    pub fn is_success(self) -> bool {
        self == NtStatus::Success
    }
}

impl TryFrom<u32> for NtStatus {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0000_0000 => Ok(NtStatus::Success),
            0xC000_0001 => Ok(NtStatus::Unsuccessful),
            0xC000_00BB => Ok(NtStatus::NotSupported),
            0xC000_0017 => Ok(NtStatus::NoMemory),
            0xC000_0010 => Ok(NtStatus::InvalidDeviceRequest),
            0xC000_000D => Ok(NtStatus::InvalidParameter),
            0xC000_0023 => Ok(NtStatus::BufferTooSmall),
            0xC000_0120 => Ok(NtStatus::Cancelled),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} (0x{:08X})", self.code())
    }
}
