//! Mapping from native failure kinds to protocol status codes.
//!
//! Device adapters normalise whatever their platform reports (errno, Win32
//! last-error, `io::ErrorKind`) into a [`NativeFailure`].  The table below is
//! the only place a failure kind becomes an [`NtStatus`].

use crate::protocol::status::NtStatus;

/// Platform-neutral classification of a failed native device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFailure {
    /// The handle is not (or no longer) valid.
    InvalidHandle,
    /// The device or driver does not implement the requested operation.
    NotSupported,
    /// The caller's output buffer cannot hold the result.
    InsufficientBuffer,
    /// Anything else; carries the raw OS code when one exists.
    Other(Option<i32>),
}

/// Maps a failed device-control call to the status reported to the peer.
///
/// | failure               | status                   |
/// |-----------------------|--------------------------|
/// | invalid handle        | invalid device request   |
/// | not supported         | invalid parameter        |
/// | insufficient buffer   | buffer too small         |
/// | anything else         | unsuccessful             |
pub fn status_for_control_failure(failure: NativeFailure) -> NtStatus {
    match failure {
        NativeFailure::InvalidHandle => NtStatus::InvalidDeviceRequest,
        NativeFailure::NotSupported => NtStatus::InvalidParameter,
        NativeFailure::InsufficientBuffer => NtStatus::BufferTooSmall,
        NativeFailure::Other(_) => NtStatus::Unsuccessful,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_failure_table() {
        assert_eq!(
            status_for_control_failure(NativeFailure::InvalidHandle),
            NtStatus::InvalidDeviceRequest
        );
        assert_eq!(
            status_for_control_failure(NativeFailure::NotSupported),
            NtStatus::InvalidParameter
        );
        assert_eq!(
            status_for_control_failure(NativeFailure::InsufficientBuffer),
            NtStatus::BufferTooSmall
        );
    }

    #[test]
    fn test_unknown_failures_are_unsuccessful() {
        assert_eq!(
            status_for_control_failure(NativeFailure::Other(Some(5))),
            NtStatus::Unsuccessful
        );
        assert_eq!(
            status_for_control_failure(NativeFailure::Other(None)),
            NtStatus::Unsuccessful
        );
    }
}
