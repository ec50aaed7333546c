//! Native serial driver implementations.
//!
//! Both drivers share the little-endian helpers below for the control codes
//! whose input or output is a single `u32`.

pub mod loopback;
pub mod serial;

pub use loopback::LoopbackDriver;
pub use serial::SerialPortDriver;

use crate::application::comm::CommError;

/// Writes `value` into the first four bytes of a control output buffer.
pub(crate) fn put_u32(output: &mut [u8], value: u32) -> Result<usize, CommError> {
    let available = output.len();
    let slot = output
        .get_mut(..4)
        .ok_or(CommError::InsufficientBuffer { needed: 4, available })?;
    slot.copy_from_slice(&value.to_le_bytes());
    Ok(4)
}

/// Reads the `u32` a control code expects as its input.
pub(crate) fn get_u32(input: &[u8]) -> Result<u32, CommError> {
    input
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| CommError::InvalidInput(format!("expected 4 input bytes, got {}", input.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_u32_requires_four_bytes() {
        let mut short = [0u8; 3];
        assert!(matches!(
            put_u32(&mut short, 1),
            Err(CommError::InsufficientBuffer { needed: 4, available: 3 })
        ));

        let mut exact = [0u8; 6];
        assert_eq!(put_u32(&mut exact, 0x0403_0201).unwrap(), 4);
        assert_eq!(exact, [1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_get_u32_rejects_short_input() {
        assert_eq!(get_u32(&[0x80, 0x25, 0, 0, 9]).unwrap(), 9600);
        assert!(matches!(get_u32(&[1, 2]), Err(CommError::InvalidInput(_))));
    }
}
