//! Serial device control codes and the bit flags carried in their buffers.
//!
//! Every serial IOCTL is `CTL_CODE(FILE_DEVICE_SERIAL_PORT, function,
//! METHOD_BUFFERED, FILE_ANY_ACCESS)`, i.e. `0x001B_0000 | (function << 2)`.

const fn serial_ctl_code(function: u32) -> u32 {
    (0x1B << 16) | (function << 2)
}

pub const IOCTL_SERIAL_SET_BAUD_RATE: u32 = serial_ctl_code(1);
pub const IOCTL_SERIAL_SET_QUEUE_SIZE: u32 = serial_ctl_code(2);
pub const IOCTL_SERIAL_SET_LINE_CONTROL: u32 = serial_ctl_code(3);
pub const IOCTL_SERIAL_SET_BREAK_ON: u32 = serial_ctl_code(4);
pub const IOCTL_SERIAL_SET_BREAK_OFF: u32 = serial_ctl_code(5);
pub const IOCTL_SERIAL_IMMEDIATE_CHAR: u32 = serial_ctl_code(6);
pub const IOCTL_SERIAL_SET_TIMEOUTS: u32 = serial_ctl_code(7);
pub const IOCTL_SERIAL_GET_TIMEOUTS: u32 = serial_ctl_code(8);
pub const IOCTL_SERIAL_SET_DTR: u32 = serial_ctl_code(9);
pub const IOCTL_SERIAL_CLR_DTR: u32 = serial_ctl_code(10);
pub const IOCTL_SERIAL_RESET_DEVICE: u32 = serial_ctl_code(11);
pub const IOCTL_SERIAL_SET_RTS: u32 = serial_ctl_code(12);
pub const IOCTL_SERIAL_CLR_RTS: u32 = serial_ctl_code(13);
pub const IOCTL_SERIAL_SET_XOFF: u32 = serial_ctl_code(14);
pub const IOCTL_SERIAL_SET_XON: u32 = serial_ctl_code(15);
pub const IOCTL_SERIAL_GET_WAIT_MASK: u32 = serial_ctl_code(16);
pub const IOCTL_SERIAL_SET_WAIT_MASK: u32 = serial_ctl_code(17);
pub const IOCTL_SERIAL_WAIT_ON_MASK: u32 = serial_ctl_code(18);
pub const IOCTL_SERIAL_PURGE: u32 = serial_ctl_code(19);
pub const IOCTL_SERIAL_GET_BAUD_RATE: u32 = serial_ctl_code(20);
pub const IOCTL_SERIAL_GET_LINE_CONTROL: u32 = serial_ctl_code(21);
pub const IOCTL_SERIAL_GET_CHARS: u32 = serial_ctl_code(22);
pub const IOCTL_SERIAL_SET_CHARS: u32 = serial_ctl_code(23);
pub const IOCTL_SERIAL_GET_HANDFLOW: u32 = serial_ctl_code(24);
pub const IOCTL_SERIAL_SET_HANDFLOW: u32 = serial_ctl_code(25);
pub const IOCTL_SERIAL_GET_MODEMSTATUS: u32 = serial_ctl_code(26);
pub const IOCTL_SERIAL_GET_COMMSTATUS: u32 = serial_ctl_code(27);
pub const IOCTL_SERIAL_XOFF_COUNTER: u32 = serial_ctl_code(28);
pub const IOCTL_SERIAL_GET_PROPERTIES: u32 = serial_ctl_code(29);
pub const IOCTL_SERIAL_GET_DTRRTS: u32 = serial_ctl_code(30);

/// `IOCTL_SERIAL_PURGE` input flags.
pub mod purge {
    pub const TXABORT: u32 = 0x0000_0001;
    pub const RXABORT: u32 = 0x0000_0002;
    pub const TXCLEAR: u32 = 0x0000_0004;
    pub const RXCLEAR: u32 = 0x0000_0008;
}

/// `IOCTL_SERIAL_GET_MODEMSTATUS` output bits.
pub mod modem_status {
    pub const CTS: u32 = 0x10;
    pub const DSR: u32 = 0x20;
    pub const RING: u32 = 0x40;
    pub const DCD: u32 = 0x80;
}

/// Human-readable name of a serial control code, for logs.
pub fn ioctl_name(code: u32) -> &'static str {
    match code {
        IOCTL_SERIAL_SET_BAUD_RATE => "IOCTL_SERIAL_SET_BAUD_RATE",
        IOCTL_SERIAL_SET_QUEUE_SIZE => "IOCTL_SERIAL_SET_QUEUE_SIZE",
        IOCTL_SERIAL_SET_LINE_CONTROL => "IOCTL_SERIAL_SET_LINE_CONTROL",
        IOCTL_SERIAL_SET_BREAK_ON => "IOCTL_SERIAL_SET_BREAK_ON",
        IOCTL_SERIAL_SET_BREAK_OFF => "IOCTL_SERIAL_SET_BREAK_OFF",
        IOCTL_SERIAL_IMMEDIATE_CHAR => "IOCTL_SERIAL_IMMEDIATE_CHAR",
        IOCTL_SERIAL_SET_TIMEOUTS => "IOCTL_SERIAL_SET_TIMEOUTS",
        IOCTL_SERIAL_GET_TIMEOUTS => "IOCTL_SERIAL_GET_TIMEOUTS",
        IOCTL_SERIAL_SET_DTR => "IOCTL_SERIAL_SET_DTR",
        IOCTL_SERIAL_CLR_DTR => "IOCTL_SERIAL_CLR_DTR",
        IOCTL_SERIAL_RESET_DEVICE => "IOCTL_SERIAL_RESET_DEVICE",
        IOCTL_SERIAL_SET_RTS => "IOCTL_SERIAL_SET_RTS",
        IOCTL_SERIAL_CLR_RTS => "IOCTL_SERIAL_CLR_RTS",
        IOCTL_SERIAL_SET_XOFF => "IOCTL_SERIAL_SET_XOFF",
        IOCTL_SERIAL_SET_XON => "IOCTL_SERIAL_SET_XON",
        IOCTL_SERIAL_GET_WAIT_MASK => "IOCTL_SERIAL_GET_WAIT_MASK",
        IOCTL_SERIAL_SET_WAIT_MASK => "IOCTL_SERIAL_SET_WAIT_MASK",
        IOCTL_SERIAL_WAIT_ON_MASK => "IOCTL_SERIAL_WAIT_ON_MASK",
        IOCTL_SERIAL_PURGE => "IOCTL_SERIAL_PURGE",
        IOCTL_SERIAL_GET_BAUD_RATE => "IOCTL_SERIAL_GET_BAUD_RATE",
        IOCTL_SERIAL_GET_LINE_CONTROL => "IOCTL_SERIAL_GET_LINE_CONTROL",
        IOCTL_SERIAL_GET_CHARS => "IOCTL_SERIAL_GET_CHARS",
        IOCTL_SERIAL_SET_CHARS => "IOCTL_SERIAL_SET_CHARS",
        IOCTL_SERIAL_GET_HANDFLOW => "IOCTL_SERIAL_GET_HANDFLOW",
        IOCTL_SERIAL_SET_HANDFLOW => "IOCTL_SERIAL_SET_HANDFLOW",
        IOCTL_SERIAL_GET_MODEMSTATUS => "IOCTL_SERIAL_GET_MODEMSTATUS",
        IOCTL_SERIAL_GET_COMMSTATUS => "IOCTL_SERIAL_GET_COMMSTATUS",
        IOCTL_SERIAL_XOFF_COUNTER => "IOCTL_SERIAL_XOFF_COUNTER",
        IOCTL_SERIAL_GET_PROPERTIES => "IOCTL_SERIAL_GET_PROPERTIES",
        IOCTL_SERIAL_GET_DTRRTS => "IOCTL_SERIAL_GET_DTRRTS",
        _ => "UNKNOWN_IOCTL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctl_codes_match_published_values() {
        assert_eq!(IOCTL_SERIAL_SET_BAUD_RATE, 0x001B_0004);
        assert_eq!(IOCTL_SERIAL_SET_DTR, 0x001B_0024);
        assert_eq!(IOCTL_SERIAL_PURGE, 0x001B_004C);
        assert_eq!(IOCTL_SERIAL_GET_BAUD_RATE, 0x001B_0050);
        assert_eq!(IOCTL_SERIAL_GET_MODEMSTATUS, 0x001B_0068);
        assert_eq!(IOCTL_SERIAL_GET_DTRRTS, 0x001B_0078);
    }

    #[test]
    fn test_ioctl_name_lookup() {
        assert_eq!(ioctl_name(0x001B_0030), "IOCTL_SERIAL_SET_RTS");
        assert_eq!(ioctl_name(0xDEAD_BEEF), "UNKNOWN_IOCTL");
    }
}
