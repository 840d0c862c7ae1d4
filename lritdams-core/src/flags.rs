//! Flag bytes carried in broadcast files.

use bitflags::bitflags;

use crate::message::Baud;

bitflags! {
    /// Message flag byte of an HRIT DCP message block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HritMsgFlags: u8 {
        /// Low three bits: 1 = 100, 2 = 300, 3 = 1200 baud.
        const BAUD_MASK = 0x07;
        const PLATFORM_CS2 = 0x08;
        const PARITY_ERRORS = 0x10;
        const NO_EOT = 0x20;
        const BINARY = 0x40;
    }
}

impl HritMsgFlags {
    pub fn baud(self) -> Baud {
        match self.bits() & Self::BAUD_MASK.bits() {
            1 => Baud::B100,
            2 => Baud::B300,
            3 => Baud::B1200,
            _ => Baud::Unknown,
        }
    }
}

bitflags! {
    /// Address-resolution (ARM) flag byte of an HRIT DCP message block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArmFlags: u8 {
        const ADDR_CORRECTED = 0x01;
        const UNCORRECTABLE_ADDR = 0x02;
        const ADDR_NOT_IN_PDT = 0x04;
        const PDT_INCOMPLETE = 0x08;
        const TIMING_ERROR = 0x10;
        const UNEXPECTED_MSG = 0x20;
        const WRONG_CHANNEL = 0x40;
    }
}

bitflags! {
    /// 16-bit flag word preceding each message in a legacy (DCSD) file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LritMsgFlags: u16 {
        const BINARY = 0x0010;
        const PARITY_ERRORS = 0x0020;
        const HAS_CARRIER_TIMES = 0x0040;
        const ADDR_CORRECTED = 0x0080;
        /// 0x0100 = 100, 0x0200 = 300, 0x0300 = 1200 baud.
        const BAUD_MASK = 0x0300;
    }
}

impl LritMsgFlags {
    pub fn baud(self) -> Baud {
        match (self.bits() & Self::BAUD_MASK.bits()) >> 8 {
            1 => Baud::B100,
            2 => Baud::B300,
            3 => Baud::B1200,
            _ => Baud::Unknown,
        }
    }
}
