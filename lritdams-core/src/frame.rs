//! DAMS-NT frame layout.
//!
//! ```text
//! [0:4)    start pattern
//! [4:7)    slot number (= channel)
//! [7:10)   channel number
//! [10]     spacecraft code
//! [11:15)  baud rate
//! [15:26)  start time, yyDDDHHMMSS
//! [26:28)  signal strength
//! [28:30)  frequency offset
//! [30]     modulation index
//! [31]     data quality
//! [32]     extended-time flag ('1' when carrier times follow)
//! [33]     error code
//! [34:42)  original address
//! [42:50)  corrected address
//! [50:55)  message length, n
//! [55:55+n) payload, then CRLF
//! optional "<carrier start> <carrier stop>\r\n" (14 + 1 + 14 + 2 bytes)
//! ```
//!
//! The idle heartbeat is the literal `NONE\r\n`.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::message::{CARRIER_TIME_LEN, parse_digits};

pub const START_PATTERN: Range<usize> = 0..4;
pub const SLOT: Range<usize> = 4..7;
pub const CHANNEL: Range<usize> = 7..10;
pub const SPACECRAFT: usize = 10;
pub const BAUD: Range<usize> = 11..15;
pub const START_TIME: Range<usize> = 15..26;
pub const SIGNAL_STRENGTH: Range<usize> = 26..28;
pub const FREQ_OFFSET: Range<usize> = 28..30;
pub const MOD_INDEX: usize = 30;
pub const DATA_QUALITY: usize = 31;
pub const EXTENDED_TIME: usize = 32;
pub const ERROR_CODE: usize = 33;
pub const ORIGINAL_ADDRESS: Range<usize> = 34..42;
pub const CORRECTED_ADDRESS: Range<usize> = 42..50;
pub const MESSAGE_LENGTH: Range<usize> = 50..55;

/// Bytes before the payload.
pub const FRAME_HEADER_LEN: usize = 55;

/// `start + ' ' + stop + CRLF`.
pub const CARRIER_LINE_LEN: usize = CARRIER_TIME_LEN * 2 + 3;

pub const HEARTBEAT: &[u8] = b"NONE\r\n";

pub const CRLF: &[u8] = b"\r\n";

// ── StartPattern ─────────────────────────────────────────────────

/// The 4-byte frame start marker, configured as 8 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StartPattern([u8; 4]);

impl StartPattern {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl Default for StartPattern {
    /// `SM\r\n`.
    fn default() -> Self {
        Self([0x53, 0x4D, 0x0D, 0x0A])
    }
}

impl FromStr for StartPattern {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        if hex.len() != 8 || !hex.is_ascii() {
            return Err(GatewayError::InvalidStartPattern(s.to_string()));
        }
        let mut out = [0u8; 4];
        for (i, b) in out.iter_mut().enumerate() {
            *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| GatewayError::InvalidStartPattern(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

impl TryFrom<String> for StartPattern {
    type Error = GatewayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StartPattern> for String {
    fn from(p: StartPattern) -> Self {
        p.to_string()
    }
}

impl fmt::Display for StartPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

// ── DamsNtFrame ──────────────────────────────────────────────────

/// One unit of the subscriber stream: a message frame or a heartbeat.
///
/// Cheap to clone; the distributor hands the same bytes to every
/// session.
#[derive(Clone, PartialEq, Eq)]
pub struct DamsNtFrame {
    bytes: Bytes,
}

impl DamsNtFrame {
    pub fn heartbeat() -> Self {
        Self {
            bytes: Bytes::from_static(HEARTBEAT),
        }
    }

    /// Wrap already-encoded bytes. No validation is done.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.bytes.as_ref() == HEARTBEAT
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    // ── Field accessors (message frames only) ────────────────────

    fn field(&self, r: Range<usize>) -> Option<&[u8]> {
        if self.is_heartbeat() {
            return None;
        }
        self.bytes.get(r)
    }

    fn byte(&self, i: usize) -> Option<u8> {
        self.field(i..i + 1).map(|b| b[0])
    }

    pub fn start_pattern(&self) -> Option<&[u8]> {
        self.field(START_PATTERN)
    }

    pub fn slot(&self) -> Option<u16> {
        self.field(SLOT).and_then(parse_digits).map(|v| v as u16)
    }

    pub fn channel(&self) -> Option<u16> {
        self.field(CHANNEL).and_then(parse_digits).map(|v| v as u16)
    }

    pub fn spacecraft(&self) -> Option<u8> {
        self.byte(SPACECRAFT)
    }

    pub fn baud(&self) -> Option<&[u8]> {
        self.field(BAUD)
    }

    pub fn start_time(&self) -> Option<&[u8]> {
        self.field(START_TIME)
    }

    pub fn signal_strength(&self) -> Option<&[u8]> {
        self.field(SIGNAL_STRENGTH)
    }

    pub fn frequency_offset(&self) -> Option<&[u8]> {
        self.field(FREQ_OFFSET)
    }

    pub fn modulation_index(&self) -> Option<u8> {
        self.byte(MOD_INDEX)
    }

    pub fn data_quality(&self) -> Option<u8> {
        self.byte(DATA_QUALITY)
    }

    pub fn has_extended_time(&self) -> bool {
        self.byte(EXTENDED_TIME) == Some(b'1')
    }

    pub fn error_code(&self) -> Option<u8> {
        self.byte(ERROR_CODE)
    }

    /// Original address with the space padding removed.
    pub fn original_address(&self) -> Option<&str> {
        self.field(ORIGINAL_ADDRESS)
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(str::trim_end)
    }

    /// Corrected address with the space padding removed.
    pub fn corrected_address(&self) -> Option<&str> {
        self.field(CORRECTED_ADDRESS)
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(str::trim_end)
    }

    pub fn message_length(&self) -> Option<usize> {
        self.field(MESSAGE_LENGTH)
            .and_then(parse_digits)
            .map(|v| v as usize)
    }

    pub fn payload(&self) -> Option<&[u8]> {
        let n = self.message_length()?;
        self.field(FRAME_HEADER_LEN..FRAME_HEADER_LEN + n)
    }

    /// Carrier start and stop as their 14-character strings.
    pub fn carrier_times(&self) -> Option<(&str, &str)> {
        if !self.has_extended_time() {
            return None;
        }
        let at = FRAME_HEADER_LEN + self.message_length()? + CRLF.len();
        let line = self.field(at..at + CARRIER_LINE_LEN)?;
        let line = std::str::from_utf8(line).ok()?;
        Some((
            &line[..CARRIER_TIME_LEN],
            &line[CARRIER_TIME_LEN + 1..CARRIER_TIME_LEN * 2 + 1],
        ))
    }
}

impl fmt::Debug for DamsNtFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_heartbeat() {
            return f.write_str("DamsNtFrame(heartbeat)");
        }
        f.debug_struct("DamsNtFrame")
            .field("channel", &self.channel())
            .field("address", &self.corrected_address())
            .field("length", &self.message_length())
            .field("extended_time", &self.has_extended_time())
            .finish()
    }
}
