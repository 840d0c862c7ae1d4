//! DCP message model.
//!
//! A [`DcpMessage`] is what the broadcast-file reader extracts and what
//! the translator consumes. Header fields are kept as the raw ASCII
//! bytes of the 37-byte GOES DOMSAT header so they can be copied into
//! the DAMS-NT frame verbatim.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{HritError, HritErrorCode};

/// Length of the GOES DOMSAT header that precedes every payload.
pub const DOMSAT_HEADER_LEN: usize = 37;

/// `yyDDDHHMMSSmmm`, the 14-character carrier timestamp.
pub const CARRIER_TIME_FORMAT: &str = "%y%j%H%M%S%3f";

/// Length of one formatted carrier timestamp.
pub const CARRIER_TIME_LEN: usize = 14;

// DOMSAT header field offsets.
const IDX_DCP_ADDR: usize = 0;
const IDX_START_TIME: usize = 8;
const IDX_FAILCODE: usize = 19;
const IDX_SIGSTRENGTH: usize = 20;
const IDX_FREQOFFSET: usize = 22;
const IDX_MODINDEX: usize = 24;
const IDX_DATAQUALITY: usize = 25;
const IDX_GOESCHANNEL: usize = 26;
const IDX_GOES_SC: usize = 29;
const IDX_SOURCE: usize = 30;
const IDX_DATALENGTH: usize = 32;

// ── Baud ─────────────────────────────────────────────────────────

/// Transmission rate of a GOES platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Baud {
    B100,
    B300,
    B1200,
    #[default]
    Unknown,
}

impl Baud {
    /// Map a numeric rate; anything unrecognised is `Unknown`.
    pub fn from_rate(rate: u32) -> Self {
        match rate {
            100 => Baud::B100,
            300 => Baud::B300,
            1200 => Baud::B1200,
            _ => Baud::Unknown,
        }
    }

    pub fn rate(self) -> Option<u32> {
        match self {
            Baud::B100 => Some(100),
            Baud::B300 => Some(300),
            Baud::B1200 => Some(1200),
            Baud::Unknown => None,
        }
    }

    /// The 4-digit DAMS-NT baud field. Unknown rates are sent as 300.
    pub fn field(self) -> &'static [u8; 4] {
        match self {
            Baud::B100 => b"0100",
            Baud::B1200 => b"1200",
            Baud::B300 | Baud::Unknown => b"0300",
        }
    }
}

impl fmt::Display for Baud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rate() {
            Some(r) => write!(f, "{r}"),
            None => write!(f, "unknown"),
        }
    }
}

// ── DcpMessage ───────────────────────────────────────────────────

/// One platform transmission extracted from a broadcast file.
#[derive(Debug, Clone, PartialEq)]
pub struct DcpMessage {
    /// Address after ARM correction, 8 hex digits.
    pub address: String,
    /// Address as received, before any correction.
    pub original_address: String,
    /// `yyDDDHHMMSS`, copied from the DOMSAT header.
    pub start_time: [u8; 11],
    /// `G` for a good message, `?` for parity errors.
    pub fail_code: u8,
    pub signal_strength: [u8; 2],
    pub frequency_offset: [u8; 2],
    pub modulation_index: u8,
    pub data_quality: u8,
    pub channel: u16,
    pub spacecraft: u8,
    pub source_code: [u8; 2],
    pub baud: Baud,
    pub payload: Bytes,
    pub carrier_start: Option<DateTime<Utc>>,
    pub carrier_stop: Option<DateTime<Utc>>,
    /// Payload is binary rather than parity-protected ASCII.
    pub binary: bool,
    /// Bit errors were detected in a binary payload.
    pub bit_errors: bool,
    pub sequence_num: u32,
}

impl DcpMessage {
    /// Parse a DOMSAT header followed by its payload.
    ///
    /// `bytes` must hold at least the header; the payload length comes
    /// from the header's 5-digit length field.
    pub fn from_domsat(bytes: &[u8]) -> Result<Self, HritError> {
        if bytes.len() < DOMSAT_HEADER_LEN {
            return Err(HritError::new(
                HritErrorCode::IncompleteFile,
                format!("DOMSAT header needs {DOMSAT_HEADER_LEN} bytes, have {}", bytes.len()),
            ));
        }

        let len_field = &bytes[IDX_DATALENGTH..DOMSAT_HEADER_LEN];
        let len = parse_digits(len_field).ok_or_else(|| {
            HritError::new(
                HritErrorCode::BadHeader,
                format!(
                    "invalid message length field '{}'",
                    String::from_utf8_lossy(len_field)
                ),
            )
        })?;
        let end = DOMSAT_HEADER_LEN + len as usize;
        if bytes.len() < end {
            return Err(HritError::new(
                HritErrorCode::IncompleteFile,
                format!("message declares {len} data bytes, have {}", bytes.len() - DOMSAT_HEADER_LEN),
            ));
        }

        let channel_field = &bytes[IDX_GOESCHANNEL..IDX_GOES_SC];
        let channel = parse_digits(channel_field).unwrap_or(0) as u16;
        let address = String::from_utf8_lossy(&bytes[IDX_DCP_ADDR..IDX_START_TIME])
            .trim()
            .to_string();

        let mut start_time = [0u8; 11];
        start_time.copy_from_slice(&bytes[IDX_START_TIME..IDX_FAILCODE]);

        Ok(Self {
            original_address: address.clone(),
            address,
            start_time,
            fail_code: bytes[IDX_FAILCODE],
            signal_strength: [bytes[IDX_SIGSTRENGTH], bytes[IDX_SIGSTRENGTH + 1]],
            frequency_offset: [bytes[IDX_FREQOFFSET], bytes[IDX_FREQOFFSET + 1]],
            modulation_index: bytes[IDX_MODINDEX],
            data_quality: bytes[IDX_DATAQUALITY],
            channel,
            spacecraft: bytes[IDX_GOES_SC],
            source_code: [bytes[IDX_SOURCE], bytes[IDX_SOURCE + 1]],
            baud: Baud::Unknown,
            payload: Bytes::copy_from_slice(&bytes[DOMSAT_HEADER_LEN..end]),
            carrier_start: None,
            carrier_stop: None,
            binary: false,
            bit_errors: false,
            sequence_num: 0,
        })
    }

    /// Rebuild the 37-byte DOMSAT header for this message.
    pub fn domsat_header(&self) -> [u8; DOMSAT_HEADER_LEN] {
        let mut h = [b' '; DOMSAT_HEADER_LEN];
        let addr = self.address.as_bytes();
        let n = addr.len().min(8);
        h[..n].copy_from_slice(&addr[..n]);
        h[IDX_START_TIME..IDX_FAILCODE].copy_from_slice(&self.start_time);
        h[IDX_FAILCODE] = self.fail_code;
        h[IDX_SIGSTRENGTH..IDX_FREQOFFSET].copy_from_slice(&self.signal_strength);
        h[IDX_FREQOFFSET..IDX_MODINDEX].copy_from_slice(&self.frequency_offset);
        h[IDX_MODINDEX] = self.modulation_index;
        h[IDX_DATAQUALITY] = self.data_quality;
        h[IDX_GOESCHANNEL..IDX_GOES_SC]
            .copy_from_slice(format!("{:03}", self.channel % 1000).as_bytes());
        h[IDX_GOES_SC] = self.spacecraft;
        h[IDX_SOURCE..IDX_DATALENGTH].copy_from_slice(&self.source_code);
        h[IDX_DATALENGTH..]
            .copy_from_slice(format!("{:05}", self.payload.len() % 100_000).as_bytes());
        h
    }

    /// Both carrier timestamps, if the receiver supplied them.
    pub fn carrier_times(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.carrier_start.zip(self.carrier_stop)
    }

    pub fn has_carrier_times(&self) -> bool {
        self.carrier_times().is_some()
    }
}

impl fmt::Display for DcpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch{:03}{} {} {}B",
            self.address,
            self.channel,
            self.spacecraft as char,
            String::from_utf8_lossy(&self.start_time),
            self.payload.len()
        )
    }
}

// ── Carrier time helpers ─────────────────────────────────────────

pub fn format_carrier_time(t: &DateTime<Utc>) -> String {
    t.format(CARRIER_TIME_FORMAT).to_string()
}

pub fn parse_carrier_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, CARRIER_TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Parse an all-digit ASCII field (surrounding spaces allowed).
pub(crate) fn parse_digits(field: &[u8]) -> Option<u32> {
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEADER: &[u8; 37] = b"CE1234AB24123120000G44+0NN123EUP00005";

    #[test]
    fn baud_field_mapping() {
        assert_eq!(Baud::from_rate(100).field(), b"0100");
        assert_eq!(Baud::from_rate(300).field(), b"0300");
        assert_eq!(Baud::from_rate(1200).field(), b"1200");
        assert_eq!(Baud::from_rate(0).field(), b"0300");
        assert_eq!(Baud::from_rate(9600).field(), b"0300");
    }

    #[test]
    fn parse_domsat_header() {
        let mut raw = HEADER.to_vec();
        raw.extend_from_slice(b"HELLO");
        let msg = DcpMessage::from_domsat(&raw).unwrap();
        assert_eq!(msg.address, "CE1234AB");
        assert_eq!(&msg.start_time, b"24123120000");
        assert_eq!(msg.fail_code, b'G');
        assert_eq!(&msg.signal_strength, b"44");
        assert_eq!(&msg.frequency_offset, b"+0");
        assert_eq!(msg.modulation_index, b'N');
        assert_eq!(msg.data_quality, b'N');
        assert_eq!(msg.channel, 123);
        assert_eq!(msg.spacecraft, b'E');
        assert_eq!(&msg.source_code, b"UP");
        assert_eq!(&msg.payload[..], b"HELLO");
        assert_eq!(&msg.domsat_header(), HEADER);
    }

    #[test]
    fn parse_domsat_rejects_bad_length() {
        let mut raw = HEADER.to_vec();
        raw[32..37].copy_from_slice(b"00x05");
        let err = DcpMessage::from_domsat(&raw).unwrap_err();
        assert_eq!(err.code, HritErrorCode::BadHeader);

        // Declares 5 bytes, carries 2.
        let mut raw = HEADER.to_vec();
        raw.extend_from_slice(b"HE");
        let err = DcpMessage::from_domsat(&raw).unwrap_err();
        assert_eq!(err.code, HritErrorCode::IncompleteFile);
    }

    #[test]
    fn carrier_time_format_is_fourteen_chars() {
        let t = Utc.with_ymd_and_hms(2024, 5, 2, 13, 4, 5).unwrap()
            + chrono::Duration::milliseconds(67);
        let s = format_carrier_time(&t);
        assert_eq!(s, "24123130405067");
        assert_eq!(s.len(), CARRIER_TIME_LEN);
        assert_eq!(parse_carrier_time(&s), Some(t));
    }
}
