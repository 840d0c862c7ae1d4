//! LRIT/HRIT DCS broadcast-file reader.
//!
//! # File layout
//!
//! ```text
//! [0]       primary header type (0)
//! [1:3)     primary header length (16, big-endian)
//! [3]       file type (130 = DCS)
//! [4:8)     offset of the DCS file header (big-endian)
//! ...
//! DCS file header, 64 bytes at that offset:
//!   [0:32)   original file name, space padded
//!   [32:40)  file length from the header start, ASCII
//!   [40:44)  source
//!   [44:48)  type, "DCSH" (HRIT blocks) or "DCSD" (legacy)
//!   [60:64)  CRC-32 of the first 60 bytes, little-endian
//! message area
//! [len-4:len) CRC-32 of header start .. len-4, little-endian
//! ```
//!
//! Call [`HritFileReader::load`], then [`HritFileReader::check_header`],
//! then iterate messages.

mod builder;
mod crc;

pub use builder::{HritFileBuilder, HritMessageSpec};
pub use crc::{crc16, crc32};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{HritError, HritErrorCode};
use crate::flags::{ArmFlags, HritMsgFlags, LritMsgFlags};
use crate::message::{
    CARRIER_TIME_LEN, DOMSAT_HEADER_LEN, DcpMessage, parse_carrier_time, parse_digits,
};

const PRIMARY_TYPE: u8 = 0;
const PRIMARY_LENGTH: u16 = 16;
const DCS_FILE_TYPE: u8 = 130;

/// Size of the DCS file header.
pub const DCS_HEADER_LEN: usize = 64;

const BLOCK_MESSAGE: u8 = 1;
const BLOCK_MISSING: u8 = 2;

/// Fixed bytes of a message block around the payload: 39 before, CRC
/// after.
const BLOCK_OVERHEAD: usize = 41;

/// Message-area format declared in the DCS file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcsFormat {
    /// `DCSH`: binary blocks with BCD times.
    Hrit,
    /// `DCSD`: `0x02 0x02` separated DOMSAT messages.
    Legacy,
}

// ── BroadcastParser ──────────────────────────────────────────────

/// Opens a broadcast file image and yields its messages.
///
/// The ingestor goes through this seam so the file format can be
/// swapped out.
pub trait BroadcastParser: Send + Sync {
    fn open(
        &self,
        name: &str,
        image: Bytes,
    ) -> Result<Box<dyn Iterator<Item = DcpMessage> + Send>, HritError>;
}

/// The stock parser: [`HritFileReader`] after a successful header check.
#[derive(Debug, Clone, Copy, Default)]
pub struct HritParser;

impl BroadcastParser for HritParser {
    fn open(
        &self,
        name: &str,
        image: Bytes,
    ) -> Result<Box<dyn Iterator<Item = DcpMessage> + Send>, HritError> {
        let mut reader = HritFileReader::new(name, image);
        reader.load()?;
        reader.check_header()?;
        Ok(Box::new(reader))
    }
}

// ── HritFileReader ───────────────────────────────────────────────

#[derive(Debug)]
pub struct HritFileReader {
    name: String,
    image: Bytes,
    header_start: usize,
    offset: usize,
    format: Option<DcsFormat>,
}

impl HritFileReader {
    pub fn new(name: impl Into<String>, image: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            header_start: 0,
            offset: 0,
            format: None,
        }
    }

    /// Validate the primary header and locate the DCS file header.
    pub fn load(&mut self) -> Result<(), HritError> {
        let img = &self.image;
        if img.len() < DCS_HEADER_LEN {
            return Err(HritError::new(
                HritErrorCode::IncompleteFile,
                format!("incomplete CCSDS file header, length={}", img.len()),
            ));
        }

        let htype = img[0];
        let hlen = u16::from_be_bytes([img[1], img[2]]);
        let ftype = img[3];
        if htype != PRIMARY_TYPE || hlen != PRIMARY_LENGTH {
            return Err(HritError::new(
                HritErrorCode::WrongFileType,
                format!("invalid LRIT file header: headerType={htype}, headerLen={hlen}"),
            ));
        }
        if ftype != DCS_FILE_TYPE {
            return Err(HritError::new(
                HritErrorCode::WrongFileType,
                format!("non-DCS file type {ftype}, expected {DCS_FILE_TYPE}"),
            ));
        }

        self.header_start = u32::from_be_bytes([img[4], img[5], img[6], img[7]]) as usize;
        debug!(file = %self.name, header_start = self.header_start, "read valid LRIT header");
        Ok(())
    }

    /// Check the DCS header, its CRC, the declared length and the
    /// whole-file CRC.
    pub fn check_header(&mut self) -> Result<(), HritError> {
        let start = self.header_start;
        let available = self.image.len().saturating_sub(start);
        if available < DCS_HEADER_LEN {
            return Err(HritError::new(
                HritErrorCode::IncompleteFile,
                format!("incomplete DCS file header, length={available}"),
            ));
        }
        let img = &self.image[start..];

        let computed = crc32(&img[..60]);
        let in_file = le_u32(&img[60..64]);
        if computed != in_file {
            return Err(HritError::new(
                HritErrorCode::BadFileCrc,
                format!("header CRC failed, computed={computed:#010x}, in file={in_file:#010x}"),
            ));
        }

        let format = match self.file_type().trim() {
            "DCSH" => DcsFormat::Hrit,
            "DCSD" => DcsFormat::Legacy,
            other => {
                return Err(HritError::new(
                    HritErrorCode::WrongFileType,
                    format!("unrecognized type in DCS header '{other}'"),
                ));
            }
        };

        let len_field = &img[32..40];
        let expected = parse_digits(len_field).ok_or_else(|| {
            HritError::new(
                HritErrorCode::BadHeader,
                format!(
                    "invalid file length in DCS header '{}'",
                    String::from_utf8_lossy(len_field)
                ),
            )
        })? as usize;
        if expected > available {
            return Err(HritError::new(
                HritErrorCode::IncompleteFile,
                format!("expected length={expected}, actual length={available}"),
            ));
        }

        let body = &img[..available - 4];
        let computed = crc32(body);
        let in_file = le_u32(&img[available - 4..]);
        if computed != in_file {
            return Err(HritError::new(
                HritErrorCode::BadFileCrc,
                format!("file CRC failed, computed={computed:#010x}, in file={in_file:#010x}"),
            ));
        }

        self.format = Some(format);
        self.offset = start + DCS_HEADER_LEN;
        Ok(())
    }

    pub fn format(&self) -> Option<DcsFormat> {
        self.format
    }

    /// File name recorded by the uplink, up to the first space.
    pub fn original_file_name(&self) -> String {
        self.header_text(0, 32)
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn source(&self) -> String {
        self.header_text(40, 4)
    }

    pub fn file_type(&self) -> String {
        self.header_text(44, 4)
    }

    fn header_text(&self, at: usize, len: usize) -> String {
        let from = self.header_start + at;
        self.image
            .get(from..from + len)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Next message, or `None` at the end of the file. Only valid after
    /// a successful [`check_header`](Self::check_header).
    pub fn next_message(&mut self) -> Option<DcpMessage> {
        match self.format? {
            DcsFormat::Hrit => loop {
                match self.next_block()? {
                    Some(msg) => return Some(msg),
                    None => continue,
                }
            },
            DcsFormat::Legacy => self.next_legacy(),
        }
    }

    // ── HRIT blocks ──────────────────────────────────────────────

    /// Outer `None` ends iteration; inner `None` is a block to skip.
    fn next_block(&mut self) -> Option<Option<DcpMessage>> {
        let len = self.image.len();
        if len < 8 || self.offset >= len - 8 {
            return None;
        }

        let at = self.offset;
        let blk_id = self.image[at];
        let blk_len = u16::from_le_bytes([self.image[at + 1], self.image[at + 2]]) as usize;
        if blk_len < 8 {
            warn!(file = %self.name, offset = at, blk_len, "block too short, aborting file");
            self.offset = len;
            return None;
        }
        if at + blk_len > len - 2 {
            warn!(
                file = %self.name,
                offset = at,
                blk_len,
                file_len = len,
                "block runs past end of file, aborting file"
            );
            self.offset = len;
            return None;
        }
        self.offset += blk_len;

        let block = self.image.slice(at..at + blk_len);
        match blk_id {
            BLOCK_MESSAGE => Some(self.parse_message_block(&block)),
            BLOCK_MISSING => {
                debug!(file = %self.name, "skipping missing-message block");
                Some(None)
            }
            other => {
                warn!(file = %self.name, block_type = other, "invalid block type, expected 1 or 2");
                Some(None)
            }
        }
    }

    fn parse_message_block(&self, blk: &[u8]) -> Option<DcpMessage> {
        if blk.len() < BLOCK_OVERHEAD {
            warn!(file = %self.name, blk_len = blk.len(), "message block shorter than its header");
            return None;
        }

        let crc_at = blk.len() - 2;
        let crc_in_file = u16::from_le_bytes([blk[crc_at], blk[crc_at + 1]]);
        if crc16(&blk[..crc_at]) != crc_in_file {
            debug!(file = %self.name, "block CRC mismatch");
        }

        let seq = blk[3] as u32 | (blk[4] as u32) << 8 | (blk[5] as u32) << 16;
        let msg_flags = HritMsgFlags::from_bits_retain(blk[6]);
        let arm_flags = ArmFlags::from_bits_retain(blk[7]);
        let address = format!("{:08X}", le_u32(&blk[8..12]));

        let (Some(carrier_start), Some(carrier_stop)) = (bcd_time(&blk[12..19]), bcd_time(&blk[19..26]))
        else {
            warn!(file = %self.name, seq, %address, "carrier times out of range, skipping message");
            return None;
        };

        let sig_x10 = le_u16(&blk[26..28]) & 0x3ff;

        let mut freq_x10 = (le_u16(&blk[28..30]) & 0x3fff) as i32;
        if freq_x10 & 0x2000 != 0 {
            freq_x10 -= 0x4000;
        }
        let freq_units = (freq_x10 / 500).unsigned_abs();
        let freq_digit = if freq_units >= 10 {
            b'A'
        } else {
            b'0' + freq_units as u8
        };

        let modulation_index = match le_u16(&blk[30..32]) >> 14 {
            0 => b'U',
            1 => b'N',
            2 => b'H',
            _ => b'L',
        };

        let good_phase_pct = blk[32] as f64 / 2.0;
        let data_quality = if good_phase_pct >= 85.0 {
            b'N'
        } else if good_phase_pct >= 75.0 {
            b'F'
        } else {
            b'P'
        };

        let chan = le_u16(&blk[33..35]);
        let spacecraft = match (chan >> 12) & 0xf {
            1 => b'E',
            2 => b'W',
            3 => b'C',
            _ => b'U',
        };

        let binary = msg_flags.contains(HritMsgFlags::BINARY);
        let parity = msg_flags.contains(HritMsgFlags::PARITY_ERRORS);
        let raw = &blk[39..crc_at];
        let payload = if binary {
            Bytes::copy_from_slice(raw)
        } else {
            raw.iter().map(|b| b & 0x7f).collect::<Vec<u8>>().into()
        };

        let mut start_time = [0u8; 11];
        start_time.copy_from_slice(carrier_start.format("%y%j%H%M%S").to_string().as_bytes());

        if arm_flags.contains(ArmFlags::ADDR_CORRECTED) {
            debug!(file = %self.name, %address, "address was corrected by ARM");
        }

        Some(DcpMessage {
            original_address: address.clone(),
            address,
            start_time,
            fail_code: if parity { b'?' } else { b'G' },
            signal_strength: two_digits(sig_x10 / 10),
            frequency_offset: [if freq_x10 < 0 { b'-' } else { b'+' }, freq_digit],
            modulation_index,
            data_quality,
            channel: chan & 0x3ff,
            spacecraft,
            source_code: [blk[35], blk[36]],
            baud: msg_flags.baud(),
            payload,
            carrier_start: Some(carrier_start),
            carrier_stop: Some(carrier_stop),
            binary,
            bit_errors: binary && parity,
            sequence_num: seq,
        })
    }

    // ── Legacy DCSD ──────────────────────────────────────────────

    fn next_legacy(&mut self) -> Option<DcpMessage> {
        loop {
            let len = self.image.len();
            if len < 4 || self.offset >= len - 4 {
                return None;
            }

            let mut skipped = 0usize;
            while self.offset < len - 2 {
                if self.image[self.offset] == 2 && self.image[self.offset + 1] == 2 {
                    self.offset += 2;
                    break;
                }
                self.offset += 1;
                skipped += 1;
            }
            if skipped > 0 {
                debug!(file = %self.name, skipped, "characters skipped before message start");
            }

            // Flag word plus DOMSAT header.
            if self.offset + 2 + DOMSAT_HEADER_LEN > len {
                return None;
            }
            let flags = LritMsgFlags::from_bits_retain(u16::from_be_bytes([
                self.image[self.offset],
                self.image[self.offset + 1],
            ]));
            self.offset += 2;

            let mut msg = match DcpMessage::from_domsat(&self.image[self.offset..len - 4]) {
                Ok(m) => m,
                Err(e) if e.code == HritErrorCode::BadHeader => {
                    info!(file = %self.name, error = %e, "skipping to next message start");
                    continue;
                }
                Err(e) => {
                    warn!(file = %self.name, error = %e, "truncated message, aborting file");
                    self.offset = len;
                    return None;
                }
            };
            self.offset += DOMSAT_HEADER_LEN + msg.payload.len();

            msg.baud = flags.baud();
            msg.binary = flags.contains(LritMsgFlags::BINARY);
            msg.bit_errors = msg.binary && flags.contains(LritMsgFlags::PARITY_ERRORS);

            if flags.contains(LritMsgFlags::HAS_CARRIER_TIMES) {
                let line_len = CARRIER_TIME_LEN * 2 + 1;
                let times = self
                    .image
                    .get(self.offset..self.offset + line_len)
                    .and_then(|line| std::str::from_utf8(line).ok())
                    .and_then(|text| {
                        let start = parse_carrier_time(text.get(..CARRIER_TIME_LEN)?)?;
                        let stop = parse_carrier_time(text.get(CARRIER_TIME_LEN + 1..)?)?;
                        Some((start, stop))
                    });
                match times {
                    Some((start, stop)) => {
                        msg.carrier_start = Some(start);
                        msg.carrier_stop = Some(stop);
                    }
                    None => warn!(file = %self.name, offset = self.offset, "bad carrier times"),
                }
                self.offset += line_len;
            }
            return Some(msg);
        }
    }
}

impl Iterator for HritFileReader {
    type Item = DcpMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn two_digits(v: u16) -> [u8; 2] {
    let v = v % 100;
    [b'0' + (v / 10) as u8, b'0' + (v % 10) as u8]
}

/// 7-byte little-endian BCD `yyDDDHHMMSSmmm`: the most significant
/// digit pair is in the last byte.
///
/// Out-of-range fields roll over into the next larger unit (day 000 is
/// the last day of the previous year, hour 24 is the next day) so a
/// damaged timestamp never costs the message.
fn bcd_time(b: &[u8]) -> Option<chrono::DateTime<chrono::Utc>> {
    let hi = |i: usize| (b[i] >> 4) as i64;
    let lo = |i: usize| (b[i] & 0x0f) as i64;

    let yy = hi(6) * 10 + lo(6);
    let ddd = hi(5) * 100 + lo(5) * 10 + hi(4);
    let hh = lo(4) * 10 + hi(3);
    let mm = lo(3) * 10 + hi(2);
    let ss = lo(2) * 10 + hi(1);
    let ms = lo(1) * 100 + hi(0) * 10 + lo(0);

    let new_year = chrono::NaiveDate::from_yo_opt(2000 + yy as i32, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    Some(
        new_year
            + chrono::Duration::days(ddd - 1)
            + chrono::Duration::hours(hh)
            + chrono::Duration::minutes(mm)
            + chrono::Duration::seconds(ss)
            + chrono::Duration::milliseconds(ms),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn spec() -> HritMessageSpec {
        HritMessageSpec {
            address: 0xCE12_34AB,
            carrier_start: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
            carrier_stop: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 3).unwrap(),
            payload: b"HG 12.3".to_vec(),
            ..HritMessageSpec::default()
        }
    }

    fn open(bytes: Vec<u8>) -> HritFileReader {
        let mut r = HritFileReader::new("test.dcs", bytes);
        r.load().unwrap();
        r.check_header().unwrap();
        r
    }

    #[test]
    fn bcd_roundtrip() {
        let t = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap()
            + chrono::Duration::milliseconds(123);
        let packed = builder::bcd_encode(&t);
        assert_eq!(bcd_time(&packed), Some(t));
    }

    #[test]
    fn bcd_fields_roll_over() {
        // 24 000 25:61:00.000
        let packed = [0x00, 0x00, 0x10, 0x56, 0x02, 0x00, 0x24];
        assert_eq!(
            bcd_time(&packed),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 2, 1, 0).unwrap())
        );
    }

    #[test]
    fn day_zero_carrier_time_keeps_message() {
        let mut file = HritFileBuilder::new("f").message(spec()).build();
        // Carrier start sits 12 bytes into the first block.
        let start = PRIMARY_LENGTH as usize + DCS_HEADER_LEN + 12;
        file[start + 5] = 0x00;
        file[start + 4] &= 0x0f;
        let n = file.len();
        let crc = crc32(&file[PRIMARY_LENGTH as usize..n - 4]);
        file[n - 4..].copy_from_slice(&crc.to_le_bytes());

        let msgs: Vec<_> = open(file).collect();
        assert_eq!(msgs.len(), 1);
        assert_eq!(
            msgs[0].carrier_start,
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap())
        );
        assert_eq!(&msgs[0].start_time, b"23365120000");
    }

    #[test]
    fn reads_hrit_message() {
        let file = HritFileBuilder::new("DCS_TEST").message(spec()).build();
        let mut r = open(file);
        assert_eq!(r.format(), Some(DcsFormat::Hrit));
        assert_eq!(r.original_file_name(), "DCS_TEST");
        assert_eq!(r.file_type(), "DCSH");

        let msg = r.next_message().unwrap();
        assert_eq!(msg.address, "CE1234AB");
        assert_eq!(&msg.start_time, b"24123120000");
        assert_eq!(msg.fail_code, b'G');
        assert_eq!(&msg.signal_strength, b"44");
        assert_eq!(&msg.frequency_offset, b"+1");
        assert_eq!(msg.modulation_index, b'N');
        assert_eq!(msg.data_quality, b'N');
        assert_eq!(msg.channel, 57);
        assert_eq!(msg.spacecraft, b'E');
        assert_eq!(msg.baud, crate::message::Baud::B300);
        assert_eq!(&msg.payload[..], b"HG 12.3");
        assert!(msg.has_carrier_times());
        assert!(r.next_message().is_none());
    }

    #[test]
    fn derived_fields() {
        let mut s = spec();
        s.msg_flags = HritMsgFlags::PARITY_ERRORS.bits() | 3;
        s.freq_offset_x10 = -5200;
        s.noise_x100 = 0xC000;
        s.good_phase_x2 = 160;
        s.channel = 195 | (2 << 12);
        s.signal_x10 = 1010;
        s.payload = vec![b'A' | 0x80, b'B'];
        let mut r = open(HritFileBuilder::new("f").message(s).build());
        let msg = r.next_message().unwrap();
        assert_eq!(msg.fail_code, b'?');
        assert_eq!(&msg.frequency_offset, b"-A");
        assert_eq!(msg.modulation_index, b'L');
        assert_eq!(msg.data_quality, b'F');
        assert_eq!(msg.channel, 195);
        assert_eq!(msg.spacecraft, b'W');
        assert_eq!(&msg.signal_strength, b"01");
        assert_eq!(msg.baud, crate::message::Baud::B1200);
        assert_eq!(&msg.payload[..], b"AB");
    }

    #[test]
    fn binary_payload_kept_raw() {
        let mut s = spec();
        s.msg_flags = HritMsgFlags::BINARY.bits() | HritMsgFlags::PARITY_ERRORS.bits();
        s.payload = vec![0xff, 0x00, 0x80];
        let mut r = open(HritFileBuilder::new("f").message(s).build());
        let msg = r.next_message().unwrap();
        assert!(msg.binary);
        assert!(msg.bit_errors);
        assert_eq!(msg.fail_code, b'?');
        assert_eq!(&msg.payload[..], &[0xff, 0x00, 0x80]);
    }

    #[test]
    fn parity_errors_flag_frame_error_code() {
        let translator = crate::translate::MessageTranslator::default();
        for (flags, want) in [
            (HritMsgFlags::PARITY_ERRORS.bits(), b'1'),
            (HritMsgFlags::PARITY_ERRORS.bits() | HritMsgFlags::BINARY.bits(), b'1'),
            (HritMsgFlags::BINARY.bits(), b'0'),
            (0, b'0'),
        ] {
            let mut s = spec();
            s.msg_flags = flags | 2;
            let msg = open(HritFileBuilder::new("f").message(s).build())
                .next_message()
                .unwrap();
            let frame = translator.translate(&msg);
            assert_eq!(frame.error_code(), Some(want), "flags {flags:#04x}");
        }
    }

    #[test]
    fn skips_missing_message_blocks() {
        let mut second = spec();
        second.payload = b"second".to_vec();
        let file = HritFileBuilder::new("f")
            .message(spec())
            .missing_message(7)
            .message(second)
            .build();
        let msgs: Vec<_> = open(file).collect();
        assert_eq!(msgs.len(), 2);
        assert_eq!(&msgs[1].payload[..], b"second");
    }

    #[test]
    fn reads_legacy_messages() {
        let mut raw = b"CE1234AB24123120000G44+0NN123EUP00005".to_vec();
        raw.extend_from_slice(b"HELLO");
        let mut msg = DcpMessage::from_domsat(&raw).unwrap();
        msg.carrier_start = Some(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap());
        msg.carrier_stop = Some(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 1).unwrap());
        let flags = LritMsgFlags::HAS_CARRIER_TIMES.bits() | 0x0100;

        let file = HritFileBuilder::legacy("old")
            .domsat(msg.clone(), flags)
            .domsat(msg.clone(), 0)
            .build();
        let mut r = open(file);
        assert_eq!(r.format(), Some(DcsFormat::Legacy));

        let a = r.next_message().unwrap();
        assert_eq!(&a.payload[..], b"HELLO");
        assert_eq!(a.baud, crate::message::Baud::B100);
        assert_eq!(a.carrier_times(), msg.carrier_times());

        let b = r.next_message().unwrap();
        assert!(!b.has_carrier_times());
        assert!(r.next_message().is_none());
    }

    #[test]
    fn rejects_bad_primary_header() {
        let mut file = HritFileBuilder::new("f").message(spec()).build();
        file[3] = 7;
        let err = HritFileReader::new("f", file).load().unwrap_err();
        assert_eq!(err.code, HritErrorCode::WrongFileType);

        let err = HritFileReader::new("f", vec![0u8; 10]).load().unwrap_err();
        assert_eq!(err.code, HritErrorCode::IncompleteFile);
    }

    #[test]
    fn rejects_corrupt_or_truncated_body() {
        let file = HritFileBuilder::new("f").message(spec()).build();

        let mut corrupt = file.clone();
        let n = corrupt.len();
        corrupt[n - 10] ^= 0x55;
        let mut r = HritFileReader::new("f", corrupt);
        r.load().unwrap();
        assert_eq!(r.check_header().unwrap_err().code, HritErrorCode::BadFileCrc);

        let truncated = file[..file.len() - 20].to_vec();
        let mut r = HritFileReader::new("f", truncated);
        r.load().unwrap();
        assert_eq!(r.check_header().unwrap_err().code, HritErrorCode::IncompleteFile);
    }

    #[test]
    fn parser_seam_opens_files() {
        let file = HritFileBuilder::new("f").message(spec()).message(spec()).build();
        let msgs = HritParser.open("f", Bytes::from(file)).unwrap();
        assert_eq!(msgs.count(), 2);
        assert!(HritParser.open("junk", Bytes::from_static(b"junk")).is_err());
    }
}
