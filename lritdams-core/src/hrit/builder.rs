//! Synthesizes DCS broadcast files, mainly for feeding fixtures to the
//! reader and the ingest pipeline.

use chrono::{DateTime, Utc};

use super::crc::{crc16, crc32};
use super::{BLOCK_MESSAGE, BLOCK_MISSING, DCS_FILE_TYPE, DCS_HEADER_LEN, PRIMARY_LENGTH};
use crate::message::{DcpMessage, format_carrier_time};

/// Raw field values of one HRIT message block.
#[derive(Debug, Clone)]
pub struct HritMessageSpec {
    pub sequence: u32,
    pub msg_flags: u8,
    pub arm_flags: u8,
    pub address: u32,
    pub carrier_start: DateTime<Utc>,
    pub carrier_stop: DateTime<Utc>,
    /// dBm x 10.
    pub signal_x10: u16,
    /// Hz x 10, signed.
    pub freq_offset_x10: i32,
    /// Top two bits carry the modulation index.
    pub noise_x100: u16,
    pub good_phase_x2: u8,
    /// Channel in the low 10 bits, spacecraft in the top nibble.
    pub channel: u16,
    pub source: [u8; 2],
    pub payload: Vec<u8>,
}

impl Default for HritMessageSpec {
    fn default() -> Self {
        Self {
            sequence: 0,
            msg_flags: 2,
            arm_flags: 0,
            address: 0,
            carrier_start: DateTime::<Utc>::UNIX_EPOCH,
            carrier_stop: DateTime::<Utc>::UNIX_EPOCH,
            signal_x10: 440,
            freq_offset_x10: 500,
            noise_x100: 0x4000,
            good_phase_x2: 180,
            channel: 57 | (1 << 12),
            source: *b"UP",
            payload: Vec::new(),
        }
    }
}

enum Entry {
    Message(HritMessageSpec),
    Missing(u32),
    Domsat(DcpMessage, u16),
}

/// Builds a complete file: primary header, DCS header, message area and
/// trailing CRC.
pub struct HritFileBuilder {
    name: String,
    source: [u8; 4],
    legacy: bool,
    entries: Vec<Entry>,
}

impl HritFileBuilder {
    /// A `DCSH` file of HRIT blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: *b"WCDA",
            legacy: false,
            entries: Vec::new(),
        }
    }

    /// A `DCSD` file of `0x02 0x02` separated DOMSAT messages.
    pub fn legacy(name: impl Into<String>) -> Self {
        Self {
            legacy: true,
            ..Self::new(name)
        }
    }

    pub fn message(mut self, spec: HritMessageSpec) -> Self {
        self.entries.push(Entry::Message(spec));
        self
    }

    pub fn missing_message(mut self, sequence: u32) -> Self {
        self.entries.push(Entry::Missing(sequence));
        self
    }

    /// Add a legacy message with its 16-bit flag word. Carrier times are
    /// written when the flags ask for them and the message has both.
    pub fn domsat(mut self, msg: DcpMessage, flags: u16) -> Self {
        self.entries.push(Entry::Domsat(msg, flags));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut body = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Message(spec) => body.extend_from_slice(&message_block(spec)),
                Entry::Missing(seq) => {
                    let mut blk = vec![BLOCK_MISSING, 0, 0];
                    blk.extend_from_slice(&seq.to_le_bytes()[..3]);
                    blk.extend_from_slice(&[0, 0]);
                    close_block(&mut blk);
                    body.extend_from_slice(&blk);
                }
                Entry::Domsat(msg, flags) => {
                    body.extend_from_slice(&[2, 2]);
                    body.extend_from_slice(&flags.to_be_bytes());
                    body.extend_from_slice(&msg.domsat_header());
                    body.extend_from_slice(&msg.payload);
                    let wants_times = flags & crate::flags::LritMsgFlags::HAS_CARRIER_TIMES.bits() != 0;
                    if let (true, Some((start, stop))) = (wants_times, msg.carrier_times()) {
                        body.extend_from_slice(format_carrier_time(&start).as_bytes());
                        body.push(b' ');
                        body.extend_from_slice(format_carrier_time(&stop).as_bytes());
                    }
                }
            }
        }

        let header_start = PRIMARY_LENGTH as usize;
        let dcs_len = DCS_HEADER_LEN + body.len() + 4;

        let mut out = Vec::with_capacity(header_start + dcs_len);
        out.push(super::PRIMARY_TYPE);
        out.extend_from_slice(&PRIMARY_LENGTH.to_be_bytes());
        out.push(DCS_FILE_TYPE);
        out.extend_from_slice(&(header_start as u32).to_be_bytes());
        out.resize(header_start, 0);

        let mut header = [b' '; DCS_HEADER_LEN];
        let name = self.name.as_bytes();
        let n = name.len().min(32);
        header[..n].copy_from_slice(&name[..n]);
        header[32..40].copy_from_slice(format!("{dcs_len:08}").as_bytes());
        header[40..44].copy_from_slice(&self.source);
        header[44..48].copy_from_slice(if self.legacy { b"DCSD" } else { b"DCSH" });
        let crc = crc32(&header[..60]);
        header[60..].copy_from_slice(&crc.to_le_bytes());

        out.extend_from_slice(&header);
        out.extend_from_slice(&body);
        let crc = crc32(&out[header_start..]);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }
}

fn message_block(spec: &HritMessageSpec) -> Vec<u8> {
    let mut blk = Vec::with_capacity(41 + spec.payload.len());
    blk.push(BLOCK_MESSAGE);
    blk.extend_from_slice(&[0, 0]);
    blk.extend_from_slice(&spec.sequence.to_le_bytes()[..3]);
    blk.push(spec.msg_flags);
    blk.push(spec.arm_flags);
    blk.extend_from_slice(&spec.address.to_le_bytes());
    blk.extend_from_slice(&bcd_encode(&spec.carrier_start));
    blk.extend_from_slice(&bcd_encode(&spec.carrier_stop));
    blk.extend_from_slice(&spec.signal_x10.to_le_bytes());
    blk.extend_from_slice(&((spec.freq_offset_x10 & 0x3fff) as u16).to_le_bytes());
    blk.extend_from_slice(&spec.noise_x100.to_le_bytes());
    blk.push(spec.good_phase_x2);
    blk.extend_from_slice(&spec.channel.to_le_bytes());
    blk.extend_from_slice(&spec.source);
    blk.extend_from_slice(b"  ");
    blk.extend_from_slice(&spec.payload);
    close_block(&mut blk);
    blk
}

/// Fill in the length and append the block CRC.
fn close_block(blk: &mut Vec<u8>) {
    let len = (blk.len() + 2) as u16;
    blk[1..3].copy_from_slice(&len.to_le_bytes());
    let crc = crc16(blk);
    blk.extend_from_slice(&crc.to_le_bytes());
}

pub(super) fn bcd_encode(t: &DateTime<Utc>) -> [u8; 7] {
    let digits = format_carrier_time(t).into_bytes();
    let mut out = [0u8; 7];
    for (i, pair) in digits.chunks(2).enumerate() {
        out[6 - i] = ((pair[0] - b'0') << 4) | (pair[1] - b'0');
    }
    out
}
