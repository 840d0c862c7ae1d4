//! DCP message → DAMS-NT frame.

use bytes::{BufMut, BytesMut};

use crate::frame::{
    CARRIER_LINE_LEN, CRLF, DamsNtFrame, FRAME_HEADER_LEN, StartPattern,
};
use crate::message::{DcpMessage, format_carrier_time};

/// Encodes messages into DAMS-NT frames with a fixed start pattern.
///
/// Stateless apart from the pattern, so one instance serves the whole
/// ingest pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageTranslator {
    start_pattern: StartPattern,
}

impl MessageTranslator {
    pub fn new(start_pattern: StartPattern) -> Self {
        Self { start_pattern }
    }

    pub fn start_pattern(&self) -> StartPattern {
        self.start_pattern
    }

    pub fn translate(&self, msg: &DcpMessage) -> DamsNtFrame {
        let carrier = msg.carrier_times();
        let capacity = FRAME_HEADER_LEN
            + msg.payload.len()
            + CRLF.len()
            + carrier.map_or(0, |_| CARRIER_LINE_LEN);
        let mut buf = BytesMut::with_capacity(capacity);

        let channel = format!("{:03}", msg.channel % 1000);
        buf.put_slice(self.start_pattern.as_bytes());
        // Slot number mirrors the channel.
        buf.put_slice(channel.as_bytes());
        buf.put_slice(channel.as_bytes());
        buf.put_u8(msg.spacecraft);
        buf.put_slice(msg.baud.field());
        buf.put_slice(&msg.start_time);
        buf.put_slice(&msg.signal_strength);
        buf.put_slice(&msg.frequency_offset);
        buf.put_u8(msg.modulation_index);
        buf.put_u8(msg.data_quality);
        buf.put_u8(if carrier.is_some() { b'1' } else { b'0' });
        buf.put_u8(error_code(msg));
        put_address(&mut buf, &msg.original_address);
        put_address(&mut buf, &msg.address);
        buf.put_slice(format!("{:05}", msg.payload.len()).as_bytes());
        buf.put_slice(&msg.payload);
        buf.put_slice(CRLF);

        if let Some((start, stop)) = carrier {
            buf.put_slice(format_carrier_time(&start).as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(format_carrier_time(&stop).as_bytes());
            buf.put_slice(CRLF);
        }

        DamsNtFrame::from_bytes(buf.freeze())
    }
}

/// `1` for a parity-failed message, `2` for a binary message with bit
/// errors, otherwise `0`.
pub fn error_code(msg: &DcpMessage) -> u8 {
    if msg.fail_code == b'?' {
        b'1'
    } else if msg.binary && msg.bit_errors {
        b'2'
    } else {
        b'0'
    }
}

/// Left-justify into exactly 8 bytes.
fn put_address(buf: &mut BytesMut, addr: &str) {
    let mut field = [b' '; 8];
    let src = addr.as_bytes();
    let n = src.len().min(field.len());
    field[..n].copy_from_slice(&src[..n]);
    buf.put_slice(&field);
}
