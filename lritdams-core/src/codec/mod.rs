//! `tokio_util` codec for the DAMS-NT subscriber stream.
//!
//! The encoder writes frames verbatim; every [`ClientSession`] writes
//! through it. The decoder is the subscriber side: it splits a byte
//! stream back into heartbeats and message frames.
//!
//! [`ClientSession`]: crate::network::ClientSession

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::GatewayError;
use crate::frame::{
    CARRIER_LINE_LEN, CRLF, DamsNtFrame, EXTENDED_TIME, FRAME_HEADER_LEN, HEARTBEAT,
    MESSAGE_LENGTH, StartPattern,
};
use crate::message::parse_digits;

/// Largest frame the decoder will buffer: header, 5-digit length,
/// CRLF and the carrier line.
pub const MAX_FRAME_SIZE: usize = FRAME_HEADER_LEN + 99_999 + 2 + CARRIER_LINE_LEN;

#[derive(Debug, Clone, Default)]
pub struct DamsNtCodec {
    start_pattern: StartPattern,
}

impl DamsNtCodec {
    pub fn new(start_pattern: StartPattern) -> Self {
        Self { start_pattern }
    }

    /// Whether `prefix` could still grow into a heartbeat or a start
    /// pattern.
    fn plausible_prefix(&self, prefix: &[u8]) -> bool {
        HEARTBEAT.starts_with(prefix) || self.start_pattern.as_bytes().starts_with(prefix)
    }
}

impl Decoder for DamsNtCodec {
    type Item = DamsNtFrame;
    type Error = GatewayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src.starts_with(HEARTBEAT) {
            let hb = src.split_to(HEARTBEAT.len());
            return Ok(Some(DamsNtFrame::from_bytes(hb.freeze())));
        }

        let pattern = self.start_pattern.as_bytes();
        if src.len() < pattern.len().max(HEARTBEAT.len()) && self.plausible_prefix(&src[..]) {
            return Ok(None);
        }
        if !src.starts_with(pattern) {
            return Err(GatewayError::InvalidFrame("missing start pattern"));
        }

        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let len = parse_digits(&src[MESSAGE_LENGTH])
            .ok_or(GatewayError::InvalidFrame("bad message length field"))?
            as usize;
        let mut total = FRAME_HEADER_LEN + len + CRLF.len();
        if src[EXTENDED_TIME] == b'1' {
            total += CARRIER_LINE_LEN;
        }
        if total > MAX_FRAME_SIZE {
            return Err(GatewayError::FrameTooLarge {
                size: total,
                max: MAX_FRAME_SIZE,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let body_end = FRAME_HEADER_LEN + len;
        if &src[body_end..body_end + CRLF.len()] != CRLF {
            return Err(GatewayError::InvalidFrame("payload not terminated by CRLF"));
        }
        if total > body_end + CRLF.len() && !src[..total].ends_with(CRLF) {
            return Err(GatewayError::InvalidFrame("carrier line not terminated by CRLF"));
        }

        let frame = src.split_to(total);
        Ok(Some(DamsNtFrame::from_bytes(frame.freeze())))
    }
}

impl Encoder<DamsNtFrame> for DamsNtCodec {
    type Error = GatewayError;

    fn encode(&mut self, item: DamsNtFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Baud, DcpMessage};
    use crate::translate::MessageTranslator;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    fn frame(payload: &'static [u8], carrier: bool) -> DamsNtFrame {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let msg = DcpMessage {
            address: "CE1234AB".into(),
            original_address: "CE1234AB".into(),
            start_time: *b"24001000000",
            fail_code: b'G',
            signal_strength: *b"40",
            frequency_offset: *b"-1",
            modulation_index: b'N',
            data_quality: b'N',
            channel: 195,
            spacecraft: b'W',
            source_code: *b"UP",
            baud: Baud::B1200,
            payload: Bytes::from_static(payload),
            carrier_start: carrier.then_some(start),
            carrier_stop: carrier.then_some(start),
            binary: false,
            bit_errors: false,
            sequence_num: 0,
        };
        MessageTranslator::default().translate(&msg)
    }

    #[test]
    fn decodes_mixed_stream() {
        let mut codec = DamsNtCodec::default();
        let mut buf = BytesMut::new();
        let a = frame(b"first", false);
        let b = frame(b"second", true);
        codec.encode(a.clone(), &mut buf).unwrap();
        codec.encode(DamsNtFrame::heartbeat(), &mut buf).unwrap();
        codec.encode(b.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(a));
        assert!(codec.decode(&mut buf).unwrap().unwrap().is_heartbeat());
        let got = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(got, b);
        assert_eq!(got.payload(), Some(&b"second"[..]));
        assert!(got.carrier_times().is_some());
        assert!(buf.is_empty());
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn waits_for_partial_frames() {
        let mut codec = DamsNtCodec::default();
        let full = frame(b"partial payload", true);
        let bytes = full.as_bytes();

        let mut buf = BytesMut::new();
        for chunk in bytes.chunks(7) {
            assert_eq!(codec.decode(&mut buf).unwrap(), None);
            buf.extend_from_slice(chunk);
        }
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(full));

        buf.extend_from_slice(b"NON");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"E\r\n");
        assert!(codec.decode(&mut buf).unwrap().unwrap().is_heartbeat());
    }

    #[test]
    fn rejects_garbage() {
        let mut codec = DamsNtCodec::default();
        let mut buf = BytesMut::from(&b"GARBAGE!"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_missing_terminator() {
        let mut codec = DamsNtCodec::default();
        let f = frame(b"abc", false);
        let mut raw = f.as_bytes().to_vec();
        let n = raw.len();
        raw[n - 2] = b'X';
        let mut buf = BytesMut::from(&raw[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(GatewayError::InvalidFrame(_))
        ));
    }
}
