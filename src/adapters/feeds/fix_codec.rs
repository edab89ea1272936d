//! FIX tag-value wire codec.
//!
//! Frames are `8=<begin>|9=<len>|<body>|10=<sum>|` with SOH (0x01) as
//! the delimiter. BodyLength counts the bytes from the field after
//! `9=` through the SOH before `10=`. CheckSum is the byte sum of
//! everything before `10=`, mod 256, zero-padded to three digits.

use crate::domain::error::FeedError;
use crate::domain::fix_message::FixMessage;

pub const SOH: u8 = 0x01;

/// Trailer length: `10=` + 3 digits + SOH.
const TRAILER_LEN: usize = 7;

/// Start of every frame; `8=FIX.4.x` and `8=FIXT.1.1` alike.
const BEGIN_MARKER: &[u8] = b"8=FIX";

/// Largest header prefix we wait on before calling the buffer garbage.
const MAX_PREFIX_LEN: usize = 64;

/// Largest BodyLength accepted from a peer.
const MAX_BODY_LEN: usize = 1024 * 1024;

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode `message` into one wire frame.
pub fn encode(message: &FixMessage, begin_string: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    for (tag, value) in message.fields() {
        body.extend_from_slice(format!("{tag}={value}").as_bytes());
        body.push(SOH);
    }

    let mut frame = Vec::with_capacity(body.len() + 32);
    frame.extend_from_slice(format!("8={begin_string}").as_bytes());
    frame.push(SOH);
    frame.extend_from_slice(format!("9={}", body.len()).as_bytes());
    frame.push(SOH);
    frame.extend_from_slice(&body);

    let sum = checksum(&frame);
    frame.extend_from_slice(format!("10={sum:03}").as_bytes());
    frame.push(SOH);
    frame
}

/// Incremental decoder over a byte stream.
#[derive(Debug, Default)]
pub struct FixDecoder {
    buf: Vec<u8>,
}

impl FixDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame.
    ///
    /// `Ok(None)` means more bytes are needed. On `Err` the offending
    /// bytes have been dropped and the decoder can be polled again.
    pub fn decode(&mut self) -> Result<Option<FixMessage>, FeedError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if !self.buf.starts_with(b"8=") {
            if self.buf.len() < 2 && self.buf[0] == b'8' {
                return Ok(None);
            }
            let skipped = self.resync(1);
            return Err(FeedError::Decode(format!(
                "{skipped} bytes before BeginString"
            )));
        }

        let Some(begin_end) = find_soh(&self.buf, 0) else {
            return self.need_more();
        };
        let len_start = begin_end + 1;
        if self.buf.len() < len_start + 2 {
            return self.need_more();
        }
        if &self.buf[len_start..len_start + 2] != b"9=" {
            self.resync(1);
            return Err(FeedError::Decode("BodyLength must be the second field".to_string()));
        }
        let Some(len_end) = find_soh(&self.buf, len_start) else {
            return self.need_more();
        };
        let body_len: usize = match std::str::from_utf8(&self.buf[len_start + 2..len_end])
            .ok()
            .and_then(|s| s.parse().ok())
        {
            Some(n) => n,
            None => {
                self.resync(1);
                return Err(FeedError::Decode("invalid BodyLength".to_string()));
            }
        };

        if body_len > MAX_BODY_LEN {
            self.resync(1);
            return Err(FeedError::Decode(format!(
                "BodyLength {body_len} exceeds {MAX_BODY_LEN}"
            )));
        }

        let body_start = len_end + 1;
        let Some((body_end, frame_end)) = body_start
            .checked_add(body_len)
            .and_then(|end| end.checked_add(TRAILER_LEN).map(|frame| (end, frame)))
        else {
            self.resync(1);
            return Err(FeedError::Decode("BodyLength out of range".to_string()));
        };
        if self.buf.len() < frame_end {
            return Ok(None);
        }

        let trailer = &self.buf[body_end..frame_end];
        if !trailer.starts_with(b"10=") || trailer[TRAILER_LEN - 1] != SOH {
            self.resync(1);
            return Err(FeedError::Decode("CheckSum field not where BodyLength says".to_string()));
        }
        let declared: Option<u8> = std::str::from_utf8(&trailer[3..6])
            .ok()
            .and_then(|s| s.parse().ok());
        let computed = checksum(&self.buf[..body_end]);
        if declared != Some(computed) {
            self.buf.drain(..frame_end);
            return Err(FeedError::Decode(format!(
                "checksum mismatch: declared {declared:?}, computed {computed}"
            )));
        }

        let fields = parse_fields(&self.buf[body_start..body_end]);
        self.buf.drain(..frame_end);
        let fields = fields?;
        Ok(Some(FixMessage::from_fields(fields)))
    }

    fn need_more(&mut self) -> Result<Option<FixMessage>, FeedError> {
        if self.buf.len() > MAX_PREFIX_LEN {
            self.resync(1);
            return Err(FeedError::Decode("unterminated FIX header".to_string()));
        }
        Ok(None)
    }

    /// Drop bytes up to the next `8=FIX` at or after `from`. Returns
    /// the number of bytes dropped.
    fn resync(&mut self, from: usize) -> usize {
        let next = self.buf[from.min(self.buf.len())..]
            .windows(BEGIN_MARKER.len())
            .position(|w| w == BEGIN_MARKER)
            .map_or(self.buf.len(), |p| p + from);
        self.buf.drain(..next);
        next
    }
}

fn find_soh(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..].iter().position(|b| *b == SOH).map(|p| p + from)
}

fn parse_fields(body: &[u8]) -> Result<Vec<(u32, String)>, FeedError> {
    body.split(|b| *b == SOH)
        .filter(|field| !field.is_empty())
        .map(|field| {
            let text = std::str::from_utf8(field)
                .map_err(|_| FeedError::Decode("field is not UTF-8".to_string()))?;
            let (tag, value) = text
                .split_once('=')
                .ok_or_else(|| FeedError::Decode(format!("field without '=': {text}")))?;
            let tag: u32 = tag
                .parse()
                .map_err(|_| FeedError::Decode(format!("non-numeric tag: {tag}")))?;
            Ok((tag, value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fix_message::{msg_type, tags};

    fn heartbeat() -> FixMessage {
        let mut msg = FixMessage::new(msg_type::HEARTBEAT);
        msg.set(tags::SENDER_COMP_ID, "CLIENT");
        msg.set(tags::TARGET_COMP_ID, "Coinbase");
        msg.set(tags::MSG_SEQ_NUM, "2");
        msg
    }

    fn pipe(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap().replace('\u{1}', "|")
    }

    #[test]
    fn test_encode_known_frame() {
        let mut msg = FixMessage::new(msg_type::HEARTBEAT);
        msg.set(tags::MSG_SEQ_NUM, "1");
        let wire = pipe(&encode(&msg, "FIX.4.2"));
        // body "35=0|34=1|" is 10 bytes
        assert!(wire.starts_with("8=FIX.4.2|9=10|35=0|34=1|10="), "{wire}");
        assert!(wire.ends_with('|'));
    }

    #[test]
    fn test_decode_split_across_reads() {
        let wire = encode(&heartbeat(), "FIX.4.2");
        let mut decoder = FixDecoder::new();
        let (a, b) = wire.split_at(wire.len() / 2);
        decoder.extend(a);
        assert_eq!(decoder.decode().unwrap(), None);
        decoder.extend(b);
        assert_eq!(decoder.decode().unwrap(), Some(heartbeat()));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_two_frames_in_one_read() {
        let mut bytes = encode(&heartbeat(), "FIX.4.2");
        bytes.extend(encode(&FixMessage::new(msg_type::LOGOUT), "FIX.4.2"));
        let mut decoder = FixDecoder::new();
        decoder.extend(&bytes);
        assert_eq!(decoder.decode().unwrap().unwrap().msg_type(), "0");
        assert_eq!(decoder.decode().unwrap().unwrap().msg_type(), "5");
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_bad_checksum_is_dropped() {
        let mut wire = encode(&heartbeat(), "FIX.4.2");
        let n = wire.len();
        wire[n - 2] = if wire[n - 2] == b'0' { b'1' } else { b'0' };
        wire.extend(encode(&FixMessage::new(msg_type::LOGOUT), "FIX.4.2"));

        let mut decoder = FixDecoder::new();
        decoder.extend(&wire);
        assert!(matches!(decoder.decode(), Err(FeedError::Decode(_))));
        assert_eq!(decoder.decode().unwrap().unwrap().msg_type(), "5");
    }

    #[test]
    fn test_overflowing_body_length_is_discarded() {
        let mut bytes = b"8=FIX.4.2\x019=18446744073709551615\x0135=0\x0110=000\x01".to_vec();
        bytes.extend(encode(&heartbeat(), "FIX.4.2"));
        let mut decoder = FixDecoder::new();
        decoder.extend(&bytes);
        assert!(matches!(decoder.decode(), Err(FeedError::Decode(_))));
        assert_eq!(decoder.decode().unwrap(), Some(heartbeat()));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_oversized_body_length_does_not_stall_stream() {
        let mut bytes = b"8=FIX.4.2\x019=999999999\x0135=0\x01".to_vec();
        for _ in 0..100 {
            bytes.extend(encode(&heartbeat(), "FIX.4.2"));
        }
        let mut decoder = FixDecoder::new();
        decoder.extend(&bytes);
        assert!(matches!(decoder.decode(), Err(FeedError::Decode(_))));

        let mut decoded = 0;
        while let Some(msg) = decoder.decode().unwrap() {
            assert_eq!(msg, heartbeat());
            decoded += 1;
        }
        assert_eq!(decoded, 100);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_garbage_prefix_resyncs() {
        let mut bytes = b"noise".to_vec();
        bytes.extend(encode(&heartbeat(), "FIX.4.2"));
        let mut decoder = FixDecoder::new();
        decoder.extend(&bytes);
        assert!(decoder.decode().is_err());
        assert_eq!(decoder.decode().unwrap(), Some(heartbeat()));
    }
}
