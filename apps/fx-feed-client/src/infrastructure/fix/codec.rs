//! Frame Codec
//!
//! Encodes and decodes the tag=value wire frames exchanged with the
//! upstream feed. Fields are `<tag>=<value>` pairs terminated by SOH
//! (0x01); every frame is
//! `8=<BeginString>|9=<BodyLength>|...|10=<CheckSum>|` where CheckSum is
//! the byte sum of everything preceding the `10=` field, modulo 256,
//! rendered as exactly three decimal digits.
//!
//! Decoding is streaming-safe: a partial buffer yields
//! [`Decoded::Incomplete`] without consuming input, and a buffer holding
//! one or more complete frames yields the first plus its exact byte
//! count, so the read loop can drain its buffer in place.
//!
//! Any [`CodecError`] is session-fatal for the caller: a frame that fails
//! its checksum or cannot be framed means the stream can no longer be
//! trusted, and the session must be torn down rather than resynchronized
//! mid-stream.
//!
//! The exact upstream dialect is not contractually pinned; this codec
//! implements the generic FIX-style subset in
//! [`messages`](super::messages) and should be checked against the
//! counterparty's specification before field numbers are frozen.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use super::messages::{
    FixMessage, Heartbeat, Logon, Logout, MarketDataSnapshot, MessageBody, QuoteEntry, Reject,
    ResendRequest, SequenceReset, TestRequest, tags,
};

/// Field and frame terminator byte.
pub const SOH: u8 = 0x01;

/// Protocol identifier carried in tag 8.
pub const BEGIN_STRING: &str = "FXFEED.1";

/// Wire format for SendingTime (UTC, millisecond precision).
const SENDING_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f";

/// Trailer is always `10=` + three digits + SOH.
const TRAILER_LEN: usize = 7;

/// Upper bound on snapshot entries per frame; the tracked universe is a
/// handful of pairs, so anything near this is a broken feed.
const MAX_SNAPSHOT_ENTRIES: usize = 1024;

// =============================================================================
// Errors
// =============================================================================

/// Codec errors. All of them are session-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Frame structure could not be parsed.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Trailing checksum did not match the frame contents.
    #[error("checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch {
        /// Value carried in the CheckSum field.
        declared: u32,
        /// Value computed over the received bytes.
        computed: u32,
    },

    /// A required field was absent.
    #[error("missing required field {0}")]
    MissingField(u32),

    /// A field value failed to parse.
    #[error("invalid value for field {tag}: {value:?}")]
    InvalidValue {
        /// Offending field tag.
        tag: u32,
        /// Offending field value.
        value: String,
    },

    /// MsgType is not part of the recognized subset.
    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),
}

// =============================================================================
// Decode Result
// =============================================================================

/// Outcome of a decode attempt against a read buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete frame was decoded; `consumed` bytes may be drained.
    Message {
        /// The decoded message.
        message: FixMessage,
        /// Exact number of bytes the frame occupied.
        consumed: usize,
    },
    /// The buffer ends mid-frame; read more bytes and retry.
    Incomplete,
}

// =============================================================================
// Codec
// =============================================================================

/// Stateless frame codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixCodec;

impl FixCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a message into a complete wire frame.
    #[must_use]
    pub fn encode(&self, message: &FixMessage) -> Vec<u8> {
        let mut body = Vec::with_capacity(128);
        put_field(&mut body, tags::MSG_TYPE, message.body.msg_type());
        put_field(&mut body, tags::MSG_SEQ_NUM, &message.msg_seq_num.to_string());
        put_field(&mut body, tags::SENDER_COMP_ID, &message.sender_comp_id);
        put_field(&mut body, tags::TARGET_COMP_ID, &message.target_comp_id);
        put_field(
            &mut body,
            tags::SENDING_TIME,
            &message.sending_time.format(SENDING_TIME_FORMAT).to_string(),
        );
        encode_body(&mut body, &message.body);

        let mut frame = Vec::with_capacity(body.len() + 32);
        put_field(&mut frame, tags::BEGIN_STRING, BEGIN_STRING);
        put_field(&mut frame, tags::BODY_LENGTH, &body.len().to_string());
        frame.extend_from_slice(&body);

        let checksum = byte_sum(&frame) % 256;
        frame.extend_from_slice(format!("10={checksum:03}").as_bytes());
        frame.push(SOH);
        frame
    }

    /// Decode the first complete frame from `buf`.
    ///
    /// Returns [`Decoded::Incomplete`] when the buffer ends mid-frame;
    /// nothing is consumed in that case.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the bytes cannot be a valid frame;
    /// the caller must treat this as session-fatal.
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded, CodecError> {
        // BeginString prefix, byte-exact.
        let prefix = begin_string_prefix();
        let check_len = buf.len().min(prefix.len());
        if buf[..check_len] != prefix[..check_len] {
            return Err(CodecError::Malformed("bad begin string".to_string()));
        }
        if buf.len() < prefix.len() {
            return Ok(Decoded::Incomplete);
        }

        // BodyLength field: "9=<digits><SOH>".
        let mut pos = prefix.len();
        if buf.len() < pos + 2 {
            return Ok(Decoded::Incomplete);
        }
        if &buf[pos..pos + 2] != b"9=" {
            return Err(CodecError::Malformed("expected BodyLength field".to_string()));
        }
        pos += 2;

        let mut body_len: usize = 0;
        let mut digits = 0;
        loop {
            let Some(&byte) = buf.get(pos) else {
                return Ok(Decoded::Incomplete);
            };
            pos += 1;
            match byte {
                SOH if digits > 0 => break,
                b'0'..=b'9' if digits < 7 => {
                    body_len = body_len * 10 + usize::from(byte - b'0');
                    digits += 1;
                }
                _ => {
                    return Err(CodecError::Malformed("unparsable body length".to_string()));
                }
            }
        }

        let body_start = pos;
        let body_end = body_start + body_len;
        let total = body_end + TRAILER_LEN;
        if buf.len() < total {
            return Ok(Decoded::Incomplete);
        }

        // Trailer: "10=<ddd><SOH>".
        let trailer = &buf[body_end..total];
        if &trailer[..3] != b"10="
            || !trailer[3..6].iter().all(u8::is_ascii_digit)
            || trailer[6] != SOH
        {
            return Err(CodecError::Malformed("bad checksum trailer".to_string()));
        }
        let declared = trailer[3..6]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));
        let computed = byte_sum(&buf[..body_end]) % 256;
        if declared != computed {
            return Err(CodecError::ChecksumMismatch { declared, computed });
        }

        let fields = split_fields(&buf[body_start..body_end])?;
        let message = build_message(&fields)?;
        Ok(Decoded::Message {
            message,
            consumed: total,
        })
    }
}

// =============================================================================
// Encode Helpers
// =============================================================================

fn put_field(buf: &mut Vec<u8>, tag: u32, value: &str) {
    buf.extend_from_slice(tag.to_string().as_bytes());
    buf.push(b'=');
    buf.extend_from_slice(value.as_bytes());
    buf.push(SOH);
}

fn put_bool(buf: &mut Vec<u8>, tag: u32, value: bool) {
    put_field(buf, tag, if value { "Y" } else { "N" });
}

fn encode_body(buf: &mut Vec<u8>, body: &MessageBody) {
    match body {
        MessageBody::Logon(logon) => {
            put_field(buf, tags::HEART_BT_INT, &logon.heart_bt_int.to_string());
            put_field(buf, tags::USERNAME, &logon.username);
            put_field(buf, tags::PASSWORD, &logon.password);
            if logon.reset_seq_num {
                put_bool(buf, tags::RESET_SEQ_NUM_FLAG, true);
            }
        }
        MessageBody::Logout(logout) => {
            if let Some(text) = &logout.text {
                put_field(buf, tags::TEXT, text);
            }
        }
        MessageBody::Heartbeat(heartbeat) => {
            if let Some(id) = &heartbeat.test_req_id {
                put_field(buf, tags::TEST_REQ_ID, id);
            }
        }
        MessageBody::TestRequest(request) => {
            put_field(buf, tags::TEST_REQ_ID, &request.test_req_id);
        }
        MessageBody::ResendRequest(request) => {
            put_field(buf, tags::BEGIN_SEQ_NO, &request.begin_seq_no.to_string());
            put_field(buf, tags::END_SEQ_NO, &request.end_seq_no.to_string());
        }
        MessageBody::SequenceReset(reset) => {
            put_bool(buf, tags::GAP_FILL_FLAG, reset.gap_fill);
            put_field(buf, tags::NEW_SEQ_NO, &reset.new_seq_no.to_string());
        }
        MessageBody::MarketDataSnapshot(snapshot) => {
            put_field(
                buf,
                tags::NO_QUOTE_ENTRIES,
                &snapshot.entries.len().to_string(),
            );
            for entry in &snapshot.entries {
                put_field(buf, tags::SYMBOL, &entry.symbol);
                put_field(buf, tags::BID_PX, &entry.bid.to_string());
                put_field(buf, tags::OFFER_PX, &entry.ask.to_string());
            }
        }
        MessageBody::Reject(reject) => {
            put_field(buf, tags::REF_SEQ_NUM, &reject.ref_seq_num.to_string());
            if let Some(text) = &reject.text {
                put_field(buf, tags::TEXT, text);
            }
        }
    }
}

fn byte_sum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)))
}

fn begin_string_prefix() -> Vec<u8> {
    let mut prefix = Vec::with_capacity(BEGIN_STRING.len() + 3);
    prefix.extend_from_slice(b"8=");
    prefix.extend_from_slice(BEGIN_STRING.as_bytes());
    prefix.push(SOH);
    prefix
}

// =============================================================================
// Decode Helpers
// =============================================================================

fn split_fields(body: &[u8]) -> Result<Vec<(u32, &str)>, CodecError> {
    let mut fields = Vec::with_capacity(16);
    for raw in body.split(|b| *b == SOH) {
        if raw.is_empty() {
            continue; // body ends with SOH, last split is empty
        }
        let eq = raw
            .iter()
            .position(|b| *b == b'=')
            .ok_or_else(|| CodecError::Malformed("field without '='".to_string()))?;
        let tag: u32 = std::str::from_utf8(&raw[..eq])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CodecError::Malformed("unparsable field tag".to_string()))?;
        let value = std::str::from_utf8(&raw[eq + 1..])
            .map_err(|_| CodecError::Malformed("non-UTF8 field value".to_string()))?;
        fields.push((tag, value));
    }
    Ok(fields)
}

fn field<'a>(fields: &[(u32, &'a str)], tag: u32) -> Option<&'a str> {
    fields.iter().find(|(t, _)| *t == tag).map(|(_, v)| *v)
}

fn require<'a>(fields: &[(u32, &'a str)], tag: u32) -> Result<&'a str, CodecError> {
    field(fields, tag).ok_or(CodecError::MissingField(tag))
}

fn parse_u64(fields: &[(u32, &str)], tag: u32) -> Result<u64, CodecError> {
    let value = require(fields, tag)?;
    value.parse().map_err(|_| CodecError::InvalidValue {
        tag,
        value: value.to_string(),
    })
}

fn parse_u32(fields: &[(u32, &str)], tag: u32) -> Result<u32, CodecError> {
    let value = require(fields, tag)?;
    value.parse().map_err(|_| CodecError::InvalidValue {
        tag,
        value: value.to_string(),
    })
}

fn parse_decimal(value: &str, tag: u32) -> Result<Decimal, CodecError> {
    value.parse().map_err(|_| CodecError::InvalidValue {
        tag,
        value: value.to_string(),
    })
}

fn parse_bool(fields: &[(u32, &str)], tag: u32) -> bool {
    field(fields, tag) == Some("Y")
}

fn parse_sending_time(fields: &[(u32, &str)]) -> Result<DateTime<Utc>, CodecError> {
    let value = require(fields, tags::SENDING_TIME)?;
    NaiveDateTime::parse_from_str(value, SENDING_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| CodecError::InvalidValue {
            tag: tags::SENDING_TIME,
            value: value.to_string(),
        })
}

fn build_message(fields: &[(u32, &str)]) -> Result<FixMessage, CodecError> {
    let msg_type = require(fields, tags::MSG_TYPE)?;
    let msg_seq_num = parse_u64(fields, tags::MSG_SEQ_NUM)?;
    let sender_comp_id = require(fields, tags::SENDER_COMP_ID)?.to_string();
    let target_comp_id = require(fields, tags::TARGET_COMP_ID)?.to_string();
    let sending_time = parse_sending_time(fields)?;

    let body = match msg_type {
        "A" => MessageBody::Logon(Logon {
            heart_bt_int: parse_u32(fields, tags::HEART_BT_INT)?,
            username: field(fields, tags::USERNAME).unwrap_or_default().to_string(),
            password: field(fields, tags::PASSWORD).unwrap_or_default().to_string(),
            reset_seq_num: parse_bool(fields, tags::RESET_SEQ_NUM_FLAG),
        }),
        "5" => MessageBody::Logout(Logout {
            text: field(fields, tags::TEXT).map(ToString::to_string),
        }),
        "0" => MessageBody::Heartbeat(Heartbeat {
            test_req_id: field(fields, tags::TEST_REQ_ID).map(ToString::to_string),
        }),
        "1" => MessageBody::TestRequest(TestRequest {
            test_req_id: require(fields, tags::TEST_REQ_ID)?.to_string(),
        }),
        "2" => MessageBody::ResendRequest(ResendRequest {
            begin_seq_no: parse_u64(fields, tags::BEGIN_SEQ_NO)?,
            end_seq_no: parse_u64(fields, tags::END_SEQ_NO)?,
        }),
        "4" => MessageBody::SequenceReset(SequenceReset {
            gap_fill: parse_bool(fields, tags::GAP_FILL_FLAG),
            new_seq_no: parse_u64(fields, tags::NEW_SEQ_NO)?,
        }),
        "W" => MessageBody::MarketDataSnapshot(parse_snapshot(fields)?),
        "3" => MessageBody::Reject(Reject {
            ref_seq_num: parse_u64(fields, tags::REF_SEQ_NUM)?,
            text: field(fields, tags::TEXT).map(ToString::to_string),
        }),
        other => return Err(CodecError::UnknownMessageType(other.to_string())),
    };

    Ok(FixMessage {
        msg_seq_num,
        sender_comp_id,
        target_comp_id,
        sending_time,
        body,
    })
}

fn parse_snapshot(fields: &[(u32, &str)]) -> Result<MarketDataSnapshot, CodecError> {
    let declared: usize = {
        let value = require(fields, tags::NO_QUOTE_ENTRIES)?;
        value
            .parse()
            .ok()
            .filter(|count| *count <= MAX_SNAPSHOT_ENTRIES)
            .ok_or_else(|| CodecError::InvalidValue {
                tag: tags::NO_QUOTE_ENTRIES,
                value: value.to_string(),
            })?
    };

    // Entries are repeating (Symbol, BidPx, OfferPx) groups in field order.
    let mut entries: Vec<QuoteEntry> = Vec::with_capacity(declared);
    let mut current: Option<(String, Option<Decimal>, Option<Decimal>)> = None;
    for (tag, value) in fields {
        match *tag {
            tags::SYMBOL => {
                if let Some(partial) = current.take() {
                    entries.push(finish_entry(partial)?);
                }
                current = Some(((*value).to_string(), None, None));
            }
            tags::BID_PX => {
                let Some(partial) = current.as_mut() else {
                    return Err(CodecError::Malformed("BidPx before Symbol".to_string()));
                };
                partial.1 = Some(parse_decimal(value, tags::BID_PX)?);
            }
            tags::OFFER_PX => {
                let Some(partial) = current.as_mut() else {
                    return Err(CodecError::Malformed("OfferPx before Symbol".to_string()));
                };
                partial.2 = Some(parse_decimal(value, tags::OFFER_PX)?);
            }
            _ => {}
        }
    }
    if let Some(partial) = current.take() {
        entries.push(finish_entry(partial)?);
    }

    if entries.len() != declared {
        return Err(CodecError::InvalidValue {
            tag: tags::NO_QUOTE_ENTRIES,
            value: declared.to_string(),
        });
    }
    Ok(MarketDataSnapshot { entries })
}

fn finish_entry(
    (symbol, bid, ask): (String, Option<Decimal>, Option<Decimal>),
) -> Result<QuoteEntry, CodecError> {
    let bid = bid.ok_or(CodecError::MissingField(tags::BID_PX))?;
    let ask = ask.ok_or(CodecError::MissingField(tags::OFFER_PX))?;
    Ok(QuoteEntry { symbol, bid, ask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(250))
            .unwrap()
    }

    fn envelope(body: MessageBody) -> FixMessage {
        FixMessage {
            msg_seq_num: 42,
            sender_comp_id: "FEED".to_string(),
            target_comp_id: "CLIENT".to_string(),
            sending_time: sample_time(),
            body,
        }
    }

    fn round_trip(message: &FixMessage) -> FixMessage {
        let codec = FixCodec::new();
        let bytes = codec.encode(message);
        match codec.decode(&bytes).unwrap() {
            Decoded::Message { message, consumed } => {
                assert_eq!(consumed, bytes.len());
                message
            }
            Decoded::Incomplete => panic!("complete frame decoded as incomplete"),
        }
    }

    #[test]
    fn encode_frames_with_begin_string_and_trailer() {
        let codec = FixCodec::new();
        let bytes = codec.encode(&envelope(MessageBody::Heartbeat(Heartbeat::default())));
        assert!(bytes.starts_with(b"8=FXFEED.1\x019="));
        assert_eq!(bytes[bytes.len() - 1], SOH);
        assert_eq!(&bytes[bytes.len() - 7..bytes.len() - 4], b"10=");
    }

    #[test]
    fn round_trip_logon() {
        let message = envelope(MessageBody::Logon(Logon {
            heart_bt_int: 30,
            username: "feed-user".to_string(),
            password: "feed-pass".to_string(),
            reset_seq_num: true,
        }));
        assert_eq!(round_trip(&message), message);
    }

    #[test]
    fn round_trip_snapshot() {
        let message = envelope(MessageBody::MarketDataSnapshot(MarketDataSnapshot {
            entries: vec![
                QuoteEntry {
                    symbol: "GBPJPY".to_string(),
                    bid: Decimal::new(18950, 2),
                    ask: Decimal::new(18953, 2),
                },
                QuoteEntry {
                    symbol: "GBPUSD".to_string(),
                    bid: Decimal::new(12701, 4),
                    ask: Decimal::new(12703, 4),
                },
            ],
        }));
        assert_eq!(round_trip(&message), message);
    }

    #[test]
    fn round_trip_session_bodies() {
        let bodies = vec![
            MessageBody::Logout(Logout {
                text: Some("bye".to_string()),
            }),
            MessageBody::Heartbeat(Heartbeat {
                test_req_id: Some("probe-1".to_string()),
            }),
            MessageBody::TestRequest(TestRequest {
                test_req_id: "probe-1".to_string(),
            }),
            MessageBody::ResendRequest(ResendRequest {
                begin_seq_no: 10,
                end_seq_no: 14,
            }),
            MessageBody::SequenceReset(SequenceReset {
                gap_fill: true,
                new_seq_no: 15,
            }),
            MessageBody::Reject(Reject {
                ref_seq_num: 7,
                text: None,
            }),
        ];
        for body in bodies {
            let message = envelope(body);
            assert_eq!(round_trip(&message), message);
        }
    }

    #[test]
    fn every_partial_prefix_is_incomplete() {
        let codec = FixCodec::new();
        let bytes = codec.encode(&envelope(MessageBody::TestRequest(TestRequest {
            test_req_id: "probe".to_string(),
        })));
        for cut in 0..bytes.len() {
            assert_eq!(
                codec.decode(&bytes[..cut]).unwrap(),
                Decoded::Incomplete,
                "prefix of {cut} bytes should be incomplete"
            );
        }
    }

    #[test]
    fn consumes_exactly_one_frame_and_leaves_the_rest() {
        let codec = FixCodec::new();
        let first = codec.encode(&envelope(MessageBody::Heartbeat(Heartbeat::default())));
        let second = codec.encode(&envelope(MessageBody::TestRequest(TestRequest {
            test_req_id: "probe".to_string(),
        })));

        let mut buf = first.clone();
        buf.extend_from_slice(&second);

        let Decoded::Message { consumed, .. } = codec.decode(&buf).unwrap() else {
            panic!("expected a complete frame");
        };
        assert_eq!(consumed, first.len());
        assert_eq!(&buf[consumed..], &second[..]);

        // Trailing garbage is also left untouched.
        let mut with_garbage = first.clone();
        with_garbage.extend_from_slice(b"\x00\x00\x00");
        let Decoded::Message { consumed, .. } = codec.decode(&with_garbage).unwrap() else {
            panic!("expected a complete frame");
        };
        assert_eq!(consumed, first.len());
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let codec = FixCodec::new();
        let mut bytes = codec.encode(&envelope(MessageBody::Heartbeat(Heartbeat::default())));
        // Flip a body byte without touching the trailer.
        let body_byte = bytes.len() - 10;
        bytes[body_byte] ^= 0x01;
        assert!(matches!(
            codec.decode(&bytes),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_payload_never_decodes_silently() {
        let codec = FixCodec::new();
        let bytes = codec.encode(&envelope(MessageBody::Heartbeat(Heartbeat::default())));
        // Corrupt each body byte in turn; the checksum must catch it
        // (a single bit flip cannot produce a same-sum collision).
        let body_start = bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == SOH)
            .map(|(i, _)| i + 1)
            .nth(1)
            .unwrap();
        for index in body_start..bytes.len() - TRAILER_LEN {
            let mut corrupted = bytes.clone();
            corrupted[index] ^= 0x01;
            assert!(codec.decode(&corrupted).is_err(), "byte {index} slipped through");
        }
    }

    #[test_case(b"7=FXFEED.1\x01" ; "wrong leading tag")]
    #[test_case(b"8=OTHER.42\x019=5\x01" ; "wrong begin string")]
    #[test_case(b"8=FXFEED.1\x018=nope\x01" ; "missing body length")]
    #[test_case(b"8=FXFEED.1\x019=abc\x01" ; "non numeric body length")]
    #[test_case(b"8=FXFEED.1\x019=12345678\x01" ; "oversized body length")]
    fn bad_framing_is_malformed(buf: &[u8]) {
        let codec = FixCodec::new();
        assert!(matches!(codec.decode(buf), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn unknown_msg_type_is_rejected() {
        let codec = FixCodec::new();
        let mut bytes = codec.encode(&envelope(MessageBody::Heartbeat(Heartbeat::default())));
        // Rewrite 35=0 to 35=Z and fix up the checksum.
        let pos = bytes
            .windows(5)
            .position(|w| w == b"35=0\x01")
            .unwrap();
        bytes[pos + 3] = b'Z';
        let body_end = bytes.len() - TRAILER_LEN;
        let checksum = byte_sum(&bytes[..body_end]) % 256;
        bytes.truncate(body_end);
        bytes.extend_from_slice(format!("10={checksum:03}").as_bytes());
        bytes.push(SOH);

        assert_eq!(
            codec.decode(&bytes),
            Err(CodecError::UnknownMessageType("Z".to_string()))
        );
    }

    #[test]
    fn snapshot_entry_count_must_match() {
        let codec = FixCodec::new();
        // A frame claiming two entries while carrying one, validly framed.
        let mut rebuilt_body = Vec::new();
        put_field(&mut rebuilt_body, tags::MSG_TYPE, "W");
        put_field(&mut rebuilt_body, tags::MSG_SEQ_NUM, "42");
        put_field(&mut rebuilt_body, tags::SENDER_COMP_ID, "FEED");
        put_field(&mut rebuilt_body, tags::TARGET_COMP_ID, "CLIENT");
        put_field(&mut rebuilt_body, tags::SENDING_TIME, "20240315-10:30:00.250");
        put_field(&mut rebuilt_body, tags::NO_QUOTE_ENTRIES, "2");
        put_field(&mut rebuilt_body, tags::SYMBOL, "GBPJPY");
        put_field(&mut rebuilt_body, tags::BID_PX, "189.50");
        put_field(&mut rebuilt_body, tags::OFFER_PX, "189.53");
        let mut frame = Vec::new();
        put_field(&mut frame, tags::BEGIN_STRING, BEGIN_STRING);
        put_field(&mut frame, tags::BODY_LENGTH, &rebuilt_body.len().to_string());
        frame.extend_from_slice(&rebuilt_body);
        let checksum = byte_sum(&frame) % 256;
        frame.extend_from_slice(format!("10={checksum:03}").as_bytes());
        frame.push(SOH);

        assert!(matches!(
            codec.decode(&frame),
            Err(CodecError::InvalidValue { tag: 295, .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_price() -> impl Strategy<Value = Decimal> {
            (1i64..10_000_000, 0u32..=5).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
        }

        fn arb_symbol() -> impl Strategy<Value = String> {
            proptest::string::string_regex("[A-Z]{3,8}").expect("valid regex")
        }

        proptest! {
            #[test]
            fn snapshot_round_trips(
                seq in 1u64..1_000_000,
                millis in 0i64..86_400_000,
                entries in proptest::collection::vec(
                    (arb_symbol(), arb_price(), arb_price()),
                    1..5,
                ),
            ) {
                let codec = FixCodec::new();
                let sending_time = Utc
                    .with_ymd_and_hms(2024, 3, 15, 0, 0, 0)
                    .unwrap()
                    .checked_add_signed(chrono::Duration::milliseconds(millis))
                    .unwrap();
                let message = FixMessage {
                    msg_seq_num: seq,
                    sender_comp_id: "FEED".to_string(),
                    target_comp_id: "CLIENT".to_string(),
                    sending_time,
                    body: MessageBody::MarketDataSnapshot(MarketDataSnapshot {
                        entries: entries
                            .into_iter()
                            .map(|(symbol, bid, ask)| QuoteEntry { symbol, bid, ask })
                            .collect(),
                    }),
                };

                let bytes = codec.encode(&message);
                let decoded = codec.decode(&bytes).unwrap();
                prop_assert_eq!(
                    decoded,
                    Decoded::Message { message, consumed: bytes.len() }
                );
            }

            #[test]
            fn arbitrary_trailing_bytes_never_change_consumption(
                extra in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let codec = FixCodec::new();
                let message = FixMessage {
                    msg_seq_num: 7,
                    sender_comp_id: "FEED".to_string(),
                    target_comp_id: "CLIENT".to_string(),
                    sending_time: Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
                    body: MessageBody::Heartbeat(Heartbeat::default()),
                };
                let frame = codec.encode(&message);
                let mut buf = frame.clone();
                buf.extend_from_slice(&extra);

                let Decoded::Message { consumed, .. } = codec.decode(&buf).unwrap() else {
                    panic!("expected a complete frame");
                };
                prop_assert_eq!(consumed, frame.len());
            }
        }
    }
}
