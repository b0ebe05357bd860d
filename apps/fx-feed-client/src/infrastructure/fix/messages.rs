//! Wire Message Types
//!
//! Typed representations of the session-layer and application-layer
//! messages exchanged with the upstream price feed. The dialect is a
//! generic FIX-style tag=value protocol; tag numbers follow FIX 4.2
//! conventions where one exists.
//!
//! # Message Kinds
//!
//! ## Session level (consumed by the session state machine)
//! - `Logon` (35=A), `Logout` (35=5), `Heartbeat` (35=0),
//!   `TestRequest` (35=1), `ResendRequest` (35=2),
//!   `SequenceReset` (35=4), `Reject` (35=3)
//!
//! ## Application level (forwarded to the quote cache)
//! - `MarketDataSnapshot` (35=W): one or more symbol/bid/ask entries,
//!   timestamped by the header `SendingTime`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// =============================================================================
// Field Tags
// =============================================================================

/// Field tag numbers used by the wire dialect.
pub mod tags {
    /// BeginString - protocol identifier, first field of every frame.
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength - byte count between this field's terminator and CheckSum.
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum - trailing modulo-256 checksum, three decimal digits.
    pub const CHECK_SUM: u32 = 10;
    /// MsgType - message kind discriminator.
    pub const MSG_TYPE: u32 = 35;
    /// MsgSeqNum - per-direction session sequence number.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// SenderCompID - originating session identity.
    pub const SENDER_COMP_ID: u32 = 49;
    /// TargetCompID - receiving session identity.
    pub const TARGET_COMP_ID: u32 = 56;
    /// SendingTime - originating UTC timestamp.
    pub const SENDING_TIME: u32 = 52;
    /// BeginSeqNo - first sequence of a resend range.
    pub const BEGIN_SEQ_NO: u32 = 7;
    /// EndSeqNo - last sequence of a resend range.
    pub const END_SEQ_NO: u32 = 16;
    /// NewSeqNo - next expected sequence after a reset.
    pub const NEW_SEQ_NO: u32 = 36;
    /// RefSeqNum - sequence of the message a reject refers to.
    pub const REF_SEQ_NUM: u32 = 45;
    /// Symbol - instrument identifier.
    pub const SYMBOL: u32 = 55;
    /// Text - free-form diagnostic text.
    pub const TEXT: u32 = 58;
    /// HeartBtInt - negotiated heartbeat interval in seconds.
    pub const HEART_BT_INT: u32 = 108;
    /// TestReqID - correlation id for TestRequest/Heartbeat pairs.
    pub const TEST_REQ_ID: u32 = 112;
    /// GapFillFlag - marks a SequenceReset as a gap fill.
    pub const GAP_FILL_FLAG: u32 = 123;
    /// BidPx - bid price.
    pub const BID_PX: u32 = 132;
    /// OfferPx - ask price.
    pub const OFFER_PX: u32 = 133;
    /// ResetSeqNumFlag - both sides reset sequence numbers on logon.
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    /// NoQuoteEntries - count of repeating snapshot entries.
    pub const NO_QUOTE_ENTRIES: u32 = 295;
    /// Username - logon credential.
    pub const USERNAME: u32 = 553;
    /// Password - logon credential.
    pub const PASSWORD: u32 = 554;
}

// =============================================================================
// Message Envelope
// =============================================================================

/// A complete wire message: standard header fields plus a typed body.
///
/// The trailer (CheckSum) and the framing fields (BeginString, BodyLength)
/// exist only on the wire; the codec computes them during encode and
/// verifies them during decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMessage {
    /// Session sequence number for this direction.
    pub msg_seq_num: u64,
    /// Originating session identity.
    pub sender_comp_id: String,
    /// Receiving session identity.
    pub target_comp_id: String,
    /// Originating timestamp (millisecond precision on the wire).
    pub sending_time: DateTime<Utc>,
    /// Typed message body.
    pub body: MessageBody,
}

/// Typed message bodies, one variant per recognized MsgType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Session initiation (35=A).
    Logon(Logon),
    /// Session termination (35=5).
    Logout(Logout),
    /// Liveness keep-alive (35=0).
    Heartbeat(Heartbeat),
    /// Liveness probe (35=1).
    TestRequest(TestRequest),
    /// Retransmission request for a sequence range (35=2).
    ResendRequest(ResendRequest),
    /// Sequence counter reposition (35=4).
    SequenceReset(SequenceReset),
    /// Quote snapshot for one or more instruments (35=W).
    MarketDataSnapshot(MarketDataSnapshot),
    /// Session-level rejection of a prior message (35=3).
    Reject(Reject),
}

impl MessageBody {
    /// Wire MsgType code for this body.
    #[must_use]
    pub const fn msg_type(&self) -> &'static str {
        match self {
            Self::Logon(_) => "A",
            Self::Logout(_) => "5",
            Self::Heartbeat(_) => "0",
            Self::TestRequest(_) => "1",
            Self::ResendRequest(_) => "2",
            Self::SequenceReset(_) => "4",
            Self::MarketDataSnapshot(_) => "W",
            Self::Reject(_) => "3",
        }
    }

    /// Human-readable kind name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Logon(_) => "Logon",
            Self::Logout(_) => "Logout",
            Self::Heartbeat(_) => "Heartbeat",
            Self::TestRequest(_) => "TestRequest",
            Self::ResendRequest(_) => "ResendRequest",
            Self::SequenceReset(_) => "SequenceReset",
            Self::MarketDataSnapshot(_) => "MarketDataSnapshot",
            Self::Reject(_) => "Reject",
        }
    }

    /// Whether this body is consumed by the session layer (as opposed to
    /// being forwarded to the quote cache).
    #[must_use]
    pub const fn is_session_level(&self) -> bool {
        !matches!(self, Self::MarketDataSnapshot(_))
    }
}

// =============================================================================
// Session-Level Bodies
// =============================================================================

/// Logon body (35=A): credentials and heartbeat negotiation.
#[derive(Clone, PartialEq, Eq)]
pub struct Logon {
    /// Heartbeat interval in seconds the sender will honor.
    pub heart_bt_int: u32,
    /// Logon username.
    pub username: String,
    /// Logon password.
    pub password: String,
    /// Request that both sides reset sequence numbers to 1.
    pub reset_seq_num: bool,
}

impl std::fmt::Debug for Logon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logon")
            .field("heart_bt_int", &self.heart_bt_int)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("reset_seq_num", &self.reset_seq_num)
            .finish()
    }
}

/// Logout body (35=5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Logout {
    /// Optional reason text.
    pub text: Option<String>,
}

/// Heartbeat body (35=0).
///
/// Carries the TestReqID when answering a TestRequest, nothing otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heartbeat {
    /// Correlation id echoed from a TestRequest, if any.
    pub test_req_id: Option<String>,
}

/// TestRequest body (35=1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    /// Correlation id the counterparty must echo in its Heartbeat.
    pub test_req_id: String,
}

/// ResendRequest body (35=2): asks for retransmission of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequest {
    /// First missing sequence number (inclusive).
    pub begin_seq_no: u64,
    /// Last missing sequence number (inclusive).
    pub end_seq_no: u64,
}

/// SequenceReset body (35=4): repositions the inbound counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceReset {
    /// True when filling a gap in lieu of retransmitting admin messages.
    pub gap_fill: bool,
    /// The next sequence number the receiver should expect.
    pub new_seq_no: u64,
}

/// Reject body (35=3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    /// Sequence number of the rejected message.
    pub ref_seq_num: u64,
    /// Optional reason text.
    pub text: Option<String>,
}

// =============================================================================
// Application-Level Bodies
// =============================================================================

/// One instrument entry inside a `MarketDataSnapshot`.
///
/// The entry is raw wire data; validation (`bid <= ask`, symbol character
/// set) happens when the session machine converts it to a domain
/// [`Quote`](crate::domain::quote::Quote).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteEntry {
    /// Instrument identifier as sent by the feed.
    pub symbol: String,
    /// Bid price.
    pub bid: Decimal,
    /// Ask price.
    pub ask: Decimal,
}

/// MarketDataSnapshot body (35=W).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketDataSnapshot {
    /// Quote entries, one per instrument.
    pub entries: Vec<QuoteEntry>,
}
