//! FIX tag-value message model.
//!
//! Holds the header and body fields of one message. `BeginString (8)`,
//! `BodyLength (9)` and `CheckSum (10)` are framing and live only on the
//! wire; see `adapters::feeds::fix_codec`.

/// FIX tag numbers used by the feed handler.
pub mod tags {
    pub const MSG_SEQ_NUM: u32 = 34;
    pub const MSG_TYPE: u32 = 35;
    pub const POSS_DUP_FLAG: u32 = 43;
    pub const SENDER_COMP_ID: u32 = 49;
    pub const SENDER_SUB_ID: u32 = 50;
    pub const SENDING_TIME: u32 = 52;
    pub const SYMBOL: u32 = 55;
    pub const TARGET_COMP_ID: u32 = 56;
    pub const TARGET_SUB_ID: u32 = 57;
    pub const TEXT: u32 = 58;
    pub const POSS_RESEND: u32 = 97;
    pub const ENCRYPT_METHOD: u32 = 98;
    pub const HEART_BT_INT: u32 = 108;
    pub const TEST_REQ_ID: u32 = 112;
    pub const ORIG_SENDING_TIME: u32 = 122;
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    pub const NO_RELATED_SYM: u32 = 146;
    pub const MD_REQ_ID: u32 = 262;
    pub const SUBSCRIPTION_REQUEST_TYPE: u32 = 263;
    pub const MARKET_DEPTH: u32 = 264;
    pub const NO_MD_ENTRY_TYPES: u32 = 267;
    pub const MD_ENTRY_TYPE: u32 = 269;
    pub const USERNAME: u32 = 553;
    pub const PASSWORD: u32 = 554;
}

/// FIX `MsgType (35)` values the session layer cares about.
pub mod msg_type {
    pub const HEARTBEAT: &str = "0";
    pub const TEST_REQUEST: &str = "1";
    pub const RESEND_REQUEST: &str = "2";
    pub const REJECT: &str = "3";
    pub const SEQUENCE_RESET: &str = "4";
    pub const LOGOUT: &str = "5";
    pub const LOGON: &str = "A";
    pub const MARKET_DATA_REQUEST: &str = "V";

    /// Session-layer message types. Everything else is application data.
    pub fn is_admin(value: &str) -> bool {
        matches!(
            value,
            HEARTBEAT | TEST_REQUEST | RESEND_REQUEST | REJECT | SEQUENCE_RESET | LOGOUT | LOGON
        )
    }
}

const fn is_header_tag(tag: u32) -> bool {
    matches!(
        tag,
        tags::MSG_TYPE
            | tags::MSG_SEQ_NUM
            | tags::POSS_DUP_FLAG
            | tags::SENDER_COMP_ID
            | tags::SENDER_SUB_ID
            | tags::SENDING_TIME
            | tags::TARGET_COMP_ID
            | tags::TARGET_SUB_ID
            | tags::POSS_RESEND
            | tags::ORIG_SENDING_TIME
    )
}

/// One FIX message: ordered header fields followed by ordered body fields.
///
/// `MsgType (35)` is always the first header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMessage {
    header: Vec<(u32, String)>,
    body: Vec<(u32, String)>,
}

impl FixMessage {
    pub fn new(msg_type: &str) -> Self {
        Self {
            header: vec![(tags::MSG_TYPE, msg_type.to_string())],
            body: Vec::new(),
        }
    }

    /// Build from decoded wire fields. Header tags are routed to the
    /// header, `MsgType` is moved to the front.
    pub fn from_fields(fields: impl IntoIterator<Item = (u32, String)>) -> Self {
        let mut header = Vec::new();
        let mut body = Vec::new();
        for (tag, value) in fields {
            if tag == tags::MSG_TYPE {
                header.insert(0, (tag, value));
            } else if is_header_tag(tag) {
                header.push((tag, value));
            } else {
                body.push((tag, value));
            }
        }
        Self { header, body }
    }

    pub fn msg_type(&self) -> &str {
        self.get(tags::MSG_TYPE).unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        msg_type::is_admin(self.msg_type())
    }

    /// First value for `tag`, header first.
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.header
            .iter()
            .chain(self.body.iter())
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Set `tag`, replacing the first existing occurrence in place.
    pub fn set(&mut self, tag: u32, value: impl Into<String>) {
        let value = value.into();
        let section = if is_header_tag(tag) {
            &mut self.header
        } else {
            &mut self.body
        };
        match section.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => section.push((tag, value)),
        }
    }

    /// Append a body field even if the tag already exists (repeating groups).
    pub fn push(&mut self, tag: u32, value: impl Into<String>) {
        self.body.push((tag, value.into()));
    }

    /// All fields in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &str)> {
        self.header
            .iter()
            .chain(self.body.iter())
            .map(|(t, v)| (*t, v.as_str()))
    }
}

/// Pipe-delimited rendering, e.g. `35=A|34=1|49=CLIENT|`.
impl std::fmt::Display for FixMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (tag, value) in self.fields() {
            write!(f, "{tag}={value}|")?;
        }
        Ok(())
    }
}
