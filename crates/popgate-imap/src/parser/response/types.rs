//! Response data types.

use crate::types::{Capability, Flag, Mailbox, ResponseCode, SeqNum, Uid, UidValidity};

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO`
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH`
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* FLAGS (...)`
    Flags(Vec<Flag>),
    /// `* SEARCH ...`
    Search(Vec<SeqNum>),
    /// `* STATUS mailbox (...)`
    Status {
        /// Mailbox the status is for.
        mailbox: Mailbox,
        /// Reported items.
        items: Vec<StatusItem>,
    },
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Returned data items.
        items: Vec<FetchItem>,
    },
    /// Any other untagged data, kept as its keyword.
    Other(String),
}

/// A single data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// UID.
    Uid(Uid),
    /// RFC822.SIZE.
    Rfc822Size(u32),
    /// FLAGS.
    Flags(Vec<Flag>),
    /// A body payload: `RFC822`, `BODY[...]` and friends.
    Body {
        /// Section specifier, e.g. `HEADER.FIELDS (FROM TO CC)`. `None` for
        /// RFC822.
        section: Option<String>,
        /// Payload; `None` when the server answered NIL.
        data: Option<Vec<u8>>,
    },
}

/// A single STATUS item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusItem {
    /// Number of messages.
    Messages(u32),
    /// Number of recent messages.
    Recent(u32),
    /// Next UID.
    UidNext(Uid),
    /// UIDVALIDITY.
    UidValidity(UidValidity),
    /// Number of unseen messages.
    Unseen(u32),
}
