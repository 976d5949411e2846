//! Command argument types.

use crate::types::Flag;

/// A FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// UID.
    Uid,
    /// RFC822.SIZE.
    Rfc822Size,
    /// RFC822 (full message, sets `\Seen`).
    Rfc822,
    /// `BODY.PEEK[HEADER.FIELDS (...)]`, fetches named header fields without
    /// setting `\Seen`.
    HeaderFields(Vec<String>),
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages in the mailbox.
    All,
    /// Messages whose named header contains the value as a substring.
    Header(String, String),
}

/// STATUS data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusAttribute {
    /// Returns the attribute as written on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// STORE flag modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace the flag set.
    Set(Vec<Flag>),
    /// Add flags.
    Add(Vec<Flag>),
    /// Remove flags.
    Remove(Vec<Flag>),
}

impl StoreAction {
    pub(crate) const fn prefix(&self) -> &'static str {
        match self {
            Self::Set(_) => "FLAGS",
            Self::Add(_) => "+FLAGS",
            Self::Remove(_) => "-FLAGS",
        }
    }

    pub(crate) fn flags(&self) -> &[Flag] {
        match self {
            Self::Set(f) | Self::Add(f) | Self::Remove(f) => f,
        }
    }
}
