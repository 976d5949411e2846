//! IMAP command builder.
//!
//! Only the commands the gateway issues are modelled. Each command knows how
//! to serialize itself behind a tag, CRLF included. Arguments that need a
//! literal produce `{n}` lines inside the output; the framing layer sends
//! them one continuation at a time.

mod serialize;
mod tag_generator;
mod types;

use crate::Result;
use crate::types::{Mailbox, SeqNum};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchCriteria, StatusAttribute, StoreAction};

use serialize::{
    needs_charset, write_astring, write_fetch_items, write_mailbox, write_search_criteria,
    write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: Mailbox,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },

    // Selected
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// FETCH command for a single message.
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
    },
    /// STORE command for a single message.
    Store {
        /// Message sequence number.
        seq: SeqNum,
        /// Flag modification.
        action: StoreAction,
        /// Suppress the untagged FETCH response.
        silent: bool,
    },
    /// COPY command for a single message.
    Copy {
        /// Message sequence number.
        seq: SeqNum,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// EXPUNGE command.
    Expunge,
}

impl Command {
    /// Serializes the command to bytes with the given tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`](crate::Error::Protocol) if an argument
    /// contains a NUL byte.
    pub fn serialize(&self, tag: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username)?;
                buf.push(b' ');
                write_astring(&mut buf, password)?;
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_mailbox(&mut buf, mailbox)?;
            }
            Self::Create { mailbox } => {
                buf.extend_from_slice(b"CREATE ");
                write_mailbox(&mut buf, mailbox)?;
            }
            Self::Subscribe { mailbox } => {
                buf.extend_from_slice(b"SUBSCRIBE ");
                write_mailbox(&mut buf, mailbox)?;
            }
            Self::Status { mailbox, items } => {
                buf.extend_from_slice(b"STATUS ");
                write_mailbox(&mut buf, mailbox)?;
                buf.extend_from_slice(b" (");
                let names: Vec<&str> = items.iter().map(|i| i.as_str()).collect();
                buf.extend_from_slice(names.join(" ").as_bytes());
                buf.push(b')');
            }
            Self::Search { criteria } => {
                buf.extend_from_slice(b"SEARCH ");
                if needs_charset(criteria) {
                    buf.extend_from_slice(b"CHARSET UTF-8 ");
                }
                write_search_criteria(&mut buf, criteria)?;
            }
            Self::Fetch { seq, items } => {
                buf.extend_from_slice(format!("FETCH {seq} ").as_bytes());
                write_fetch_items(&mut buf, items);
            }
            Self::Store {
                seq,
                action,
                silent,
            } => {
                buf.extend_from_slice(format!("STORE {seq} ").as_bytes());
                write_store_action(&mut buf, action, *silent);
            }
            Self::Copy { seq, mailbox } => {
                buf.extend_from_slice(format!("COPY {seq} ").as_bytes());
                write_mailbox(&mut buf, mailbox)?;
            }
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),
        }

        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }

    /// Returns the command name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Create { .. } => "CREATE",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Status { .. } => "STATUS",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Expunge => "EXPUNGE",
        }
    }
}
