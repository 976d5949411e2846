//! Core IMAP types.
//!
//! The subset of RFC 9051 / RFC 3501 types the gateway exchanges with its
//! backend: identifiers, flags, mailbox names and response status.

#![allow(clippy::missing_const_for_fn)]

mod flags;
mod identifiers;
mod mailbox;
mod status;

pub use flags::Flag;
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{Mailbox, MailboxStatus};
pub use status::{Capability, ResponseCode, Status};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_num_new() {
        assert!(SeqNum::new(0).is_none());
        assert_eq!(SeqNum::new(42).unwrap().get(), 42);
    }

    #[test]
    fn test_uid_new() {
        assert!(Uid::new(0).is_none());
        assert_eq!(Uid::new(123).unwrap().get(), 123);
    }

    #[test]
    fn test_capability_parse() {
        assert_eq!(Capability::parse("IMAP4rev1"), Capability::Imap4Rev1);
        assert_eq!(Capability::parse("idle"), Capability::Idle);
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("XYZZY"),
            Capability::Unknown("XYZZY".to_string())
        );
    }

    #[test]
    fn test_flag_parse() {
        assert_eq!(Flag::parse("\\Deleted"), Flag::Deleted);
        assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
        assert_eq!(Flag::parse("$Forwarded"), Flag::Keyword("$Forwarded".to_string()));
    }
}
