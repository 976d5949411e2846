//! # popgate-core
//!
//! Domain logic of the popgate POP3 gateway.
//!
//! This crate provides:
//! - Per-account settings and their `SQLite` store
//! - The header classification rule that decides which mail is curated
//! - The backend mail store capability and its IMAP implementation
//! - The mailbox reorganizer run on every POP3 login

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod classify;
mod error;
pub mod reorganize;
pub mod settings;

pub use backend::imap::{ImapMailStore, ImapSession, ImapStoreConfig};
pub use backend::{
    BackendError, BackendResult, BackendSession, MailStore, MessageId, MessageSummary,
    MessageUidEntry, list_summaries, list_uids,
};
pub use classify::accept;
pub use error::{Error, Result};
pub use reorganize::{CandidateSet, ReorgReport, destination_mailbox, reorganize};
pub use settings::{AccountNamePolicy, Settings, SettingsStore, SqliteSettingsStore};
