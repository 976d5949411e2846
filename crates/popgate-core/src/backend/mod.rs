//! Backend mail store capability.
//!
//! The POP3 layer never talks IMAP directly. It opens a [`BackendSession`]
//! through a [`MailStore`] and drives it with the operations below. Each
//! session owns one remote connection for its whole life and is never
//! shared between POP3 connections.
//!
//! - [`imap`]: the production store, backed by `popgate-imap`
//! - `memory`: an in-process store for tests (`test-util` feature)

use std::future::Future;
use std::num::NonZeroU32;
use std::str::FromStr;

use thiserror::Error;

pub mod imap;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

/// Identifier of a message within the selected mailbox.
///
/// Backed by the IMAP sequence number, so it is only valid until the next
/// expunge or mailbox selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub NonZeroU32);

impl MessageId {
    /// Creates a message id. Returns `None` for 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<NonZeroU32>().map(Self)
    }
}

/// A message id with its size, as reported by POP3 `LIST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSummary {
    /// Message id.
    pub id: MessageId,
    /// Size in octets.
    pub octet_size: u32,
}

/// A message id with its backend UID, as reported by POP3 `UIDL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageUidEntry {
    /// Message id.
    pub id: MessageId,
    /// Backend UID, stable across sessions.
    pub uid: u32,
}

/// Errors raised by a backend session.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The connection failed: connect, TLS, I/O or timeout.
    #[error("transport error: {0}")]
    Transport(#[source] popgate_imap::Error),

    /// Any other failure reported by the backend.
    #[error("protocol error: {0}")]
    Protocol(#[source] popgate_imap::Error),

    /// The message does not exist in the selected mailbox.
    #[error("no such message: {0}")]
    NoSuchMessage(MessageId),
}

impl From<popgate_imap::Error> for BackendError {
    fn from(err: popgate_imap::Error) -> Self {
        if err.is_transport() {
            Self::Transport(err)
        } else {
            Self::Protocol(err)
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Opens backend sessions.
pub trait MailStore: Send + Sync {
    /// The session type this store hands out.
    type Session: BackendSession;

    /// Connects to the backend. The session is not yet logged in.
    fn open(&self) -> impl Future<Output = BackendResult<Self::Session>> + Send;
}

/// One exclusive connection to the backend mail store.
///
/// Operations that take a [`MessageId`] work on the mailbox selected
/// last. Selecting another mailbox invalidates earlier ids.
pub trait BackendSession: Send {
    /// Logs in. A rejected credential is [`BackendError::Auth`].
    fn login(
        &mut self,
        address: &str,
        credential: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Makes sure `path` exists and is subscribed. Idempotent.
    fn ensure_mailbox(&mut self, path: &str) -> impl Future<Output = BackendResult<()>> + Send;

    /// Selects `path` for the id-based operations.
    fn select_mailbox(&mut self, path: &str) -> impl Future<Output = BackendResult<()>> + Send;

    /// Returns the messages whose `field` header contains `term`.
    fn search_header(
        &mut self,
        field: &str,
        term: &str,
    ) -> impl Future<Output = BackendResult<Vec<MessageId>>> + Send;

    /// Returns the `From`, `To` and `Cc` header lines of a message, never
    /// the body.
    fn fetch_headers(&mut self, id: MessageId)
    -> impl Future<Output = BackendResult<String>> + Send;

    /// Returns the full message. Its octet length is the length of the
    /// returned buffer.
    fn fetch_full(&mut self, id: MessageId) -> impl Future<Output = BackendResult<Vec<u8>>> + Send;

    /// Returns the backend UID of a message.
    fn fetch_uid(&mut self, id: MessageId) -> impl Future<Output = BackendResult<u32>> + Send;

    /// Returns the size of a message in octets.
    fn get_size(&mut self, id: MessageId) -> impl Future<Output = BackendResult<u32>> + Send;

    /// Selects `path` and returns every message in it.
    fn list_all(
        &mut self,
        path: &str,
    ) -> impl Future<Output = BackendResult<Vec<MessageId>>> + Send;

    /// Copies a message to `destination` and flags the source `\Deleted`.
    /// Nothing is expunged.
    fn copy_and_flag_deleted(
        &mut self,
        id: MessageId,
        destination: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Removes every `\Deleted` message from the selected mailbox.
    fn expunge(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// Logs out and drops the connection. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Lists `mailbox` with message sizes.
///
/// # Errors
///
/// Fails on the first backend error.
pub async fn list_summaries<B: BackendSession>(
    session: &mut B,
    mailbox: &str,
) -> BackendResult<Vec<MessageSummary>> {
    let ids = session.list_all(mailbox).await?;
    let mut summaries = Vec::with_capacity(ids.len());
    for id in ids {
        let octet_size = session.get_size(id).await?;
        summaries.push(MessageSummary { id, octet_size });
    }
    Ok(summaries)
}

/// Lists `mailbox` with backend UIDs.
///
/// # Errors
///
/// Fails on the first backend error.
pub async fn list_uids<B: BackendSession>(
    session: &mut B,
    mailbox: &str,
) -> BackendResult<Vec<MessageUidEntry>> {
    let ids = session.list_all(mailbox).await?;
    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        let uid = session.fetch_uid(id).await?;
        entries.push(MessageUidEntry { id, uid });
    }
    Ok(entries)
}
