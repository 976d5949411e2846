//! In-process mail store for tests.
//!
//! Mailboxes live in memory behind a shared lock, so a test keeps a clone
//! of the [`MemoryMailStore`] to seed messages before a session runs and
//! to inspect the result afterwards. Every session call is journaled.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{BackendError, BackendResult, BackendSession, MailStore, MessageId};

/// How an injected failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The backend answers NO.
    Protocol,
    /// The connection drops.
    Transport,
}

#[derive(Debug)]
struct StoredMessage {
    uid: u32,
    data: Vec<u8>,
    deleted: bool,
}

#[derive(Debug)]
struct StoredMailbox {
    messages: Vec<StoredMessage>,
    uid_next: u32,
}

impl Default for StoredMailbox {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            uid_next: 1,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, String>,
    mailboxes: BTreeMap<String, StoredMailbox>,
    subscribed: BTreeSet<String>,
    failures: HashMap<&'static str, Failure>,
    journal: Vec<String>,
    opened: usize,
    closed: usize,
}

impl MemoryState {
    fn enter(&mut self, op: &'static str, detail: String) -> BackendResult<()> {
        self.journal.push(if detail.is_empty() {
            op.to_string()
        } else {
            format!("{op} {detail}")
        });
        match self.failures.get(op) {
            Some(Failure::Protocol) => Err(BackendError::Protocol(popgate_imap::Error::No(
                format!("{op} failed"),
            ))),
            Some(Failure::Transport) => Err(BackendError::Transport(popgate_imap::Error::Io(
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, format!("{op} failed")),
            ))),
            None => Ok(()),
        }
    }
}

fn no(text: &str) -> BackendError {
    BackendError::Protocol(popgate_imap::Error::No(text.to_string()))
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`MailStore`] whose mailboxes live in memory.
#[derive(Debug, Clone)]
pub struct MemoryMailStore {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMailStore {
    /// Creates a store with an empty `INBOX`.
    #[must_use]
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state
            .mailboxes
            .insert("INBOX".to_string(), StoredMailbox::default());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Registers login credentials.
    pub fn add_account(&self, address: &str, password: &str) {
        lock(&self.state)
            .accounts
            .insert(address.to_string(), password.to_string());
    }

    /// Appends a message to `mailbox`, creating the mailbox if needed.
    /// Returns the assigned UID.
    pub fn deliver(&self, mailbox: &str, data: &[u8]) -> u32 {
        let mut state = lock(&self.state);
        let mailbox = state.mailboxes.entry(mailbox.to_string()).or_default();
        let uid = mailbox.uid_next;
        mailbox.uid_next += 1;
        mailbox.messages.push(StoredMessage {
            uid,
            data: data.to_vec(),
            deleted: false,
        });
        uid
    }

    /// Makes every later call of `op` fail. `op` is a session method name
    /// or `"open"`.
    pub fn fail_on(&self, op: &'static str, failure: Failure) {
        lock(&self.state).failures.insert(op, failure);
    }

    /// Returns the messages of `mailbox` in sequence order, including
    /// those flagged deleted but not yet expunged.
    #[must_use]
    pub fn messages(&self, mailbox: &str) -> Vec<Vec<u8>> {
        lock(&self.state)
            .mailboxes
            .get(mailbox)
            .map(|m| m.messages.iter().map(|msg| msg.data.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns how many messages of `mailbox` are flagged deleted.
    #[must_use]
    pub fn deleted_count(&self, mailbox: &str) -> usize {
        lock(&self.state)
            .mailboxes
            .get(mailbox)
            .map_or(0, |m| m.messages.iter().filter(|msg| msg.deleted).count())
    }

    /// Returns true if `mailbox` exists.
    #[must_use]
    pub fn has_mailbox(&self, mailbox: &str) -> bool {
        lock(&self.state).mailboxes.contains_key(mailbox)
    }

    /// Returns true if `mailbox` is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, mailbox: &str) -> bool {
        lock(&self.state).subscribed.contains(mailbox)
    }

    /// Returns every call made so far, oldest first.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        lock(&self.state).journal.clone()
    }

    /// Returns how many sessions were opened.
    #[must_use]
    pub fn open_count(&self) -> usize {
        lock(&self.state).opened
    }

    /// Returns how many times `close` was called on any session.
    #[must_use]
    pub fn close_count(&self) -> usize {
        lock(&self.state).closed
    }
}

impl MailStore for MemoryMailStore {
    type Session = MemorySession;

    async fn open(&self) -> BackendResult<MemorySession> {
        let mut state = lock(&self.state);
        state.enter("open", String::new())?;
        state.opened += 1;
        Ok(MemorySession {
            state: Arc::clone(&self.state),
            logged_in: false,
            selected: None,
            closed: false,
        })
    }
}

/// A session on a [`MemoryMailStore`].
#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    logged_in: bool,
    selected: Option<String>,
    closed: bool,
}

impl MemorySession {
    fn authenticated(&self) -> BackendResult<()> {
        if self.logged_in && !self.closed {
            Ok(())
        } else {
            Err(BackendError::Protocol(popgate_imap::Error::InvalidState(
                "not authenticated".into(),
            )))
        }
    }

    fn selected(&self) -> BackendResult<&str> {
        self.authenticated()?;
        self.selected.as_deref().ok_or_else(|| {
            BackendError::Protocol(popgate_imap::Error::InvalidState("no mailbox selected".into()))
        })
    }

    fn with_message<T>(
        &self,
        id: MessageId,
        f: impl FnOnce(&mut StoredMessage) -> T,
    ) -> BackendResult<T> {
        let name = self.selected()?;
        let mut state = lock(&self.state);
        let index = usize::try_from(id.get() - 1).map_err(|_| BackendError::NoSuchMessage(id))?;
        state
            .mailboxes
            .get_mut(name)
            .and_then(|mailbox| mailbox.messages.get_mut(index))
            .map(f)
            .ok_or(BackendError::NoSuchMessage(id))
    }
}

/// Splits the header section into unfolded `(name, line)` pairs.
fn header_lines(data: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(data);
    let header = text.split("\r\n\r\n").next().unwrap_or_default();

    let mut lines: Vec<(String, String)> = Vec::new();
    for line in header.split("\r\n") {
        if line.starts_with([' ', '\t']) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str("\r\n");
                last.push_str(line);
            }
        } else if let Some((name, _)) = line.split_once(':') {
            lines.push((name.trim().to_string(), line.to_string()));
        }
    }
    lines
}

impl BackendSession for MemorySession {
    async fn login(&mut self, address: &str, credential: &str) -> BackendResult<()> {
        let mut state = lock(&self.state);
        state.enter("login", address.to_string())?;
        if state.accounts.get(address).is_some_and(|pw| pw == credential) {
            self.logged_in = true;
            Ok(())
        } else {
            Err(BackendError::Auth("Authentication failed.".into()))
        }
    }

    async fn ensure_mailbox(&mut self, path: &str) -> BackendResult<()> {
        self.authenticated()?;
        let mut state = lock(&self.state);
        state.enter("ensure_mailbox", path.to_string())?;
        state.mailboxes.entry(path.to_string()).or_default();
        state.subscribed.insert(path.to_string());
        Ok(())
    }

    async fn select_mailbox(&mut self, path: &str) -> BackendResult<()> {
        self.authenticated()?;
        let mut state = lock(&self.state);
        state.enter("select_mailbox", path.to_string())?;
        if !state.mailboxes.contains_key(path) {
            self.selected = None;
            return Err(no("Mailbox doesn't exist"));
        }
        self.selected = Some(path.to_string());
        Ok(())
    }

    async fn search_header(&mut self, field: &str, term: &str) -> BackendResult<Vec<MessageId>> {
        let name = self.selected()?;
        let mut state = lock(&self.state);
        state.enter("search_header", format!("{field} {term}"))?;

        let term = term.to_lowercase();
        let hits = state.mailboxes.get(name).map_or_else(Vec::new, |mailbox| {
            (1u32..)
                .zip(&mailbox.messages)
                .filter(|(_, msg)| {
                    header_lines(&msg.data).iter().any(|(header, line)| {
                        header.eq_ignore_ascii_case(field)
                            && line[header.len()..].to_lowercase().contains(&term)
                    })
                })
                .filter_map(|(seq, _)| MessageId::new(seq))
                .collect()
        });
        Ok(hits)
    }

    async fn fetch_headers(&mut self, id: MessageId) -> BackendResult<String> {
        lock(&self.state).enter("fetch_headers", id.to_string())?;
        self.with_message(id, |msg| {
            let mut out = String::new();
            for (name, line) in header_lines(&msg.data) {
                if ["From", "To", "Cc"]
                    .iter()
                    .any(|field| name.eq_ignore_ascii_case(field))
                {
                    out.push_str(&line);
                    out.push_str("\r\n");
                }
            }
            out.push_str("\r\n");
            out
        })
    }

    async fn fetch_full(&mut self, id: MessageId) -> BackendResult<Vec<u8>> {
        lock(&self.state).enter("fetch_full", id.to_string())?;
        self.with_message(id, |msg| msg.data.clone())
    }

    async fn fetch_uid(&mut self, id: MessageId) -> BackendResult<u32> {
        lock(&self.state).enter("fetch_uid", id.to_string())?;
        self.with_message(id, |msg| msg.uid)
    }

    async fn get_size(&mut self, id: MessageId) -> BackendResult<u32> {
        lock(&self.state).enter("get_size", id.to_string())?;
        let len = self.with_message(id, |msg| msg.data.len())?;
        u32::try_from(len).map_err(|_| no("message too large"))
    }

    async fn list_all(&mut self, path: &str) -> BackendResult<Vec<MessageId>> {
        lock(&self.state).enter("list_all", path.to_string())?;
        self.select_mailbox(path).await?;
        let state = lock(&self.state);
        let count = state.mailboxes.get(path).map_or(0, |m| m.messages.len());
        let count = u32::try_from(count).map_err(|_| no("mailbox too large"))?;
        Ok((1..=count).filter_map(MessageId::new).collect())
    }

    async fn copy_and_flag_deleted(
        &mut self,
        id: MessageId,
        destination: &str,
    ) -> BackendResult<()> {
        lock(&self.state).enter("copy_and_flag_deleted", format!("{id} {destination}"))?;
        if !lock(&self.state).mailboxes.contains_key(destination) {
            return Err(no("[TRYCREATE] Mailbox doesn't exist"));
        }
        let data = self.with_message(id, |msg| msg.data.clone())?;
        {
            let mut state = lock(&self.state);
            if let Some(mailbox) = state.mailboxes.get_mut(destination) {
                let uid = mailbox.uid_next;
                mailbox.uid_next += 1;
                mailbox.messages.push(StoredMessage {
                    uid,
                    data,
                    deleted: false,
                });
            }
        }
        self.with_message(id, |msg| msg.deleted = true)
    }

    async fn expunge(&mut self) -> BackendResult<()> {
        let name = self.selected()?.to_string();
        let mut state = lock(&self.state);
        state.enter("expunge", String::new())?;
        if let Some(mailbox) = state.mailboxes.get_mut(&name) {
            mailbox.messages.retain(|msg| !msg.deleted);
        }
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = lock(&self.state);
        state.journal.push("close".to_string());
        state.closed += 1;
        self.closed = true;
        self.logged_in = false;
        self.selected = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(n: u32) -> MessageId {
        MessageId::new(n).unwrap()
    }

    async fn session(store: &MemoryMailStore) -> MemorySession {
        store.add_account("u", "p");
        let mut session = store.open().await.unwrap();
        session.login("u", "p").await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let store = MemoryMailStore::new();
        store.add_account("u", "p");
        let mut session = store.open().await.unwrap();
        assert!(matches!(
            session.login("u", "x").await,
            Err(BackendError::Auth(_))
        ));
        assert!(matches!(
            session.select_mailbox("INBOX").await,
            Err(BackendError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_search_is_field_scoped() {
        let store = MemoryMailStore::new();
        store.deliver("INBOX", b"From: alice@example.org\r\nTo: bob@example.org\r\n\r\nbody\r\n");
        store.deliver(
            "INBOX",
            b"To: carol@example.org,\r\n ALICE@example.org\r\nSubject: hi\r\n\r\n",
        );
        let mut session = session(&store).await;
        session.select_mailbox("INBOX").await.unwrap();

        let hits = session.search_header("to", "alice@example.org").await.unwrap();
        assert_eq!(hits, vec![id(2)]);
        let hits = session.search_header("FROM", "alice").await.unwrap();
        assert_eq!(hits, vec![id(1)]);
    }

    #[tokio::test]
    async fn test_fetch_headers_only_address_fields() {
        let store = MemoryMailStore::new();
        store.deliver(
            "INBOX",
            b"Subject: x\r\nFrom: a@x\r\nCc: c@x\r\nTo: b@x\r\n\r\nTo: not a header\r\n",
        );
        let mut session = session(&store).await;
        session.select_mailbox("INBOX").await.unwrap();

        let headers = session.fetch_headers(id(1)).await.unwrap();
        assert_eq!(headers, "From: a@x\r\nCc: c@x\r\nTo: b@x\r\n\r\n");
        assert!(matches!(
            session.fetch_headers(id(9)).await,
            Err(BackendError::NoSuchMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_flag_expunge() {
        let store = MemoryMailStore::new();
        store.deliver("INBOX", b"To: a\r\n\r\n");
        store.deliver("INBOX", b"To: b\r\n\r\n");
        let mut session = session(&store).await;

        session.ensure_mailbox("INBOX/work").await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();
        session
            .copy_and_flag_deleted(id(2), "INBOX/work")
            .await
            .unwrap();
        assert_eq!(store.deleted_count("INBOX"), 1);
        assert_eq!(store.messages("INBOX").len(), 2);

        session.expunge().await.unwrap();
        assert_eq!(store.messages("INBOX"), vec![b"To: a\r\n\r\n".to_vec()]);
        assert_eq!(store.messages("INBOX/work"), vec![b"To: b\r\n\r\n".to_vec()]);
        assert!(store.is_subscribed("INBOX/work"));
    }

    #[tokio::test]
    async fn test_copy_to_missing_mailbox_fails() {
        let store = MemoryMailStore::new();
        store.deliver("INBOX", b"To: a\r\n\r\n");
        let mut session = session(&store).await;
        session.select_mailbox("INBOX").await.unwrap();
        assert!(session.copy_and_flag_deleted(id(1), "nowhere").await.is_err());
        assert_eq!(store.deleted_count("INBOX"), 0);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryMailStore::new();
        store.fail_on("select_mailbox", Failure::Transport);
        let mut session = session(&store).await;
        assert!(matches!(
            session.select_mailbox("INBOX").await,
            Err(BackendError::Transport(_))
        ));
        session.close().await;
        assert_eq!(store.close_count(), 1);
        assert_eq!(store.journal().last().map(String::as_str), Some("close"));
    }
}
