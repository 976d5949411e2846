//! [`MailStore`] backed by a remote IMAP server.

use std::future::Future;
use std::time::Duration;

use popgate_imap::{
    Authenticated, Client, FetchAttribute, FetchItem, Flag, ImapStream, LoggedIn, NotAuthenticated,
    SearchCriteria, Security, Selected, SeqNum, StatusAttribute, StoreAction, Transition,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::{BackendError, BackendResult, BackendSession, MailStore, MessageId};

/// Header fields fetched for classification.
const CLASSIFY_FIELDS: [&str; 3] = ["FROM", "TO", "CC"];

/// Connection settings for the IMAP backend.
#[derive(Debug, Clone)]
pub struct ImapStoreConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Plaintext or TLS.
    pub security: Security,
    /// Limit for TCP connect, TLS handshake and greeting.
    pub connect_timeout: Duration,
    /// Limit for each command round trip.
    pub io_timeout: Duration,
}

impl ImapStoreConfig {
    /// Creates a configuration with the default port for `security` and
    /// default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }
}

/// Opens one IMAP connection per backend session.
#[derive(Debug, Clone)]
pub struct ImapMailStore {
    config: ImapStoreConfig,
}

impl ImapMailStore {
    /// Creates a store for the given server.
    #[must_use]
    pub const fn new(config: ImapStoreConfig) -> Self {
        Self { config }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ImapStoreConfig {
        &self.config
    }
}

impl MailStore for ImapMailStore {
    type Session = ImapSession<ImapStream>;

    async fn open(&self) -> BackendResult<ImapSession<ImapStream>> {
        let config = &self.config;
        debug!(host = %config.host, port = config.port, "connecting to backend");

        let stream = timed(
            config.connect_timeout,
            popgate_imap::connection::connect(&config.host, config.port, config.security),
        )
        .await?;
        ImapSession::from_stream(stream, config.connect_timeout, config.io_timeout).await
    }
}

/// Where the session is in the IMAP state machine.
enum SessionState<S> {
    /// Logged out, failed, or not yet connected.
    Closed,
    /// Greeting received.
    Connected(Client<S, NotAuthenticated>),
    /// Logged in.
    Authenticated(Client<S, Authenticated>),
    /// Mailbox selected.
    Selected(Client<S, Selected>),
}

/// A backend session on one IMAP connection.
///
/// A LOGIN or SELECT the server refuses leaves the connection usable: the
/// session stays connected, or falls back to authenticated after a failed
/// SELECT. Only a transport failure or BYE closes it.
pub struct ImapSession<S> {
    state: SessionState<S>,
    io_timeout: Duration,
}

impl<S> std::fmt::Debug for ImapSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            SessionState::Closed => "closed",
            SessionState::Connected(_) => "connected",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Selected(_) => "selected",
        };
        f.debug_struct("ImapSession")
            .field("state", &state)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Reads the server greeting from an established stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting does not arrive within
    /// `greeting_timeout` or is a BYE.
    pub async fn from_stream(
        stream: S,
        greeting_timeout: Duration,
        io_timeout: Duration,
    ) -> BackendResult<Self> {
        let client = timed(greeting_timeout, Client::from_stream(stream)).await?;
        Ok(Self {
            state: SessionState::Connected(client),
            io_timeout,
        })
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match &self.state {
            SessionState::Selected(client) => Some(client.mailbox()),
            _ => None,
        }
    }

    fn selected(&mut self) -> BackendResult<&mut Client<S, Selected>> {
        match &mut self.state {
            SessionState::Selected(client) => Ok(client),
            _ => Err(invalid_state("no mailbox selected")),
        }
    }

    /// Fetches one message's items, failing with `NoSuchMessage` when the
    /// server returns nothing for it.
    async fn fetch_one(
        &mut self,
        id: MessageId,
        attributes: &[FetchAttribute],
    ) -> BackendResult<Vec<FetchItem>> {
        let limit = self.io_timeout;
        let client = self.selected()?;
        let items = timed(limit, client.fetch(seq(id), attributes)).await?;
        if items.is_empty() {
            return Err(BackendError::NoSuchMessage(id));
        }
        Ok(items)
    }
}

impl<S> BackendSession for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn login(&mut self, address: &str, credential: &str) -> BackendResult<()> {
        let client = match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Connected(client) => client,
            other => {
                self.state = other;
                return Err(invalid_state("already logged in"));
            }
        };

        match timed_transition(self.io_timeout, client.login(address, credential)).await {
            Ok(client) => {
                debug!(address, "backend login succeeded");
                self.state = SessionState::Authenticated(client);
                Ok(())
            }
            Err((client, err)) => {
                if let Some(client) = client {
                    self.state = SessionState::Connected(client);
                }
                match err {
                    popgate_imap::Error::No(text) => Err(BackendError::Auth(text)),
                    err => Err(err.into()),
                }
            }
        }
    }

    async fn ensure_mailbox(&mut self, path: &str) -> BackendResult<()> {
        let limit = self.io_timeout;
        match &mut self.state {
            SessionState::Authenticated(client) => ensure_mailbox(client, path, limit).await,
            SessionState::Selected(client) => ensure_mailbox(client, path, limit).await,
            _ => Err(invalid_state("not logged in")),
        }
    }

    async fn select_mailbox(&mut self, path: &str) -> BackendResult<()> {
        let limit = self.io_timeout;
        let selected = match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Authenticated(client) => {
                timed_transition(limit, client.select(path)).await
            }
            SessionState::Selected(client) => timed_transition(limit, client.select(path)).await,
            other => {
                self.state = other;
                return Err(invalid_state("not logged in"));
            }
        };

        match selected {
            Ok((client, status)) => {
                debug!(mailbox = path, exists = status.exists, "mailbox selected");
                self.state = SessionState::Selected(client);
                Ok(())
            }
            Err((client, err)) => {
                if let Some(client) = client {
                    self.state = SessionState::Authenticated(client);
                }
                Err(err.into())
            }
        }
    }

    async fn search_header(&mut self, field: &str, term: &str) -> BackendResult<Vec<MessageId>> {
        let limit = self.io_timeout;
        let client = self.selected()?;
        let criteria = SearchCriteria::Header(field.to_string(), term.to_string());
        let hits = timed(limit, client.search(&criteria)).await?;
        Ok(hits.into_iter().map(|seq| MessageId(seq.0)).collect())
    }

    async fn fetch_headers(&mut self, id: MessageId) -> BackendResult<String> {
        let fields = CLASSIFY_FIELDS.iter().map(|f| (*f).to_string()).collect();
        let items = self
            .fetch_one(id, &[FetchAttribute::HeaderFields(fields)])
            .await?;
        let data = body(items).ok_or(BackendError::NoSuchMessage(id))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn fetch_full(&mut self, id: MessageId) -> BackendResult<Vec<u8>> {
        let items = self.fetch_one(id, &[FetchAttribute::Rfc822]).await?;
        body(items).ok_or(BackendError::NoSuchMessage(id))
    }

    async fn fetch_uid(&mut self, id: MessageId) -> BackendResult<u32> {
        let items = self.fetch_one(id, &[FetchAttribute::Uid]).await?;
        items
            .into_iter()
            .find_map(|item| match item {
                FetchItem::Uid(uid) => Some(uid.get()),
                _ => None,
            })
            .ok_or(BackendError::NoSuchMessage(id))
    }

    async fn get_size(&mut self, id: MessageId) -> BackendResult<u32> {
        let items = self.fetch_one(id, &[FetchAttribute::Rfc822Size]).await?;
        items
            .into_iter()
            .find_map(|item| match item {
                FetchItem::Rfc822Size(size) => Some(size),
                _ => None,
            })
            .ok_or(BackendError::NoSuchMessage(id))
    }

    async fn list_all(&mut self, path: &str) -> BackendResult<Vec<MessageId>> {
        self.select_mailbox(path).await?;
        let limit = self.io_timeout;
        let client = self.selected()?;
        let all = timed(limit, client.search(&SearchCriteria::All)).await?;
        Ok(all.into_iter().map(|seq| MessageId(seq.0)).collect())
    }

    async fn copy_and_flag_deleted(
        &mut self,
        id: MessageId,
        destination: &str,
    ) -> BackendResult<()> {
        let limit = self.io_timeout;
        let client = self.selected()?;
        timed(limit, client.copy(seq(id), destination)).await?;
        timed(
            limit,
            client.store_silent(seq(id), StoreAction::Add(vec![Flag::Deleted])),
        )
        .await
    }

    async fn expunge(&mut self) -> BackendResult<()> {
        let limit = self.io_timeout;
        let client = self.selected()?;
        let removed = timed(limit, client.expunge()).await?;
        debug!(count = removed.len(), "expunged");
        Ok(())
    }

    async fn close(&mut self) {
        let limit = self.io_timeout;
        let result = match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Closed => return,
            SessionState::Connected(client) => timed(limit, client.logout()).await,
            SessionState::Authenticated(client) => timed(limit, client.logout()).await,
            SessionState::Selected(client) => timed(limit, client.logout()).await,
        };
        match result {
            Ok(()) => debug!("backend session closed"),
            Err(err) => warn!(%err, "backend logout failed"),
        }
    }
}

/// STATUS the mailbox; CREATE it on NO; then SUBSCRIBE.
///
/// Some servers answer NO to SUBSCRIBE on an already subscribed mailbox,
/// which is not an error here.
async fn ensure_mailbox<S, State>(
    client: &mut Client<S, State>,
    path: &str,
    limit: Duration,
) -> BackendResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    State: LoggedIn + Send,
{
    match timed(limit, client.status(path, &[StatusAttribute::Messages])).await {
        Ok(_) => {}
        Err(BackendError::Protocol(popgate_imap::Error::No(text))) => {
            debug!(mailbox = path, %text, "creating mailbox");
            timed(limit, client.create(path)).await?;
        }
        Err(err) => return Err(err),
    }

    match timed(limit, client.subscribe(path)).await {
        Err(BackendError::Protocol(popgate_imap::Error::No(text))) => {
            debug!(mailbox = path, %text, "subscribe refused, assuming subscribed");
            Ok(())
        }
        other => other,
    }
}

/// Runs an IMAP call under a deadline, mapping both failure kinds.
async fn timed<T>(
    limit: Duration,
    fut: impl Future<Output = popgate_imap::Result<T>>,
) -> BackendResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(BackendError::from),
        Err(_) => Err(timeout(limit)),
    }
}

/// Runs a state-changing IMAP call under a deadline. The connection is
/// handed back with the error unless it timed out, broke or got a BYE.
async fn timed_transition<T, C>(
    limit: Duration,
    fut: impl Future<Output = Transition<T, C>>,
) -> Result<T, (Option<C>, popgate_imap::Error)> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(next)) => Ok(next),
        Ok(Err((client, err))) => {
            let usable = !err.is_transport() && !matches!(err, popgate_imap::Error::Bye(_));
            Err((usable.then_some(client), err))
        }
        Err(_) => Err((None, popgate_imap::Error::Timeout(limit))),
    }
}

const fn timeout(limit: Duration) -> BackendError {
    BackendError::Transport(popgate_imap::Error::Timeout(limit))
}

fn invalid_state(message: &str) -> BackendError {
    BackendError::Protocol(popgate_imap::Error::InvalidState(message.to_string()))
}

const fn seq(id: MessageId) -> SeqNum {
    SeqNum(id.0)
}

fn body(items: Vec<FetchItem>) -> Option<Vec<u8>> {
    items.into_iter().find_map(|item| match item {
        FetchItem::Body { data, .. } => Some(data.unwrap_or_default()),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;

    const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1] ready\r\n";
    const LIMIT: Duration = Duration::from_secs(5);

    fn id(n: u32) -> MessageId {
        MessageId::new(n).unwrap()
    }

    async fn session(mock: Mock) -> ImapSession<Mock> {
        ImapSession::from_stream(mock, LIMIT, LIMIT).await.unwrap()
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN bcd123 wrong\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE\r\nA0001 OK\r\n")
            .build();

        let mut session = session(mock).await;
        let err = session.login("bcd123", "wrong").await.unwrap_err();
        assert!(matches!(err, BackendError::Auth(text) if text == "Authentication failed."));

        session.close().await;
    }

    #[tokio::test]
    async fn test_failed_select_falls_back_to_authenticated() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN u p\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 2 EXISTS\r\nA0001 OK\r\n")
            .write(b"A0002 SELECT INBOX/gone\r\n")
            .read(b"A0002 NO [NONEXISTENT] Unknown mailbox\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE\r\nA0003 OK\r\n")
            .build();

        let mut session = session(mock).await;
        session.login("u", "p").await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();
        assert!(matches!(
            session.select_mailbox("INBOX/gone").await,
            Err(BackendError::Protocol(popgate_imap::Error::No(_)))
        ));
        assert_eq!(session.selected_mailbox(), None);
        assert!(matches!(
            session.search_header("TO", "x").await,
            Err(BackendError::Protocol(popgate_imap::Error::InvalidState(_)))
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn test_ensure_mailbox_creates_missing() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN u p\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 STATUS INBOX/work (MESSAGES)\r\n")
            .read(b"A0001 NO [NONEXISTENT] Mailbox doesn't exist\r\n")
            .write(b"A0002 CREATE INBOX/work\r\n")
            .read(b"A0002 OK\r\n")
            .write(b"A0003 SUBSCRIBE INBOX/work\r\n")
            .read(b"A0003 OK\r\n")
            .write(b"A0004 STATUS INBOX/work (MESSAGES)\r\n")
            .read(b"* STATUS INBOX/work (MESSAGES 3)\r\nA0004 OK\r\n")
            .write(b"A0005 SUBSCRIBE INBOX/work\r\n")
            .read(b"A0005 NO Already subscribed\r\n")
            .write(b"A0006 LOGOUT\r\n")
            .read(b"* BYE\r\nA0006 OK\r\n")
            .build();

        let mut session = session(mock).await;
        session.login("u", "p").await.unwrap();
        session.ensure_mailbox("INBOX/work").await.unwrap();
        session.ensure_mailbox("INBOX/work").await.unwrap();
        session.close().await;
        session.close().await;
    }

    #[tokio::test]
    async fn test_reorganize_commands() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN u p\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 5 EXISTS\r\nA0001 OK [READ-WRITE]\r\n")
            .write(b"A0002 SEARCH (HEADER Received \"alice@example.org\")\r\n")
            .read(b"* SEARCH 2 5\r\nA0002 OK\r\n")
            .write(b"A0003 FETCH 5 BODY.PEEK[HEADER.FIELDS (FROM TO CC)]\r\n")
            .read(b"* 5 FETCH (BODY[HEADER.FIELDS (FROM TO CC)] {9}\r\nTo: a\r\n\r\n)\r\n")
            .read(b"A0003 OK\r\n")
            .write(b"A0004 COPY 5 INBOX/work\r\n")
            .read(b"A0004 OK\r\n")
            .write(b"A0005 STORE 5 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK\r\n")
            .write(b"A0006 EXPUNGE\r\n")
            .read(b"* 5 EXPUNGE\r\nA0006 OK\r\n")
            .build();

        let mut session = session(mock).await;
        session.login("u", "p").await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();
        assert_eq!(session.selected_mailbox(), Some("INBOX"));

        let hits = session
            .search_header("Received", "alice@example.org")
            .await
            .unwrap();
        assert_eq!(hits, vec![id(2), id(5)]);

        let headers = session.fetch_headers(id(5)).await.unwrap();
        assert_eq!(headers, "To: a\r\n\r\n");

        session
            .copy_and_flag_deleted(id(5), "INBOX/work")
            .await
            .unwrap();
        session.expunge().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_uid_size_and_retrieve() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN u p\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT INBOX/work\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK\r\n")
            .write(b"A0002 SEARCH ALL\r\n")
            .read(b"* SEARCH 1\r\nA0002 OK\r\n")
            .write(b"A0003 FETCH 1 UID\r\n")
            .read(b"* 1 FETCH (UID 4242)\r\nA0003 OK\r\n")
            .write(b"A0004 FETCH 1 RFC822.SIZE\r\n")
            .read(b"* 1 FETCH (RFC822.SIZE 9)\r\nA0004 OK\r\n")
            .write(b"A0005 FETCH 1 RFC822\r\n")
            .read(b"* 1 FETCH (RFC822 {9}\r\nTo: a\r\n\r\n)\r\nA0005 OK\r\n")
            .write(b"A0006 FETCH 7 RFC822\r\n")
            .read(b"A0006 OK\r\n")
            .build();

        let mut session = session(mock).await;
        session.login("u", "p").await.unwrap();

        assert_eq!(session.list_all("INBOX/work").await.unwrap(), vec![id(1)]);
        assert_eq!(session.fetch_uid(id(1)).await.unwrap(), 4242);
        assert_eq!(session.get_size(id(1)).await.unwrap(), 9);
        assert_eq!(session.fetch_full(id(1)).await.unwrap(), b"To: a\r\n\r\n".to_vec());
        assert!(matches!(
            session.fetch_full(id(7)).await,
            Err(BackendError::NoSuchMessage(m)) if m == id(7)
        ));
    }

    #[tokio::test]
    async fn test_search_before_select_is_rejected() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN u p\r\n")
            .read(b"A0000 OK\r\n")
            .build();

        let mut session = session(mock).await;
        session.login("u", "p").await.unwrap();
        assert!(matches!(
            session.search_header("TO", "x").await,
            Err(BackendError::Protocol(popgate_imap::Error::InvalidState(_)))
        ));
    }

    #[tokio::test]
    async fn test_bye_is_protocol_error() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0000 LOGIN u p\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* BYE server shutting down\r\n")
            .build();

        let mut session = session(mock).await;
        session.login("u", "p").await.unwrap();
        assert!(matches!(
            session.select_mailbox("INBOX").await,
            Err(BackendError::Protocol(popgate_imap::Error::Bye(_)))
        ));
        assert_eq!(session.selected_mailbox(), None);

        // The server is gone, so no LOGOUT is attempted.
        session.close().await;
    }
}
