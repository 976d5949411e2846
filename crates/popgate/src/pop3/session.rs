//! Per-connection POP3 state machine.
//!
//! ```text
//! Unauthorized --PASS ok--> Transaction
//!      |                         |
//!      +--QUIT / error / EOF--> Closed <--QUIT / error / EOF--+
//! ```
//!
//! The backend session is opened by PASS and closed exactly once when the
//! connection ends, whichever way it ends.

use std::time::Duration;

use popgate_core::{
    BackendError, BackendSession, Error as CoreError, MailStore, MessageId, Settings,
    SettingsStore, destination_mailbox, list_summaries, list_uids, reorganize,
};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tracing::{debug, error, info, warn};

use super::command::Command;
use super::reply::ReplyWriter;
use crate::config::expand;

/// Longest accepted command line, terminator included.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Capabilities listed by CAPA.
const CAPABILITIES: [&str; 2] = ["UIDL", "USER"];

/// What to do after an invalid command in the transaction state.
///
/// In the authorization state the connection always stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidCommandPolicy {
    /// Reply `-ERR` and close the connection.
    #[default]
    Disconnect,
    /// Reply `-ERR` and wait for the next command.
    KeepOpen,
}

/// Settings shared by every POP3 connection.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name shown in the greeting.
    pub name: String,
    /// Curated folder under `INBOX/`.
    pub folder: String,
    /// Backend login name template.
    pub login_format: String,
    /// Forward address template; the result is whitelisted.
    pub address_format: Option<String>,
    /// Silence after which the client is dropped.
    pub idle_timeout: Duration,
    /// Invalid-command behaviour in the transaction state.
    pub invalid_command: InvalidCommandPolicy,
}

impl SessionConfig {
    /// Path of the curated mailbox.
    #[must_use]
    pub fn destination(&self) -> String {
        destination_mailbox(&self.folder)
    }

    /// Backend login name for a POP3 account.
    #[must_use]
    pub fn login_address(&self, user: &str) -> String {
        expand(&self.login_format, user)
    }

    /// Forward address of a POP3 account, if configured.
    #[must_use]
    pub fn forward_address(&self, user: &str) -> Option<String> {
        self.address_format
            .as_deref()
            .map(|template| expand(template, user))
    }

    fn greeting(&self) -> String {
        format!("simple {} POP3 -> IMAP proxy", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unauthorized,
    Transaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

enum Line {
    Command(String),
    TooLong,
    Eof,
}

/// Runs one POP3 connection to completion.
///
/// Returns when the client quits, disconnects or idles out, or after a
/// reply that ends the connection. The backend session, if any, is closed
/// before returning.
///
/// # Errors
///
/// Returns an error if reading from or writing to the client fails.
pub async fn serve<IO, St, M>(
    io: IO,
    config: &SessionConfig,
    settings: &St,
    store: &M,
) -> std::io::Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    St: SettingsStore,
    M: MailStore,
{
    let (reader, writer) = tokio::io::split(io);
    let mut session = Session {
        config,
        settings,
        store,
        state: State::Unauthorized,
        user: None,
        backend: None,
    };

    let result = session
        .run(BufReader::new(reader), ReplyWriter::new(writer))
        .await;
    session.shutdown().await;
    result
}

struct Session<'a, St, M: MailStore> {
    config: &'a SessionConfig,
    settings: &'a St,
    store: &'a M,
    state: State,
    user: Option<String>,
    backend: Option<M::Session>,
}

impl<St, M> Session<'_, St, M>
where
    St: SettingsStore,
    M: MailStore,
{
    async fn run<R, W>(&mut self, mut reader: R, mut out: ReplyWriter<W>) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        out.ok(&self.config.greeting()).await?;

        let mut buf = Vec::with_capacity(256);
        loop {
            let line = match tokio::time::timeout(
                self.config.idle_timeout,
                read_line(&mut reader, &mut buf),
            )
            .await
            {
                Ok(line) => line?,
                Err(_) => {
                    info!(user = self.user.as_deref(), "idle timeout");
                    break;
                }
            };

            let line = match line {
                Line::Command(line) => line,
                Line::TooLong => {
                    warn!(user = self.user.as_deref(), "command line too long");
                    out.err("line too long").await?;
                    break;
                }
                Line::Eof => {
                    debug!(user = self.user.as_deref(), "client disconnected");
                    break;
                }
            };

            let command = Command::parse(&line);
            debug!(user = self.user.as_deref(), "-> {command:?}");

            if self.handle(command, &mut out).await? == Flow::Close {
                break;
            }
        }

        let _ = out.shutdown().await;
        Ok(())
    }

    async fn handle<W>(&mut self, command: Command, out: &mut ReplyWriter<W>) -> std::io::Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        match (self.state, command) {
            (_, Command::Quit) => {
                self.close_backend().await;
                out.ok("Bye bye!").await?;
                Ok(Flow::Close)
            }
            (State::Unauthorized, Command::User(Some(user))) => {
                self.user = Some(user);
                out.ok("user accepted").await?;
                Ok(Flow::Continue)
            }
            (State::Unauthorized, Command::User(None)) => {
                out.err("missing account name").await?;
                Ok(Flow::Continue)
            }
            (State::Unauthorized, Command::Pass(password)) => {
                self.pass(password.unwrap_or_default(), out).await
            }
            (State::Transaction, Command::Capa) => {
                out.multiline("Capability list follows", CAPABILITIES)
                    .await?;
                Ok(Flow::Continue)
            }
            (State::Transaction, Command::Uidl) => self.uidl(out).await,
            (State::Transaction, Command::List) => self.list(out).await,
            (State::Transaction, Command::Retr(arg)) => self.retr(arg.as_deref(), out).await,
            (State::Transaction, Command::Dele) => {
                out.err("you are not allowed to delete messages on this server")
                    .await?;
                Ok(Flow::Continue)
            }
            (state, command) => {
                debug!(user = self.user.as_deref(), verb = command.verb(), "invalid command");
                out.err("invalid command").await?;
                let drop_connection = state == State::Transaction
                    && self.config.invalid_command == InvalidCommandPolicy::Disconnect;
                Ok(if drop_connection {
                    Flow::Close
                } else {
                    Flow::Continue
                })
            }
        }
    }

    async fn pass<W>(&mut self, password: String, out: &mut ReplyWriter<W>) -> std::io::Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(user) = self.user.clone() else {
            out.err("send USER first").await?;
            return Ok(Flow::Continue);
        };

        let settings = match self.settings.get_settings(&user).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                info!(%user, "account not registered");
                out.err("account not registered!").await?;
                return Ok(Flow::Continue);
            }
            Err(CoreError::InvalidAccountName(_)) => {
                info!(%user, "invalid account name");
                out.err("invalid account name").await?;
                return Ok(Flow::Continue);
            }
            Err(err) => {
                error!(%user, %err, "settings lookup failed");
                out.err("unable to get user settings!").await?;
                return Ok(Flow::Close);
            }
        };

        match self.open_backend(&user, &password, &settings).await {
            Ok(backend) => {
                self.backend = Some(backend);
                self.state = State::Transaction;
                out.ok("pass accepted").await?;
                Ok(Flow::Continue)
            }
            Err(BackendError::Auth(text)) => {
                warn!(%user, %text, "backend rejected credentials");
                out.err("Username or password incorrect!").await?;
                Ok(Flow::Continue)
            }
            Err(err) => {
                error!(%user, %err, "backend login failed");
                out.err("Username or password incorrect!").await?;
                Ok(Flow::Close)
            }
        }
    }

    /// Opens a backend session, logs in and reorganizes the mailbox. On
    /// failure the half-open session is closed here.
    async fn open_backend(
        &self,
        user: &str,
        password: &str,
        settings: &Settings,
    ) -> Result<M::Session, BackendError> {
        let mut backend = self.store.open().await?;

        let address = self.config.login_address(user);
        let forward = self.config.forward_address(user);
        let destination = self.config.destination();

        let prepared = async {
            backend.login(&address, password).await?;
            reorganize(&mut backend, settings, &destination, forward.as_deref()).await
        }
        .await;

        match prepared {
            Ok(_) => Ok(backend),
            Err(err) => {
                backend.close().await;
                Err(err)
            }
        }
    }

    async fn uidl<W>(&mut self, out: &mut ReplyWriter<W>) -> std::io::Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        let destination = self.config.destination();
        let Some(backend) = self.backend.as_mut() else {
            return self.abort(out, "unable to perform UIDL", None).await;
        };

        match list_uids(backend, &destination).await {
            Ok(entries) => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|entry| format!("{} {}", entry.id, entry.uid))
                    .collect();
                out.multiline("", lines).await?;
                Ok(Flow::Continue)
            }
            Err(err) => self.abort(out, "unable to perform UIDL", Some(err)).await,
        }
    }

    async fn list<W>(&mut self, out: &mut ReplyWriter<W>) -> std::io::Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        let destination = self.config.destination();
        let Some(backend) = self.backend.as_mut() else {
            return self.abort(out, "unable to perform LIST", None).await;
        };

        match list_summaries(backend, &destination).await {
            Ok(summaries) => {
                let total: u64 = summaries.iter().map(|s| u64::from(s.octet_size)).sum();
                let header = format!("{} messages ({total} octets)", summaries.len());
                let lines: Vec<String> = summaries
                    .iter()
                    .map(|summary| format!("{} {}", summary.id, summary.octet_size))
                    .collect();
                out.multiline(&header, lines).await?;
                Ok(Flow::Continue)
            }
            Err(err) => self.abort(out, "unable to perform LIST", Some(err)).await,
        }
    }

    async fn retr<W>(&mut self, arg: Option<&str>, out: &mut ReplyWriter<W>) -> std::io::Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        const NO_SUCH: &str = "no such message";

        let Some(id) = arg.and_then(|arg| arg.parse::<MessageId>().ok()) else {
            return self.abort(out, NO_SUCH, None).await;
        };
        let destination = self.config.destination();
        let Some(backend) = self.backend.as_mut() else {
            return self.abort(out, NO_SUCH, None).await;
        };

        let fetched = async {
            backend.select_mailbox(&destination).await?;
            backend.fetch_full(id).await
        }
        .await;

        match fetched {
            Ok(data) => {
                out.message(&data).await?;
                Ok(Flow::Continue)
            }
            Err(err) => self.abort(out, NO_SUCH, Some(err)).await,
        }
    }

    /// Ends the connection after a failure in the transaction state.
    async fn abort<W>(
        &mut self,
        out: &mut ReplyWriter<W>,
        reply: &str,
        cause: Option<BackendError>,
    ) -> std::io::Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        match cause {
            Some(err) => error!(user = self.user.as_deref(), %err, "{reply}"),
            None => warn!(user = self.user.as_deref(), "{reply}"),
        }
        self.close_backend().await;
        out.err(reply).await?;
        Ok(Flow::Close)
    }

    async fn close_backend(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close().await;
            debug!(user = self.user.as_deref(), "backend session closed");
        }
    }

    async fn shutdown(&mut self) {
        self.close_backend().await;
        info!(user = self.user.as_deref(), "connection closed");
    }
}

/// Reads one command line of at most [`MAX_LINE_LENGTH`] bytes.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = u64::try_from(MAX_LINE_LENGTH).unwrap_or(u64::MAX) + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;

    if n == 0 {
        return Ok(Line::Eof);
    }
    if !buf.ends_with(b"\n") {
        return Ok(if n > MAX_LINE_LENGTH {
            Line::TooLong
        } else {
            Line::Eof
        });
    }
    Ok(Line::Command(String::from_utf8_lossy(buf).into_owned()))
}
