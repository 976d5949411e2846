//! Type-state IMAP client connection.
//!
//! The connection moves through three states:
//!
//! - `NotAuthenticated`: right after the greeting
//! - `Authenticated`: after LOGIN
//! - `Selected`: after SELECT
//!
//! Each state only exposes the commands valid in it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

pub use self::states::{Authenticated, LoggedIn, NotAuthenticated, Selected};
use super::framed::{FramedStream, ResponseAccumulator};
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// Result of a command that moves the connection into another state.
///
/// When the command fails the connection is handed back along with the
/// error, in the state the server left it in.
pub type Transition<T, Fallback> = std::result::Result<T, (Fallback, Error)>;

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities seen so far.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(Command::Noop).await.map(drop)
    }

    /// Runs one command to completion.
    ///
    /// Returns the untagged data the server sent along the way. A NO, BAD
    /// or BYE completion becomes the matching error. Untagged lines that do
    /// not parse are logged and dropped.
    pub(crate) async fn execute(&mut self, command: Command) -> Result<Vec<UntaggedResponse>> {
        let tag = self.tag_gen.next();
        trace!(%tag, command = command.name(), "sending");
        self.stream.write_command(&command.serialize(&tag)?).await?;

        let raw = ResponseAccumulator::new(tag.as_str())
            .read_until_tagged(&mut self.stream)
            .await?;

        let mut untagged = Vec::with_capacity(raw.len());
        for bytes in &raw {
            match ResponseParser::parse(bytes) {
                Ok(Response::Tagged {
                    tag: done, status, text, ..
                }) if done.as_str() == tag => {
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(untagged),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Ok(Response::Untagged(UntaggedResponse::Bye { text, .. })) => {
                    return Err(Error::Bye(text));
                }
                Ok(Response::Untagged(response)) => untagged.push(response),
                Ok(other) => debug!(?other, "ignoring unexpected response"),
                Err(err) => debug!(%err, command = command.name(), "skipping unparsable response"),
            }
        }

        Err(Error::Protocol(format!(
            "missing tagged response to {}",
            command.name()
        )))
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Sends LOGOUT and closes the stream. Errors after the command has
    /// been written are ignored; the server may drop the connection first.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        self.stream
            .write_command(&Command::Logout.serialize(&tag)?)
            .await?;
        let _ = ResponseAccumulator::new(tag.as_str())
            .read_until_tagged(&mut self.stream)
            .await;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}
