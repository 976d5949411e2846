//! Framed I/O for the IMAP protocol.
//!
//! A response is one CRLF terminated line, extended by every `{n}` literal
//! announced at the end of a line: the n literal bytes and the rest of the
//! line after them belong to the same response.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::Status;
use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 16 * 1024;
const WRITE_BUFFER_SIZE: usize = 1024;

/// Upper bound for one line, literals excluded.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Upper bound for a single literal.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered reader/writer speaking IMAP framing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(WRITE_BUFFER_SIZE),
        }
    }

    /// Reads one complete response, inlining any literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        loop {
            let line_start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(len) = literal_length(&response[line_start..]) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }
        trace!(bytes = response.len(), "response read");
        Ok(response)
    }

    async fn read_line_into(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        loop {
            let n = self.reader.read_until(b'\n', out).await?;
            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
            if out.ends_with(b"\r\n") {
                return Ok(());
            }
            // A bare LF is not a line end; keep reading.
            if out.len() - start > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes a serialized command and flushes it.
    ///
    /// The command is sent line by line. After a line that announces a
    /// `{n}` literal the server's `+` continuation is awaited before the n
    /// literal bytes go out. A tagged NO or BAD in place of the
    /// continuation ends the command with that error.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        if !data.ends_with(b"\r\n") {
            return Err(Error::Protocol("command not terminated by CRLF".to_string()));
        }
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let mut literal = 0;
        while !self.write_buffer.is_empty() {
            let Some(end) = self
                .write_buffer
                .get(literal..)
                .and_then(find_crlf)
                .map(|i| literal + i + 2)
            else {
                return Err(Error::Protocol("literal overruns command".to_string()));
            };
            let chunk = self.write_buffer.split_to(end);
            let stream = self.reader.get_mut();
            stream.write_all(&chunk).await?;
            stream.flush().await?;

            literal = match literal_length(&chunk[literal..]) {
                Some(len) if !self.write_buffer.is_empty() => {
                    trace!(len, "literal announced");
                    self.wait_for_continuation().await?;
                    len
                }
                _ => 0,
            };
        }
        Ok(())
    }

    async fn wait_for_continuation(&mut self) -> Result<()> {
        loop {
            let response = self.read_response().await?;
            match ResponseParser::parse(&response)? {
                Response::Continuation { .. } => return Ok(()),
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                Response::Untagged(other) => trace!(?other, "untagged data before continuation"),
                Response::Tagged { status, text, .. } => {
                    return Err(match status {
                        Status::No => Error::No(text),
                        Status::Bad => Error::Bad(text),
                        _ => Error::Protocol(format!("literal not accepted: {text}")),
                    });
                }
            }
        }
    }

    /// Shuts down the write half of the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Consumes the framed stream and returns the inner stream. Buffered
    /// input is discarded.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

/// Returns n if the line ends with a `{n}` or `{n+}` literal marker.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Collects responses until the tagged completion for one command.
pub struct ResponseAccumulator {
    tag: String,
}

impl ResponseAccumulator {
    /// Creates an accumulator waiting for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Reads responses up to and including the tagged one.
    ///
    /// An untagged BYE ends the exchange early, since the server will not
    /// send the completion after it.
    pub async fn read_until_tagged<S>(&self, framed: &mut FramedStream<S>) -> Result<Vec<Vec<u8>>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut responses = Vec::new();
        loop {
            let response = framed.read_response().await?;
            let done = self.is_completion(&response) || is_bye(&response);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    fn is_completion(&self, response: &[u8]) -> bool {
        response
            .strip_prefix(self.tag.as_bytes())
            .is_some_and(|rest| rest.first() == Some(&b' '))
    }
}

fn is_bye(response: &[u8]) -> bool {
    response.len() >= 6 && response[..6].eq_ignore_ascii_case(b"* BYE ")
}
