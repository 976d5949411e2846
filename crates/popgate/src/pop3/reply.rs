//! POP3 reply writing.

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

const CRLF: &[u8] = b"\r\n";
const TERMINATOR: &[u8] = b".\r\n";

/// Buffered writer for POP3 replies.
///
/// Every method flushes before returning, so a reply is on the wire by the
/// time the session reads the next command.
#[derive(Debug)]
pub struct ReplyWriter<W> {
    inner: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> ReplyWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    /// Writes `+OK` with optional text.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn ok(&mut self, text: &str) -> std::io::Result<()> {
        self.status("+OK", text).await
    }

    /// Writes `-ERR` with text.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn err(&mut self, text: &str) -> std::io::Result<()> {
        self.status("-ERR", text).await
    }

    async fn status(&mut self, indicator: &str, text: &str) -> std::io::Result<()> {
        let line = if text.is_empty() {
            indicator.to_string()
        } else {
            format!("{indicator} {text}")
        };
        self.put_line(&line).await?;
        self.inner.flush().await
    }

    /// Writes `+OK <text>`, the given lines and the terminating `.`.
    ///
    /// Lines are dot-stuffed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn multiline<I, S>(&mut self, text: &str, lines: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.put_line(&if text.is_empty() {
            "+OK".to_string()
        } else {
            format!("+OK {text}")
        })
        .await?;
        for line in lines {
            let line = line.as_ref();
            if line.starts_with('.') {
                self.inner.write_all(b".").await?;
            }
            self.put_line(line).await?;
        }
        self.inner.write_all(TERMINATOR).await?;
        self.inner.flush().await
    }

    /// Writes `+OK <n> octets`, the dot-stuffed message and the
    /// terminating `.`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn message(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.put_line(&format!("+OK {} octets", data.len())).await?;
        self.inner.write_all(&dot_stuff(data)).await?;
        self.inner.write_all(TERMINATOR).await?;
        self.inner.flush().await
    }

    async fn put_line(&mut self, line: &str) -> std::io::Result<()> {
        debug!("<- {line}");
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(CRLF).await
    }

    /// Flushes and shuts down the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Prepares a message body for a multi-line reply.
///
/// A `.` is prepended to every line starting with `.`, and the body is
/// made to end with CRLF so the terminator sits on its own line.
#[must_use]
pub fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    let mut at_line_start = true;
    for &byte in data {
        if at_line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        at_line_start = byte == b'\n';
    }
    if !data.is_empty() && !out.ends_with(CRLF) {
        if out.ends_with(b"\n") {
            out.pop();
        }
        out.extend_from_slice(CRLF);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(b"a\r\n.b\r\n..c\r\n"), b"a\r\n..b\r\n...c\r\n");
        assert_eq!(dot_stuff(b".\r\n"), b"..\r\n");
        assert_eq!(dot_stuff(b"no newline"), b"no newline\r\n");
        assert_eq!(dot_stuff(b"bare lf\n"), b"bare lf\r\n");
        assert_eq!(dot_stuff(b"mid.dot\r\n"), b"mid.dot\r\n");
        assert!(dot_stuff(b"").is_empty());
    }

    #[tokio::test]
    async fn test_status_lines() {
        let mut out = Vec::new();
        let mut writer = ReplyWriter::new(&mut out);
        writer.ok("user accepted").await.unwrap();
        writer.err("invalid command").await.unwrap();
        writer.ok("").await.unwrap();
        assert_eq!(out, b"+OK user accepted\r\n-ERR invalid command\r\n+OK\r\n");
    }

    #[tokio::test]
    async fn test_multiline_and_message() {
        let mut out = Vec::new();
        let mut writer = ReplyWriter::new(&mut out);
        writer
            .multiline("Capability list follows", ["UIDL", "USER"])
            .await
            .unwrap();
        writer.message(b"Subject: x\r\n\r\n.sig\r\n").await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "+OK Capability list follows\r\nUIDL\r\nUSER\r\n.\r\n\
             +OK 20 octets\r\nSubject: x\r\n\r\n..sig\r\n.\r\n"
        );
    }
}
