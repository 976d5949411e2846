//! Connection handling for the backend IMAP server.
//!
//! - [`Security`]: plaintext or implicit TLS
//! - [`ImapStream`]: the TCP/TLS stream and [`connect`]
//! - [`FramedStream`]: CRLF line framing with literal support
//! - [`Client`]: type-state command interface

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, LoggedIn, NotAuthenticated, Selected, Transition};
pub use config::Security;
pub use framed::{FramedStream, ResponseAccumulator};
pub use stream::{ImapStream, connect, create_tls_connector};
