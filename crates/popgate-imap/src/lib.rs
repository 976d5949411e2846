//! # popgate-imap
//!
//! The IMAP client half of the popgate gateway. It speaks just enough of
//! RFC 3501 / RFC 9051 to log in on a user's behalf, maintain a curated
//! sub-mailbox and read messages back out of it.
//!
//! ## Features
//!
//! - **Type-state connection management**: `NotAuthenticated` → `Authenticated`
//!   → `Selected`, enforced at compile time
//! - **Commands**: LOGIN, STATUS, CREATE, SUBSCRIBE, SELECT, SEARCH, FETCH,
//!   STORE, COPY, EXPUNGE, LOGOUT
//! - **TLS via rustls**: no OpenSSL dependency
//! - **Sans-I/O parser**: response parsing is separate from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use popgate_imap::{Client, FetchAttribute, SearchCriteria, Security};
//!
//! #[tokio::main]
//! async fn main() -> popgate_imap::Result<()> {
//!     let stream = popgate_imap::connection::connect("imap.example.com", 993, Security::Tls).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = match client.login("user@example.com", "password").await {
//!         Ok(client) => client,
//!         Err((client, err)) => {
//!             client.logout().await?;
//!             return Err(err);
//!         }
//!     };
//!
//!     let (mut client, status) = client.select("INBOX").await.map_err(|(_, err)| err)?;
//!     println!("Messages: {}", status.exists);
//!
//!     let hits = client
//!         .search(&SearchCriteria::Header("TO".into(), "alice@example.org".into()))
//!         .await?;
//!     for seq in hits {
//!         let items = client.fetch(seq, &[FetchAttribute::Rfc822Size]).await?;
//!         println!("{seq}: {items:?}");
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: IMAP command builders and serialization
//! - [`connection`]: streams, framing and the type-state client
//! - [`parser`]: sans-I/O response lexer and parser
//! - [`types`]: core IMAP types (flags, mailboxes, identifiers)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchCriteria, StatusAttribute, StoreAction};
pub use connection::{
    Authenticated, Client, FramedStream, ImapStream, LoggedIn, NotAuthenticated, Security,
    Selected, Transition,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, StatusItem, UntaggedResponse};
pub use types::{Capability, Flag, Mailbox, MailboxStatus, ResponseCode, SeqNum, Status, Tag, Uid};
