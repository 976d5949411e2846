//! `popgate` serves a curated IMAP sub-mailbox to POP3-only mail clients.
//!
//! On PASS the gateway logs into the IMAP backend with the client's
//! credentials, moves matching mail from `INBOX` into `INBOX/<folder>` and
//! then answers LIST, UIDL and RETR from that folder.
//!
//! The binary is a thin wrapper: [`config::Config`] is loaded from TOML,
//! [`logging::init`] installs the subscriber and [`listener::run`] accepts
//! connections until interrupted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod listener;
pub mod logging;
pub mod pop3;

pub use config::{Config, ConfigError};
