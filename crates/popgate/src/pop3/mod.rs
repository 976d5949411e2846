//! POP3 server side of the gateway.
//!
//! - [`command`]: command line parsing
//! - [`reply`]: status lines, multi-line replies and dot-stuffing
//! - [`session`]: the per-connection state machine

pub mod command;
pub mod reply;
pub mod session;

pub use command::Command;
pub use reply::ReplyWriter;
pub use session::{InvalidCommandPolicy, SessionConfig, serve};
