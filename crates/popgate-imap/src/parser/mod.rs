//! Sans-I/O parser for IMAP server responses.
//!
//! The [`lexer`] turns raw bytes into tokens and the [`response`] parser
//! builds [`Response`] values out of them. Neither touches the network; the
//! connection layer hands them one complete response at a time.
//!
//! # Example
//!
//! ```
//! use popgate_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* SEARCH 3 9\r\n").unwrap();
//! match response {
//!     Response::Untagged(UntaggedResponse::Search(hits)) => assert_eq!(hits.len(), 2),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, StatusItem, UntaggedResponse};
