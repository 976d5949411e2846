//! Response parser.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, StatusItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_response_code, parse_search_response,
    parse_status_response,
};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ ...`).
    Continuation {
        /// Text following the `+`, if any.
        text: Option<String>,
    },
}

/// Parses one complete response as delivered by the framing layer.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);
        match lexer.next_token()? {
            Token::Asterisk => Self::untagged(&mut lexer).map(Response::Untagged),
            Token::Plus => {
                lexer.skip_spaces();
                let text = lexer.rest_of_line();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => Self::tagged(&mut lexer, tag),
            Token::Number(n) => Self::tagged(&mut lexer, &n.to_string()),
            token => Err(Error::Parse {
                position: 0,
                message: format!("expected *, + or tag, got {token:?}"),
            }),
        }
    }

    fn tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::status(lexer)?;
        let (code, text) = Self::resp_text(lexer)?;
        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        match lexer.next_token()? {
            Token::Atom(keyword) => Self::untagged_keyword(lexer, keyword),
            Token::Number(n) => Self::message_data(lexer, n),
            token => Err(lexer.error(&format!("unexpected {token:?} after *"))),
        }
    }

    fn untagged_keyword(lexer: &mut Lexer<'_>, keyword: &str) -> Result<UntaggedResponse> {
        let upper = keyword.to_uppercase();
        let response = match upper.as_str() {
            "OK" | "NO" | "BAD" | "PREAUTH" | "BYE" => {
                let (code, text) = Self::resp_text(lexer)?;
                match upper.as_str() {
                    "OK" => UntaggedResponse::Ok { code, text },
                    "NO" => UntaggedResponse::No { code, text },
                    "BAD" => UntaggedResponse::Bad { code, text },
                    "PREAUTH" => UntaggedResponse::PreAuth { code, text },
                    _ => UntaggedResponse::Bye { code, text },
                }
            }
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
            "FLAGS" => {
                lexer.expect_space()?;
                UntaggedResponse::Flags(parse_flag_list(lexer)?)
            }
            "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
            "STATUS" => {
                lexer.expect_space()?;
                let (mailbox, items) = parse_status_response(lexer)?;
                UntaggedResponse::Status { mailbox, items }
            }
            _ => UntaggedResponse::Other(upper),
        };
        Ok(response)
    }

    fn message_data(lexer: &mut Lexer<'_>, n: u32) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom()?.to_uppercase();
        let seq = SeqNum::new(n);

        match (keyword.as_str(), seq) {
            ("EXISTS", _) => Ok(UntaggedResponse::Exists(n)),
            ("RECENT", _) => Ok(UntaggedResponse::Recent(n)),
            ("EXPUNGE" | "FETCH", None) => Err(lexer.error("sequence number 0")),
            ("EXPUNGE", Some(seq)) => Ok(UntaggedResponse::Expunge(seq)),
            ("FETCH", Some(seq)) => {
                lexer.expect_space()?;
                let items = fetch::parse_fetch_items(lexer)?;
                Ok(UntaggedResponse::Fetch { seq, items })
            }
            _ => Ok(UntaggedResponse::Other(keyword)),
        }
    }

    fn status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let atom = lexer.read_atom()?;
        match atom.to_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(&format!("invalid status {atom}"))),
        }
    }

    /// Parses `[SP] ["[" code "]" SP] text`. Some servers omit the text.
    fn resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        lexer.skip_spaces();
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        lexer.skip_spaces();
        Ok((code, lexer.rest_of_line()))
    }
}
