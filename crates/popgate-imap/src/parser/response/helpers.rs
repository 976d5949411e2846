//! Parsers for the smaller response grammars.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, Flag, Mailbox, ResponseCode, SeqNum, Uid, UidValidity};
use crate::Result;

use super::types::StatusItem;

/// Parses a bracketed response code. The lexer must be positioned on `[`.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let atom = lexer.read_atom()?;

    let code = match atom.to_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            Uid::new(n).map_or_else(|| ResponseCode::Unknown(atom.to_string()), ResponseCode::UidNext)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            UidValidity::new(n).map_or_else(
                || ResponseCode::Unknown(atom.to_string()),
                ResponseCode::UidValidity,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            SeqNum::new(n).map_or_else(|| ResponseCode::Unknown(atom.to_string()), ResponseCode::Unseen)
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Codes we do not model may carry arbitrary arguments.
    skip_to_close_bracket(lexer)?;
    Ok(code)
}

fn skip_to_close_bracket(lexer: &mut Lexer<'_>) -> Result<()> {
    loop {
        match lexer.peek() {
            Some(b']') => return lexer.expect(Token::RBracket),
            Some(b'\r') | None => return Err(lexer.error("unterminated response code")),
            Some(_) => {
                lexer.bump();
            }
        }
    }
}

/// Parses the space separated atoms following `CAPABILITY`.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.expect_space()?;
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::Unknown(n.to_string())),
            _ => break,
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<Flag>> {
    lexer.expect(Token::LParen)?;
    let mut flags = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(flags),
            Token::Space => {}
            Token::Atom(s) => flags.push(Flag::parse(s)),
            // `\*` in PERMANENTFLAGS lexes as an atom `\` followed by `*`.
            Token::Asterisk => {}
            token => return Err(lexer.error(&format!("unexpected {token:?} in flag list"))),
        }
    }
}

/// Parses the sequence numbers following `SEARCH`.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<SeqNum>> {
    let mut hits = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.expect_space()?;
        if let Token::Number(n) = lexer.next_token()?
            && let Some(seq) = SeqNum::new(n)
        {
            hits.push(seq);
        }
    }
    Ok(hits)
}

/// Parses `mailbox (NAME value ...)` following `STATUS`.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let mailbox = Mailbox::new(lexer.read_astring()?);
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => {
                lexer.expect_space()?;
                let value = lexer.read_number()?;
                let item = match name.to_uppercase().as_str() {
                    "MESSAGES" => Some(StatusItem::Messages(value)),
                    "RECENT" => Some(StatusItem::Recent(value)),
                    "UNSEEN" => Some(StatusItem::Unseen(value)),
                    "UIDNEXT" => Uid::new(value).map(StatusItem::UidNext),
                    "UIDVALIDITY" => UidValidity::new(value).map(StatusItem::UidValidity),
                    _ => None,
                };
                items.extend(item);
            }
            token => return Err(lexer.error(&format!("unexpected {token:?} in STATUS"))),
        }
    }
    Ok((mailbox, items))
}
