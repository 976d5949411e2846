//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::Result;

use super::helpers::parse_flag_list;
use super::types::FetchItem;

/// Parses the parenthesized item list of `* n FETCH (...)`.
pub fn parse_fetch_items(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name,
            token => return Err(lexer.error(&format!("unexpected {token:?} in FETCH"))),
        };

        match name.to_uppercase().as_str() {
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID 0 in FETCH"))?;
                items.push(FetchItem::Uid(uid));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" | "BODY" | "BINARY" => {
                let section = read_section(lexer)?;
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body { section, data });
            }
            _ => {
                lexer.expect_space()?;
                skip_value(lexer)?;
            }
        }
    }
}

/// Reads an optional `[section]` and `<origin>` suffix.
///
/// The section text is kept verbatim; it may contain spaces and
/// parentheses, e.g. `HEADER.FIELDS (FROM TO CC)`.
fn read_section(lexer: &mut Lexer<'_>) -> Result<Option<String>> {
    if lexer.peek() != Some(b'[') {
        return Ok(None);
    }
    lexer.bump();

    let mut section = Vec::new();
    loop {
        match lexer.bump() {
            Some(b']') => break,
            Some(b'\r') | None => return Err(lexer.error("unterminated section")),
            Some(b) => section.push(b),
        }
    }

    if lexer.peek() == Some(b'<') {
        while let Some(b) = lexer.bump() {
            if b == b'>' {
                break;
            }
        }
    }

    Ok(Some(String::from_utf8_lossy(&section).into_owned()))
}

/// Skips one value of an item we do not model, nested lists included.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Token::RParen => return Err(lexer.error("unbalanced parenthesis")),
            Token::Eof | Token::Crlf => return Err(lexer.error("truncated FETCH item")),
            _ if depth == 0 => return Ok(()),
            _ => {}
        }
    }
}
