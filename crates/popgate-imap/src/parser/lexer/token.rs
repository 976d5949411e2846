//! Lexer tokens.

/// A single token of a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, borrowed from the input.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    Quoted(String),
    /// Literal payload (`{n}\r\n` followed by n bytes).
    Literal(Vec<u8>),
    /// Number.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// A single space.
    Space,
    /// `*`, the untagged response prefix.
    Asterisk,
    /// `+`, the continuation request prefix.
    Plus,
    /// NIL
    Nil,
    /// CRLF
    Crlf,
    /// End of input.
    Eof,
}
