//! Command serialization helpers.
//!
//! Strings that cannot travel as an atom or quoted string (CR, LF or 8-bit
//! bytes) are sent as synchronizing literals. NUL cannot be sent at all.

use crate::types::Mailbox;
use crate::{Error, Result};

use super::types::{FetchAttribute, SearchCriteria, StoreAction};

/// Writes an astring: atom, quoted string or literal.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        write_string(buf, s)
    } else {
        buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Writes a string: quoted when possible, as a literal otherwise.
pub fn write_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.bytes().any(|b| b == 0) {
        return Err(Error::Protocol("NUL byte in command argument".to_string()));
    }
    if s.bytes().any(needs_literal) {
        write_literal(buf, s);
    } else {
        write_quoted(buf, s);
    }
    Ok(())
}

/// Writes a quoted string, escaping `"` and `\`.
fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Writes a synchronizing literal. The framing layer waits for the
/// server's continuation after the `{n}` line.
fn write_literal(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(format!("{{{}}}\r\n", s.len()).as_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Writes a mailbox name.
pub fn write_mailbox(buf: &mut Vec<u8>, mailbox: &Mailbox) -> Result<()> {
    write_astring(buf, mailbox.as_str())
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

const fn needs_literal(b: u8) -> bool {
    b == b'\r' || b == b'\n' || b >= 0x80
}

/// Returns true if SEARCH must announce `CHARSET UTF-8` for the criteria.
pub fn needs_charset(criteria: &SearchCriteria) -> bool {
    match criteria {
        SearchCriteria::All => false,
        SearchCriteria::Header(name, value) => !name.is_ascii() || !value.is_ascii(),
    }
}

/// Writes FETCH items. A single item goes bare, several are parenthesized.
pub fn write_fetch_items(buf: &mut Vec<u8>, attrs: &[FetchAttribute]) {
    if let [single] = attrs {
        write_fetch_attribute(buf, single);
        return;
    }
    buf.push(b'(');
    for (i, attr) in attrs.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_fetch_attribute(buf, attr);
    }
    buf.push(b')');
}

fn write_fetch_attribute(buf: &mut Vec<u8>, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Rfc822Size => buf.extend_from_slice(b"RFC822.SIZE"),
        FetchAttribute::Rfc822 => buf.extend_from_slice(b"RFC822"),
        FetchAttribute::HeaderFields(fields) => {
            buf.extend_from_slice(b"BODY.PEEK[HEADER.FIELDS (");
            buf.extend_from_slice(fields.join(" ").as_bytes());
            buf.extend_from_slice(b")]");
        }
    }
}

/// Writes a STORE action.
pub fn write_store_action(buf: &mut Vec<u8>, action: &StoreAction, silent: bool) {
    buf.extend_from_slice(action.prefix().as_bytes());
    if silent {
        buf.extend_from_slice(b".SILENT");
    }
    buf.extend_from_slice(b" (");
    for (i, flag) in action.flags().iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(flag.as_str().as_bytes());
    }
    buf.push(b')');
}

/// Writes SEARCH criteria.
///
/// Header values are never sent as atoms so that address fragments such as
/// `@example.com` reach the server unchanged.
pub fn write_search_criteria(buf: &mut Vec<u8>, criteria: &SearchCriteria) -> Result<()> {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Header(name, value) => {
            buf.extend_from_slice(b"(HEADER ");
            write_astring(buf, name)?;
            buf.push(b' ');
            write_string(buf, value)?;
            buf.push(b')');
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn to_string(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_astring_atom() {
        assert_eq!(to_string(|b| write_astring(b, "INBOX")), "INBOX");
    }

    #[test]
    fn test_astring_quotes_and_escapes() {
        assert_eq!(to_string(|b| write_astring(b, "")), "\"\"");
        assert_eq!(to_string(|b| write_astring(b, "a b")), "\"a b\"");
        assert_eq!(to_string(|b| write_astring(b, "say \"hi\"")), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_header_search_value_always_quoted() {
        let criteria = SearchCriteria::Header("TO".into(), "bob".into());
        assert_eq!(
            to_string(|b| write_search_criteria(b, &criteria)),
            "(HEADER TO \"bob\")"
        );
    }

    #[test]
    fn test_header_fields_fetch() {
        let attrs = [FetchAttribute::HeaderFields(vec![
            "FROM".into(),
            "TO".into(),
            "CC".into(),
        ])];
        assert_eq!(
            to_string(|b| {
                write_fetch_items(b, &attrs);
                Ok(())
            }),
            "BODY.PEEK[HEADER.FIELDS (FROM TO CC)]"
        );
    }

    #[test]
    fn test_multiple_fetch_items_parenthesized() {
        let attrs = [FetchAttribute::Uid, FetchAttribute::Rfc822Size];
        assert_eq!(
            to_string(|b| {
                write_fetch_items(b, &attrs);
                Ok(())
            }),
            "(UID RFC822.SIZE)"
        );
    }

    #[test]
    fn test_line_breaks_force_literal() {
        let value = "x\")\r\nA9999 EXPUNGE\r\n";
        assert_eq!(
            to_string(|b| write_string(b, value)),
            format!("{{{}}}\r\n{value}", value.len())
        );
        assert_eq!(to_string(|b| write_astring(b, "a\nb")), "{3}\r\na\nb");
    }

    #[test]
    fn test_eight_bit_forces_literal() {
        assert_eq!(
            to_string(|b| write_astring(b, "p\u{e4}ss")),
            "{5}\r\np\u{e4}ss"
        );
        assert!(needs_charset(&SearchCriteria::Header(
            "TO".into(),
            "m\u{fc}ller@example.org".into()
        )));
        assert!(!needs_charset(&SearchCriteria::Header(
            "TO".into(),
            "bob@example.org".into()
        )));
    }

    #[test]
    fn test_nul_rejected() {
        let mut buf = Vec::new();
        let err = write_astring(&mut buf, "pa\0ss").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        let criteria = SearchCriteria::Header("TO".into(), "a\0".into());
        assert!(write_search_criteria(&mut buf, &criteria).is_err());
    }

    #[test]
    fn test_tab_stays_quoted() {
        assert_eq!(to_string(|b| write_astring(b, "a\tb")), "\"a\tb\"");
    }
}
