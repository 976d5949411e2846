//! POP3 command parsing.

use std::fmt;

/// A parsed POP3 command line.
///
/// Verbs are matched case-sensitively. Missing arguments are kept as
/// `None` so the session can answer with a precise error.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `USER <name>`
    User(Option<String>),
    /// `PASS <secret>`; the secret is the rest of the line and may contain
    /// spaces.
    Pass(Option<String>),
    /// `CAPA`
    Capa,
    /// `UIDL`
    Uidl,
    /// `LIST`
    List,
    /// `RETR <id>`
    Retr(Option<String>),
    /// `DELE`, with any arguments.
    Dele,
    /// `QUIT`
    Quit,
    /// Anything else, holding the verb.
    Unknown(String),
}

impl Command {
    /// Parses one line. Surrounding spaces and the line terminator are
    /// ignored.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_matches(|c| c == '\r' || c == '\n' || c == ' ');
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let first_arg = || {
            rest.split(' ')
                .find(|arg| !arg.is_empty())
                .map(str::to_string)
        };

        match verb {
            "USER" => Self::User(first_arg()),
            "PASS" => Self::Pass(Some(rest.to_string()).filter(|s| !s.is_empty())),
            "CAPA" => Self::Capa,
            "UIDL" => Self::Uidl,
            "LIST" => Self::List,
            "RETR" => Self::Retr(first_arg()),
            "DELE" => Self::Dele,
            "QUIT" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Capa => "CAPA",
            Self::Uidl => "UIDL",
            Self::List => "LIST",
            Self::Retr(_) => "RETR",
            Self::Dele => "DELE",
            Self::Quit => "QUIT",
            Self::Unknown(verb) => verb,
        }
    }
}

/// Shows the command as logged: the `PASS` secret is redacted.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(Some(arg)) | Self::Retr(Some(arg)) => write!(f, "{} {arg}", self.verb()),
            Self::Pass(Some(_)) => f.write_str("PASS ********"),
            _ => f.write_str(self.verb()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbs() {
        assert_eq!(Command::parse("USER bcd123\r\n"), Command::User(Some("bcd123".into())));
        assert_eq!(Command::parse("USER\r\n"), Command::User(None));
        assert_eq!(Command::parse("CAPA\r\n"), Command::Capa);
        assert_eq!(Command::parse("UIDL\r\n"), Command::Uidl);
        assert_eq!(Command::parse("LIST\r\n"), Command::List);
        assert_eq!(Command::parse("RETR 42\r\n"), Command::Retr(Some("42".into())));
        assert_eq!(Command::parse("RETR\r\n"), Command::Retr(None));
        assert_eq!(Command::parse("DELE 1\r\n"), Command::Dele);
        assert_eq!(Command::parse("QUIT\n"), Command::Quit);
    }

    #[test]
    fn test_verbs_are_case_sensitive() {
        assert_eq!(Command::parse("quit\r\n"), Command::Unknown("quit".into()));
        assert_eq!(Command::parse("User x\r\n"), Command::Unknown("User".into()));
    }

    #[test]
    fn test_pass_keeps_spaces() {
        assert_eq!(
            Command::parse("PASS correct horse\r\n"),
            Command::Pass(Some("correct horse".into()))
        );
        assert_eq!(Command::parse("PASS\r\n"), Command::Pass(None));
    }

    #[test]
    fn test_extra_spaces() {
        assert_eq!(Command::parse("  USER  bcd123 \r\n"), Command::User(Some("bcd123".into())));
        assert_eq!(Command::parse("\r\n"), Command::Unknown(String::new()));
    }

    #[test]
    fn test_debug_redacts_password() {
        let pass = Command::parse("PASS hunter2\r\n");
        assert_eq!(format!("{pass:?}"), "PASS ********");
        assert_eq!(format!("{:?}", Command::parse("RETR 3")), "RETR 3");
    }
}
