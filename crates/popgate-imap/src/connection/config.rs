//! Connection security.

/// How the TCP connection to the IMAP server is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext (port 143). Only for trusted networks and tests.
    None,
    /// TLS from the first byte (port 993).
    #[default]
    Tls,
}

impl Security {
    /// Returns the conventional port for this mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Tls => 993,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_tls() {
        assert_eq!(Security::default(), Security::Tls);
        assert_eq!(Security::default().default_port(), 993);
        assert_eq!(Security::None.default_port(), 143);
    }
}
