//! Account-name validation.

use regex::Regex;

use crate::{Error, Result};

/// Decides which account names may be looked up in the settings store.
///
/// Without a pattern any non-empty name without whitespace is accepted.
/// A pattern must match the whole name.
#[derive(Debug, Clone, Default)]
pub struct AccountNamePolicy {
    pattern: Option<Regex>,
}

impl AccountNamePolicy {
    /// A policy that accepts any non-empty name without whitespace.
    #[must_use]
    pub const fn any() -> Self {
        Self { pattern: None }
    }

    /// Builds a policy from a regular expression. The expression is
    /// anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the expression does not compile.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored)
            .map_err(|e| Error::Config(format!("invalid account pattern: {e}")))?;
        Ok(Self {
            pattern: Some(regex),
        })
    }

    /// Returns true if `name` is a valid account name.
    #[must_use]
    pub fn is_valid(&self, name: &str) -> bool {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return false;
        }
        self.pattern.as_ref().is_none_or(|re| re.is_match(name))
    }

    /// Checks `name`, failing with [`Error::InvalidAccountName`].
    ///
    /// # Errors
    ///
    /// Returns an error if the name is rejected.
    pub fn check(&self, name: &str) -> Result<()> {
        if self.is_valid(name) {
            Ok(())
        } else {
            Err(Error::InvalidAccountName(name.to_string()))
        }
    }
}
