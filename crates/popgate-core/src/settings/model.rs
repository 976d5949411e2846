//! Settings data model.

/// Separator used when a term list is stored as a single column.
pub(crate) const LIST_SEPARATOR: char = ';';

/// Curation settings for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Account name as used in POP3 `USER`.
    pub user: String,
    /// The user's institutional address. Empty when unknown.
    pub workmail: String,
    /// Sender terms searched in the `FROM` header.
    pub from_whitelist: Vec<String>,
    /// Destination terms searched in the `TO` and `Received` headers.
    pub to_whitelist: Vec<String>,
    /// Terms that reject a message that is not whitelisted.
    pub blacklist: Vec<String>,
}

impl Settings {
    /// Creates empty settings for an account.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    /// Returns the whitelist used for classification: `to_whitelist` plus
    /// an optional extra address (the user's forward address).
    ///
    /// Duplicates and empty terms are removed, so calling this on every
    /// login never grows the list.
    #[must_use]
    pub fn effective_whitelist(&self, extra: Option<&str>) -> Vec<String> {
        dedup_terms(
            self.to_whitelist
                .iter()
                .map(String::as_str)
                .chain(extra),
        )
    }

    /// Returns the blacklist used for classification: `blacklist` plus
    /// `workmail` when known.
    #[must_use]
    pub fn effective_blacklist(&self) -> Vec<String> {
        dedup_terms(
            self.blacklist
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(self.workmail.as_str())),
        )
    }
}

fn dedup_terms<'a>(terms: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        if !term.is_empty() && !out.iter().any(|t| t == term) {
            out.push(term.to_string());
        }
    }
    out
}

/// Splits a stored list, dropping empty entries.
pub(crate) fn split_list(stored: &str) -> Vec<String> {
    stored
        .split(LIST_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins a list for storage, dropping empty entries.
pub(crate) fn join_list(terms: &[String]) -> String {
    let kept: Vec<&str> = terms
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    kept.join(&LIST_SEPARATOR.to_string())
}
