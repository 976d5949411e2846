//! Header classification.
//!
//! A message is kept when its header text contains any whitelist term,
//! or when it contains no blacklist term. Matching is plain, case-sensitive
//! substring containment over the raw header text: terms are free-form
//! (full addresses, partial domains) and are not tied to a header field.

/// Returns true if `text` contains any of `terms`.
#[must_use]
pub fn contains_any<S: AsRef<str>>(text: &str, terms: &[S]) -> bool {
    terms.iter().any(|term| text.contains(term.as_ref()))
}

/// Decides whether a message with header text `header` is curated.
///
/// Equivalent to `whitelisted || !blacklisted`. With both lists empty
/// every message is accepted.
#[must_use]
pub fn accept<W: AsRef<str>, B: AsRef<str>>(header: &str, whitelist: &[W], blacklist: &[B]) -> bool {
    contains_any(header, whitelist) || !contains_any(header, blacklist)
}
