//! Mailbox reorganization.
//!
//! Runs once per POP3 login, before the client may read anything:
//!
//! 1. Ensure `INBOX/<folder>` exists and is subscribed.
//! 2. Select `INBOX`.
//! 3. Collect candidates with header searches: `TO` and then `Received`
//!    for every destination term, then `FROM` for every sender term.
//! 4. Classify each candidate on its `From`/`To`/`Cc` lines; copy accepted
//!    ones to the destination and flag them deleted.
//! 5. Expunge `INBOX` once.
//!
//! Any backend failure aborts the pass. Messages copied before a failure
//! stay flagged but are not expunged, so the next login copies them again.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::backend::{BackendResult, BackendSession, MessageId};
use crate::classify;
use crate::settings::Settings;

/// The mailbox searched for candidates.
pub const SOURCE_MAILBOX: &str = "INBOX";

/// Returns the curated mailbox path for a folder name.
#[must_use]
pub fn destination_mailbox(folder: &str) -> String {
    format!("{SOURCE_MAILBOX}/{folder}")
}

/// Message ids collected by the header searches, without duplicates.
///
/// Iteration follows insertion order, which is the order the backend
/// returned the ids in.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    order: Vec<MessageId>,
    seen: HashSet<MessageId>,
}

impl CandidateSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an id. Returns false if it was already present.
    pub fn insert(&mut self, id: MessageId) -> bool {
        let added = self.seen.insert(id);
        if added {
            self.order.push(id);
        }
        added
    }

    /// Number of distinct ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no id was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.order.iter().copied()
    }
}

impl Extend<MessageId> for CandidateSet {
    fn extend<T: IntoIterator<Item = MessageId>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id);
        }
    }
}

/// Outcome of one reorganization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorgReport {
    /// Distinct messages found by the searches.
    pub candidates: usize,
    /// Messages copied to the destination and flagged deleted.
    pub moved: usize,
    /// Candidates rejected by classification.
    pub skipped: usize,
}

/// Moves the curated mail of `settings.user` from `INBOX` into
/// `destination`.
///
/// `extra_whitelist` is the user's own forward address; it is searched and
/// whitelisted like a `to_whitelist` term.
///
/// # Errors
///
/// Returns the first backend error. Nothing is expunged in that case.
pub async fn reorganize<B: BackendSession>(
    session: &mut B,
    settings: &Settings,
    destination: &str,
    extra_whitelist: Option<&str>,
) -> BackendResult<ReorgReport> {
    let whitelist = settings.effective_whitelist(extra_whitelist);
    let blacklist = settings.effective_blacklist();

    session.ensure_mailbox(destination).await?;
    session.select_mailbox(SOURCE_MAILBOX).await?;

    let candidates = collect_candidates(session, &whitelist, &settings.from_whitelist).await?;

    let mut report = ReorgReport {
        candidates: candidates.len(),
        ..ReorgReport::default()
    };
    for id in candidates.iter() {
        let header = session.fetch_headers(id).await?;
        if classify::accept(&header, &whitelist, &blacklist) {
            session.copy_and_flag_deleted(id, destination).await?;
            report.moved += 1;
        } else {
            debug!(user = %settings.user, %id, "candidate rejected");
            report.skipped += 1;
        }
    }

    session.expunge().await?;

    info!(
        user = %settings.user,
        moved = report.moved,
        candidates = report.candidates,
        "moved {} of {} possible mails",
        report.moved,
        report.candidates
    );
    Ok(report)
}

async fn collect_candidates<B: BackendSession>(
    session: &mut B,
    to_terms: &[String],
    from_terms: &[String],
) -> BackendResult<CandidateSet> {
    let searches = to_terms
        .iter()
        .map(|term| ("TO", term))
        .chain(to_terms.iter().map(|term| ("Received", term)))
        .chain(from_terms.iter().filter(|t| !t.is_empty()).map(|term| ("FROM", term)));

    let mut candidates = CandidateSet::new();
    for (field, term) in searches.collect::<Vec<_>>() {
        let hits = session.search_header(field, term).await?;
        debug!(field, term = %term, hits = hits.len(), "header search");
        candidates.extend(hits);
    }
    Ok(candidates)
}
