//! Type-state markers for the client connection.

use std::sync::Arc;

use crate::types::MailboxStatus;

/// Before LOGIN. Only LOGIN and LOGOUT are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// After LOGIN. Mailbox management and SELECT are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// States in which the user is logged in: [`Authenticated`] and
/// [`Selected`]. Mailbox management commands are valid in both.
pub trait LoggedIn: sealed::Sealed {}

impl LoggedIn for Authenticated {}
impl LoggedIn for Selected {}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// A mailbox is selected. Carries the SELECT snapshot.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Arc<str>,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates a new Selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<Arc<str>>, status: MailboxStatus) -> Self {
        Self {
            mailbox: mailbox.into(),
            status,
        }
    }

    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the status reported by SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// Returns the number of messages reported by SELECT.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.status.exists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_states_are_send_sync() {
        assert_send_sync::<NotAuthenticated>();
        assert_send_sync::<Authenticated>();
        assert_send_sync::<Selected>();
    }

    #[test]
    fn test_selected_accessors() {
        let selected = Selected::new(
            "INBOX/work",
            MailboxStatus {
                exists: 12,
                ..MailboxStatus::default()
            },
        );
        assert_eq!(selected.mailbox(), "INBOX/work");
        assert_eq!(selected.exists(), 12);
    }
}
