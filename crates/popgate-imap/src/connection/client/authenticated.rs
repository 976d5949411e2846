//! Commands valid once logged in, in both the authenticated and the
//! selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::{Authenticated, LoggedIn, Selected};
use super::{Client, Transition};
use crate::Result;
use crate::command::{Command, StatusAttribute};
use crate::parser::{StatusItem, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, ResponseCode};

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: LoggedIn,
{
    /// Selects a mailbox for read-write access.
    ///
    /// A failed SELECT leaves no mailbox selected, so the connection comes
    /// back in the authenticated state along with the error.
    pub async fn select(
        mut self,
        mailbox: &str,
    ) -> Transition<(Client<S, Selected>, MailboxStatus), Client<S, Authenticated>> {
        let result = self
            .execute(Command::Select {
                mailbox: Mailbox::new(mailbox),
            })
            .await;
        let untagged = match result {
            Ok(untagged) => untagged,
            Err(err) => return Err((self.transition(Authenticated), err)),
        };
        let status = select_status(untagged);
        let state = Selected::new(mailbox, status.clone());
        Ok((self.transition(state), status))
    }

    /// Creates a mailbox.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.execute(Command::Create {
            mailbox: Mailbox::new(mailbox),
        })
        .await
        .map(drop)
    }

    /// Subscribes to a mailbox.
    pub async fn subscribe(&mut self, mailbox: &str) -> Result<()> {
        self.execute(Command::Subscribe {
            mailbox: Mailbox::new(mailbox),
        })
        .await
        .map(drop)
    }

    /// Requests STATUS for a mailbox without selecting it.
    ///
    /// A NO answer usually means the mailbox does not exist.
    pub async fn status(
        &mut self,
        mailbox: &str,
        items: &[StatusAttribute],
    ) -> Result<Vec<StatusItem>> {
        let untagged = self
            .execute(Command::Status {
                mailbox: Mailbox::new(mailbox),
                items: items.to_vec(),
            })
            .await?;

        Ok(untagged
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Status { items, .. } => Some(items),
                _ => None,
            })
            .flatten()
            .collect())
    }
}

/// Folds the untagged data of a SELECT into a status snapshot.
fn select_status(untagged: Vec<UntaggedResponse>) -> MailboxStatus {
    let mut status = MailboxStatus::default();
    for response in untagged {
        match response {
            UntaggedResponse::Exists(n) => status.exists = n,
            UntaggedResponse::Recent(n) => status.recent = n,
            UntaggedResponse::Flags(flags) => status.flags = flags,
            UntaggedResponse::Ok {
                code: Some(code), ..
            } => match code {
                ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
                ResponseCode::UidNext(v) => status.uid_next = Some(v),
                ResponseCode::Unseen(v) => status.unseen = Some(v),
                _ => {}
            },
            _ => {}
        }
    }
    status
}
