//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::{Command, FetchAttribute, SearchCriteria, StoreAction};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, SeqNum};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox name.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Returns the status snapshot of the selected mailbox.
    #[must_use]
    pub const fn mailbox_status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Searches the selected mailbox. Hits come back in server order.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<SeqNum>> {
        let untagged = self
            .execute(Command::Search {
                criteria: criteria.clone(),
            })
            .await?;

        let mut hits = Vec::new();
        for response in untagged {
            if let UntaggedResponse::Search(seqs) = response {
                hits.extend(seqs);
            }
        }
        Ok(hits)
    }

    /// Fetches data items for one message.
    ///
    /// Only the FETCH responses for `seq` are returned; unsolicited FETCH
    /// data for other messages (flag updates) is dropped. An empty result
    /// means the server had no such message.
    pub async fn fetch(
        &mut self,
        seq: SeqNum,
        attributes: &[FetchAttribute],
    ) -> Result<Vec<FetchItem>> {
        let untagged = self
            .execute(Command::Fetch {
                seq,
                items: attributes.to_vec(),
            })
            .await?;

        let mut items = Vec::new();
        for response in untagged {
            if let UntaggedResponse::Fetch { seq: got, items: data } = response
                && got == seq
            {
                items.extend(data);
            }
        }
        Ok(items)
    }

    /// Changes the flags of one message without asking for the result.
    pub async fn store_silent(&mut self, seq: SeqNum, action: StoreAction) -> Result<()> {
        self.execute(Command::Store {
            seq,
            action,
            silent: true,
        })
        .await
        .map(drop)
    }

    /// Copies one message to another mailbox.
    pub async fn copy(&mut self, seq: SeqNum, mailbox: &str) -> Result<()> {
        self.execute(Command::Copy {
            seq,
            mailbox: Mailbox::new(mailbox),
        })
        .await
        .map(drop)
    }

    /// Permanently removes every message flagged `\Deleted`.
    ///
    /// Returns the expunged sequence numbers as reported by the server.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        let untagged = self.execute(Command::Expunge).await?;
        Ok(untagged
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Expunge(seq) => Some(seq),
                _ => None,
            })
            .collect())
    }
}
