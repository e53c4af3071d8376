//! Mailbox access: the source adapter trait and its IMAP implementation.

pub mod credentials;
pub mod imap;

pub use credentials::{CredentialProvider, CredentialState, TokenRefresher};
pub use imap::{ImapConfig, ImapSource};

use async_trait::async_trait;

use crate::error::SourceError;

/// Header parse result for a single fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderFields {
    /// Header block parsed; individual fields may still be missing.
    Parsed {
        sender: Option<String>,
        subject: Option<String>,
    },
    /// Header block could not be read at all.
    Unreadable,
}

/// A message as fetched from the mailbox: provider-assigned id plus
/// whatever came out of its FROM/SUBJECT headers.
#[derive(Debug, Clone)]
pub struct MailSummary {
    pub id: String,
    pub headers: HeaderFields,
}

impl MailSummary {
    pub fn parsed(
        id: impl Into<String>,
        sender: Option<&str>,
        subject: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            headers: HeaderFields::Parsed {
                sender: sender.map(str::to_string),
                subject: subject.map(str::to_string),
            },
        }
    }

    pub fn unreadable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            headers: HeaderFields::Unreadable,
        }
    }
}

/// A bounded-batch mailbox reader.
#[async_trait]
pub trait MailboxSource: Send + Sync {
    /// Fetch at most `max` messages, most recent first.
    ///
    /// Returns fewer without error when the mailbox has fewer to give.
    /// Ordering is source-defined; callers must not re-sort.
    async fn fetch_batch(&self, max: usize) -> Result<Vec<MailSummary>, SourceError>;
}
