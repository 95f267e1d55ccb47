//! Error types for the wildfire environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// The receiving actor has terminated and dropped its mailbox
    #[error("Mailbox closed: {0}")]
    MailboxClosed(String),
}

impl EnvError {
    /// Creates a closed-mailbox error.
    pub fn closed(owner: impl std::fmt::Display) -> Self {
        Self::MailboxClosed(owner.to_string())
    }
}
