//! Actor mailboxes.
//!
//! ```text
//! Sender A ──post(m1)──┐
//!                      ├──> [ m1 m2 n1 ... ] ──recv()──> Owner task
//! Sender B ──post(n1)──┘
//! ```
//!
//! Messages from one sender arrive in send order; messages from different
//! senders interleave arbitrarily. Posting never blocks and never fails
//! while the owner is alive.

use crate::error::EnvError;
use std::fmt;
use tokio::sync::mpsc;

/// Creates a connected sender/receiver pair for an actor named `owner`.
pub fn mailbox<M>(owner: impl Into<String>) -> (MailboxSender<M>, Mailbox<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let owner = owner.into();
    (
        MailboxSender {
            owner: owner.clone(),
            tx,
        },
        Mailbox { owner, rx },
    )
}

/// The posting side of a mailbox. Cheap to clone.
pub struct MailboxSender<M> {
    /// Name of the owning actor (for error messages)
    owner: String,

    tx: mpsc::UnboundedSender<M>,
}

impl<M> MailboxSender<M> {
    /// Enqueues a message for the owner.
    ///
    /// # Returns
    /// * `Ok(())` - Message queued
    /// * `Err(EnvError::MailboxClosed)` - The owner has terminated
    pub fn post(&self, message: M) -> Result<(), EnvError> {
        self.tx
            .send(message)
            .map_err(|_| EnvError::closed(&self.owner))
    }

    /// Returns true once the owner has dropped its receiving side.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the owner's name.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl<M> Clone for MailboxSender<M> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for MailboxSender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxSender")
            .field("owner", &self.owner)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The receiving side of a mailbox, owned by exactly one actor task.
pub struct Mailbox<M> {
    owner: String,
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> Mailbox<M> {
    /// Waits for the next message.
    ///
    /// Returns `None` only when every sender has been dropped.
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Takes a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<M> {
        self.rx.try_recv().ok()
    }

    /// Returns the owner's name.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("owner", &self.owner).finish()
    }
}
