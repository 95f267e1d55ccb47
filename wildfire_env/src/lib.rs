//! Wildfire Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the node and agent
//! actors run unchanged in **Production** (tokio, OS entropy) and in the
//! **Simulation** harness (tokio virtual time, seeded entropy).
//!
//! # What Gets Intercepted
//!
//! - Time (`now()`, `sleep()`)
//! - Task creation (`spawn()`)
//! - Randomness (`derive_rng()`)
//!
//! Deriving every random stream from one 64-bit seed makes a run
//! reproducible from its seed number.
//!
//! Actors talk to each other through [`Mailbox`]es: unbounded, FIFO per
//! sender, and never blocking the sender.
//!
//! # Example
//!
//! ```ignore
//! use wildfire_env::{mailbox, WildfireContext};
//!
//! async fn actor_loop<Ctx: WildfireContext>(ctx: &Ctx, mut inbox: Mailbox<Msg>) {
//!     while let Some(msg) = inbox.recv().await {
//!         handle(msg);
//!     }
//! }
//! ```

mod context;
mod error;
mod mailbox;
mod tokio_impl;

pub use context::WildfireContext;
pub use error::EnvError;
pub use mailbox::{mailbox, Mailbox, MailboxSender};
pub use tokio_impl::TokioContext;
