//! Core environment context trait for wildfire actors.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// Node and agent actors never touch the clock, the scheduler or an entropy
/// source directly; they go through this trait so the same actor code runs
/// in production and in seeded simulation runs.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` (in `wildfire_sim`) - seeded streams
#[async_trait]
pub trait WildfireContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    ///
    /// Agent creation timestamps are derived from this value.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time (stamped on run results and exports).
    fn system_time(&self) -> SystemTime;

    /// Suspends the calling task for the given duration.
    ///
    /// Ignition timers are built on this.
    async fn sleep(&self, duration: Duration);

    /// Lets other ready tasks run before the caller continues.
    ///
    /// Searching agents call this between hops.
    async fn yield_now(&self);

    /// Spawns a detached background task.
    ///
    /// A panicking task terminates only itself.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns an independent random stream.
    ///
    /// Seeded implementations combine their master seed with `stream` so
    /// that each actor gets a reproducible stream of its own.
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (0 when not seeded).
    fn seed(&self) -> u64;
}
