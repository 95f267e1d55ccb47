//! Simulation context implementing WildfireContext for seeded runs.

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Instrument;
use wildfire_env::WildfireContext;

/// Simulation context backed by the tokio clock and seeded RNG streams.
///
/// This implements `WildfireContext` using:
/// - `tokio::time`, so a runtime with a paused clock runs on virtual time
/// - One master seed from which every random stream is derived
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Virtual time 0
    start: tokio::time::Instant,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    ///
    /// Create it inside the runtime that will drive the simulation, so that
    /// time 0 is read from that runtime's clock.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: tokio::time::Instant::now(),
            epoch: UNIX_EPOCH + Duration::from_secs(1_704_067_200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
}

#[async_trait]
impl WildfireContext for SimContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future.instrument(tracing::trace_span!("task", name = %name)));
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        // Combine master seed with the stream id for a reproducible stream
        let combined_seed = self.seed.wrapping_mul(0x517c_c1b7_2722_0a95) ^ stream;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
