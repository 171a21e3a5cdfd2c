//! `RunSearch`: drives a `ConfigGenerator` to completion against a
//! `Profiler`, checkpointing as it goes.
//!
//! Single-threaded cooperative driver: one `RunConfig` in flight at a time,
//! suspension only at the `Profiler::profile` boundary. Cancellation is an
//! `Arc<AtomicU8>` signal counter rather than `tokio_util::CancellationToken`
//! — one signal finalizes the checkpoint and returns after the in-flight
//! measurement, a second signal (observed on the next poll) exits
//! immediately without a final write.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use search_types::{RunConfig, RunConfigMeasurement, SearchResult};

use crate::generators::ConfigGenerator;
use crate::state::{SearchCheckpoint, StateManager};
use profiler_client::Profiler;

const SIGNAL_NONE: u8 = 0;
const SIGNAL_GRACEFUL: u8 = 1;
const SIGNAL_IMMEDIATE: u8 = 2;

/// A cloneable handle a signal task (e.g. `tokio::signal::ctrl_c`) uses to
/// request shutdown; the orchestrator polls it between measurements.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    signal: Arc<AtomicU8>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one shutdown request. The first call asks for a graceful
    /// exit (final checkpoint written); a second call asks for an immediate
    /// one (no final checkpoint).
    pub fn signal(&self) {
        let previous = self.signal.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
            Some(match s {
                SIGNAL_NONE => SIGNAL_GRACEFUL,
                _ => SIGNAL_IMMEDIATE,
            })
        });
        if let Ok(SIGNAL_GRACEFUL) = previous {
            info!("second cancellation signal received: exiting immediately");
        } else {
            info!("cancellation signal received: finishing in-flight measurement then exiting");
        }
    }

    pub fn is_graceful_exit_requested(&self) -> bool {
        self.signal.load(Ordering::SeqCst) >= SIGNAL_GRACEFUL
    }

    pub fn is_immediate_exit_requested(&self) -> bool {
        self.signal.load(Ordering::SeqCst) >= SIGNAL_IMMEDIATE
    }
}

/// Outcome of driving one generator to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The generator reported `is_done()`.
    Completed,
    /// A cancellation signal ended the run early.
    Cancelled,
}

/// Drives `generator` against `profiler`, persisting progress through
/// `state`. Generic over both so a caller can swap in `MockProfiler` for
/// tests/demos or any of the five `ConfigGenerator` implementations.
pub struct RunSearch<G, P>
where
    G: ConfigGenerator<Output = RunConfig>,
    P: Profiler,
{
    generator: G,
    profiler: P,
    state: StateManager,
    checkpoint: SearchCheckpoint,
    cancellation: CancellationToken,
}

impl<G, P> RunSearch<G, P>
where
    G: ConfigGenerator<Output = RunConfig>,
    P: Profiler,
{
    /// Loads `state`'s checkpoint (if any) and replays its cached
    /// measurements into `generator` before the first `next_config` call, so
    /// a resumed run skips configs it already measured (see `crate::state`
    /// module docs for why replay — not cursor deserialization — is what
    /// makes this correct).
    pub fn new(generator: G, profiler: P, state: StateManager, cancellation: CancellationToken) -> SearchResult<Self> {
        let checkpoint = state.load_or_default()?;
        let mut search = Self {
            generator,
            profiler,
            state,
            checkpoint,
            cancellation,
        };
        search.replay_checkpoint();
        Ok(search)
    }

    fn replay_checkpoint(&mut self) {
        let replayed = self.checkpoint.measurement_log.len();
        if replayed == 0 {
            return;
        }
        info!(count = replayed, "replaying cached measurements from checkpoint");
        for measurement in self.checkpoint.measurement_log.clone() {
            if self.generator.is_done() {
                break;
            }
            if self.generator.next_config().is_none() {
                break;
            }
            self.generator.set_last_results(&[measurement]);
        }
    }

    pub fn checkpoint(&self) -> &SearchCheckpoint {
        &self.checkpoint
    }

    /// Drives the generator to completion or cancellation.
    pub async fn run(&mut self) -> SearchResult<RunOutcome> {
        loop {
            if self.cancellation.is_graceful_exit_requested() {
                break;
            }
            if self.generator.is_done() {
                self.state.save_checkpoint_final(&self.checkpoint)?;
                return Ok(RunOutcome::Completed);
            }
            let Some(config) = self.generator.next_config() else {
                self.state.save_checkpoint_final(&self.checkpoint)?;
                return Ok(RunOutcome::Completed);
            };

            let measurement = self.measure(&config).await;
            self.generator.set_last_results(&[measurement.clone()]);
            self.checkpoint
                .seen_measurements
                .insert(config.fingerprint(), measurement.clone());
            self.checkpoint.measurement_log.push(measurement);

            if self.cancellation.is_immediate_exit_requested() {
                info!("immediate exit requested: skipping final checkpoint");
                return Ok(RunOutcome::Cancelled);
            }
            self.state.save_checkpoint_if_due(&self.checkpoint)?;
        }

        self.state.save_checkpoint_final(&self.checkpoint)?;
        Ok(RunOutcome::Cancelled)
    }

    /// A `Profiler` error degrades the current sub-sweep rather than ending
    /// the whole run: it is logged and surfaced to the generator as `None`,
    /// never propagated as an `Err` out of `run`.
    async fn measure(&mut self, config: &RunConfig) -> Option<RunConfigMeasurement> {
        match self.profiler.profile(config).await {
            Ok(measurement) => Some(measurement),
            Err(e) => {
                warn!(fingerprint = %config.fingerprint(), error = %e, "measurement failed");
                None
            }
        }
    }
}
