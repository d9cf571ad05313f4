//! Poll loop driving cycles on a fixed interval

use super::{PollCycle, SilentCycleCounter};
use crate::error::QueryError;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info};

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// Single-shot mode finished its one cycle
    Completed,
    /// Interrupted between cycles
    Interrupted,
}

/// Drives [`PollCycle`]s, one at a time
#[derive(Debug, Clone)]
pub struct PollLoop {
    /// `None` runs exactly one cycle
    interval: Option<Duration>,
    heartbeat_every: u64,
}

impl PollLoop {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval: interval.filter(|d| !d.is_zero()),
            heartbeat_every: super::HEARTBEAT_EVERY,
        }
    }

    /// Run until interrupted (looping) or after one cycle (single shot)
    pub async fn run<C>(
        &self,
        cycle: &mut C,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<PollExit, QueryError>
    where
        C: PollCycle + ?Sized,
    {
        let Some(interval) = self.interval else {
            if !cycle.run_cycle().await? {
                cycle.nothing_found();
            }
            return Ok(PollExit::Completed);
        };

        info!(interval_secs = interval.as_secs(), "Starting poll loop");
        let mut silent = SilentCycleCounter::new(self.heartbeat_every);

        loop {
            if interrupted(&mut shutdown) {
                break;
            }

            let produced = cycle.run_cycle().await?;
            if silent.record(produced) {
                cycle.still_looking();
            }
            debug!(produced, silent_cycles = silent.consecutive(), "Cycle finished");

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Stopping poll loop");
        Ok(PollExit::Interrupted)
    }
}

fn interrupted(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}
