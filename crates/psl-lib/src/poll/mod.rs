//! Poll loop
//!
//! Drives repeated cycles on an interval. Cycles never overlap, and an
//! interrupt is only observed between cycles.

mod counter;
mod r#loop;

pub use counter::{SilentCycleCounter, HEARTBEAT_EVERY};
pub use r#loop::{PollExit, PollLoop};

use crate::error::QueryError;
use async_trait::async_trait;

/// One full fetch/classify/act pass driven by the poll loop
#[async_trait]
pub trait PollCycle: Send {
    /// Run one cycle. `Ok(true)` when it produced visible output.
    ///
    /// An error ends the loop; only unrecoverable connection loss should
    /// be returned here.
    async fn run_cycle(&mut self) -> Result<bool, QueryError>;

    /// Heartbeat while consecutive cycles find nothing
    fn still_looking(&mut self);

    /// A single-shot run found nothing
    fn nothing_found(&mut self);
}
