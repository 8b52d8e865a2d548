//! Forever loop around [`Aggregator::run_pass`].

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::aggregator::{AggregateError, Aggregator, PassReport};

#[derive(thiserror::Error, Debug)]
/// Reasons the loop gives up.
pub enum SchedulerError {
    /// A pass stopped under the abort policy.
    #[error("pass aborted: {0}")]
    Aborted(#[from] AggregateError),
    /// Too many passes in a row failed completely.
    #[error("data service unreachable for {passes} consecutive passes")]
    ServiceUnreachable {
        /// Failed passes in a row.
        passes: u32,
    },
}

/// Runs passes with a fixed rest interval in between.
pub struct Scheduler {
    aggregator: Aggregator,
    interval: Duration,
    max_failed_passes: u32,
}

impl Scheduler {
    /// Build a scheduler. `max_failed_passes == 0` never gives up.
    #[must_use]
    pub fn new(aggregator: Aggregator, interval: Duration, max_failed_passes: u32) -> Self {
        Self {
            aggregator,
            interval,
            max_failed_passes,
        }
    }

    /// Run a single pass.
    ///
    /// # Errors
    ///
    /// Returns the pass error under the abort policy.
    pub async fn run_once(&self) -> Result<PassReport, SchedulerError> {
        Ok(self.aggregator.run_pass().await?)
    }

    /// Run passes until `shutdown` resolves. A pass already under way is
    /// finished before returning, so no unit is left half written.
    ///
    /// # Errors
    ///
    /// Returns a [`SchedulerError`] when a pass aborts or the data service
    /// looks unreachable.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<(), SchedulerError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stopping = false;
        let mut failed_in_row: u32 = 0;
        let mut pass_number: u64 = 0;

        loop {
            pass_number += 1;
            info!(pass = pass_number, "starting pass");

            let pass = self.aggregator.run_pass();
            tokio::pin!(pass);
            let report = loop {
                tokio::select! {
                    report = &mut pass => break report?,
                    () = &mut shutdown, if !stopping => {
                        info!("shutdown requested, finishing the current pass");
                        stopping = true;
                    }
                }
            };

            if report.is_failed() {
                failed_in_row += 1;
                warn!(
                    errors = report.errors(),
                    failed_in_row, "pass failed without updating any unit"
                );
                if self.max_failed_passes > 0 && failed_in_row >= self.max_failed_passes {
                    return Err(SchedulerError::ServiceUnreachable {
                        passes: failed_in_row,
                    });
                }
            } else {
                failed_in_row = 0;
            }

            if stopping {
                return Ok(());
            }

            info!(interval = ?self.interval, "sleeping until next pass");
            tokio::select! {
                () = sleep(self.interval) => {}
                () = &mut shutdown => {
                    info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}
