//! Per-level recomputation and the bottom-up pass over all four levels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::level::{CityLevel, ConstituencyLevel, DistrictLevel, Level, QuarterLevel};
use crate::model::{GeoUnit, LevelKind, TallySource};
use crate::ports::{GeoDataPort, PortError};
use crate::tally::{MatchMode, TallyError, tally};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What a pass does when one unit fails.
pub enum ErrorPolicy {
    /// Log the failure, count it, and move on to the next unit.
    #[default]
    Continue,
    /// Stop the pass at the first failure and hand the error to the caller.
    Abort,
}

#[derive(Debug, Clone, Copy)]
/// Knobs for [`Aggregator`].
pub struct AggregatorConfig {
    /// How child candidates are lined up against the parent's.
    pub match_mode: MatchMode,
    /// Reaction to a failing unit.
    pub error_policy: ErrorPolicy,
    /// Units of one level processed at the same time. Always 1 under
    /// [`ErrorPolicy::Abort`].
    pub unit_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            error_policy: ErrorPolicy::default(),
            unit_concurrency: 1,
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Failure to recompute a single unit.
pub enum UnitError {
    /// Children could not be fetched.
    #[error("{level} {unit}: fetching children failed: {source}")]
    Fetch {
        /// Level of the unit.
        level: LevelKind,
        /// Label of the unit.
        unit: String,
        /// Data service error.
        source: PortError,
    },
    /// Children could not be summed into the unit.
    #[error("{level} {unit}: {source}")]
    Tally {
        /// Level of the unit.
        level: LevelKind,
        /// Label of the unit.
        unit: String,
        /// Tally error.
        source: TallyError,
    },
    /// The recomputed unit could not be written back.
    #[error("{level} {unit}: replace failed: {source}")]
    Replace {
        /// Level of the unit.
        level: LevelKind,
        /// Label of the unit.
        unit: String,
        /// Data service error.
        source: PortError,
    },
}

#[derive(thiserror::Error, Debug)]
/// Failure that stops a pass under [`ErrorPolicy::Abort`].
pub enum AggregateError {
    /// The units of a level could not be listed.
    #[error("listing {level} units failed: {source}")]
    List {
        /// Level being listed.
        level: LevelKind,
        /// Data service error.
        source: PortError,
    },
    /// A unit failed.
    #[error(transparent)]
    Unit(#[from] UnitError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of recomputing one level.
pub struct LevelReport {
    /// Level recomputed.
    pub level: LevelKind,
    /// Units listed for the level.
    pub units: usize,
    /// Units written back.
    pub updated: usize,
    /// Units that failed.
    pub failed: usize,
    /// Child slots dropped by positional matching.
    pub skipped_slots: usize,
    /// Set when the level could not be listed at all.
    pub list_error: Option<String>,
}

impl LevelReport {
    fn new(level: LevelKind) -> Self {
        Self {
            level,
            units: 0,
            updated: 0,
            failed: 0,
            skipped_slots: 0,
            list_error: None,
        }
    }

    /// Failed units plus a failed listing.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.failed + usize::from(self.list_error.is_some())
    }
}

#[derive(Debug, Clone)]
/// Outcome of one bottom-up pass.
pub struct PassReport {
    /// Wall-clock start of the pass.
    pub started_at: DateTime<Utc>,
    /// Time the pass took.
    pub elapsed: Duration,
    /// One report per level, in pass order.
    pub levels: Vec<LevelReport>,
}

impl PassReport {
    /// Units written back across all levels.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.levels.iter().map(|level| level.updated).sum()
    }

    /// Errors across all levels.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.levels.iter().map(LevelReport::errors).sum()
    }

    /// Whether the pass tried to do work and none of it succeeded. A run
    /// of these usually means the data service is down.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.errors() > 0 && self.updated() == 0
    }
}

/// Recomputes the tallies of the geographic hierarchy through an injected
/// data service client.
pub struct Aggregator {
    port: Arc<dyn GeoDataPort>,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Create an aggregator bound to the given data service.
    #[must_use]
    pub fn new(port: Arc<dyn GeoDataPort>, config: AggregatorConfig) -> Self {
        Self { port, config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Run all four levels bottom-up, each level finishing its writes
    /// before the next one starts reading.
    ///
    /// # Errors
    ///
    /// Only under [`ErrorPolicy::Abort`]: returns the first
    /// [`AggregateError`] encountered.
    pub async fn run_pass(&self) -> Result<PassReport, AggregateError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut levels = Vec::with_capacity(LevelKind::PASS_ORDER.len());

        for kind in LevelKind::PASS_ORDER {
            let report = match kind {
                LevelKind::Quarter => self.aggregate_level::<QuarterLevel>().await?,
                LevelKind::District => self.aggregate_level::<DistrictLevel>().await?,
                LevelKind::Constituency => self.aggregate_level::<ConstituencyLevel>().await?,
                LevelKind::City => self.aggregate_level::<CityLevel>().await?,
            };
            levels.push(report);
        }

        let report = PassReport {
            started_at,
            elapsed: clock.elapsed(),
            levels,
        };
        info!(
            updated = report.updated(),
            errors = report.errors(),
            elapsed = ?report.elapsed,
            "pass finished"
        );
        Ok(report)
    }

    /// Recompute every unit of one level from its children.
    ///
    /// # Errors
    ///
    /// Only under [`ErrorPolicy::Abort`]: returns the listing error or the
    /// first unit error.
    pub async fn aggregate_level<L: Level>(&self) -> Result<LevelReport, AggregateError> {
        let mut report = LevelReport::new(L::KIND);
        let abort = self.config.error_policy == ErrorPolicy::Abort;

        let parents = match L::parents(self.port.as_ref()).await {
            Ok(parents) => parents,
            Err(source) => {
                let err = AggregateError::List {
                    level: L::KIND,
                    source,
                };
                if abort {
                    return Err(err);
                }
                warn!(level = %L::KIND, "{err}");
                report.list_error = Some(err.to_string());
                return Ok(report);
            }
        };

        if parents.is_empty() {
            debug!(level = %L::KIND, "no units found");
        }
        report.units = parents.len();

        let width = if abort {
            1
        } else {
            self.config.unit_concurrency.max(1)
        };
        let mut outcomes = stream::iter(parents)
            .map(|parent| self.aggregate_unit::<L>(parent))
            .buffer_unordered(width);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(skipped_slots) => {
                    report.updated += 1;
                    report.skipped_slots += skipped_slots;
                }
                Err(err) if abort => return Err(err.into()),
                Err(err) => {
                    warn!(level = %L::KIND, "{err}");
                    report.failed += 1;
                }
            }
        }

        info!(
            level = %L::KIND,
            units = report.units,
            updated = report.updated,
            failed = report.failed,
            "level finished"
        );
        Ok(report)
    }

    async fn aggregate_unit<L: Level>(&self, mut parent: L::Parent) -> Result<usize, UnitError> {
        let port = self.port.as_ref();
        let unit = parent.label();

        let children = L::children(port, &parent)
            .await
            .map_err(|source| UnitError::Fetch {
                level: L::KIND,
                unit: unit.clone(),
                source,
            })?;
        if children.is_empty() {
            debug!(level = %L::KIND, %unit, "no children found, totals reset to zero");
        }

        let rollup = tally(
            parent.candidates(),
            &unit,
            &children,
            L::child_label,
            self.config.match_mode,
        )
        .map_err(|source| UnitError::Tally {
            level: L::KIND,
            unit: unit.clone(),
            source,
        })?;
        let skipped_slots = rollup.skipped_slots;
        if skipped_slots > 0 {
            warn!(level = %L::KIND, %unit, skipped_slots, "candidate slots did not line up");
        }

        parent.apply(rollup);
        L::replace(port, &parent)
            .await
            .map_err(|source| UnitError::Replace {
                level: L::KIND,
                unit: unit.clone(),
                source,
            })?;

        for candidate in parent.candidates() {
            debug!(
                level = %L::KIND,
                %unit,
                candidate = %candidate.key(),
                votes = candidate.votes,
                "candidate tally"
            );
        }
        let counts = parent.counts();
        info!(
            level = %L::KIND,
            %unit,
            children = children.len(),
            eligible_voters = counts.eligible_voters,
            actual_voters = counts.actual_voters,
            valid_votes = counts.valid_votes,
            invalid_votes = counts.invalid_votes,
            "unit updated"
        );
        Ok(skipped_slots)
    }
}
