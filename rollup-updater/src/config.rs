//! Command line and environment configuration.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use rollup_core::{AggregatorConfig, ErrorPolicy, MatchMode};
use rollup_provider_http::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

/// Wait before the first pass in debug mode, so the database behind the
/// results service has time to come up.
const DEBUG_STARTUP_DELAY: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum MatchArg {
    /// Match candidates by first and last name.
    Identity,
    /// Match candidates by list position (legacy behaviour).
    Positional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PolicyArg {
    /// Log failing units and keep going.
    Continue,
    /// Stop at the first failing unit.
    Abort,
}

#[derive(Debug, Parser)]
#[command(
    name = "rollup-updater",
    version,
    about = "Rolls ballot box counts up to quarters, districts, constituencies and cities"
)]
pub(crate) struct Config {
    /// Base URL of the results service.
    #[arg(long, env = "UPDATER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub(crate) base_url: String,

    /// Rest between two passes, in seconds.
    #[arg(long, env = "UPDATER_INTERVAL_SECS", default_value_t = 600)]
    pub(crate) interval_secs: u64,

    /// Deadline for a single HTTP request, in seconds.
    #[arg(long, env = "UPDATER_TIMEOUT_SECS", default_value_t = 15)]
    pub(crate) timeout_secs: u64,

    /// User agent sent with every request.
    #[arg(long, env = "UPDATER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub(crate) user_agent: String,

    /// How child candidates are matched to the parent's list.
    #[arg(long, env = "UPDATER_MATCH_MODE", value_enum, default_value_t = MatchArg::Identity)]
    pub(crate) match_mode: MatchArg,

    /// What to do when a unit fails.
    #[arg(long, env = "UPDATER_ERROR_POLICY", value_enum, default_value_t = PolicyArg::Continue)]
    pub(crate) error_policy: PolicyArg,

    /// Units of one level processed concurrently.
    #[arg(
        long,
        env = "UPDATER_CONCURRENCY",
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub(crate) concurrency: u16,

    /// Consecutive fully failed passes before giving up; 0 never gives up.
    #[arg(long, env = "UPDATER_MAX_FAILED_PASSES", default_value_t = 5)]
    pub(crate) max_failed_passes: u32,

    /// Anything but `false` delays the first pass.
    #[arg(long, env = "UPDATER_DEBUG", default_value = "false")]
    pub(crate) debug: String,

    /// Run a single pass and exit.
    #[arg(long)]
    pub(crate) once: bool,
}

impl Config {
    pub(crate) fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn startup_delay(&self) -> Option<Duration> {
        (self.debug != "false").then_some(DEBUG_STARTUP_DELAY)
    }

    pub(crate) fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            match_mode: match self.match_mode {
                MatchArg::Identity => MatchMode::Identity,
                MatchArg::Positional => MatchMode::Positional,
            },
            error_policy: match self.error_policy {
                PolicyArg::Continue => ErrorPolicy::Continue,
                PolicyArg::Abort => ErrorPolicy::Abort,
            },
            unit_concurrency: usize::from(self.concurrency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("rollup-updater").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn defaults_follow_the_legacy_updater() {
        let config = parse(&[]);

        assert_eq!(config.base_url, "http://localhost:84/v1/", "base url");
        assert_eq!(config.interval(), Duration::from_secs(600), "ten minutes");
        assert_eq!(config.timeout(), Duration::from_secs(15), "request deadline");
        assert_eq!(config.user_agent, "updater-v1", "user agent");
        assert_eq!(config.startup_delay(), None, "no delay");

        let engine = config.aggregator_config();
        assert_eq!(engine.match_mode, MatchMode::Identity, "identity matching");
        assert_eq!(engine.error_policy, ErrorPolicy::Continue, "continue on error");
        assert_eq!(engine.unit_concurrency, 1, "sequential units");
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--match-mode",
            "positional",
            "--error-policy",
            "abort",
            "--concurrency",
            "8",
            "--debug",
            "true",
            "--once",
        ]);

        let engine = config.aggregator_config();
        assert_eq!(engine.match_mode, MatchMode::Positional, "positional");
        assert_eq!(engine.error_policy, ErrorPolicy::Abort, "abort");
        assert_eq!(engine.unit_concurrency, 8, "eight at once");
        assert_eq!(config.startup_delay(), Some(DEBUG_STARTUP_DELAY), "debug delay");
        assert!(config.once, "single pass");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let parsed = Config::try_parse_from(["rollup-updater", "--concurrency", "0"]);
        assert!(parsed.is_err(), "concurrency must be positive");
    }
}
