//! stderr logging for the `prefmatch` binary.
//!
//! stdout carries only NDJSON responses, so every event goes to stderr. The
//! filter comes from `PREFMATCH_LOG`, then `RUST_LOG`, then the level picked
//! by [`LogSettings`]. A directive that fails to parse is skipped.

use tracing::Level;
use tracing_subscriber::EnvFilter;

use prefmatch_core::{MatchError, MatchResult};

use crate::cli::CliInput;

/// Subscriber settings resolved from flags and the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub ansi: bool,
}

impl LogSettings {
    /// `--verbose` beats `--quiet`; either beats `env_level`
    /// (`PREFMATCH_LOG_LEVEL`, or `WARN` when unset).
    #[must_use]
    pub const fn from_cli(input: &CliInput, env_level: Level, stderr_is_tty: bool) -> Self {
        let level = if input.verbose {
            Level::DEBUG
        } else if input.quiet {
            Level::ERROR
        } else {
            env_level
        };
        Self {
            level,
            ansi: stderr_is_tty && !input.no_color,
        }
    }
}

/// First usable directive among `prefmatch_log`, `rust_log` and `level`.
#[must_use]
pub fn filter_directive(prefmatch_log: Option<&str>, rust_log: Option<&str>, level: Level) -> String {
    [prefmatch_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|directive| !directive.is_empty() && EnvFilter::try_new(directive).is_ok())
        .map_or_else(|| level.as_str().to_ascii_lowercase(), str::to_owned)
}

/// Install the global stderr subscriber.
///
/// # Errors
///
/// Returns `MatchError::InvalidConfig` (field `logging`) when a global
/// subscriber is already set.
pub fn install(settings: LogSettings) -> MatchResult<()> {
    let directive = filter_directive(
        std::env::var("PREFMATCH_LOG").ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
        settings.level,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(settings.ansi)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|err| MatchError::InvalidConfig {
            field: "logging".into(),
            value: directive,
            reason: err.to_string(),
        })
}
