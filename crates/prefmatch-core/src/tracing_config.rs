//! Shared tracing vocabulary for the prefmatch crates.
//!
//! Library crates only emit spans and events; installing a subscriber is left
//! to the binary (or to whoever embeds the library).
//!
//! Filter all prefmatch output with:
//! ```text
//! PREFMATCH_LOG=prefmatch=debug
//! ```

use tracing::Level;

/// Target prefix used by every prefmatch span and event.
pub const TARGET_PREFIX: &str = "prefmatch";

/// Span names used across the pipeline.
pub mod span_names {
    /// One nearest-neighbor query, engine search plus rerank.
    pub const SEARCH: &str = "prefmatch::search";
    /// Penalty rerank of over-fetched hits.
    pub const RERANK: &str = "prefmatch::rerank";
    /// Single-vector insert.
    pub const INSERT_ONE: &str = "prefmatch::insert_one";
    /// Full index rebuild.
    pub const INSERT_BULK: &str = "prefmatch::insert_bulk";
    /// Scheduled refresh cycle.
    pub const REFRESH_CYCLE: &str = "prefmatch::refresh_cycle";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Level from `PREFMATCH_LOG_LEVEL`, or `default` when unset or unrecognized.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("PREFMATCH_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}
