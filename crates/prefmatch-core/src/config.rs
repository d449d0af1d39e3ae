//! Process-wide configuration for the matching index.
//!
//! [`MatchConfig`] is fixed at start-up: the coordinator copies what it needs
//! when it is constructed and nothing here is mutable at runtime.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};

/// Default preference vector dimensionality (one slot per schema attribute).
pub const DEFAULT_DIMENSION: usize = 8;
/// Default HNSW `M` (graph fan-out). Higher is more accurate and slower.
pub const DEFAULT_HNSW_M: usize = 32;
/// Default HNSW `ef_construction`.
pub const DEFAULT_HNSW_EF_CONSTRUCTION: usize = 200;
/// Default HNSW `ef_search`.
pub const DEFAULT_HNSW_EF_SEARCH: usize = 100;
/// Default HNSW max layer depth (`hnsw_rs` caps this at 16).
pub const DEFAULT_HNSW_MAX_LAYER: usize = 16;
/// Default number of matches returned by a query.
pub const DEFAULT_TOP_K: usize = 100;
/// Default size of the internal id space (ids fall in `0..2^31`).
pub const DEFAULT_ID_SPACE: u64 = 1 << 31;
/// Maximum number of derivation attempts before an id is declared unplaceable.
pub const DEFAULT_MAX_ID_ATTEMPTS: u32 = 1024;
/// Default period between scheduled bulk refreshes.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

const MAX_HNSW_M: usize = 256;
const MAX_HNSW_LAYER: usize = 16;

/// Which ANN engine backs the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Approximate HNSW graph (`hnsw_rs`).
    #[default]
    Hnsw,
    /// Exact brute-force scan. Suitable for small populations.
    Flat,
}

impl FromStr for EngineKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hnsw" => Ok(Self::Hnsw),
            "flat" => Ok(Self::Flat),
            _ => Err(()),
        }
    }
}

/// Configuration for the matching index.
///
/// All fields have defaults; TOML files and environment variables override
/// them selectively.
///
/// # Environment Variable Overrides
///
/// | Variable                           | Field                   | Default |
/// |------------------------------------|-------------------------|---------|
/// | `PREFMATCH_DIMENSION`              | `dimension`             | `8`     |
/// | `PREFMATCH_HNSW_M`                 | `hnsw_m`                | `32`    |
/// | `PREFMATCH_EF_SEARCH`              | `hnsw_ef_search`        | `100`   |
/// | `PREFMATCH_DEFAULT_TOP_K`          | `default_top_k`         | `100`   |
/// | `PREFMATCH_ENGINE`                 | `engine`                | `hnsw`  |
/// | `PREFMATCH_REFRESH_INTERVAL_SECS`  | `refresh_interval_secs` | `300`   |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Length of every preference vector.
    pub dimension: usize,

    /// HNSW `M` (max connections per node).
    pub hnsw_m: usize,

    /// HNSW build-time beam width.
    pub hnsw_ef_construction: usize,

    /// HNSW query-time beam width. Raised to `k` when a query asks for more.
    pub hnsw_ef_search: usize,

    /// HNSW maximum layer count.
    pub hnsw_max_layer: usize,

    /// `top_k` used when a query does not specify one.
    pub default_top_k: usize,

    /// ANN engine implementation.
    pub engine: EngineKind,

    /// Size of the internal id space. Internal ids fall in `0..id_space`.
    pub id_space: u64,

    /// Bounded retry count for id derivation.
    pub max_id_attempts: u32,

    /// Seconds between scheduled bulk refreshes.
    pub refresh_interval_secs: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            hnsw_m: DEFAULT_HNSW_M,
            hnsw_ef_construction: DEFAULT_HNSW_EF_CONSTRUCTION,
            hnsw_ef_search: DEFAULT_HNSW_EF_SEARCH,
            hnsw_max_layer: DEFAULT_HNSW_MAX_LAYER,
            default_top_k: DEFAULT_TOP_K,
            engine: EngineKind::Hnsw,
            id_space: DEFAULT_ID_SPACE,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl MatchConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::ConfigParse` for malformed TOML and
    /// `MatchError::InvalidConfig` when a value fails validation.
    pub fn from_toml_str(contents: &str) -> MatchResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| MatchError::ConfigParse {
            path: "<inline>".into(),
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::Io` if the file cannot be read, otherwise the
    /// errors of [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> MatchResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|err| match err {
            MatchError::ConfigParse { detail, .. } => MatchError::ConfigParse {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })
    }

    /// Apply overrides from the process environment.
    ///
    /// Only variables that are set and parse cleanly are applied; anything
    /// else is logged and ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("PREFMATCH_"))
            .collect();
        self.with_overrides_from(&env)
    }

    /// Apply overrides from an explicit variable map.
    #[must_use]
    pub fn with_overrides_from(mut self, env: &HashMap<String, String>) -> Self {
        if let Some(dim) = parse_env::<usize>(env, "PREFMATCH_DIMENSION")
            && dim > 0
        {
            self.dimension = dim;
        }
        if let Some(m) = parse_env::<usize>(env, "PREFMATCH_HNSW_M")
            && (1..=MAX_HNSW_M).contains(&m)
        {
            self.hnsw_m = m;
        }
        if let Some(ef) = parse_env::<usize>(env, "PREFMATCH_EF_SEARCH")
            && ef > 0
        {
            self.hnsw_ef_search = ef;
        }
        if let Some(top_k) = parse_env::<usize>(env, "PREFMATCH_DEFAULT_TOP_K")
            && top_k > 0
        {
            self.default_top_k = top_k;
        }
        if let Some(value) = env.get("PREFMATCH_ENGINE") {
            match value.parse::<EngineKind>() {
                Ok(kind) => self.engine = kind,
                Err(()) => tracing::warn!(
                    target: "prefmatch.config",
                    value = %value,
                    "ignoring unknown PREFMATCH_ENGINE (expected hnsw|flat)"
                ),
            }
        }
        if let Some(secs) = parse_env::<u64>(env, "PREFMATCH_REFRESH_INTERVAL_SECS")
            && secs > 0
        {
            self.refresh_interval_secs = secs;
        }
        self
    }

    #[must_use]
    pub const fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    #[must_use]
    pub const fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub const fn with_id_space(mut self, id_space: u64) -> Self {
        self.id_space = id_space;
        self
    }

    #[must_use]
    pub const fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    /// Refresh period as a `Duration`.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Check every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> MatchResult<()> {
        if self.dimension == 0 {
            return Err(invalid("dimension", self.dimension, "must be greater than zero"));
        }
        if self.hnsw_m == 0 || self.hnsw_m > MAX_HNSW_M {
            return Err(invalid("hnsw_m", self.hnsw_m, "must be in 1..=256"));
        }
        if self.hnsw_ef_construction == 0 {
            return Err(invalid(
                "hnsw_ef_construction",
                self.hnsw_ef_construction,
                "must be greater than zero",
            ));
        }
        if self.hnsw_ef_search == 0 {
            return Err(invalid(
                "hnsw_ef_search",
                self.hnsw_ef_search,
                "must be greater than zero",
            ));
        }
        if self.hnsw_max_layer == 0 || self.hnsw_max_layer > MAX_HNSW_LAYER {
            return Err(invalid("hnsw_max_layer", self.hnsw_max_layer, "must be in 1..=16"));
        }
        if self.default_top_k == 0 {
            return Err(invalid("default_top_k", self.default_top_k, "must be greater than zero"));
        }
        if self.id_space == 0 || self.id_space > i64::MAX as u64 {
            return Err(invalid("id_space", self.id_space, "must be in 1..=i64::MAX"));
        }
        if self.max_id_attempts == 0 {
            return Err(invalid("max_id_attempts", self.max_id_attempts, "must be greater than zero"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(invalid(
                "refresh_interval_secs",
                self.refresh_interval_secs,
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(env: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = env.get(key)?;
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        tracing::warn!(target: "prefmatch.config", key, value = %raw, "ignoring unparseable override");
    }
    parsed
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> MatchError {
    MatchError::InvalidConfig {
        field: field.to_owned(),
        value: value.to_string(),
        reason: reason.to_owned(),
    }
}
