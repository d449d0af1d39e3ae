use std::path::PathBuf;

/// Unified error type covering every failure mode of the matching pipeline.
///
/// Validation variants (`InvalidVectorSize`, `NonFiniteComponent`,
/// `QueryDimensionMismatch`, `InvalidPreference`) are always raised before any
/// shared state is touched, so a rejected call never leaves a partial mutation
/// behind. `IdentifierSpaceExhausted` is a configuration problem: the id space
/// is too small for the population being indexed.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    // === Validation errors ===
    /// A submitted preference vector does not have the configured dimension.
    #[error(
        "Invalid vector size for user {user_id}: expected {expected} components, found {found}."
    )]
    InvalidVectorSize {
        /// External id of the offending submission.
        user_id: String,
        /// Configured dimensionality.
        expected: usize,
        /// Length of the submitted vector.
        found: usize,
    },

    /// A submitted vector contains NaN or an infinity.
    #[error(
        "Vector for user {user_id} has a non-finite component at position {position}. Use -1 for unknown values."
    )]
    NonFiniteComponent {
        /// External id of the offending submission.
        user_id: String,
        /// Zero-based component position.
        position: usize,
    },

    /// A query vector does not have the configured dimension.
    #[error(
        "Query dimension mismatch: index has {expected}-dim vectors, query has {found}-dim."
    )]
    QueryDimensionMismatch {
        /// Configured dimensionality.
        expected: usize,
        /// Length of the query vector.
        found: usize,
    },

    /// A raw preference answer is outside the attribute's declared range.
    #[error("Preference {attribute} = {value} is out of range [0, {max}].")]
    InvalidPreference {
        /// Attribute name from the schema.
        attribute: String,
        /// The rejected value.
        value: f64,
        /// Declared maximum for the attribute.
        max: f64,
    },

    // === Identifier errors ===
    /// Every derivation attempt for an external id collided with another id.
    #[error(
        "Identifier space exhausted for user {user_id} after {attempts} attempts (space = {space}). Increase id_space."
    )]
    IdentifierSpaceExhausted {
        /// External id that could not be placed.
        user_id: String,
        /// Number of derivation attempts made.
        attempts: u32,
        /// Size of the internal id space.
        space: u64,
    },

    // === Engine errors ===
    /// The ANN engine rejected an operation.
    #[error("ANN engine {engine} failed: {detail}")]
    EngineFailure {
        /// Engine identifier.
        engine: &'static str,
        /// What went wrong.
        detail: String,
    },

    // === Configuration errors ===
    /// A configuration value is invalid.
    #[error("Invalid config: {field} = \"{value}\" — {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse config at {}: {detail}", .path.display())]
    ConfigParse {
        /// Path of the config file.
        path: PathBuf,
        /// Parser message.
        detail: String,
    },

    // === I/O and protocol errors ===
    /// Wraps `std::io::Error` for file and stream operations.
    #[error("I/O error: {0}. Check file permissions and paths.")]
    Io(#[from] std::io::Error),

    /// A request frame could not be decoded.
    #[error("Protocol error: {detail}")]
    Protocol {
        /// What was wrong with the frame.
        detail: String,
    },

    /// The snapshot source for a bulk refresh could not be read.
    #[error("Vector source {source_name} unavailable: {source}")]
    SourceUnavailable {
        /// Human-readable source name.
        source_name: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MatchError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidVectorSize { .. } => "invalid_vector_size",
            Self::NonFiniteComponent { .. } => "non_finite_component",
            Self::QueryDimensionMismatch { .. } => "query_dimension_mismatch",
            Self::InvalidPreference { .. } => "invalid_preference",
            Self::IdentifierSpaceExhausted { .. } => "identifier_space_exhausted",
            Self::EngineFailure { .. } => "engine_failure",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::ConfigParse { .. } => "config_parse",
            Self::Io(_) => "io",
            Self::Protocol { .. } => "protocol",
            Self::SourceUnavailable { .. } => "source_unavailable",
        }
    }

    /// Whether the caller sent bad input (as opposed to a server-side failure).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVectorSize { .. }
                | Self::NonFiniteComponent { .. }
                | Self::QueryDimensionMismatch { .. }
                | Self::InvalidPreference { .. }
                | Self::Protocol { .. }
        )
    }
}

/// Convenience alias used throughout the prefmatch crates.
pub type MatchResult<T> = Result<T, MatchError>;
