use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LakehouseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage transport failed for '{path}': {message}")]
    Transport { path: String, message: String },

    /// The object was fetched but its content is not a usable table.
    #[error("Table '{path}' is unreadable: {message}")]
    Unreadable { path: String, message: String },

    #[error("Country taxonomy is invalid: {0}")]
    InvalidTaxonomy(String),

    #[error("No normalized segments found under '{0}'")]
    NoSegments(String),

    /// A segment-set does not match its manifest, or its normalization never finished.
    #[error("Segment-set '{folder}' is not usable: {reason}")]
    InvalidSegmentSet { folder: String, reason: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The dataset keys of the master fact table and the metadata table disagree.
    #[error(
        "dataset_key sets disagree: {} key(s) missing from metadata, {} key(s) missing from fact table",
        missing_in_metadata.len(),
        missing_in_facts.len()
    )]
    ReconciliationInvariant {
        missing_in_metadata: Vec<String>,
        missing_in_facts: Vec<String>,
    },
}

impl LakehouseError {
    pub fn transport(path: impl Into<String>, message: impl fmt::Display) -> Self {
        LakehouseError::Transport {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn unreadable(path: impl Into<String>, message: impl fmt::Display) -> Self {
        LakehouseError::Unreadable {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_segment_set(folder: impl Into<String>, reason: impl fmt::Display) -> Self {
        LakehouseError::InvalidSegmentSet {
            folder: folder.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LakehouseError>;

/// Reasons a source row or a whole source table is left out of the normalized tier.
///
/// These never abort a run; callers count and log them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SkipReason {
    UnresolvedCountry,
    ConceptLookup { concept: String, matches: usize },
    MissingPeriodColumn,
    MissingCountryColumn,
    MissingValueColumn,
    UnexpectedShape { width: usize },
    Unreadable { message: String },
}

impl SkipReason {
    /// Stable label used for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::UnresolvedCountry => "unresolved_country",
            SkipReason::ConceptLookup { .. } => "concept_lookup",
            SkipReason::MissingPeriodColumn => "missing_period_column",
            SkipReason::MissingCountryColumn => "missing_country_column",
            SkipReason::MissingValueColumn => "missing_value_column",
            SkipReason::UnexpectedShape { .. } => "unexpected_shape",
            SkipReason::Unreadable { .. } => "unreadable",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnresolvedCountry => write!(f, "country reference did not resolve"),
            SkipReason::ConceptLookup { concept, matches } => {
                write!(f, "concept '{}' matched {} rows in the concept table", concept, matches)
            }
            SkipReason::MissingPeriodColumn => write!(f, "table has no period column"),
            SkipReason::MissingCountryColumn => write!(f, "table has no country column"),
            SkipReason::MissingValueColumn => write!(f, "table has no value column"),
            SkipReason::UnexpectedShape { width } => {
                write!(f, "table has an unexpected width of {} columns", width)
            }
            SkipReason::Unreadable { message } => write!(f, "table could not be parsed: {}", message),
        }
    }
}
