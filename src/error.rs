use thiserror::Error;

/// Errors surfaced by model construction, indexing, and analysis.
///
/// Internal invariant breaches (e.g. nullifying an already-null gate) are
/// programming errors and panic instead of returning a variant; numeric
/// oddities that do not invalidate the result (rare-event probability above
/// one, the UNITY uncertainty case) accumulate as warnings on the result
/// objects.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate definition of '{0}'")]
    DuplicateId(String),

    #[error("reference to undefined '{0}'")]
    UnknownRef(String),

    #[error("cyclic gate definition involving '{0}'")]
    CyclicTree(String),

    #[error("{kind} formula requires {expected}, got {actual} arguments")]
    InvalidArity {
        kind: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("ATLEAST vote number {vote} out of bounds for {children} arguments")]
    InvalidVote { vote: usize, children: usize },

    #[error("probability {value} of '{id}' is outside [0, 1]")]
    ProbabilityRange { id: String, value: f64 },

    #[error("invalid {name} distribution: {reason}")]
    InvalidDistribution { name: &'static str, reason: String },

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("{0}")]
    Validation(String),
}

impl Error {
    /// Prepends an originating context (usually a file or model name) to the
    /// error message.
    pub fn in_context(self, context: &str) -> Self {
        Error::Validation(format!("{}: {}", context, self))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
