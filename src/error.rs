use thiserror::Error;

/// Errors raised while loading instances and solutions or writing results.
///
/// Infeasible assignments are never errors; only malformed input and I/O are.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown {kind} id `{id}`")]
    UnknownId { kind: &'static str, id: String },

    #[error("{what}: expected {expected} entries, found {found}")]
    LengthMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("{0} is missing")]
    MissingField(String),

    #[error("{kind} `{id}` appears more than once")]
    DuplicateEntry { kind: &'static str, id: String },

    #[error("{what} day {day} is outside the {days}-day horizon")]
    OutOfHorizon {
        what: String,
        day: usize,
        days: usize,
    },

    #[error("construction failed: {0}")]
    Construction(String),
}

pub type Result<T> = std::result::Result<T, Error>;
