// Optimizer error types: a single crate-wide `thiserror` enum and a
// `Result` type alias, rather than per-module error types.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum OptError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("could not parse hint block: {0}")]
    HintParseError(String),

    #[error("statistics missing for table {0}")]
    StatisticsMissing(String),

    #[error("index advisor exceeded its deadline")]
    AdvisorTimeout,
}

pub type Result<T> = std::result::Result<T, OptError>;
