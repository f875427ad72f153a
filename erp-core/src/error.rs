use thiserror::Error;

/// Pre-commit failure of a batch rename. Nothing has been written when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source resource not found: {identifier}")]
    Missing { identifier: String },

    #[error("destination identifier already in use: {identifier}")]
    Collision { identifier: String },

    #[error("resource targeted by more than one rename: {identifier}")]
    DuplicateSource { identifier: String },
}

#[derive(Error, Debug)]
pub enum ErpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("offset table is stale; run update_offsets before serializing")]
    StaleOffsets,
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ErpError>;
