/// Failures surfaced by the embedding engine.
///
/// Construction-time variants (`DimensionMismatch`, `SizeMismatch`,
/// `DuplicateToken`, `EmptySpace`) only come out of [`VectorSpace::new`];
/// everything else is a query-time error that the boundary layer reports.
///
/// [`VectorSpace::new`]: crate::space::VectorSpace::new
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unknown space: {0}")]
    UnknownSpace(String),

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("dimension mismatch for token {token:?}: expected {expected}, got {got}")]
    DimensionMismatch {
        token: String,
        expected: usize,
        got: usize,
    },

    #[error("size mismatch: {tokens} tokens but {vectors} vectors")]
    SizeMismatch { tokens: usize, vectors: usize },

    #[error("duplicate token: {0}")]
    DuplicateToken(String),

    #[error("space has no tokens")]
    EmptySpace,

    #[error("requested {requested} tokens but vocabulary only has {available}")]
    InsufficientVocabulary { requested: usize, available: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
}

pub type EngineResult<T> = Result<T, EngineError>;
