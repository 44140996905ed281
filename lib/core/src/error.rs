use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("identifier already present: {0}")]
    DuplicateId(u64),

    #[error("unknown identifier: {0}")]
    UnknownId(u64),

    #[error("invalid vector dimensionality: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid index options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Kernel(#[from] vicinity_kernels::KernelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted index data: {0}")]
    Corrupted(String),
}
