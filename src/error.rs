use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic number: expected {expected}, found {found}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported image dimensions {rows}x{cols}, expected 28x28")]
    BadDimensions { rows: u32, cols: u32 },

    #[error("truncated payload: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{images} images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },
}

impl Error {
    /// True for errors caused by the contents of a file rather than by
    /// reading it.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::BadMagic { .. } | Error::BadDimensions { .. } | Error::Truncated { .. }
        )
    }
}
