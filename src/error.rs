use thiserror::Error;

/// Error types for reading and writing compiled translation catalogs
#[derive(Debug, Error)]
pub enum QmError {
    /// The buffer does not start with the 16-byte catalog magic
    #[error("QM-Format error: magic marker missing")]
    BadMagic,

    /// A block or field declares more bytes than the buffer holds
    #[error(
        "QM-Format error: {what} at offset {offset} needs {needed} bytes, but only {available} are available"
    )]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A translation string is not made of whole UTF-16 code units
    #[error("QM-Format error: UTF-16 string length {0} is not a multiple of 2")]
    OddUtf16Length(u32),

    /// A hash index entry points outside the messages block
    #[error("QM-Format error: message offset {offset} is outside the messages block ({len} bytes)")]
    MessageOffset { offset: u32, len: usize },

    /// A block or string is too large for its 32-bit length field
    #[error("QM-Format error: {what} of {len} bytes does not fit a 32-bit length")]
    TooLarge { what: &'static str, len: usize },

    /// At least one UTF-8 string in the file failed strict validation
    #[error("Error: File contains invalid UTF-8 sequences.")]
    InvalidUtf8,

    /// An error originating from I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON catalog could not be parsed or produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input file kind is not one this crate handles
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}

/// Result type for catalog operations
pub type QmResult<T> = Result<T, QmError>;
