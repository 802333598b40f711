use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// Invalid schema shape. Raised once when a plan is compiled, never per record.
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// A runtime value has no line protocol representation.
    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),

    /// A frame column's element kind has no line protocol representation.
    #[error("Unsupported column type: {0}")]
    UnsupportedColumnType(String),

    /// A time value could not be normalized to an epoch nanosecond integer.
    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    /// A chunked stream is not a valid concatenation of top-level JSON objects.
    #[error("Invalid chunk framing: {0}")]
    Framing(String),

    /// A record could not be rendered as a line protocol line.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}
