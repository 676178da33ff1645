use crate::readiness::Readiness;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredmapError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("malformed recording: {0}")]
    MalformedInput(String),
    #[error("no recording loaded")]
    NoRecording,
    #[error("option error: {0}")]
    Option(String),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("output error: {0}")]
    Output(String),
}

/// Rejected move request. The partition is left untouched whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("field {field} is not at {bucket}[{index}]")]
    UnknownField {
        field: String,
        bucket: String,
        index: usize,
    },
    #[error("index {index} is out of range for {bucket} (len {len})")]
    InvalidIndex {
        bucket: String,
        index: usize,
        len: usize,
    },
    #[error("unknown bucket: {0}")]
    UnknownBucket(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("please map all fields before generating the payload ({0})")]
    NotReady(Readiness),
}
