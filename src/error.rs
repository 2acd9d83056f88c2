use std::path::PathBuf;

/// Failures confined to a single record. The pipeline reports these and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Record too long: {length} > {max_length}")]
    RecordTooLong { length: usize, max_length: usize },

    #[error("Transformer '{transformer}' could not apply: {reason}")]
    TransformFailure { transformer: String, reason: String },

    #[error("Formatter '{formatter}' failed to render record: {reason}")]
    RenderFailure { formatter: String, reason: String },
}

/// Failures of the event source. Always fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read from event source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to '{address}': {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source address '{0}'")]
    InvalidAddress(String),
}

/// Configuration problems detected before the loop starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Include keys and exclude keys are mutually exclusive")]
    ConflictingKeyFilters,

    #[error("Key list '{0}' does not name any key")]
    EmptyKeyList(String),

    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file '{}': {reason}", path.display())]
    FileParse { path: PathBuf, reason: String },
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to write to output: {0}")]
    Sink(#[source] std::io::Error),
}
