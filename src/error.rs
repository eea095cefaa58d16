use thiserror::Error;

/// Result type for flow pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Stage execution error
    #[error("Stage execution failed: {0}")]
    StageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Unrecoverable read or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A boxed payload was accessed as the wrong type
    #[error("Packet type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The other end of a connection went away without ending the stream
    #[error("Connection {connection} disconnected before end of stream")]
    Disconnected { connection: String },

    /// Receive attempted after end of stream was already observed
    #[error("Connection {connection} already delivered end of stream")]
    StreamEnded { connection: String },

    /// Send attempted after end of stream was already sent
    #[error("Connection {connection} is closed: end of stream already sent")]
    SendAfterEnd { connection: String },

    /// A stage thread panicked
    #[error("Stage {0} panicked")]
    StagePanicked(String),

    /// A stage thread could not be spawned
    #[error("Failed to spawn stage {stage}: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True for errors that are only a consequence of a neighbouring stage failing
    pub fn is_disconnect(&self) -> bool {
        matches!(self, PipelineError::Disconnected { .. })
    }
}
