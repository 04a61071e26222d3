use thiserror::Error;

/// Errors surfaced synchronously to the submitter. No persistent state
/// is left behind when one of these is returned (the working
/// directory, if created, is removed first).
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("malformed archive: {0}")]
    BadArchive(String),

    #[error("unsafe path in submission: {0:?}")]
    UnsafePath(String),

    #[error("invalid metadata: {0}")]
    BadMetadata(String),

    #[error("storage unavailable: {0}")]
    StorageFull(String),

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),
}

impl AdmissionError {
    /// Stable, short diagnostic code. Intentionally distinct from the
    /// `Display` message, which may carry detail not meant for wire
    /// stability.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::BadArchive(_) => "BAD_ARCHIVE",
            AdmissionError::UnsafePath(_) => "UNSAFE_PATH",
            AdmissionError::BadMetadata(_) => "BAD_METADATA",
            AdmissionError::StorageFull(_) => "STORAGE_FULL",
            AdmissionError::BrokerUnavailable(_) => "BROKER_UNAVAILABLE",
        }
    }

    /// HTTP status the manager should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AdmissionError::BadArchive(_)
            | AdmissionError::UnsafePath(_)
            | AdmissionError::BadMetadata(_) => 400,
            AdmissionError::StorageFull(_) | AdmissionError::BrokerUnavailable(_) => 500,
        }
    }
}

/// Errors that occur while running a leased job. These never
/// propagate to a caller; they're translated into a terminal marker
/// and a `Failed` status record by the worker.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Docker error: {0}")]
    ContainerEngine(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("TIMEOUT")]
    Timeout,

    #[error("non-zero exit: {0}")]
    NonZeroExit(i64),
}

impl ExecutionError {
    /// The `<detail>` token carried in `[HELIOS_TASK_FAILED:<detail>]`.
    pub fn detail_token(&self) -> String {
        match self {
            ExecutionError::ContainerEngine(_) => "Docker error".to_string(),
            ExecutionError::Runtime(_) => "Runtime error".to_string(),
            ExecutionError::Timeout => "TIMEOUT".to_string(),
            ExecutionError::NonZeroExit(code) => code.to_string(),
        }
    }
}
