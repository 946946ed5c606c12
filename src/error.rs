//! Error types for Mail Sweep.

/// Top-level error type for a sweep.
///
/// Mail and database failures reach here wrapped: mail errors inside
/// `Pipeline`, database errors inside `Storage`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mail store errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail request {operation} failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Invalid response for {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },

    #[error("Authentication failed for mail store")]
    AuthFailed,

    #[error("Thread {id} not found")]
    ThreadNotFound { id: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Storage hierarchy and sink errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create folder {name}: {reason}")]
    FolderCreation { name: String, reason: String },

    #[error("Sink {name} unavailable: {reason}")]
    SinkUnavailable { name: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline errors.
///
/// `Mail` and `Storage` abort the sweep. The remaining variants are raised
/// while handling a single thread and end up in the fallback log.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mail store error: {0}")]
    Mail(#[from] MailError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to read thread {thread_id}: {reason}")]
    ThreadFacts { thread_id: String, reason: String },

    #[error("Rule {rule} failed: {reason}")]
    Rule { rule: String, reason: String },

    #[error("Failed to move thread {thread_id} to trash: {reason}")]
    Trash { thread_id: String, reason: String },
}
