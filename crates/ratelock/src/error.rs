use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockStoreError {
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}
