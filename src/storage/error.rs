use thiserror::Error;

/// Failure reported by a repository.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique or composite-key constraint rejected the write.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The write points at a row that does not exist.
    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Classify a sqlx failure, keeping constraint violations distinct from
    /// generic backend errors.
    pub(crate) fn from_sqlx(err: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let message = db.message();
            if db.is_unique_violation() || message.contains("UNIQUE constraint failed") {
                return StoreError::Duplicate(context.to_string());
            }
            if db.is_foreign_key_violation() || message.contains("FOREIGN KEY constraint failed") {
                return StoreError::MissingReference(context.to_string());
            }
        }
        StoreError::Backend(anyhow::Error::new(err).context(format!("Failed to {}", context)))
    }
}
