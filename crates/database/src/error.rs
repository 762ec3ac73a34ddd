use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    #[error("Database operation failed: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    #[error("A record already exists for {0}")]
    Conflict(String),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        DbError::Invalid(err.to_string())
    }
}
