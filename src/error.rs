use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("column mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    DuplicateKey(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for CertError {
    fn from(e: lopdf::Error) -> Self {
        CertError::Template(e.to_string())
    }
}

pub type CertResult<T> = Result<T, CertError>;
