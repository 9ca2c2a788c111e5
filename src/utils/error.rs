use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// MongoDB server code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Raw failure reported by a store backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Mongo(mongodb::error::Error),
}

impl From<mongodb::error::Error> for BackendError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            BackendError::DuplicateKey(err.to_string())
        } else {
            BackendError::Mongo(err)
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|w| w.code == DUPLICATE_KEY_CODE))
            .unwrap_or(false),
        _ => false,
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error in {operation} for collection '{collection}': {source}")]
    Store {
        collection: String,
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Upstream(String),
}

impl AppError {
    pub fn store(collection: &str, operation: &'static str, source: BackendError) -> Self {
        AppError::Store {
            collection: collection.to_string(),
            operation,
            source,
        }
    }

    /// Status code carried by the error envelope built from this error.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Store { .. } => 500,
            AppError::Validation(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Auth(_) => 401,
            AppError::Upstream(_) => 502,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            AppError::Store {
                source: BackendError::DuplicateKey(_),
                ..
            }
        )
    }

    /// Short machine-facing detail for the envelope's error entry.
    pub fn detail(&self) -> String {
        match self {
            AppError::Store { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}
