//! Error types for search pipeline construction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid search form: {0}")]
    InvalidSearchForm(String),

    #[error("Invalid search parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Invalid public id: '{0}'")]
    InvalidPublicId(String),

    #[error("Type catalog error: {0}")]
    TypeCatalog(String),

    #[error("Category catalog error: {0}")]
    CategoryCatalog(String),

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSearchForm(_)
                | Error::InvalidParameter(_)
                | Error::InvalidQuery(_)
                | Error::InvalidPublicId(_)
        )
    }
}
