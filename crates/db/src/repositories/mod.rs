use thiserror::Error;

use approvo_core::ports::StoreError;

pub mod memory;
pub mod workflow;

pub use memory::{InMemoryWorkflowStore, MemorySeed};
pub use workflow::SqlWorkflowStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("guarded write matched no row")]
    Stale,
    #[error("title `{0}` is already taken")]
    DuplicateTitle(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::Stale => StoreError::StaleWrite,
            RepositoryError::DuplicateTitle(title) => StoreError::DuplicateTitle(title),
        }
    }
}

#[cfg(test)]
mod tests {
    use approvo_core::ports::StoreError;

    use super::RepositoryError;

    #[test]
    fn repository_errors_map_onto_store_errors() {
        assert_eq!(StoreError::from(RepositoryError::Stale), StoreError::StaleWrite);
        assert_eq!(
            StoreError::from(RepositoryError::DuplicateTitle("ERP".to_string())),
            StoreError::DuplicateTitle("ERP".to_string())
        );
        assert!(matches!(
            StoreError::from(RepositoryError::Database(sqlx::Error::PoolTimedOut)),
            StoreError::Unavailable(_)
        ));
    }
}
