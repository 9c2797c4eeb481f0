use std::collections::HashSet;

use super::domain::{ContractId, ContractRecord};

/// Storage abstraction for committed contracts.
pub trait ContractRepository: Send + Sync {
    /// Inserts or replaces the record with the same id.
    fn upsert(&self, record: ContractRecord) -> Result<(), RepositoryError>;
    /// Removing an unknown id is not an error.
    fn remove(&self, id: &ContractId) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError>;
    /// Newest first.
    fn all(&self) -> Result<Vec<ContractRecord>, RepositoryError>;

    /// Paper blanks taken out of the free inventory by committed contracts.
    fn used_blanks(&self) -> Result<HashSet<String>, RepositoryError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(ContractRecord::consumes_blank)
            .filter_map(|record| record.blank_id)
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
