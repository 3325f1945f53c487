use grantor_core::entity::EntityKind;
use grantor_storage::StorageError;

use crate::credential::CredentialError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} '{key}' does not exist")]
    MissingEntity { kind: EntityKind, key: String },

    #[error("{kind} '{key}' already exists")]
    DuplicateEntity { kind: EntityKind, key: String },

    #[error("{0} relation already exists")]
    DuplicateRelation(EntityKind),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn missing(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::MissingEntity {
            kind,
            key: key.into(),
        }
    }

    pub fn duplicate(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::DuplicateEntity {
            kind,
            key: key.into(),
        }
    }
}
