//! Service-level errors returned by the view, annotation and relevance
//! services.

use thiserror::Error;

use vigil_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A referenced system, task or archive does not exist (or belongs to
    /// another system).
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The request failed validation; nothing was applied.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A read failed while composing a view.
    #[error("store failure during {operation}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Applying one annotation failed. Earlier annotations in the batch stay
    /// applied.
    #[error("failed to annotate {entity} {id}")]
    Annotate {
        entity: &'static str,
        id: String,
        #[source]
        source: StoreError,
    },

    /// Annotations were applied but the relevance pass afterwards failed.
    #[error("relevance reconciliation failed")]
    Reconcile(#[source] StoreError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap a read failure; `NotFound` from the store passes through as is.
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            source => Self::Store { operation, source },
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Validation(msg),
            DomainError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
