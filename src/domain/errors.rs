use crate::domain::entities::{TicketAction, TicketStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Cannot {action} a ticket that is {from}")]
    InvalidTransition {
        from: TicketStatus,
        action: TicketAction,
    },
    #[error("No SLA limit configured for priority '{0}'")]
    UnknownPriority(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            other => DomainError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DomainError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DomainError::StoreUnavailable(format!("Migration failed: {}", err))
    }
}
