use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Spot {spot_id} is already reserved for an overlapping window")]
    Conflict { spot_id: String },

    #[error("Spot {0} is disabled for maintenance")]
    SpotDisabled(String),

    #[error("Not found: {entity} with id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Reservation {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Reservation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Reservation {0} already carries a different payment")]
    AlreadyPaid(String),

    /// The storage refused a commit because its preconditions no longer hold.
    #[error("Stale write: {0}")]
    StaleWrite(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether this error is likely transient (storage unavailable, timeout)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Persistence(_))
    }

    /// Expected, user-actionable outcomes as opposed to infrastructure failures.
    pub fn is_business(&self) -> bool {
        !matches!(
            self,
            DomainError::Persistence(_) | DomainError::StaleWrite(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),
}

impl From<InfraError> for DomainError {
    fn from(err: InfraError) -> Self {
        DomainError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_persistence_errors_are_transient() {
        assert!(DomainError::Persistence("down".into()).is_transient());
        assert!(!DomainError::Conflict { spot_id: "A1".into() }.is_transient());
        assert!(!DomainError::StaleWrite("x".into()).is_transient());
    }

    #[test]
    fn business_errors_are_distinguishable_from_failures() {
        assert!(DomainError::InvalidWindow("bad".into()).is_business());
        assert!(DomainError::AlreadyCancelled("r1".into()).is_business());
        assert!(!DomainError::Persistence("down".into()).is_business());
    }

    #[test]
    fn infra_error_converts_to_persistence() {
        let err: DomainError = InfraError::Timeout(500).into();
        assert_eq!(
            err,
            DomainError::Persistence("Operation timed out after 500 ms".into())
        );
    }
}
