use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Unified error type for all stockflow operations.
///
/// Variants are terminal: they surface to the caller exactly as raised and
/// never leave partial effects behind.
#[derive(Error, Debug, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Not assigned: {0}")]
    NotAssigned(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent modification detected for record {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

/// Conversion helper so call sites can raise database failures uniformly
/// whether the underlying API hands back a [`DbErr`] or a plain message.
pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Wrap any database-ish failure into the `DatabaseError` variant.
    pub fn db_error<E: IntoDbErr>(err: E) -> Self {
        ServiceError::DatabaseError(err.into_db_err())
    }

    /// Stable machine-readable label per variant. Single source of truth
    /// for metrics labels and structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) => "database_error",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::PermissionDenied(_) => "permission_denied",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InsufficientStock(_) => "insufficient_stock",
            ServiceError::NotAssigned(_) => "not_assigned",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::ConcurrentModification(_) => "concurrent_modification",
            ServiceError::EventError(_) => "event_error",
            ServiceError::Other(_) => "internal_error",
        }
    }

    /// Message safe to hand to external callers. Domain errors pass through
    /// verbatim; infrastructure failures are masked.
    pub fn response_message(&self) -> String {
        match self {
            ServiceError::DatabaseError(_) => "Database error".to_string(),
            ServiceError::EventError(_) => "Event processing error".to_string(),
            ServiceError::Other(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).kind(),
            "validation_error"
        );
        assert_eq!(
            ServiceError::PermissionDenied("x".into()).kind(),
            "permission_denied"
        );
        assert_eq!(ServiceError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).kind(),
            "insufficient_stock"
        );
        assert_eq!(ServiceError::NotAssigned("x".into()).kind(), "not_assigned");
        assert_eq!(
            ServiceError::ConcurrentModification(Uuid::new_v4()).kind(),
            "concurrent_modification"
        );
    }

    #[test]
    fn response_message_masks_infrastructure_failures() {
        assert_eq!(
            ServiceError::db_error("connection reset").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::Other(anyhow::anyhow!("boom")).response_message(),
            "Internal server error"
        );
    }

    #[test]
    fn domain_errors_pass_through_verbatim() {
        let err = ServiceError::PermissionDenied("Only owner can create company".into());
        assert_eq!(
            err.response_message(),
            "Permission denied: Only owner can create company"
        );

        let err = ServiceError::InsufficientStock("requested 4, available 2".into());
        assert_eq!(
            err.response_message(),
            "Insufficient stock: requested 4, available 2"
        );
    }

    #[test]
    fn validator_failures_fold_into_validation_error() {
        #[derive(Validate)]
        struct Probe {
            #[validate(range(min = 1, message = "Quantity must be positive"))]
            quantity: i32,
        }

        let err: ServiceError = Probe { quantity: 0 }.validate().unwrap_err().into();
        match err {
            ServiceError::ValidationError(msg) => {
                assert!(msg.contains("Quantity must be positive"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn db_error_accepts_plain_messages() {
        let err = ServiceError::db_error("timeout");
        assert!(matches!(err, ServiceError::DatabaseError(DbErr::Custom(_))));
    }
}
