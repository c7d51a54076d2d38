use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid calendar date: {0}")]
    InvalidDate(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("Stale payment transition for booking {0}")]
    StaleTransition(Uuid),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    // Transaction contention; callers retry with fresh state up to a bound.
    #[error("Transaction conflict")]
    Conflict,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
