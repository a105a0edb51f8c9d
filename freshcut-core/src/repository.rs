/// Errors surfaced by store adapters. Unique-constraint violations the domain reacts
/// to get their own variants; everything else is opaque backend detail that must
/// only ever be logged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order number already taken: {0}")]
    DuplicateOrderNumber(String),

    #[error("Order {0} already has a fulfillment record")]
    AlreadyFulfilled(uuid::Uuid),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
