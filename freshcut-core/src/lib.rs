pub mod carrier;
pub mod notification;
pub mod repository;

pub use repository::{StoreError, StoreResult};
