use async_trait::async_trait;
use freshcut_core::StoreResult;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{Customer, Fulfillment, NewCustomer, NewFulfillment, NewOrder, Order};

/// Repository trait for customer records
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Atomic find-or-create keyed on the phone number. Two concurrent calls with the
    /// same new phone must yield the same customer, never two rows. An existing
    /// customer takes the new name, and the new email when one is given.
    async fn find_or_create(&self, contact: &NewCustomer) -> StoreResult<Customer>;

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert header and lines in one transaction with status and payment status
    /// `pending`. A clash on the order number surfaces as
    /// `StoreError::DuplicateOrderNumber` and leaves nothing behind.
    async fn insert_order(&self, order: &NewOrder) -> StoreResult<Order>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Take the exclusive right to book a shipment for a pending order with no
    /// fulfillment. Returns `false` while another dispatch holds a claim younger than
    /// `lease`, or when the order is no longer dispatchable.
    async fn claim_dispatch(&self, order_id: Uuid, lease: Duration) -> StoreResult<bool>;

    /// Give a claim back after the carrier call failed
    async fn release_dispatch(&self, order_id: Uuid) -> StoreResult<()>;

    /// Persist the shipment, move the order `pending -> processing` and clear any
    /// dispatch claim, atomically. Fails with `StoreError::AlreadyFulfilled` if the
    /// order already has one.
    async fn attach_fulfillment(&self, order_id: Uuid, fulfillment: &NewFulfillment) -> StoreResult<Fulfillment>;

    /// Pending orders without a fulfillment created at least `min_age_seconds` ago,
    /// oldest first
    async fn list_undispatched(&self, min_age_seconds: i64, limit: i64) -> StoreResult<Vec<Order>>;
}
