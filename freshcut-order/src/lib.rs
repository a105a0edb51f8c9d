pub mod models;
pub mod cart;
pub mod number;
pub mod repository;
pub mod assembler;
pub mod resiliency;
pub mod fulfillment;
pub mod notification;
pub mod checkout;
pub mod sweeper;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use models::{Order, OrderItem, OrderStatus, Fulfillment, PlacedOrder};
pub use cart::{CheckoutIdentity, CheckoutRequest, ValidationError};
pub use number::OrderNumberGenerator;
pub use repository::{CustomerRepository, OrderRepository};
pub use assembler::{CheckoutError, CommittedOrder, OrderAssembler};
pub use resiliency::CircuitBreaker;
pub use fulfillment::{DispatchSettings, FulfillmentDispatcher, FulfillmentError};
pub use notification::{NotificationDispatcher, TracingNotifier};
pub use checkout::CheckoutService;
pub use sweeper::{DispatchSweeper, SweepSettings};
