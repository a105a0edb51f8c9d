use std::sync::Arc;

use crate::assembler::{CheckoutError, CommittedOrder, OrderAssembler};
use crate::cart::{CheckoutIdentity, CheckoutRequest};
use crate::fulfillment::FulfillmentDispatcher;
use crate::models::PlacedOrder;
use crate::notification::{order_created_event, NotificationDispatcher};

/// Entry point for placing an order.
///
/// The response depends only on the order transaction. Carrier hand-off and
/// notifications are started after commit and never awaited here.
pub struct CheckoutService {
    assembler: OrderAssembler,
    fulfillment: Arc<FulfillmentDispatcher>,
    notifications: NotificationDispatcher,
    auto_dispatch: bool,
}

impl CheckoutService {
    pub fn new(
        assembler: OrderAssembler,
        fulfillment: Arc<FulfillmentDispatcher>,
        notifications: NotificationDispatcher,
        auto_dispatch: bool,
    ) -> Self {
        Self { assembler, fulfillment, notifications, auto_dispatch }
    }

    pub fn fulfillment(&self) -> &Arc<FulfillmentDispatcher> {
        &self.fulfillment
    }

    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
        identity: CheckoutIdentity,
    ) -> Result<PlacedOrder, CheckoutError> {
        let CommittedOrder { order, customer } = self.assembler.place_order(request, identity).await?;

        if self.auto_dispatch {
            self.fulfillment.spawn_dispatch(order.id);
        }
        self.notifications.notify_order_created(order_created_event(&order, &customer));

        Ok(PlacedOrder::from(&order))
    }
}
