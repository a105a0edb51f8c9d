use freshcut_catalog::{PriceResolver, ResolvedPrice};
use freshcut_core::StoreError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cart::{CheckoutIdentity, CheckoutRequest, ValidatedCheckout, ValidatedLine, ValidationError};
use crate::models::{Customer, NewOrder, NewOrderItem, Order};
use crate::number::OrderNumberGenerator;
use crate::repository::{CustomerRepository, OrderRepository};

/// How many fresh order numbers to try before giving up on a checkout
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// A committed order together with the customer it belongs to
#[derive(Debug, Clone)]
pub struct CommittedOrder {
    pub order: Order,
    pub customer: Customer,
}

/// Turns a submitted cart into a committed, server-priced order.
///
/// Nothing here talks to the network besides the store, and the only write that
/// can partially succeed is the customer upsert, which is idempotent.
pub struct OrderAssembler {
    pricing: PriceResolver,
    customers: Arc<dyn CustomerRepository>,
    orders: Arc<dyn OrderRepository>,
    numbers: OrderNumberGenerator,
}

impl OrderAssembler {
    pub fn new(
        pricing: PriceResolver,
        customers: Arc<dyn CustomerRepository>,
        orders: Arc<dyn OrderRepository>,
        numbers: OrderNumberGenerator,
    ) -> Self {
        Self { pricing, customers, orders, numbers }
    }

    pub async fn place_order(
        &self,
        request: &CheckoutRequest,
        identity: CheckoutIdentity,
    ) -> Result<CommittedOrder, CheckoutError> {
        // 1. Validate before any read or write
        let checkout = request.validate()?;

        // 2. Authoritative prices
        let variant_ids: Vec<Uuid> = checkout.lines.iter().map(|l| l.variant_id).collect();
        let prices = self.pricing.resolve(&variant_ids).await.map_err(|e| {
            error!("Price resolution failed: {}", e);
            CheckoutError::Internal(e.to_string())
        })?;

        // 3. Line and order totals
        let (items, total_amount) = price_lines(&checkout.lines, &prices)?;
        if let Some(client_total) = checkout.client_total {
            if client_total != total_amount {
                debug!("Discarding client total {} in favour of computed {}", client_total, total_amount);
            }
        }

        // 4. Customer
        let customer = self.resolve_customer(&checkout, identity).await?;

        // 5 + 6. Order number and atomic insert
        let order = self.insert_with_fresh_number(&checkout, &customer, items, total_amount).await?;

        info!(
            "Order {} placed for customer {} ({}): {} lines, total {}",
            order.order_number,
            customer.id,
            freshcut_shared::Masked::new(&customer.phone),
            order.item_count(),
            order.total_amount
        );

        Ok(CommittedOrder { order, customer })
    }

    async fn resolve_customer(
        &self,
        checkout: &ValidatedCheckout,
        identity: CheckoutIdentity,
    ) -> Result<Customer, CheckoutError> {
        match identity {
            CheckoutIdentity::Guest => self.customers.find_or_create(&checkout.contact).await
                .map_err(|e| {
                    error!("Customer upsert failed: {}", e);
                    CheckoutError::Internal(e.to_string())
                }),
            CheckoutIdentity::Session(customer_id) => self.customers.get_customer(customer_id).await
                .map_err(|e| {
                    error!("Customer lookup for {} failed: {}", customer_id, e);
                    CheckoutError::Internal(e.to_string())
                })?
                .ok_or(CheckoutError::UnknownCustomer),
        }
    }

    async fn insert_with_fresh_number(
        &self,
        checkout: &ValidatedCheckout,
        customer: &Customer,
        items: Vec<NewOrderItem>,
        total_amount: Decimal,
    ) -> Result<Order, CheckoutError> {
        let mut new_order = NewOrder {
            id: Uuid::new_v4(),
            order_number: self.numbers.generate(),
            customer_id: customer.id,
            items,
            total_amount,
            payment_method: checkout.payment_method,
            shipping_address: checkout.shipping_address.clone(),
        };

        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            match self.orders.insert_order(&new_order).await {
                Ok(order) => return Ok(order),
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    warn!("Order number {} already taken (attempt {}), regenerating", number, attempt);
                    new_order.order_number = self.numbers.generate();
                }
                Err(e) => {
                    error!("Order insert failed for customer {}: {}", customer.id, e);
                    return Err(CheckoutError::Internal(e.to_string()));
                }
            }
        }

        error!("Gave up after {} order number collisions", MAX_ORDER_NUMBER_ATTEMPTS);
        Err(CheckoutError::Internal("order number space exhausted".to_string()))
    }
}

/// Price every validated line against the resolved catalog prices.
/// Fails on the first line whose variant is unavailable or belongs to another product.
pub fn price_lines(
    lines: &[ValidatedLine],
    prices: &HashMap<Uuid, ResolvedPrice>,
) -> Result<(Vec<NewOrderItem>, Decimal), CheckoutError> {
    let mut items = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in lines {
        let price = prices.get(&line.variant_id)
            .filter(|p| p.is_orderable)
            .ok_or(CheckoutError::Unavailable {
                position: line.position,
                variant_id: line.variant_id,
            })?;

        if price.product_id != line.product_id {
            return Err(CheckoutError::ProductMismatch {
                position: line.position,
                product_id: line.product_id,
                variant_id: line.variant_id,
            });
        }

        let line_total = price.effective_unit_price
            .checked_mul(Decimal::from(line.quantity))
            .ok_or_else(|| CheckoutError::Internal(format!("line {} total overflowed", line.position)))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| CheckoutError::Internal("order total overflowed".to_string()))?;

        items.push(NewOrderItem {
            id: Uuid::new_v4(),
            product_id: price.product_id,
            variant_id: line.variant_id,
            product_name: price.product_name.clone(),
            variant_label: price.variant_label.clone(),
            quantity: line.quantity,
            unit_price: price.effective_unit_price,
            total_price: line_total,
            cut_type: line.cut_type.clone(),
        });
    }

    Ok((items, total))
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Item {position}: variant {variant_id} is not available")]
    Unavailable { position: usize, variant_id: Uuid },

    #[error("Item {position}: variant {variant_id} does not belong to product {product_id}")]
    ProductMismatch { position: usize, product_id: Uuid, variant_id: Uuid },

    #[error("Customer account not found")]
    UnknownCustomer,

    #[error("Unable to process order: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Caused by what the client sent, as opposed to a server-side failure
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CheckoutError::Internal(_))
    }

    /// Message safe to return to the client. Server-side detail is never included.
    pub fn public_message(&self) -> String {
        match self {
            CheckoutError::Internal(_) => "Unable to process order".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, CustomerPayload};
    use crate::memory::MemoryStore;
    use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};
    use freshcut_catalog::CatalogRepository;

    fn customer_payload(phone: &str) -> CustomerPayload {
        CustomerPayload {
            name: "Ravi Kumar".to_string(),
            phone: phone.to_string(),
            email: None,
            address: "44 Linking Road".to_string(),
            landmark: None,
            city: "Mumbai".to_string(),
            state: Some("Maharashtra".to_string()),
            pincode: "400050".to_string(),
        }
    }

    fn request(items: Vec<CartItem>, phone: &str) -> CheckoutRequest {
        CheckoutRequest {
            items,
            customer: customer_payload(phone),
            payment_method: PaymentMethod::Cod,
            total_amount: None,
        }
    }

    fn line(product_id: Uuid, variant_id: Uuid, quantity: i64) -> CartItem {
        CartItem { product_id, variant_id, quantity, cut_type: None }
    }

    fn assembler(store: &Arc<MemoryStore>) -> OrderAssembler {
        let catalog: Arc<dyn CatalogRepository> = store.clone();
        OrderAssembler::new(
            PriceResolver::new(catalog),
            store.clone(),
            store.clone(),
            OrderNumberGenerator::default(),
        )
    }

    #[tokio::test]
    async fn test_total_is_computed_server_side() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Curry Cut", "500 g", Decimal::from(100), None, true, true);
        let assembler = assembler(&store);

        let mut req = request(vec![line(p1, v1, 2)], "9876543210");
        req.total_amount = Some(Decimal::from(1));
        let committed = assembler.place_order(&req, CheckoutIdentity::Guest).await.unwrap();

        let order = committed.order;
        assert_eq!(order.total_amount, Decimal::from(200));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].unit_price, Decimal::from(100));
        assert_eq!(order.items[0].total_price, Decimal::from(200));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.calculate_total(), order.total_amount);
        assert_eq!(order.shipping_address.pincode, "400050");
    }

    #[tokio::test]
    async fn test_discount_price_applies() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Mutton Keema", "500 g", Decimal::from(100), Some(Decimal::from(80)), true, true);
        let (p2, v2) = store.add_variant("Prawns", "250 g", Decimal::new(34950, 2), None, true, true);
        let assembler = assembler(&store);

        let req = request(vec![line(p1, v1, 3), line(p2, v2, 2)], "9876543210");
        let order = assembler.place_order(&req, CheckoutIdentity::Guest).await.unwrap().order;

        assert_eq!(order.items[0].unit_price, Decimal::from(80));
        // 3 x 80 + 2 x 349.50
        assert_eq!(order.total_amount, Decimal::new(93900, 2));
    }

    #[tokio::test]
    async fn test_inactive_product_rejected_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Fish Fillet", "1 kg", Decimal::from(500), None, true, false);
        let assembler = assembler(&store);

        let err = assembler.place_order(&request(vec![line(p1, v1, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Unavailable { position: 1, .. }));
        assert!(err.is_client_error());
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.customer_count(), 0);
    }

    #[tokio::test]
    async fn test_inactive_or_unknown_variant_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Wings", "500 g", Decimal::from(150), None, true, true);
        let (p2, v2) = store.add_variant("Chicken Liver", "250 g", Decimal::from(90), None, false, true);
        let assembler = assembler(&store);

        let err = assembler.place_order(
            &request(vec![line(p1, v1, 1), line(p2, v2, 1)], "9876543210"),
            CheckoutIdentity::Guest,
        ).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable { position: 2, .. }));

        let err = assembler.place_order(
            &request(vec![line(p1, Uuid::new_v4(), 1)], "9876543210"),
            CheckoutIdentity::Guest,
        ).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable { position: 1, .. }));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_product_variant_mismatch_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (p1, _v1) = store.add_variant("Goat Ribs", "500 g", Decimal::from(400), None, true, true);
        let (_p2, v2) = store.add_variant("Egg Tray", "30 pcs", Decimal::from(210), None, true, true);
        let assembler = assembler(&store);

        let err = assembler.place_order(&request(vec![line(p1, v2, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await
            .unwrap_err();

        match err {
            CheckoutError::ProductMismatch { position, product_id, variant_id } => {
                assert_eq!(position, 1);
                assert_eq!(product_id, p1);
                assert_eq!(variant_id, v2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_customer_is_reused() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Breast", "1 kg", Decimal::from(320), None, true, true);
        let assembler = assembler(&store);

        let first = assembler.place_order(&request(vec![line(p1, v1, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await.unwrap();
        let second = assembler.place_order(&request(vec![line(p1, v1, 2)], "+91 98765 43210"), CheckoutIdentity::Guest)
            .await.unwrap();

        assert_eq!(first.customer.id, second.customer.id);
        assert_eq!(store.customer_count(), 1);
        assert_ne!(first.order.order_number, second.order.order_number);
    }

    #[tokio::test]
    async fn test_returning_customer_contact_is_refreshed() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Breast", "1 kg", Decimal::from(320), None, true, true);
        let assembler = assembler(&store);

        let first = assembler.place_order(&request(vec![line(p1, v1, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await.unwrap();

        let mut req = request(vec![line(p1, v1, 1)], "9876543210");
        req.customer.name = "Asha R. Rao".to_string();
        req.customer.email = Some("asha.rao@example.com".to_string());
        let second = assembler.place_order(&req, CheckoutIdentity::Guest).await.unwrap();
        assert_eq!(second.customer.id, first.customer.id);
        assert_eq!(second.customer.name, "Asha R. Rao");
        assert_eq!(second.customer.email.as_deref(), Some("asha.rao@example.com"));

        let mut req = request(vec![line(p1, v1, 1)], "9876543210");
        req.customer.email = None;
        let third = assembler.place_order(&req, CheckoutIdentity::Guest).await.unwrap();
        assert_eq!(third.customer.email.as_deref(), Some("asha.rao@example.com"));
    }

    #[tokio::test]
    async fn test_concurrent_first_checkouts_share_one_customer() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Drumsticks", "500 g", Decimal::from(180), None, true, true);
        let assembler = Arc::new(assembler(&store));

        let a = {
            let assembler = assembler.clone();
            let req = request(vec![line(p1, v1, 1)], "9123456780");
            tokio::spawn(async move { assembler.place_order(&req, CheckoutIdentity::Guest).await })
        };
        let b = {
            let assembler = assembler.clone();
            let req = request(vec![line(p1, v1, 2)], "9123456780");
            tokio::spawn(async move { assembler.place_order(&req, CheckoutIdentity::Guest).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(store.customer_count(), 1);
        assert_eq!(store.order_count(), 2);
        assert_eq!(a.order.customer_id, b.order.customer_id);
    }

    #[tokio::test]
    async fn test_session_identity_uses_existing_account() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Pork Belly", "500 g", Decimal::from(450), None, true, true);
        let assembler = assembler(&store);
        let existing = store.seed_customer("Meera", "9000000001");

        let committed = assembler.place_order(
            &request(vec![line(p1, v1, 1)], "9876543210"),
            CheckoutIdentity::Session(existing.id),
        ).await.unwrap();
        assert_eq!(committed.order.customer_id, existing.id);

        let err = assembler.place_order(
            &request(vec![line(p1, v1, 1)], "9876543210"),
            CheckoutIdentity::Session(Uuid::new_v4()),
        ).await.unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownCustomer));
    }

    #[tokio::test]
    async fn test_order_number_collision_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Mince", "500 g", Decimal::from(220), None, true, true);
        store.reject_next_order_numbers(2);
        let assembler = assembler(&store);

        let order = assembler.place_order(&request(vec![line(p1, v1, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await
            .unwrap()
            .order;

        assert_eq!(store.order_count(), 1);
        assert!(order.order_number.starts_with("FC-"));
    }

    #[tokio::test]
    async fn test_persistent_collisions_fail_generically() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Mince", "500 g", Decimal::from(220), None, true, true);
        store.reject_next_order_numbers(MAX_ORDER_NUMBER_ATTEMPTS);
        let assembler = assembler(&store);

        let err = assembler.place_order(&request(vec![line(p1, v1, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await
            .unwrap_err();

        assert!(!err.is_client_error());
        assert_eq!(err.public_message(), "Unable to process order");
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_leaks_no_detail() {
        let store = Arc::new(MemoryStore::new());
        let (p1, v1) = store.add_variant("Chicken Mince", "500 g", Decimal::from(220), None, true, true);
        store.fail_order_inserts(true);
        let assembler = assembler(&store);

        let err = assembler.place_order(&request(vec![line(p1, v1, 1)], "9876543210"), CheckoutIdentity::Guest)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Internal(_)));
        assert!(!err.public_message().contains("simulated"));
        assert_eq!(store.order_count(), 0);
    }

    #[test]
    fn test_validation_error_is_client_error() {
        let err = CheckoutError::from(ValidationError::EmptyCart);
        assert!(err.is_client_error());
        assert_eq!(err.public_message(), "Cart is empty");
    }
}
