//! In-process stand-ins for the store, the carrier and notifiers.
//!
//! Everything here keeps state behind a plain mutex that is never held across an
//! await, so the atomicity the Postgres adapters get from constraints and
//! transactions holds here too. Faults can be injected to exercise the retry and
//! failure paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use freshcut_catalog::{CatalogRepository, Product, ProductVariant, VariantListing};
use freshcut_core::carrier::{CarrierClient, CarrierError, CarrierToken, ShipmentReceipt, ShipmentRequest};
use freshcut_core::notification::{NotifyError, OrderNotifier};
use freshcut_core::{StoreError, StoreResult};
use freshcut_shared::models::events::OrderCreatedEvent;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    Customer, CustomerRole, Fulfillment, FulfillmentStatus, NewCustomer, NewFulfillment, NewOrder,
    NewOrderItem, Order, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};
use crate::number::OrderNumberGenerator;
use crate::repository::{CustomerRepository, OrderRepository};

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, ProductVariant>,
    customers: HashMap<Uuid, Customer>,
    customer_by_phone: HashMap<String, Uuid>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashSet<String>,
    dispatch_claims: HashMap<Uuid, DateTime<Utc>>,
    reject_order_numbers: usize,
    fail_order_inserts: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    seeded_phones: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panicking test thread must not hide the state from the assertions that follow
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a product with a single variant. Returns `(product_id, variant_id)`.
    pub fn add_variant(
        &self,
        product_name: &str,
        label: &str,
        price: Decimal,
        discount_price: Option<Decimal>,
        variant_active: bool,
        product_active: bool,
    ) -> (Uuid, Uuid) {
        let product = Product {
            id: Uuid::new_v4(),
            name: product_name.to_string(),
            slug: product_name.to_lowercase().replace(' ', "-"),
            category: None,
            is_active: product_active,
        };
        let variant = ProductVariant {
            id: Uuid::new_v4(),
            product_id: product.id,
            label: label.to_string(),
            weight_grams: None,
            price,
            discount_price,
            is_active: variant_active,
        };
        let ids = (product.id, variant.id);

        let mut tables = self.tables();
        tables.products.insert(product.id, product);
        tables.variants.insert(variant.id, variant);
        ids
    }

    pub fn seed_customer(&self, name: &str, phone: &str) -> Customer {
        let mut tables = self.tables();
        upsert_customer(&mut tables, &NewCustomer {
            name: name.to_string(),
            phone: phone.to_string(),
            email: None,
        })
    }

    /// Insert a pending order of `lines` lines summing to `total`, for a fresh customer
    pub async fn seed_pending_order(&self, total: Decimal, lines: usize) -> Order {
        let lines = lines.max(1);
        let n = self.seeded_phones.fetch_add(1, Ordering::SeqCst);
        let phone = format!("7{:09}", n);
        let customer = self.seed_customer("Seeded Customer", &phone);

        let share = (total / Decimal::from(lines as u64)).round_dp(2);
        let mut remaining = total;
        let items = (0..lines)
            .map(|i| {
                let price = if i + 1 == lines { remaining } else { share };
                remaining -= price;
                NewOrderItem {
                    id: Uuid::new_v4(),
                    product_id: Uuid::new_v4(),
                    variant_id: Uuid::new_v4(),
                    product_name: format!("Item {}", i + 1),
                    variant_label: "500 g".to_string(),
                    quantity: 1,
                    unit_price: price,
                    total_price: price,
                    cut_type: None,
                }
            })
            .collect();

        let new_order = NewOrder {
            id: Uuid::new_v4(),
            order_number: OrderNumberGenerator::default().generate(),
            customer_id: customer.id,
            items,
            total_amount: total,
            payment_method: PaymentMethod::Cod,
            shipping_address: ShippingAddress {
                recipient_name: customer.name.clone(),
                phone: customer.phone.clone(),
                email: None,
                address: "1 Residency Road".to_string(),
                landmark: None,
                city: "Bengaluru".to_string(),
                state: Some("Karnataka".to_string()),
                pincode: "560025".to_string(),
            },
        };

        let mut tables = self.tables();
        insert_order(&mut tables, &new_order)
    }

    /// The next `n` order inserts fail with a duplicate order number
    pub fn reject_next_order_numbers(&self, n: usize) {
        self.tables().reject_order_numbers = n;
    }

    pub fn fail_order_inserts(&self, fail: bool) {
        self.tables().fail_order_inserts = fail;
    }

    pub fn get_order_now(&self, id: Uuid) -> Option<Order> {
        self.tables().orders.get(&id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.tables().orders.len()
    }

    pub fn customer_count(&self) -> usize {
        self.tables().customers.len()
    }

    pub fn fulfillment_count(&self) -> usize {
        self.tables().orders.values().filter(|o| o.fulfillment.is_some()).count()
    }
}

fn upsert_customer(tables: &mut Tables, contact: &NewCustomer) -> Customer {
    let existing_id = tables.customer_by_phone.get(&contact.phone).copied();
    if let Some(existing) = existing_id.and_then(|id| tables.customers.get_mut(&id)) {
        existing.name = contact.name.clone();
        if contact.email.is_some() {
            existing.email = contact.email.clone();
        }
        return existing.clone();
    }
    let customer = Customer {
        id: Uuid::new_v4(),
        name: contact.name.clone(),
        phone: contact.phone.clone(),
        email: contact.email.clone(),
        role: CustomerRole::Customer,
        created_at: Utc::now(),
    };
    tables.customer_by_phone.insert(customer.phone.clone(), customer.id);
    tables.customers.insert(customer.id, customer.clone());
    customer
}

fn insert_order(tables: &mut Tables, new_order: &NewOrder) -> Order {
    let now = Utc::now();
    let order = Order {
        id: new_order.id,
        order_number: new_order.order_number.clone(),
        customer_id: new_order.customer_id,
        items: new_order.items.iter().cloned().map(|item| item.into_order_item(new_order.id)).collect(),
        total_amount: new_order.total_amount,
        status: OrderStatus::Pending,
        payment_method: new_order.payment_method,
        payment_status: PaymentStatus::Pending,
        shipping_address: new_order.shipping_address.clone(),
        fulfillment: None,
        created_at: now,
        updated_at: now,
    };
    tables.order_numbers.insert(order.order_number.clone());
    tables.orders.insert(order.id, order.clone());
    order
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn fetch_orderable_variants(&self, variant_ids: &[Uuid]) -> StoreResult<Vec<VariantListing>> {
        let tables = self.tables();
        Ok(variant_ids.iter()
            .filter_map(|id| tables.variants.get(id))
            .filter_map(|variant| {
                tables.products.get(&variant.product_id)
                    .map(|product| VariantListing::from_parts(product, variant))
            })
            .filter(VariantListing::is_orderable)
            .collect())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn find_or_create(&self, contact: &NewCustomer) -> StoreResult<Customer> {
        let mut tables = self.tables();
        Ok(upsert_customer(&mut tables, contact))
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.tables().customers.get(&id).cloned())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &NewOrder) -> StoreResult<Order> {
        let mut tables = self.tables();
        if tables.fail_order_inserts {
            return Err(StoreError::Backend("simulated insert failure".to_string()));
        }
        if tables.reject_order_numbers > 0 {
            tables.reject_order_numbers -= 1;
            return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
        }
        if tables.order_numbers.contains(&order.order_number) {
            return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
        }
        Ok(insert_order(&mut tables, order))
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables().orders.get(&id).cloned())
    }

    async fn claim_dispatch(&self, order_id: Uuid, lease: Duration) -> StoreResult<bool> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::days(365));
        let mut tables = self.tables();
        let dispatchable = tables.orders.get(&order_id).is_some_and(Order::awaits_dispatch);
        let held = tables.dispatch_claims.get(&order_id)
            .is_some_and(|claimed_at| now.signed_duration_since(*claimed_at) < lease);
        if !dispatchable || held {
            return Ok(false);
        }
        tables.dispatch_claims.insert(order_id, now);
        Ok(true)
    }

    async fn release_dispatch(&self, order_id: Uuid) -> StoreResult<()> {
        self.tables().dispatch_claims.remove(&order_id);
        Ok(())
    }

    async fn attach_fulfillment(&self, order_id: Uuid, fulfillment: &NewFulfillment) -> StoreResult<Fulfillment> {
        let mut tables = self.tables();
        tables.dispatch_claims.remove(&order_id);
        let order = tables.orders.get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order_id)))?;
        if order.fulfillment.is_some() {
            return Err(StoreError::AlreadyFulfilled(order_id));
        }

        let now = Utc::now();
        let record = Fulfillment {
            id: Uuid::new_v4(),
            order_id,
            carrier_name: fulfillment.carrier_name.clone(),
            awb_number: fulfillment.awb_number.clone(),
            label_url: fulfillment.label_url.clone(),
            tracking_payload: fulfillment.tracking_payload.clone(),
            status: FulfillmentStatus::Booked,
            created_at: now,
        };
        order.fulfillment = Some(record.clone());
        if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Processing;
            order.updated_at = now;
        }
        Ok(record)
    }

    async fn list_undispatched(&self, min_age_seconds: i64, limit: i64) -> StoreResult<Vec<Order>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(min_age_seconds);
        let tables = self.tables();
        let mut orders: Vec<Order> = tables.orders.values()
            .filter(|o| o.awaits_dispatch() && o.created_at <= cutoff)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders.truncate(limit.max(0) as usize);
        Ok(orders)
    }
}

/// Carrier double. Succeeds unless a failure has been queued with `push_failure`.
pub struct ScriptedCarrier {
    configured: bool,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<CarrierError>>,
    last_request: Mutex<Option<ShipmentRequest>>,
    logins: AtomicUsize,
    shipments: AtomicUsize,
}

impl ScriptedCarrier {
    pub fn new() -> Self {
        Self {
            configured: true,
            delay: None,
            failures: Mutex::new(VecDeque::new()),
            last_request: Mutex::new(None),
            logins: AtomicUsize::new(0),
            shipments: AtomicUsize::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::new() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_failure(&self, error: CarrierError) {
        self.failures.lock().unwrap_or_else(|p| p.into_inner()).push_back(error);
    }

    pub fn login_calls(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn shipment_calls(&self) -> usize {
        self.shipments.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ShipmentRequest> {
        self.last_request.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for ScriptedCarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarrierClient for ScriptedCarrier {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn login(&self) -> Result<CarrierToken, CarrierError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.configured {
            return Err(CarrierError::NotConfigured);
        }
        Ok(CarrierToken { value: format!("token-{}", n), expires_at: None })
    }

    async fn create_shipment(&self, _token: &str, request: &ShipmentRequest) -> Result<ShipmentReceipt, CarrierError> {
        let n = self.shipments.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap_or_else(|p| p.into_inner()) = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.failures.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }
        Ok(ShipmentReceipt {
            awb_number: format!("AWB{:010}", n),
            carrier_name: self.name().to_string(),
            label_url: Some(format!("https://labels.invalid/{}.pdf", request.order_reference)),
            tracking_payload: serde_json::json!({ "order_reference": request.order_reference }),
        })
    }
}

/// Notifier double that records the order numbers it was told about
pub struct RecordingNotifier {
    channel: String,
    fail: bool,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            fail: false,
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(channel: &str) -> Self {
        Self { fail: true, ..Self::new(channel) }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn notify_order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Delivery(format!("{} gateway returned 503", self.channel)));
        }
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).push(event.order_number.clone());
        Ok(())
    }
}
