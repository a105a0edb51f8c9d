use async_trait::async_trait;
use freshcut_core::{StoreError, StoreResult};
use freshcut_order::models::{
    Fulfillment, FulfillmentStatus, NewFulfillment, NewOrder, Order, OrderItem, ParseEnumError,
    ShippingAddress,
};
use freshcut_order::OrderRepository;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::database::{backend, unique_violation};

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";
const FULFILLMENT_ORDER_CONSTRAINT: &str = "fulfillments_order_id_key";

const ORDER_COLUMNS: &str = "id, order_number, customer_id, total_amount, status, payment_method, \
                             payment_status, shipping_address, created_at, updated_at";

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    total_amount: Decimal,
    status: String,
    payment_method: String,
    payment_status: String,
    shipping_address: Json<ShippingAddress>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    variant_id: Uuid,
    product_name: String,
    variant_label: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
    cut_type: Option<String>,
}

#[derive(sqlx::FromRow)]
struct FulfillmentRow {
    id: Uuid,
    order_id: Uuid,
    carrier_name: String,
    awb_number: String,
    label_url: Option<String>,
    tracking_payload: Value,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

fn corrupt(e: ParseEnumError) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            product_name: row.product_name,
            variant_label: row.variant_label,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
            cut_type: row.cut_type,
        }
    }
}

impl TryFrom<FulfillmentRow> for Fulfillment {
    type Error = StoreError;

    fn try_from(row: FulfillmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            carrier_name: row.carrier_name,
            awb_number: row.awb_number,
            label_url: row.label_url,
            tracking_payload: row.tracking_payload,
            status: row.status.parse::<FulfillmentStatus>().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, fulfillment: Option<Fulfillment>) -> StoreResult<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_id: self.customer_id,
            items,
            total_amount: self.total_amount,
            status: self.status.parse().map_err(corrupt)?,
            payment_method: self.payment_method.parse().map_err(corrupt)?,
            payment_status: self.payment_status.parse().map_err(corrupt)?,
            shipping_address: self.shipping_address.0,
            fulfillment,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PgOrderRepository {
    async fn load(&self, row: OrderRow) -> StoreResult<Order> {
        let items: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, variant_id, product_name, variant_label,
                   quantity, unit_price, total_price, cut_type
            FROM order_items WHERE order_id = $1 ORDER BY position
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let fulfillment: Option<FulfillmentRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, carrier_name, awb_number, label_url, tracking_payload, status, created_at
            FROM fulfillments WHERE order_id = $1
            "#,
        )
        .bind(row.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let items = items.into_iter().map(OrderItem::from).collect();
        let fulfillment = fulfillment.map(Fulfillment::try_from).transpose()?;
        row.into_order(items, fulfillment)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &NewOrder) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let inserted: Result<OrderRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO orders (id, order_number, customer_id, total_amount, status,
                                payment_method, payment_status, shipping_address)
            VALUES ($1, $2, $3, $4, 'pending', $5, 'pending', $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(order.total_amount)
        .bind(order.payment_method.as_str())
        .bind(Json(&order.shipping_address))
        .fetch_one(&mut *tx)
        .await;

        let header = match inserted {
            Ok(row) => row,
            Err(e) if unique_violation(&e).as_deref() == Some(ORDER_NUMBER_CONSTRAINT) => {
                // Dropping the transaction rolls it back
                return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
            }
            Err(e) => return Err(backend(e)),
        };

        let mut items = Vec::with_capacity(order.items.len());
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, variant_id, product_name, variant_label,
                                         quantity, unit_price, total_price, cut_type, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.product_name)
            .bind(&item.variant_label)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .bind(&item.cut_type)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            items.push(item.clone().into_order_item(order.id));
        }

        tx.commit().await.map_err(backend)?;

        header.into_order(items, None)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => self.load(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn claim_dispatch(&self, order_id: Uuid, lease: Duration) -> StoreResult<bool> {
        // Single statement, so two dispatchers racing on the same row serialise on its lock
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE orders o SET dispatch_claimed_at = NOW()
            WHERE o.id = $1
              AND o.status = 'pending'
              AND (o.dispatch_claimed_at IS NULL OR o.dispatch_claimed_at <= NOW() - make_interval(secs => $2))
              AND NOT EXISTS (SELECT 1 FROM fulfillments f WHERE f.order_id = o.id)
            RETURNING o.id
            "#,
        )
        .bind(order_id)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(claimed.is_some())
    }

    async fn release_dispatch(&self, order_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET dispatch_claimed_at = NULL WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn attach_fulfillment(&self, order_id: Uuid, fulfillment: &NewFulfillment) -> StoreResult<Fulfillment> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let inserted: Result<FulfillmentRow, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO fulfillments (id, order_id, carrier_name, awb_number, label_url, tracking_payload, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'booked')
            RETURNING id, order_id, carrier_name, awb_number, label_url, tracking_payload, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(&fulfillment.carrier_name)
        .bind(&fulfillment.awb_number)
        .bind(&fulfillment.label_url)
        .bind(&fulfillment.tracking_payload)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if unique_violation(&e).as_deref() == Some(FULFILLMENT_ORDER_CONSTRAINT) => {
                return Err(StoreError::AlreadyFulfilled(order_id));
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(StoreError::NotFound(format!("order {}", order_id)));
            }
            Err(e) => return Err(backend(e)),
        };

        sqlx::query(
            "UPDATE orders SET status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END, \
             dispatch_claimed_at = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        row.try_into()
    }

    async fn list_undispatched(&self, min_age_seconds: i64, limit: i64) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders o
            WHERE o.status = 'pending'
              AND o.created_at <= NOW() - make_interval(secs => $1)
              AND NOT EXISTS (SELECT 1 FROM fulfillments f WHERE f.order_id = o.id)
            ORDER BY o.created_at
            LIMIT $2
            "#
        ))
        .bind(min_age_seconds as f64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.load(row).await?);
        }
        Ok(orders)
    }
}
