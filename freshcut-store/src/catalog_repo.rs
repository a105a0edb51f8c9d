use async_trait::async_trait;
use freshcut_catalog::{CatalogRepository, VariantListing};
use freshcut_core::StoreResult;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::backend;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    variant_id: Uuid,
    product_id: Uuid,
    product_name: String,
    variant_label: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    variant_active: bool,
    product_active: bool,
}

impl From<ListingRow> for VariantListing {
    fn from(row: ListingRow) -> Self {
        Self {
            variant_id: row.variant_id,
            product_id: row.product_id,
            product_name: row.product_name,
            variant_label: row.variant_label,
            price: row.price,
            discount_price: row.discount_price,
            variant_active: row.variant_active,
            product_active: row.product_active,
        }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn fetch_orderable_variants(&self, variant_ids: &[Uuid]) -> StoreResult<Vec<VariantListing>> {
        let rows: Vec<ListingRow> = sqlx::query_as(
            r#"
            SELECT v.id AS variant_id, p.id AS product_id, p.name AS product_name,
                   v.label AS variant_label, v.price, v.discount_price,
                   v.is_active AS variant_active, p.is_active AS product_active
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.id = ANY($1) AND v.is_active AND p.is_active
            "#,
        )
        .bind(variant_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(VariantListing::from).collect())
    }
}
