use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog product (e.g. "Chicken Breast, Boneless")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: Option<String>,
    pub is_active: bool,
}

/// A purchasable SKU of a product, distinguished by pack size or weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Pack label shown to customers, e.g. "500 g" or "1 kg"
    pub label: String,
    pub weight_grams: Option<i32>,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub is_active: bool,
}

/// A variant joined with the parent product fields pricing depends on.
/// This is the shape the catalog store hands to the price resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantListing {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_label: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub variant_active: bool,
    pub product_active: bool,
}

impl VariantListing {
    pub fn from_parts(product: &Product, variant: &ProductVariant) -> Self {
        Self {
            variant_id: variant.id,
            product_id: product.id,
            product_name: product.name.clone(),
            variant_label: variant.label.clone(),
            price: variant.price,
            discount_price: variant.discount_price,
            variant_active: variant.is_active,
            product_active: product.is_active,
        }
    }

    /// Inactive variant or inactive product means the SKU cannot be ordered
    pub fn is_orderable(&self) -> bool {
        self.variant_active && self.product_active
    }

    /// Discount price when one is set and the SKU is live, base price otherwise
    pub fn effective_unit_price(&self) -> Decimal {
        match self.discount_price {
            Some(discount) if self.is_orderable() => discount,
            _ => self.price,
        }
    }
}
