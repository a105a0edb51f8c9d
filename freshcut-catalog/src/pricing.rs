use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::CatalogRepository;

/// Authoritative price for one variant at the moment of lookup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedPrice {
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_label: String,
    pub effective_unit_price: Decimal,
    pub is_orderable: bool,
}

/// Resolves variant ids to server-side prices. Client-submitted prices never reach
/// this type, so everything downstream of it is tamper-proof.
pub struct PriceResolver {
    catalog: Arc<dyn CatalogRepository>,
}

impl PriceResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Look up prices for a set of variant ids. Duplicates are collapsed before the
    /// query. Ids missing from the result are not orderable.
    pub async fn resolve(&self, variant_ids: &[Uuid]) -> Result<HashMap<Uuid, ResolvedPrice>, PricingError> {
        let mut seen = HashSet::with_capacity(variant_ids.len());
        let distinct: Vec<Uuid> = variant_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if distinct.is_empty() {
            return Ok(HashMap::new());
        }

        let listings = self.catalog.fetch_orderable_variants(&distinct).await
            .map_err(|e| PricingError::CatalogUnavailable(e.to_string()))?;

        let mut prices = HashMap::with_capacity(listings.len());
        for listing in listings {
            // The store is supposed to filter these out already
            if !listing.is_orderable() {
                tracing::warn!(
                    "Catalog returned non-orderable variant {} for product {}; ignoring",
                    listing.variant_id, listing.product_id
                );
                continue;
            }
            let unit_price = listing.effective_unit_price();
            if unit_price.is_sign_negative() {
                tracing::error!("Variant {} has a negative price; ignoring", listing.variant_id);
                continue;
            }

            prices.insert(listing.variant_id, ResolvedPrice {
                product_id: listing.product_id,
                effective_unit_price: unit_price,
                product_name: listing.product_name,
                variant_label: listing.variant_label,
                is_orderable: true,
            });
        }

        tracing::debug!("Resolved {} of {} requested variants", prices.len(), distinct.len());
        Ok(prices)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Catalog lookup failed: {0}")]
    CatalogUnavailable(String),
}
