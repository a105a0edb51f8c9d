use async_trait::async_trait;
use freshcut_core::StoreResult;
use uuid::Uuid;

use crate::product::VariantListing;

/// Read access to authoritative catalog prices
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Listings for the given variant ids, restricted to active variants whose parent
    /// product is active. Ids that are unknown or inactive are simply absent.
    async fn fetch_orderable_variants(&self, variant_ids: &[Uuid]) -> StoreResult<Vec<VariantListing>>;
}
