pub mod product;
pub mod pricing;
pub mod repository;

pub use product::{Product, ProductVariant, VariantListing};
pub use pricing::{PriceResolver, PricingError, ResolvedPrice};
pub use repository::CatalogRepository;
