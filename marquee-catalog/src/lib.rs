pub mod pricing;
pub mod inventory;

pub use pricing::{format_amount, PricingConfig, PricingEngine, PricingError};
pub use inventory::{load_seed_file, CatalogError, InMemoryResourceCatalog};
