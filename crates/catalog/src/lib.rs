//! Catalog domain: enterprises, products, variants and hub-scoped stock views.
//!
//! Pure domain data consumed by the fulfillment engine; no IO, no HTTP.

pub mod enterprise;
pub mod product;
pub mod registry;
pub mod scope;

pub use enterprise::{Enterprise, EnterpriseId};
pub use product::{Product, ProductId, TaxCategory, TaxCategoryId, Variant, VariantId};
pub use registry::Catalog;
pub use scope::{HubOverrideScoper, NullScoper, StockScoper, StockSnapshot, VariantOverride};
