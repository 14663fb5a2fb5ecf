//! Shopify Admin API client for the repricer.
//!
//! Three surfaces, matching what the batch engine needs and nothing more:
//! REST `products.json` with cursor pagination for the catalog walk, the
//! GraphQL metafield read/`metafieldsSet` pair for the USD base price, and
//! a REST variant PUT for the sale price.

pub mod client;
pub mod error;
pub mod pager;
pub mod pagination;
pub mod throttle;
pub mod types;

pub use client::AdminClient;
pub use error::ShopifyError;
pub use pager::CatalogPager;
pub use throttle::Throttle;
pub use types::{BaseListRow, Product, ProductsPage, Variant};
