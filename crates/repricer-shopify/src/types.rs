//! Admin API payload types.
//!
//! REST responses are decoded tolerantly: the engine requests
//! `fields=id,title,variants` but stores on older API versions may send
//! more or less, so everything optional carries `#[serde(default)]`.
//! Prices arrive as decimal strings and stay strings here; parsing happens
//! where the number is used.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level response from `GET /admin/api/{v}/products.json`.
#[derive(Debug, Deserialize)]
pub struct ProductsEnvelope {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// One decoded catalog page plus the cursor for the page after it.
#[derive(Debug)]
pub struct ProductsPage {
    pub products: Vec<Product>,
    /// `None` on the final page.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    /// Current sale price as a decimal string (e.g. `"72000.00"`).
    pub price: String,
}

/// One row of the base-price browse listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseListRow {
    pub product: String,
    pub variant_id: i64,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub base_usd: Option<Decimal>,
}

// GraphQL wire types. The envelope is generic; `errors` is the transport-
// level failure channel, distinct from mutation `userErrors`.

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlErrorEntry {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantMetafieldData {
    #[serde(rename = "productVariant")]
    pub product_variant: Option<VariantMetafieldNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantMetafieldNode {
    pub metafield: Option<MetafieldValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetafieldValue {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetafieldsSetData {
    #[serde(rename = "metafieldsSet")]
    pub metafields_set: Option<MetafieldsSetPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetafieldsSetPayload {
    #[serde(default, rename = "userErrors")]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductVariantsData {
    #[serde(rename = "productVariants")]
    pub product_variants: Option<ProductVariantsConnection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductVariantsConnection {
    #[serde(default)]
    pub edges: Vec<ProductVariantEdge>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductVariantEdge {
    pub node: ProductVariantNode,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductVariantNode {
    pub id: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub product: Option<ProductTitle>,
    #[serde(default)]
    pub metafield: Option<MetafieldValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductTitle {
    pub title: String,
}

/// Admin API global id for a product variant.
#[must_use]
pub fn variant_gid(variant_id: i64) -> String {
    format!("gid://shopify/ProductVariant/{variant_id}")
}

/// Trailing numeric id of a Shopify gid, `None` when the tail is not a
/// number.
#[must_use]
pub fn numeric_id(gid: &str) -> Option<i64> {
    gid.rsplit('/').next()?.parse().ok()
}
