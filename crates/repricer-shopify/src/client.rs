//! HTTP client for the Shopify Admin API.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use repricer_core::numeric::parse_flexible;
use repricer_core::pricing::to_money;

use crate::error::ShopifyError;
use crate::pagination::extract_next_cursor;
use crate::types::{
    numeric_id, variant_gid, BaseListRow, GraphQlEnvelope, GraphQlRequest, MetafieldsSetData,
    ProductVariantsData, ProductsEnvelope, ProductsPage, VariantMetafieldData,
};

/// Metafield coordinates of the stored USD base price.
pub const METAFIELD_NAMESPACE: &str = "pricing";
pub const METAFIELD_KEY: &str = "base_usd";

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const READ_BASE_QUERY: &str = r#"
query VariantBase($id: ID!) {
  productVariant(id: $id) {
    metafield(namespace: "pricing", key: "base_usd") { value }
  }
}"#;

const UPSERT_BASE_MUTATION: &str = r#"
mutation SetVariantBase($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { id }
    userErrors { field message }
  }
}"#;

const BASE_LIST_QUERY: &str = r#"
query BaseList($first: Int!, $query: String) {
  productVariants(first: $first, query: $query) {
    edges {
      node {
        id
        sku
        price
        product { title }
        metafield(namespace: "pricing", key: "base_usd") { value }
      }
    }
  }
}"#;

/// Authenticated Admin API client bound to one store.
///
/// Construct with [`AdminClient::new`] for a real store or
/// [`AdminClient::with_base_url`] to aim at a mock server in tests.
#[derive(Debug)]
pub struct AdminClient {
    http: Client,
    base_url: String,
    token: String,
    api_version: String,
}

impl AdminClient {
    /// Client for `https://{store_domain}`.
    ///
    /// # Errors
    ///
    /// [`ShopifyError::InvalidBaseUrl`] when the domain does not form a
    /// valid URL, [`ShopifyError::Http`] when the underlying client cannot
    /// be built.
    pub fn new(
        store_domain: &str,
        admin_token: &str,
        api_version: &str,
        timeout_secs: u64,
    ) -> Result<Self, ShopifyError> {
        Self::with_base_url(
            format!("https://{store_domain}"),
            admin_token,
            api_version,
            timeout_secs,
        )
    }

    /// Client with an explicit base URL, for pointing tests at a local
    /// mock server.
    ///
    /// # Errors
    ///
    /// Same as [`AdminClient::new`].
    pub fn with_base_url(
        base_url: impl Into<String>,
        admin_token: &str,
        api_version: &str,
        timeout_secs: u64,
    ) -> Result<Self, ShopifyError> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| ShopifyError::InvalidBaseUrl {
            base_url: base_url.clone(),
            reason: e.to_string(),
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: admin_token.to_string(),
            api_version: api_version.to_string(),
        })
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/admin/api/{}/{path}", self.base_url, self.api_version)
    }

    /// Fetch one catalog page.
    ///
    /// Origin requests (no cursor) filter to active products, restrict the
    /// payload to the fields the engine reads, and fix the order for a
    /// deterministic walk. Cursor requests must not repeat the filters —
    /// the Admin API rejects `page_info` combined with them.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::CursorInvalid`] — HTTP 400 on a cursor request;
    ///   the stored cursor has expired.
    /// - [`ShopifyError::RateLimited`] — HTTP 429.
    /// - [`ShopifyError::NotFound`] / [`ShopifyError::UnexpectedStatus`] —
    ///   other non-2xx statuses.
    /// - [`ShopifyError::Http`] / [`ShopifyError::Deserialize`] — transport
    ///   or body decode failure.
    pub async fn fetch_products_page(
        &self,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<ProductsPage, ShopifyError> {
        let url = self.products_url(page_size, cursor)?;
        let response = self
            .http
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            if let Some(cursor) = cursor {
                return Err(ShopifyError::CursorInvalid {
                    cursor: cursor.to_string(),
                });
            }
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ShopifyError::RateLimited {
                retry_after_secs: retry_after_of(&response),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ShopifyError::NotFound { url });
        }
        if !status.is_success() {
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        // Take the Link header before the body consumes the response.
        let link_header = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response.text().await?;
        let envelope = serde_json::from_str::<ProductsEnvelope>(&body).map_err(|e| {
            ShopifyError::Deserialize {
                context: "products page".to_string(),
                source: e,
            }
        })?;

        Ok(ProductsPage {
            products: envelope.products,
            next_cursor: extract_next_cursor(link_header.as_deref()),
        })
    }

    /// Read the stored USD base price metafield, raw.
    ///
    /// `None` when the variant is gone or carries no base price.
    ///
    /// # Errors
    ///
    /// Transport, status, and GraphQL failures; never `Ok(None)` for those,
    /// so a flaky read cannot masquerade as a missing base.
    pub async fn read_base_usd(&self, variant_id: i64) -> Result<Option<String>, ShopifyError> {
        let variables = serde_json::json!({ "id": variant_gid(variant_id) });
        let data: VariantMetafieldData = self
            .post_graphql(READ_BASE_QUERY, variables, "variant base price read")
            .await?;
        Ok(data
            .product_variant
            .and_then(|variant| variant.metafield)
            .map(|metafield| metafield.value))
    }

    /// Write the USD base price metafield (`number_decimal`, two decimals).
    ///
    /// # Errors
    ///
    /// [`ShopifyError::MetafieldRejected`] when the mutation returns
    /// `userErrors`; transport/status/GraphQL failures otherwise.
    pub async fn upsert_base_usd(
        &self,
        variant_id: i64,
        value: Decimal,
    ) -> Result<(), ShopifyError> {
        let variables = serde_json::json!({
            "metafields": [{
                "ownerId": variant_gid(variant_id),
                "namespace": METAFIELD_NAMESPACE,
                "key": METAFIELD_KEY,
                "type": "number_decimal",
                "value": format!("{value:.2}"),
            }]
        });
        let data: MetafieldsSetData = self
            .post_graphql(UPSERT_BASE_MUTATION, variables, "variant base price write")
            .await?;

        let payload = data
            .metafields_set
            .ok_or_else(|| ShopifyError::GraphQl {
                context: "variant base price write".to_string(),
                message: "metafieldsSet payload missing from response".to_string(),
            })?;
        if payload.user_errors.is_empty() {
            Ok(())
        } else {
            Err(ShopifyError::MetafieldRejected {
                reasons: payload
                    .user_errors
                    .into_iter()
                    .map(|error| error.message)
                    .collect(),
            })
        }
    }

    /// Rewrite a variant's sale price (integer local currency).
    ///
    /// # Errors
    ///
    /// [`ShopifyError::NotFound`] when the variant no longer exists;
    /// transport and status failures otherwise.
    pub async fn update_variant_price(
        &self,
        variant_id: i64,
        price: i64,
    ) -> Result<(), ShopifyError> {
        let url = self.rest_url(&format!("variants/{variant_id}.json"));
        let body = serde_json::json!({ "variant": { "id": variant_id, "price": price } });
        let response = self
            .http
            .put(&url)
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ShopifyError::NotFound { url });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ShopifyError::RateLimited {
                retry_after_secs: retry_after_of(&response),
            });
        }
        if !status.is_success() {
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }

    /// Browse variants with their stored base prices, newest ids last.
    ///
    /// Rows whose gid does not parse are dropped with a warning rather
    /// than failing the whole listing.
    ///
    /// # Errors
    ///
    /// Transport, status, and GraphQL failures.
    pub async fn fetch_base_list(
        &self,
        search: Option<&str>,
        first: u32,
    ) -> Result<Vec<BaseListRow>, ShopifyError> {
        let variables = serde_json::json!({ "first": first.clamp(1, 100), "query": search });
        let data: ProductVariantsData = self
            .post_graphql(BASE_LIST_QUERY, variables, "base price listing")
            .await?;

        let edges = data
            .product_variants
            .map(|connection| connection.edges)
            .unwrap_or_default();

        Ok(edges
            .into_iter()
            .filter_map(|edge| {
                let node = edge.node;
                let Some(variant_id) = numeric_id(&node.id) else {
                    tracing::warn!(gid = %node.id, "skipping base-list row with unparsable gid");
                    return None;
                };
                Some(BaseListRow {
                    product: node
                        .product
                        .map(|product| product.title)
                        .unwrap_or_default(),
                    variant_id,
                    sku: node.sku.filter(|sku| !sku.is_empty()),
                    price: node.price.as_deref().and_then(parse_flexible),
                    base_usd: node
                        .metafield
                        .and_then(|metafield| parse_flexible(&metafield.value))
                        .and_then(to_money),
                })
            })
            .collect())
    }

    async fn post_graphql<T: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
        context: &str,
    ) -> Result<T, ShopifyError> {
        let url = self.rest_url("graphql.json");
        let response = self
            .http
            .post(&url)
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ShopifyError::RateLimited {
                retry_after_secs: retry_after_of(&response),
            });
        }
        if !status.is_success() {
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let envelope =
            serde_json::from_str::<GraphQlEnvelope<T>>(&body).map_err(|e| {
                ShopifyError::Deserialize {
                    context: context.to_string(),
                    source: e,
                }
            })?;

        if let Some(error) = envelope.errors.first() {
            return Err(ShopifyError::GraphQl {
                context: context.to_string(),
                message: error.message.clone(),
            });
        }
        envelope.data.ok_or_else(|| ShopifyError::GraphQl {
            context: context.to_string(),
            message: "response carried neither data nor errors".to_string(),
        })
    }

    fn products_url(&self, page_size: u32, cursor: Option<&str>) -> Result<String, ShopifyError> {
        let base = self.rest_url("products.json");
        let mut url =
            reqwest::Url::parse(&base).map_err(|e| ShopifyError::InvalidBaseUrl {
                base_url: base.clone(),
                reason: e.to_string(),
            })?;

        url.query_pairs_mut()
            .append_pair("limit", &page_size.to_string());
        match cursor {
            Some(cursor) => {
                url.query_pairs_mut().append_pair("page_info", cursor);
            }
            None => {
                url.query_pairs_mut()
                    .append_pair("status", "active")
                    .append_pair("fields", "id,title,variants")
                    .append_pair("order", "title asc");
            }
        }
        Ok(url.to_string())
    }
}

fn retry_after_of(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AdminClient {
        AdminClient::with_base_url("http://127.0.0.1:9", "shpat_test", "2024-10", 5).unwrap()
    }

    #[test]
    fn origin_request_carries_filters() {
        let url = client().products_url(25, None).unwrap();
        assert!(url.starts_with("http://127.0.0.1:9/admin/api/2024-10/products.json?"));
        assert!(url.contains("limit=25"));
        assert!(url.contains("status=active"));
        assert!(url.contains("fields=id%2Ctitle%2Cvariants"));
        assert!(url.contains("order=title+asc"));
        assert!(!url.contains("page_info"));
    }

    #[test]
    fn cursor_request_carries_only_limit_and_cursor() {
        let url = client().products_url(25, Some("CURSOR123")).unwrap();
        assert!(url.contains("limit=25"));
        assert!(url.contains("page_info=CURSOR123"));
        assert!(!url.contains("status=active"));
        assert!(!url.contains("fields="));
    }

    #[test]
    fn new_builds_https_base_from_domain() {
        let client = AdminClient::new("example.myshopify.com", "shpat_x", "2024-10", 5).unwrap();
        assert_eq!(
            client.rest_url("graphql.json"),
            "https://example.myshopify.com/admin/api/2024-10/graphql.json"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_trimmed() {
        let client = AdminClient::with_base_url("http://localhost:8080/", "t", "2024-10", 5).unwrap();
        assert_eq!(
            client.rest_url("products.json"),
            "http://localhost:8080/admin/api/2024-10/products.json"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = AdminClient::with_base_url("not a url", "t", "2024-10", 5).unwrap_err();
        assert!(matches!(err, ShopifyError::InvalidBaseUrl { .. }));
    }
}
