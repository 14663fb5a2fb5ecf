use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 400 on a request that carried a `page_info` cursor. Admin API
    /// cursors expire; the engine recovers by restarting from the origin.
    #[error("pagination cursor rejected by the Admin API: {cursor}")]
    CursorInvalid { cursor: String },

    #[error("rate limited by the Admin API (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("GraphQL request failed for {context}: {message}")]
    GraphQl { context: String, message: String },

    /// `metafieldsSet` returned `userErrors`: the write was understood but
    /// refused (bad type, missing owner, and so on).
    #[error("metafield write rejected: {}", reasons.join("; "))]
    MetafieldRejected { reasons: Vec<String> },

    #[error("invalid Admin API base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
