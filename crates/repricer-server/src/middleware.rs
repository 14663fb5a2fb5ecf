use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Admin key auth settings used by middleware.
#[derive(Clone)]
pub struct AuthState {
    admin_key: Arc<String>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `REPRICER_ADMIN_KEY`.
    ///
    /// In development, an empty/missing key disables auth for local
    /// iteration. In non-development envs, an empty/missing key fails
    /// startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let key = std::env::var("REPRICER_ADMIN_KEY")
            .unwrap_or_default()
            .trim()
            .to_owned();

        if key.is_empty() {
            if is_development {
                tracing::warn!(
                    "REPRICER_ADMIN_KEY not set; admin auth disabled in development environment"
                );
                return Ok(Self {
                    admin_key: Arc::new(String::new()),
                    enabled: false,
                });
            }

            anyhow::bail!("REPRICER_ADMIN_KEY is required outside development");
        }

        Ok(Self {
            admin_key: Arc::new(key),
            enabled: true,
        })
    }

    /// Auth enabled with exactly `key`, for router tests.
    #[cfg(test)]
    pub(crate) fn with_key(key: &str) -> Self {
        Self {
            admin_key: Arc::new(key.to_string()),
            enabled: true,
        }
    }

    /// Constant-time comparison against the configured key.
    fn allows(&self, presented: &str) -> bool {
        self.admin_key.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("admin_key", &"[redacted]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing the admin key when enabled.
///
/// The key is accepted from the `x-admin-key` header or a `?key=` query
/// parameter; either one is compared in constant time.
pub async fn require_admin_key(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let presented = header_key(&req).or_else(|| query_key(req.uri().query()));

    match presented {
        Some(key) if auth.allows(key) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "unauthorized",
                    message: "missing or invalid admin key",
                },
            }),
        )
            .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "rate_limited",
                    message: "rate limit exceeded",
                },
            }),
        )
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn header_key(req: &Request) -> Option<&str> {
    req.headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn query_key(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find_map(|(name, value)| (name == "key" && !value.is_empty()).then_some(value))
}
