//! Tick state-machine tests: an in-memory store plus a wiremock Admin API.
//!
//! GraphQL reads and writes share one path and are told apart by request
//! body, `"query VariantBase"` for reads and `"metafieldsSet"` for writes.

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{
    body_string_contains, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repricer_core::{InMemoryJobStore, JobMode, JobParams, JobStore, OutcomeStatus, PriceJob};
use repricer_engine::{run_tick, start_job, TickLimits, TickOutcome};
use repricer_shopify::AdminClient;

const PRODUCTS_PATH: &str = "/admin/api/2024-10/products.json";
const GRAPHQL_PATH: &str = "/admin/api/2024-10/graphql.json";

const READ_NULL: &str = r#"{"data":{"productVariant":{"metafield":null}}}"#;
const READ_TEN: &str = r#"{"data":{"productVariant":{"metafield":{"value":"10.00"}}}}"#;
const UPSERT_OK: &str =
    r#"{"data":{"metafieldsSet":{"metafields":[{"id":"gid://shopify/Metafield/1"}],"userErrors":[]}}}"#;
const UPSERT_REJECTED: &str = r#"{"data":{"metafieldsSet":{"metafields":[],"userErrors":[{"field":["value"],"message":"Value is invalid"}]}}}"#;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn limits(variant_quota: u32, cursor_reset_limit: i32) -> TickLimits {
    TickLimits {
        page_size: 25,
        variant_quota,
        throttle_ms: 0,
        cursor_reset_limit,
    }
}

fn client_for(server: &MockServer) -> AdminClient {
    AdminClient::with_base_url(server.uri(), "shpat_test", "2024-10", 5).unwrap()
}

fn params(mode: JobMode) -> JobParams {
    JobParams {
        mode,
        rate: 7200.0,
        margin: 1.0,
        round_step: 100.0,
        total_variants_hint: None,
        cron_minutes: None,
    }
}

fn product(id: i64, title: &str, variants: &[(i64, &str)]) -> serde_json::Value {
    let variants: Vec<serde_json::Value> = variants
        .iter()
        .map(|(variant_id, price)| json!({ "id": variant_id, "price": price }))
        .collect();
    json!({ "id": id, "title": title, "variants": variants })
}

fn page_of(products: &[serde_json::Value]) -> serde_json::Value {
    json!({ "products": products })
}

fn next_link(server: &MockServer, cursor: &str) -> String {
    format!(
        "<{}{PRODUCTS_PATH}?limit=25&page_info={cursor}>; rel=\"next\"",
        server.uri()
    )
}

fn graphql_mock(discriminator: &str, body: &'static str) -> Mock {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains(discriminator))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
}

fn put_price_mock() -> Mock {
    Mock::given(method("PUT")).respond_with(
        ResponseTemplate::new(200).set_body_raw(r#"{"variant":{"id":0}}"#, "application/json"),
    )
}

async fn load(store: &InMemoryJobStore) -> PriceJob {
    store
        .load_job()
        .await
        .unwrap()
        .expect("job record should exist")
}

async fn statuses(store: &InMemoryJobStore) -> Vec<OutcomeStatus> {
    store
        .recent_log(100)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.status)
        .collect()
}

// ---------------------------------------------------------------------------
// Idle and completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tick_without_a_job_is_idle_and_silent() {
    let server = MockServer::start().await;
    let store = InMemoryJobStore::default();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(outcome, TickOutcome::Idle);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn tick_with_a_finished_job_is_idle() {
    let server = MockServer::start().await;
    let store = InMemoryJobStore::default();
    let mut job = PriceJob::new(params(JobMode::Update), Utc::now());
    job.running = false;
    store.save_job(&job).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(outcome, TickOutcome::Idle);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_page_completes_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[])))
        .mount(&server)
        .await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Completed {
            variants_evaluated: 0
        }
    );
    let job = load(&store).await;
    assert!(!job.running);
    assert!(job.last_msg.starts_with("job complete"), "{}", job.last_msg);
}

// ---------------------------------------------------------------------------
// Seeding and updating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_pass_seeds_bases_and_leaves_prices_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[
            product(1, "Mi Band 9", &[(11, "72000.00")]),
            product(2, "Redmi Buds 6", &[(21, "145000.00")]),
        ])))
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_NULL).mount(&server).await;
    graphql_mock("metafieldsSet", UPSERT_OK)
        .expect(2)
        .mount(&server)
        .await;
    put_price_mock().expect(0).mount(&server).await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Completed {
            variants_evaluated: 2
        }
    );
    let job = load(&store).await;
    assert!(!job.running);
    assert_eq!(job.processed_products, 2);
    assert_eq!(job.processed_variants, 2);
    assert_eq!(job.seeded_variants, 2);
    assert_eq!(job.updated_variants, 0);

    let log = store.recent_log(100).await.unwrap();
    assert_eq!(
        statuses(&store).await,
        vec![OutcomeStatus::Seeded, OutcomeStatus::Seeded]
    );
    // Seeded from the current price, so the computed target matches it.
    assert_eq!(log[0].price_before, Some(72_000));
    assert_eq!(log[0].price_after, Some(72_000));
    assert_eq!(log[1].price_before, Some(145_000));
    assert_eq!(log[1].price_after, Some(145_000));
}

#[tokio::test]
async fn drifted_price_is_rewritten_and_matching_price_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[product(
            1,
            "Mi Band 9",
            &[(11, "69000.00"), (12, "72000.00")],
        )])))
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN).mount(&server).await;
    Mock::given(method("PUT"))
        .and(path("/admin/api/2024-10/variants/11.json"))
        .and(body_string_contains(r#""price":72000"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"variant":{"id":11}}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Completed {
            variants_evaluated: 2
        }
    );
    let job = load(&store).await;
    assert_eq!(job.updated_variants, 1);
    assert_eq!(job.seeded_variants, 0);
    assert_eq!(
        statuses(&store).await,
        vec![OutcomeStatus::Updated, OutcomeStatus::Skipped]
    );

    let log = store.recent_log(100).await.unwrap();
    assert_eq!(log[0].price_before, Some(69_000));
    assert_eq!(log[0].price_after, Some(72_000));
}

#[tokio::test]
async fn failed_price_write_consumes_quota_as_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[product(
            1,
            "Mi Band 9",
            &[(11, "69000.00")],
        )])))
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN).mount(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Completed {
            variants_evaluated: 1
        }
    );
    let job = load(&store).await;
    assert_eq!(job.updated_variants, 0);
    assert_eq!(statuses(&store).await, vec![OutcomeStatus::Skipped]);
}

#[tokio::test]
async fn unavailable_base_skips_silently_without_consuming_quota() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[
            product(1, "Alpha", &[(11, "72000.00")]),
            product(2, "Beta", &[(21, "72000.00")]),
        ])))
        .mount(&server)
        .await;
    // Variant 11 has no base and its seed write is rejected; variant 21
    // reads an existing base.
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("query VariantBase"))
        .and(body_string_contains("ProductVariant/11"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(READ_NULL, "application/json"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("metafieldsSet"))
        .and(body_string_contains("ProductVariant/11"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(UPSERT_REJECTED, "application/json"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("query VariantBase"))
        .and(body_string_contains("ProductVariant/21"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(READ_TEN, "application/json"))
        .mount(&server)
        .await;
    put_price_mock().expect(0).mount(&server).await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    // Quota of one: the unavailable variant must not consume it.
    let outcome = run_tick(&store, &client_for(&server), &limits(1, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Progressed {
            variants_evaluated: 1
        }
    );
    let job = load(&store).await;
    assert_eq!(job.processed_products, 2);
    assert_eq!(job.processed_variants, 2, "both pass the price gate");
    assert_eq!(job.seeded_variants, 0);

    let log = store.recent_log(100).await.unwrap();
    assert_eq!(log.len(), 1, "unavailable base leaves no log entry");
    assert_eq!(log[0].variant_id, 21);
    assert_eq!(log[0].status, OutcomeStatus::Skipped);
}

#[tokio::test]
async fn non_positive_prices_are_passed_over_entirely() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[product(
            1,
            "Alpha",
            &[(11, "0.00"), (12, "precio"), (13, "72000.00")],
        )])))
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN)
        .expect(1)
        .mount(&server)
        .await;
    put_price_mock().expect(0).mount(&server).await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Completed {
            variants_evaluated: 1
        }
    );
    let job = load(&store).await;
    assert_eq!(job.processed_variants, 1, "only the priced variant counts");
    assert_eq!(statuses(&store).await, vec![OutcomeStatus::Skipped]);
}

// ---------------------------------------------------------------------------
// Quota, cursor, wrap-around
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quota_exhaustion_persists_the_cursor_and_keeps_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_of(&[
                    product(1, "Alpha", &[(11, "69000.00"), (12, "69000.00")]),
                    product(2, "Beta", &[(21, "69000.00")]),
                ]))
                .insert_header("Link", next_link(&server, "CURSOR_B").as_str()),
        )
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN).mount(&server).await;
    put_price_mock().expect(2).mount(&server).await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(2, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Progressed {
            variants_evaluated: 2
        }
    );
    let job = load(&store).await;
    assert!(job.running);
    assert_eq!(job.cursor.as_deref(), Some("CURSOR_B"));
    assert_eq!(job.processed_products, 1, "Beta was never entered");
    assert_eq!(job.updated_variants, 2);
}

#[tokio::test]
async fn quota_exhausted_exactly_at_the_final_page_wraps_around() {
    let server = MockServer::start().await;
    // First origin fetch serves one variant and no next page; the second
    // serves an empty catalog.
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[product(
            1,
            "Alpha",
            &[(11, "69000.00")],
        )])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[])))
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN).mount(&server).await;
    put_price_mock().expect(1).mount(&server).await;

    let store = InMemoryJobStore::default();
    start_job(&store, params(JobMode::Update)).await.unwrap();
    let client = client_for(&server);

    let first = run_tick(&store, &client, &limits(1, 3)).await.unwrap();
    assert_eq!(
        first,
        TickOutcome::Progressed {
            variants_evaluated: 1
        }
    );
    let job = load(&store).await;
    assert!(job.running, "exact exhaustion at the end keeps the job alive");
    assert_eq!(job.cursor, None, "wrapped back to the origin");

    let second = run_tick(&store, &client, &limits(1, 3)).await.unwrap();
    assert_eq!(
        second,
        TickOutcome::Completed {
            variants_evaluated: 0
        }
    );
    assert!(!load(&store).await.running);
}

#[tokio::test]
async fn stale_cursor_restarts_until_the_budget_is_spent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page_info", "STALE"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param_is_missing("page_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_of(&[product(1, "Alpha", &[(11, "72000.00")])]))
                .insert_header("Link", next_link(&server, "CURSOR_B").as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page_info", "CURSOR_B"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN).mount(&server).await;

    let store = InMemoryJobStore::default();
    let mut job = PriceJob::new(params(JobMode::Update), Utc::now());
    job.cursor = Some("STALE".to_string());
    store.save_job(&job).await.unwrap();
    let client = client_for(&server);
    let limits = limits(10, 1);

    // Signal one: recovered, restart from the origin next tick.
    let first = run_tick(&store, &client, &limits).await.unwrap();
    assert_eq!(first, TickOutcome::CursorRestarted { resets: 1 });
    let job = load(&store).await;
    assert!(job.running);
    assert_eq!(job.cursor, None);
    assert!(job.last_msg.contains("cursor expired"), "{}", job.last_msg);

    // The origin walk progresses and stores the next cursor.
    let second = run_tick(&store, &client, &limits).await.unwrap();
    assert_eq!(
        second,
        TickOutcome::Progressed {
            variants_evaluated: 1
        }
    );
    assert_eq!(load(&store).await.cursor.as_deref(), Some("CURSOR_B"));

    // Signal two exceeds the budget of one: the job stops.
    let third = run_tick(&store, &client, &limits).await.unwrap();
    assert_eq!(third, TickOutcome::ResetLimitExceeded);
    let job = load(&store).await;
    assert!(!job.running);
    assert_eq!(job.cursor_resets, 2);
    assert!(job.last_msg.starts_with("stopped"), "{}", job.last_msg);

    // Stopped means stopped: no further page fetch happens.
    let fourth = run_tick(&store, &client, &limits).await.unwrap();
    assert_eq!(fourth, TickOutcome::Idle);
}

#[tokio::test]
async fn fetch_failure_records_the_message_and_leaves_the_job_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = InMemoryJobStore::default();
    let mut job = PriceJob::new(params(JobMode::Update), Utc::now());
    job.cursor = Some("CURSOR_B".to_string());
    store.save_job(&job).await.unwrap();

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(outcome, TickOutcome::RemoteErrorRecorded);
    let job = load(&store).await;
    assert!(job.running, "transient failures never stop the job");
    assert_eq!(job.cursor.as_deref(), Some("CURSOR_B"));
    assert!(job.last_msg.contains("page fetch failed"), "{}", job.last_msg);
    assert!(job.last_run_at.is_some());
}

// ---------------------------------------------------------------------------
// reset_base mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_base_job_overwrites_bases_without_reading_or_repricing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(&[product(
            1,
            "Mi Band 9",
            &[(11, "72001.00")],
        )])))
        .mount(&server)
        .await;
    graphql_mock("query VariantBase", READ_TEN)
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("metafieldsSet"))
        .and(body_string_contains(r#""value":"10.00""#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(UPSERT_OK, "application/json"))
        .expect(1)
        .mount(&server)
        .await;
    put_price_mock().expect(0).mount(&server).await;

    let store = InMemoryJobStore::default();
    let started = start_job(&store, params(JobMode::ResetBase)).await.unwrap();
    assert!((started.margin - 1.0).abs() < f64::EPSILON);
    assert!(started.round_step.abs() < f64::EPSILON);

    let outcome = run_tick(&store, &client_for(&server), &limits(10, 3))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Completed {
            variants_evaluated: 1
        }
    );
    let job = load(&store).await;
    assert_eq!(job.seeded_variants, 1);

    let log = store.recent_log(100).await.unwrap();
    assert_eq!(log[0].status, OutcomeStatus::BaseReset);
    assert_eq!(log[0].price_before, Some(72_001));
    assert_eq!(log[0].price_after, Some(72_001));
}
