//! The batch engine: page-by-page catalog walks, base-price resolution,
//! and the singleton job lifecycle.
//!
//! Everything here runs against two injected ports, the [`JobStore`]
//! trait for state and the Shopify `AdminClient` for the catalog, so the
//! whole engine is exercised in tests with an in-memory store and a mock
//! HTTP server.
//!
//! [`JobStore`]: repricer_core::JobStore

pub mod control;
pub mod error;
pub mod manual;
pub mod resolver;
pub mod runner;

pub use control::{cancel_job, start_job};
pub use error::EngineError;
pub use manual::{apply_manual_edit, ManualEditOutcome, ManualEditParams, PricingDefaults};
pub use resolver::{reset_base_price, resolve_base, ResolvedBase};
pub use runner::{run_tick, TickLimits, TickOutcome};
