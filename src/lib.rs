//! Receipt Sync - dual-path POS receipt ingestion
//!
//! Writes each validated receipt to an operational store and an
//! append-only analytics log, deduplicates the analytics copy, and
//! reconciles the two.

pub mod config;
pub mod dedup;
pub mod ingest;
pub mod log;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod reconcile;
pub mod service;
pub mod storage;
pub mod utils;

#[doc(hidden)]
pub mod test_utils;

pub use config::Config;
pub use service::{ServiceContext, ServiceError};
