//! Data-quality gate in front of the upsert tables.
//!
//! Expectations run in order. A failed `Drop` expectation removes the record
//! and counts it against that expectation; a failed `Warn` expectation only
//! counts. The stream is never halted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::model::{HeaderRecord, ItemRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectAction {
    Drop,
    Warn,
}

/// A named predicate over a record.
pub struct Expectation<R> {
    pub name: &'static str,
    pub action: ExpectAction,
    check: fn(&R) -> bool,
}

/// Ordered expectations with per-expectation counters.
pub struct QualityGate<R> {
    expectations: Vec<Expectation<R>>,
    dropped: BTreeMap<&'static str, u64>,
    warned: BTreeMap<&'static str, u64>,
}

impl<R> Default for QualityGate<R> {
    fn default() -> Self {
        Self {
            expectations: Vec::new(),
            dropped: BTreeMap::new(),
            warned: BTreeMap::new(),
        }
    }
}

impl<R> QualityGate<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_or_drop(mut self, name: &'static str, check: fn(&R) -> bool) -> Self {
        self.expectations.push(Expectation {
            name,
            action: ExpectAction::Drop,
            check,
        });
        self
    }

    pub fn expect_or_warn(mut self, name: &'static str, check: fn(&R) -> bool) -> Self {
        self.expectations.push(Expectation {
            name,
            action: ExpectAction::Warn,
            check,
        });
        self
    }

    /// Return `true` if the record passes every drop expectation.
    pub fn admit(&mut self, record: &R) -> bool {
        for expectation in &self.expectations {
            if (expectation.check)(record) {
                continue;
            }
            match expectation.action {
                ExpectAction::Drop => {
                    *self.dropped.entry(expectation.name).or_insert(0) += 1;
                    warn!(expectation = expectation.name, "Record dropped by quality gate");
                    return false;
                }
                ExpectAction::Warn => {
                    *self.warned.entry(expectation.name).or_insert(0) += 1;
                    warn!(expectation = expectation.name, "Record failed quality expectation");
                }
            }
        }
        true
    }

    /// Keep the records that pass.
    pub fn filter(&mut self, records: Vec<R>) -> Vec<R> {
        records.into_iter().filter(|r| self.admit(r)).collect()
    }

    pub fn dropped(&self, expectation: &str) -> u64 {
        self.dropped.get(expectation).copied().unwrap_or(0)
    }

    pub fn warned(&self, expectation: &str) -> u64 {
        self.warned.get(expectation).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }
}

fn non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

fn opt_non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(non_blank)
}

/// Gate for header records.
pub fn header_gate() -> QualityGate<HeaderRecord> {
    QualityGate::<HeaderRecord>::new()
        .expect_or_drop("valid_transaction_id", |r| non_blank(&r.transaction_id))
        .expect_or_drop("valid_store_id", |r| non_blank(&r.store_id))
        .expect_or_drop("valid_timestamp", |r| r.transaction_ts != DateTime::<Utc>::default())
        .expect_or_drop("non_negative_total", |r| r.total_cents >= 0)
        .expect_or_warn("has_event_id", |r| r.event_id != Uuid::nil())
}

/// Gate for item records.
pub fn item_gate() -> QualityGate<ItemRecord> {
    QualityGate::<ItemRecord>::new()
        .expect_or_drop("valid_transaction_id", |r| non_blank(&r.transaction_id))
        .expect_or_drop("has_identifier", |r| opt_non_blank(&r.upc) || opt_non_blank(&r.sku))
        .expect_or_drop("positive_quantity", |r| r.quantity > 0)
        .expect_or_drop("non_negative_extended", |r| r.extended_cents >= 0)
        .expect_or_warn("has_product_desc", |r| non_blank(&r.product_desc))
}
