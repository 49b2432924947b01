//! Analytics log envelope: one header record and N item records per delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::receipt::{LineItem, Receipt};

/// Header row as appended to the headers target.
///
/// Fields default so that records produced by other writers still
/// deserialize; the dedup quality gate decides what to keep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderRecord {
    pub event_id: Uuid,
    pub transaction_id: String,
    pub store_id: String,
    pub store_name: String,
    pub pos_terminal_id: Option<String>,
    pub cashier_id: Option<String>,
    pub customer_id: Option<String>,
    pub transaction_ts: DateTime<Utc>,
    pub subtotal_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub total_cents: i64,
    pub tender_type: Option<String>,
    pub card_last4: Option<String>,
    pub ingested_ts: DateTime<Utc>,
}

/// Line item row as appended to the items target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRecord {
    pub event_id: Uuid,
    pub transaction_id: String,
    /// 1-based position within the receipt.
    pub item_seq: u32,
    pub upc: Option<String>,
    pub sku: Option<String>,
    pub product_desc: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub extended_cents: i64,
    pub discount_cents: i64,
    pub department_code: Option<String>,
    pub ingested_ts: DateTime<Utc>,
}

impl HeaderRecord {
    fn from_receipt(receipt: &Receipt, event_id: Uuid, ingested_ts: DateTime<Utc>) -> Self {
        Self {
            event_id,
            transaction_id: receipt.transaction_id().to_string(),
            store_id: receipt.store_id().to_string(),
            store_name: receipt.store_name().to_string(),
            pos_terminal_id: receipt.pos_terminal_id().map(str::to_string),
            cashier_id: receipt.cashier_id().map(str::to_string),
            customer_id: receipt.customer_id().map(str::to_string),
            transaction_ts: receipt.transaction_ts(),
            subtotal_cents: receipt.subtotal_cents(),
            tax_cents: receipt.tax_cents(),
            total_cents: receipt.total_cents(),
            tender_type: receipt.tender_type().map(|t| t.as_str().to_string()),
            card_last4: receipt.card_last4().map(str::to_string),
            ingested_ts,
        }
    }
}

impl ItemRecord {
    fn from_item(
        transaction_id: &str,
        item_seq: u32,
        item: &LineItem,
        event_id: Uuid,
        ingested_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            transaction_id: transaction_id.to_string(),
            item_seq,
            upc: item.upc().map(str::to_string),
            sku: item.sku().map(str::to_string),
            product_desc: item.product_desc().to_string(),
            quantity: item.quantity(),
            unit_price_cents: item.unit_price_cents(),
            extended_cents: item.extended_cents(),
            discount_cents: item.discount_cents(),
            department_code: item.department_code().map(str::to_string),
            ingested_ts,
        }
    }
}

/// Transient container for a single delivery attempt.
///
/// All records share the delivery id and ingestion timestamp. Discarded
/// once the log acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionEnvelope {
    pub delivery_id: Uuid,
    pub ingested_ts: DateTime<Utc>,
    pub header: HeaderRecord,
    pub items: Vec<ItemRecord>,
}

impl IngestionEnvelope {
    /// Seal a receipt with a fresh delivery id and the current time.
    pub fn seal(receipt: &Receipt) -> Self {
        Self::seal_with(receipt, Uuid::new_v4(), Utc::now())
    }

    /// Seal with an explicit delivery id and timestamp.
    pub fn seal_with(receipt: &Receipt, delivery_id: Uuid, ingested_ts: DateTime<Utc>) -> Self {
        let header = HeaderRecord::from_receipt(receipt, delivery_id, ingested_ts);
        let items = receipt
            .items()
            .iter()
            .zip(1u32..)
            .map(|(item, seq)| {
                ItemRecord::from_item(receipt.transaction_id(), seq, item, delivery_id, ingested_ts)
            })
            .collect();

        Self {
            delivery_id,
            ingested_ts,
            header,
            items,
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.header.transaction_id
    }
}
