//! Receipt fixtures shared by unit and integration tests.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::model::{RawLineItem, RawReceipt, Receipt, ValidationRules};

/// Line item with a UPC and quantity 1.
pub fn raw_item(desc: &str, upc: &str, cents: i64) -> RawLineItem {
    RawLineItem {
        upc: Some(upc.to_string()),
        product_desc: Some(desc.to_string()),
        quantity: Some(1),
        unit_price_cents: Some(cents),
        extended_cents: Some(cents),
        department_code: Some("GROCERY".to_string()),
        ..Default::default()
    }
}

/// Well-formed raw receipt: 1757 + 105 = 1862, two items.
pub fn raw_receipt_at(transaction_id: &str, ts: DateTime<Utc>) -> RawReceipt {
    RawReceipt {
        transaction_id: Some(transaction_id.to_string()),
        store_id: Some("STORE-042".to_string()),
        store_name: Some("Downtown Market".to_string()),
        pos_terminal_id: Some("POS-3".to_string()),
        cashier_id: Some("EMP-118".to_string()),
        customer_id: Some("CUST-9001".to_string()),
        transaction_ts: Some(ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        subtotal_cents: Some(1757),
        tax_cents: Some(105),
        total_cents: Some(1862),
        tender_type: Some("CREDIT".to_string()),
        card_last4: Some("****4532".to_string()),
        items: vec![
            raw_item("Oat Milk", "012345678905", 998),
            raw_item("Sourdough", "012345678912", 759),
        ],
    }
}

/// Raw receipt timestamped one hour ago.
pub fn raw_receipt(transaction_id: &str) -> RawReceipt {
    raw_receipt_at(transaction_id, Utc::now() - chrono::Duration::hours(1))
}

pub fn receipt_at(transaction_id: &str, ts: DateTime<Utc>) -> Receipt {
    raw_receipt_at(transaction_id, ts)
        .validate(&ValidationRules::default())
        .unwrap_or_else(|e| panic!("fixture receipt is invalid: {e}"))
}

/// Valid receipt timestamped one hour ago.
pub fn receipt(transaction_id: &str) -> Receipt {
    raw_receipt(transaction_id)
        .validate(&ValidationRules::default())
        .unwrap_or_else(|e| panic!("fixture receipt is invalid: {e}"))
}

/// Fixed reference time for deterministic tests.
pub fn fixed_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 18, 14, 30, 0)
        .single()
        .unwrap_or_default()
}
