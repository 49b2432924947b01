//! Canonical receipt representation.
//!
//! [`Receipt`] and [`LineItem`] can only be obtained through validation of
//! their raw counterparts ([`RawReceipt`], [`RawLineItem`]). Serde goes
//! through the same path, so a deserialized receipt is always valid.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    non_negative, normalize_card_last4, parse_timestamp, present, ValidationError,
    ValidationRules,
};

/// Number of items named in the quick-display summary.
const SUMMARY_ITEM_LIMIT: usize = 3;

/// Payment tender type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TenderType {
    Credit,
    Debit,
    Cash,
    Ebt,
    Check,
    Gift,
}

impl TenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderType::Credit => "CREDIT",
            TenderType::Debit => "DEBIT",
            TenderType::Cash => "CASH",
            TenderType::Ebt => "EBT",
            TenderType::Check => "CHECK",
            TenderType::Gift => "GIFT",
        }
    }
}

impl fmt::Display for TenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREDIT" => Ok(TenderType::Credit),
            "DEBIT" => Ok(TenderType::Debit),
            "CASH" => Ok(TenderType::Cash),
            "EBT" => Ok(TenderType::Ebt),
            "CHECK" => Ok(TenderType::Check),
            "GIFT" => Ok(TenderType::Gift),
            _ => Err(ValidationError::UnknownTender(s.to_string())),
        }
    }
}

/// Product identifier carried by a line item.
///
/// There is no variant without an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemIdentifier {
    Upc(String),
    Sku(String),
    Both { upc: String, sku: String },
}

impl ItemIdentifier {
    /// Build from optional parts. Blank strings count as absent.
    pub fn from_parts(upc: Option<String>, sku: Option<String>) -> Option<Self> {
        match (present(upc), present(sku)) {
            (Some(upc), Some(sku)) => Some(ItemIdentifier::Both { upc, sku }),
            (Some(upc), None) => Some(ItemIdentifier::Upc(upc)),
            (None, Some(sku)) => Some(ItemIdentifier::Sku(sku)),
            (None, None) => None,
        }
    }

    pub fn upc(&self) -> Option<&str> {
        match self {
            ItemIdentifier::Upc(upc) | ItemIdentifier::Both { upc, .. } => Some(upc),
            ItemIdentifier::Sku(_) => None,
        }
    }

    pub fn sku(&self) -> Option<&str> {
        match self {
            ItemIdentifier::Sku(sku) | ItemIdentifier::Both { sku, .. } => Some(sku),
            ItemIdentifier::Upc(_) => None,
        }
    }
}

/// Unvalidated line item as received from the POS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLineItem {
    pub upc: Option<String>,
    pub sku: Option<String>,
    pub product_desc: Option<String>,
    /// Defaults to 1 when absent.
    pub quantity: Option<i64>,
    pub unit_price_cents: Option<i64>,
    pub extended_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub department_code: Option<String>,
}

impl RawLineItem {
    /// Validate into a [`LineItem`]. `index` is used in error messages.
    pub fn validate(self, index: usize) -> Result<LineItem, ValidationError> {
        let identifier = ItemIdentifier::from_parts(self.upc, self.sku)
            .ok_or(ValidationError::ItemMissingIdentifier { index })?;

        let product_desc = present(self.product_desc).ok_or(ValidationError::MissingItemField {
            index,
            field: "product_desc",
        })?;

        let quantity = self.quantity.unwrap_or(1);
        if quantity < 0 {
            return Err(ValidationError::NegativeQuantity { index, quantity });
        }

        let unit_price_cents = self
            .unit_price_cents
            .ok_or(ValidationError::MissingItemField {
                index,
                field: "unit_price_cents",
            })?;
        let extended_cents = self.extended_cents.ok_or(ValidationError::MissingItemField {
            index,
            field: "extended_cents",
        })?;

        Ok(LineItem {
            identifier,
            product_desc,
            quantity,
            unit_price_cents: non_negative(format!("items[{index}].unit_price_cents"), unit_price_cents)?,
            extended_cents: non_negative(format!("items[{index}].extended_cents"), extended_cents)?,
            discount_cents: non_negative(
                format!("items[{index}].discount_cents"),
                self.discount_cents.unwrap_or(0),
            )?,
            department_code: present(self.department_code),
        })
    }
}

/// A single validated line item on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLineItem", into = "RawLineItem")]
pub struct LineItem {
    identifier: ItemIdentifier,
    product_desc: String,
    quantity: i64,
    unit_price_cents: i64,
    extended_cents: i64,
    discount_cents: i64,
    department_code: Option<String>,
}

impl LineItem {
    pub fn identifier(&self) -> &ItemIdentifier {
        &self.identifier
    }

    pub fn upc(&self) -> Option<&str> {
        self.identifier.upc()
    }

    pub fn sku(&self) -> Option<&str> {
        self.identifier.sku()
    }

    pub fn product_desc(&self) -> &str {
        &self.product_desc
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price_cents(&self) -> i64 {
        self.unit_price_cents
    }

    pub fn extended_cents(&self) -> i64 {
        self.extended_cents
    }

    pub fn discount_cents(&self) -> i64 {
        self.discount_cents
    }

    pub fn department_code(&self) -> Option<&str> {
        self.department_code.as_deref()
    }

    /// Short label for the receipt summary: `"2x Oat Milk"` or `"Cheese"`.
    pub fn summary_fragment(&self) -> String {
        if self.quantity == 1 {
            self.product_desc.clone()
        } else {
            format!("{}x {}", self.quantity, self.product_desc)
        }
    }
}

impl TryFrom<RawLineItem> for LineItem {
    type Error = ValidationError;

    fn try_from(raw: RawLineItem) -> Result<Self, Self::Error> {
        raw.validate(0)
    }
}

impl From<LineItem> for RawLineItem {
    fn from(item: LineItem) -> Self {
        RawLineItem {
            upc: item.upc().map(str::to_string),
            sku: item.sku().map(str::to_string),
            product_desc: Some(item.product_desc),
            quantity: Some(item.quantity),
            unit_price_cents: Some(item.unit_price_cents),
            extended_cents: Some(item.extended_cents),
            discount_cents: Some(item.discount_cents),
            department_code: item.department_code,
        }
    }
}

/// Unvalidated POS receipt event.
///
/// Every field is optional so that malformed input deserializes and is
/// rejected by [`RawReceipt::validate`] with a precise error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawReceipt {
    pub transaction_id: Option<String>,
    pub store_id: Option<String>,
    pub store_name: Option<String>,
    pub pos_terminal_id: Option<String>,
    pub cashier_id: Option<String>,
    pub customer_id: Option<String>,
    /// RFC 3339 with offset, e.g. `2026-02-18T14:30:00Z`.
    pub transaction_ts: Option<String>,
    pub subtotal_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub total_cents: Option<i64>,
    pub tender_type: Option<String>,
    pub card_last4: Option<String>,
    pub items: Vec<RawLineItem>,
}

impl RawReceipt {
    /// Validate into a [`Receipt`] using the given rules.
    pub fn validate(self, rules: &ValidationRules) -> Result<Receipt, ValidationError> {
        let transaction_id =
            present(self.transaction_id).ok_or(ValidationError::MissingField("transaction_id"))?;
        let store_id = present(self.store_id).ok_or(ValidationError::MissingField("store_id"))?;
        let store_name =
            present(self.store_name).ok_or(ValidationError::MissingField("store_name"))?;
        let raw_ts =
            present(self.transaction_ts).ok_or(ValidationError::MissingField("transaction_ts"))?;
        let transaction_ts = parse_timestamp(&raw_ts)?;
        let total_cents = self
            .total_cents
            .ok_or(ValidationError::MissingField("total_cents"))?;

        let tender_type = present(self.tender_type)
            .map(|t| t.parse::<TenderType>())
            .transpose()?;

        let subtotal_cents = self
            .subtotal_cents
            .map(|v| non_negative("subtotal_cents", v))
            .transpose()?;
        let tax_cents = self
            .tax_cents
            .map(|v| non_negative("tax_cents", v))
            .transpose()?;
        let total_cents = non_negative("total_cents", total_cents)?;

        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        rules.check_totals(subtotal_cents, tax_cents, total_cents)?;

        Ok(Receipt {
            transaction_id,
            store_id,
            store_name,
            pos_terminal_id: present(self.pos_terminal_id),
            cashier_id: present(self.cashier_id),
            customer_id: present(self.customer_id),
            transaction_ts,
            subtotal_cents,
            tax_cents,
            total_cents,
            tender_type,
            card_last4: self.card_last4.as_deref().and_then(normalize_card_last4),
            items,
        })
    }
}

/// Complete, validated POS receipt. Immutable once built.
///
/// `transaction_id` is the business idempotency key across both write paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReceipt", into = "RawReceipt")]
pub struct Receipt {
    transaction_id: String,
    store_id: String,
    store_name: String,
    pos_terminal_id: Option<String>,
    cashier_id: Option<String>,
    customer_id: Option<String>,
    transaction_ts: DateTime<Utc>,
    subtotal_cents: Option<i64>,
    tax_cents: Option<i64>,
    total_cents: i64,
    tender_type: Option<TenderType>,
    card_last4: Option<String>,
    items: Vec<LineItem>,
}

impl Receipt {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn pos_terminal_id(&self) -> Option<&str> {
        self.pos_terminal_id.as_deref()
    }

    pub fn cashier_id(&self) -> Option<&str> {
        self.cashier_id.as_deref()
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn transaction_ts(&self) -> DateTime<Utc> {
        self.transaction_ts
    }

    pub fn subtotal_cents(&self) -> Option<i64> {
        self.subtotal_cents
    }

    pub fn tax_cents(&self) -> Option<i64> {
        self.tax_cents
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    pub fn tender_type(&self) -> Option<TenderType> {
        self.tender_type
    }

    pub fn card_last4(&self) -> Option<&str> {
        self.card_last4.as_deref()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// First three item fragments joined, plus `" + N more"` when truncated.
    pub fn item_summary(&self) -> String {
        let mut summary = self
            .items
            .iter()
            .take(SUMMARY_ITEM_LIMIT)
            .map(LineItem::summary_fragment)
            .collect::<Vec<_>>()
            .join(", ");
        if self.items.len() > SUMMARY_ITEM_LIMIT {
            summary.push_str(&format!(" + {} more", self.items.len() - SUMMARY_ITEM_LIMIT));
        }
        summary
    }
}

impl TryFrom<RawReceipt> for Receipt {
    type Error = ValidationError;

    fn try_from(raw: RawReceipt) -> Result<Self, Self::Error> {
        raw.validate(&ValidationRules::default())
    }
}

impl From<Receipt> for RawReceipt {
    fn from(receipt: Receipt) -> Self {
        RawReceipt {
            transaction_id: Some(receipt.transaction_id),
            store_id: Some(receipt.store_id),
            store_name: Some(receipt.store_name),
            pos_terminal_id: receipt.pos_terminal_id,
            cashier_id: receipt.cashier_id,
            customer_id: receipt.customer_id,
            transaction_ts: Some(
                receipt
                    .transaction_ts
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
            subtotal_cents: receipt.subtotal_cents,
            tax_cents: receipt.tax_cents,
            total_cents: Some(receipt.total_cents),
            tender_type: receipt.tender_type.map(|t| t.as_str().to_string()),
            card_last4: receipt.card_last4,
            items: receipt.items.into_iter().map(RawLineItem::from).collect(),
        }
    }
}
