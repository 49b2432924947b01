//! Receipt domain model.
//!
//! Raw POS input is validated into immutable [`Receipt`] values before
//! anything is written. Envelopes and outcomes describe the two write paths.

mod envelope;
mod outcome;
mod receipt;
mod validation;

pub use envelope::{HeaderRecord, IngestionEnvelope, ItemRecord};
pub use outcome::{AnalyticsResult, DualWriteOutcome, IngestAck, InsertOutcome, OverallStatus};
pub use receipt::{ItemIdentifier, LineItem, RawLineItem, RawReceipt, Receipt, TenderType};
pub use validation::{
    normalize_card_last4, parse_timestamp, ValidationError, ValidationRules,
    DEFAULT_TOTAL_TOLERANCE_CENTS,
};
