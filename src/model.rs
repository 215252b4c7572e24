//! Data Model
//!
//! Ledger documents, their key encoding and amount rules.
//!
//! ## Key Encoding
//! ```text
//! ┌──────────────┬──────┬──────────────────┐
//! │ docType      │ 0x00 │ natural id       │
//! └──────────────┴──────┴──────────────────┘
//! ```
//! All documents of one type live in `[docType 0x00, docType 0x01)`.
//! The separator sorts below every id byte, so one type's range never
//! reaches into another type whose tag shares a prefix
//! (`spend` / `spendAllocation`).

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LedgerError, Result};

/// Byte between the type tag and the natural id
pub const KEY_SEPARATOR: u8 = 0x00;

/// Field holding the type tag in every stored document
pub const DOC_TYPE_FIELD: &str = "docType";

// =============================================================================
// Document Types
// =============================================================================

/// Type tag carried by every document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocType {
    Ngo,
    Donation,
    Spend,
    SpendAllocation,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Ngo => "ngo",
            DocType::Donation => "donation",
            DocType::Spend => "spend",
            DocType::SpendAllocation => "spendAllocation",
        }
    }

    /// Storage key for a document of this type
    pub fn key(&self, id: &str) -> Vec<u8> {
        doc_key(self.as_str(), id)
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `docType 0x00 id`
pub fn doc_key(doc_type: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(doc_type.len() + 1 + id.len());
    key.extend_from_slice(doc_type.as_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Half-open scan bounds covering every document of `doc_type`
pub fn type_range(doc_type: &str) -> (Vec<u8>, Vec<u8>) {
    let mut low = Vec::with_capacity(doc_type.len() + 1);
    low.extend_from_slice(doc_type.as_bytes());
    let mut high = low.clone();
    low.push(KEY_SEPARATOR);
    high.push(KEY_SEPARATOR + 1);
    (low, high)
}

/// Natural id from a stored key, if it carries the separator
pub fn natural_id(key: &[u8]) -> Option<&str> {
    let pos = key.iter().position(|&b| b == KEY_SEPARATOR)?;
    std::str::from_utf8(&key[pos + 1..]).ok()
}

/// Ids must be non-empty and must not contain the key separator
pub fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(LedgerError::Validation(format!("{} must not be empty", what)));
    }
    if id.as_bytes().contains(&KEY_SEPARATOR) {
        return Err(LedgerError::Validation(format!(
            "{} must not contain NUL bytes",
            what
        )));
    }
    Ok(())
}

// =============================================================================
// Amounts
// =============================================================================

/// Whether zero is an acceptable amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRule {
    /// `amount >= 0` (donations)
    NonNegative,
    /// `amount > 0` (spends, allocations)
    Positive,
}

/// Check sign and precision of an amount
pub fn validate_amount(amount: Decimal, rule: AmountRule, scale: u32) -> Result<()> {
    let sign_ok = match rule {
        AmountRule::NonNegative => !amount.is_sign_negative() || amount.is_zero(),
        AmountRule::Positive => amount > Decimal::ZERO,
    };
    if !sign_ok {
        let expected = match rule {
            AmountRule::NonNegative => "must not be negative",
            AmountRule::Positive => "must be positive",
        };
        return Err(LedgerError::InvalidAmount(format!("{} {}", amount, expected)));
    }
    if amount.normalize().scale() > scale {
        return Err(LedgerError::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            amount, scale
        )));
    }
    Ok(())
}

/// `a + b`, or `InvalidAmount` if the sum is not representable
pub fn add_amount(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| {
        LedgerError::InvalidAmount(format!(
            "{} + {} exceeds the largest representable amount",
            a, b
        ))
    })
}

/// Sum of `amounts` without overflowing
pub fn sum_amounts<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, add_amount)
}

// =============================================================================
// Document Trait
// =============================================================================

/// A typed ledger document
pub trait Document: Serialize + DeserializeOwned {
    const DOC_TYPE: DocType;

    /// Natural id
    fn id(&self) -> &str;

    fn key(&self) -> Vec<u8> {
        Self::DOC_TYPE.key(self.id())
    }

    /// JSON payload with the `docType` tag; object keys are sorted, so
    /// equal documents always encode to equal bytes
    fn encode(&self) -> Result<Bytes> {
        let mut value = serde_json::to_value(self)?;
        match value {
            Value::Object(ref mut fields) => {
                fields.insert(
                    DOC_TYPE_FIELD.to_string(),
                    Value::String(Self::DOC_TYPE.as_str().to_string()),
                );
            }
            _ => {
                return Err(LedgerError::Serialization(format!(
                    "{} did not serialize to an object",
                    Self::DOC_TYPE
                )))
            }
        }
        Ok(Bytes::from(serde_json::to_vec(&value)?))
    }

    /// Decode from parsed fields (the `docType` tag is ignored)
    fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(fields.clone())).map_err(|e| {
            LedgerError::Serialization(format!("malformed {} document: {}", Self::DOC_TYPE, e))
        })
    }

    /// Decode from a stored payload
    fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            LedgerError::Serialization(format!("malformed {} document: {}", Self::DOC_TYPE, e))
        })
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Beneficiary organisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ngo {
    pub registration_number: String,
    #[serde(default)]
    pub name: String,
}

impl Document for Ngo {
    const DOC_TYPE: DocType = DocType::Ngo;

    fn id(&self) -> &str {
        &self.registration_number
    }
}

/// Funds earmarked for one NGO; immutable once written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub donation_id: String,
    pub donation_amount: Decimal,
    pub donor_user_name: String,
    pub ngo_registration_number: String,
    pub donation_date: String,
}

impl Document for Donation {
    const DOC_TYPE: DocType = DocType::Donation;

    fn id(&self) -> &str {
        &self.donation_id
    }
}

/// A spend by an NGO; written together with its allocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spend {
    pub spend_id: String,
    pub spend_amount: Decimal,
    pub spend_description: String,
    pub spend_date: String,
    pub ngo_registration_number: String,
}

impl Document for Spend {
    const DOC_TYPE: DocType = DocType::Spend;

    fn id(&self) -> &str {
        &self.spend_id
    }
}

/// Portion of a spend drawn from one donation; append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendAllocation {
    pub spend_allocation_id: String,
    pub spend_allocation_amount: Decimal,
    pub spend_allocation_date: String,
    pub spend_allocation_description: String,
    pub donation_id: String,
    pub ngo_registration_number: String,
    pub spend_id: String,
}

impl Document for SpendAllocation {
    const DOC_TYPE: DocType = DocType::SpendAllocation;

    fn id(&self) -> &str {
        &self.spend_allocation_id
    }
}

/// Input to the allocation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRequest {
    pub id: String,
    pub amount: Decimal,
    pub description: String,
    pub date: String,
    /// NGO registration number
    pub beneficiary_id: String,
}

impl SpendRequest {
    /// The Spend document this request creates
    pub fn to_spend(&self) -> Spend {
        Spend {
            spend_id: self.id.clone(),
            spend_amount: self.amount.normalize(),
            spend_description: self.description.clone(),
            spend_date: self.date.clone(),
            ngo_registration_number: self.beneficiary_id.clone(),
        }
    }
}
