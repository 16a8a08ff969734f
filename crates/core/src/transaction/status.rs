//! Status vocabulary for transactions.
//!
//! Clients send status strings in several spellings (`success`, `selesai`,
//! `cancel`, ...). Every write path funnels them through [`normalize_status`]
//! so only the canonical values ever reach the `transaksi.status` column.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Spellings that collapse to `sukses`.
const SUCCESS_SYNONYMS: &[&str] = &["success", "completed", "selesai"];

/// Spellings that collapse to `batal`.
const CANCEL_SYNONYMS: &[&str] = &["cancel", "canceled", "batal", "failed"];

/// Canonical transaction status as stored in the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Awaiting payment.
    #[default]
    Pending,
    /// Paid.
    Sukses,
    /// Cancelled; its tickets are released.
    Batal,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 3] = [Self::Pending, Self::Sukses, Self::Batal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sukses => "sukses",
            Self::Batal => "batal",
        }
    }

    /// Every spelling that reads back as this status, the canonical one first.
    pub fn spellings(&self) -> Vec<&'static str> {
        let synonyms: &[&'static str] = match self {
            Self::Pending => &[],
            Self::Sukses => SUCCESS_SYNONYMS,
            Self::Batal => CANCEL_SYNONYMS,
        };
        std::iter::once(self.as_str())
            .chain(synonyms.iter().copied().filter(|s| *s != self.as_str()))
            .collect()
    }

    /// Parse an already-normalized value. Synonyms are not accepted here.
    pub fn from_canonical(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "sukses" => Some(Self::Sukses),
            "batal" => Some(Self::Batal),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a free-form status string to its canonical spelling.
///
/// Synonyms collapse to `sukses` or `batal`; any other non-empty value is
/// returned trimmed and lower-cased. Empty or absent input yields `None` and
/// the caller picks the default.
pub fn normalize_status(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }

    if SUCCESS_SYNONYMS.contains(&value.as_str()) {
        return Some(TransactionStatus::Sukses.as_str().to_string());
    }
    if CANCEL_SYNONYMS.contains(&value.as_str()) {
        return Some(TransactionStatus::Batal.as_str().to_string());
    }

    Some(value)
}

/// Normalize and resolve to a canonical status, `None` when the value is
/// absent or normalizes to something outside the vocabulary.
pub fn canonical_status(raw: Option<&str>) -> Option<TransactionStatus> {
    normalize_status(raw).and_then(|s| TransactionStatus::from_canonical(&s))
}

/// Whether `raw` is accepted by the status-set operation.
///
/// The check runs on the raw input, before normalization: the value must be
/// one of the canonical names or one of their synonyms.
pub fn is_recognized_status(raw: &str) -> bool {
    let value = raw.trim().to_lowercase();
    TransactionStatus::from_canonical(&value).is_some()
        || SUCCESS_SYNONYMS.contains(&value.as_str())
        || CANCEL_SYNONYMS.contains(&value.as_str())
}
