//! Amendment lifecycle state.

use serde::{Deserialize, Serialize};

/// Review state of a pending amendment.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed   (merged into the order, kept for audit)
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmendmentStatus {
    /// Captured, not yet merged.
    #[default]
    Pending,

    /// Merged into its order (terminal state).
    Confirmed,

    /// Withdrawn before merging (terminal state).
    Cancelled,
}

impl AmendmentStatus {
    /// Returns true if a payment may be recorded in this state.
    pub fn can_pay(&self) -> bool {
        matches!(self, AmendmentStatus::Pending)
    }

    /// Returns true if the amendment can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, AmendmentStatus::Pending)
    }

    /// Returns true if the amendment can be merged in this state.
    pub fn can_confirm(&self) -> bool {
        matches!(self, AmendmentStatus::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AmendmentStatus::Confirmed | AmendmentStatus::Cancelled)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AmendmentStatus::Pending => "pending",
            AmendmentStatus::Confirmed => "confirmed",
            AmendmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AmendmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state of an amendment's own charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
