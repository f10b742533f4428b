use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::vendor::models::PaymentStatus;

/// A single payment recorded against a vendor's bill.
///
/// `status_at_payment` is the vendor status this payment produced at write
/// time - a historical field, distinct from the vendor's current derived
/// status. Editing the payment amount re-snapshots it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub vendor_id: Uuid,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Portion of `amount` that exceeded the owed balance when recorded.
    /// Only `amount - overpayment` ever reduced the vendor's pending
    /// balance, so reversals restore exactly that much.
    #[serde(with = "rust_decimal::serde::float")]
    pub overpayment: Decimal,
    pub transaction_date: NaiveDate,
    pub note: Option<String>,
    pub status_at_payment: PaymentStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One vendor whose stored pending balance disagrees with its ledger.
#[derive(Debug, Clone, FromRow)]
pub struct BalanceDrift {
    pub vendor_id: Uuid,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    /// Sum of the applied portion (`amount - overpayment`) of every
    /// recorded payment for the vendor.
    pub ledger_total: Decimal,
}

impl BalanceDrift {
    /// The pending balance the ledger implies.
    pub fn expected_pending(&self) -> Decimal {
        super::reconcile::clamp_pending(self.total_amount - self.ledger_total, self.total_amount)
    }

    pub fn is_consistent(&self) -> bool {
        self.expected_pending() == self.pending_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn drift_detection_compares_against_ledger_sum() {
        let consistent = BalanceDrift {
            vendor_id: Uuid::new_v4(),
            total_amount: dec!(1000),
            pending_amount: dec!(600),
            ledger_total: dec!(400),
        };
        assert!(consistent.is_consistent());

        let drifted = BalanceDrift {
            pending_amount: dec!(700),
            ..consistent.clone()
        };
        assert!(!drifted.is_consistent());
        assert_eq!(drifted.expected_pending(), dec!(600));
    }

    #[test]
    fn fully_applied_ledger_implies_zero_pending() {
        // e.g. payments of 400 and 700 against a 1000 bill: the 700 applied
        // only 600, so the applied sum is exactly the total.
        let drift = BalanceDrift {
            vendor_id: Uuid::new_v4(),
            total_amount: dec!(1000),
            pending_amount: dec!(0),
            ledger_total: dec!(1000),
        };
        assert_eq!(drift.expected_pending(), dec!(0));
        assert!(drift.is_consistent());
    }
}
