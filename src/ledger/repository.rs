use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{BalanceDrift, PaymentTransaction};
use super::reconcile;
use crate::error::{AppResult, LedgerError};
use crate::vendor::models::Vendor;
use crate::vendor::repository::lock_vendor_row;

/// Payment-ledger repository.
///
/// Each mutation runs inside one database transaction that locks the owning
/// vendor row before reading the balance, so concurrent mutations against
/// the same vendor serialize and the pending amount never sees a lost
/// update. Early `?` returns drop the transaction, which rolls it back.
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a payment against a vendor's bill.
    ///
    /// Returns the inserted transaction, the updated vendor, and the
    /// overpayment absorbed by the zero floor (zero when the payment fit
    /// within the owed balance).
    pub async fn add_payment(
        &self,
        vendor_id: Uuid,
        amount: Decimal,
        transaction_date: NaiveDate,
        note: Option<String>,
    ) -> AppResult<(PaymentTransaction, Vendor, Decimal)> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount("must be greater than zero".to_string()).into());
        }

        let mut tx = self.pool.begin().await?;

        let vendor = lock_vendor_row(&mut tx, vendor_id).await?;
        let change = reconcile::apply_payment(vendor.pending_amount, vendor.total_amount, amount);

        let payment = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            INSERT INTO transactions (vendor_id, amount, overpayment, transaction_date, note, status_at_payment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, vendor_id, amount, overpayment, transaction_date, note, status_at_payment, created_at, updated_at
            "#,
        )
        .bind(vendor_id)
        .bind(amount)
        .bind(change.overpayment)
        .bind(transaction_date)
        .bind(note)
        .bind(change.status)
        .fetch_one(&mut *tx)
        .await?;

        let vendor = self
            .write_pending(&mut tx, vendor_id, change.new_pending)
            .await?;

        tx.commit().await?;

        Ok((payment, vendor, change.overpayment))
    }

    /// Replace a payment's amount (and optionally date/note), reversing the
    /// old amount and applying the new one in a single step.
    ///
    /// The status snapshot on the transaction row is refreshed to the status
    /// the edited payment now produces.
    pub async fn update_payment(
        &self,
        transaction_id: Uuid,
        amount: Decimal,
        transaction_date: Option<NaiveDate>,
        note: Option<String>,
    ) -> AppResult<(PaymentTransaction, Vendor)> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount("must be greater than zero".to_string()).into());
        }

        let mut tx = self.pool.begin().await?;

        // Unlocked peek to learn the owning vendor, then take the vendor
        // lock first - same order as every other mutation path.
        let vendor_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT vendor_id FROM transactions WHERE id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        let vendor = lock_vendor_row(&mut tx, vendor_id).await?;

        // Re-read under the vendor lock; the row may have been deleted in
        // between.
        let existing = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            SELECT id, vendor_id, amount, overpayment, transaction_date, note, status_at_payment, created_at, updated_at
            FROM transactions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        let change = reconcile::adjust_payment(
            vendor.pending_amount,
            vendor.total_amount,
            existing.amount,
            existing.overpayment,
            amount,
        );

        let payment = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            UPDATE transactions
            SET amount = $2, overpayment = $3, transaction_date = $4, note = $5,
                status_at_payment = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, vendor_id, amount, overpayment, transaction_date, note, status_at_payment, created_at, updated_at
            "#,
        )
        .bind(transaction_id)
        .bind(amount)
        .bind(change.overpayment)
        .bind(transaction_date.unwrap_or(existing.transaction_date))
        .bind(note.or(existing.note))
        .bind(change.status)
        .fetch_one(&mut *tx)
        .await?;

        let vendor = self
            .write_pending(&mut tx, vendor_id, change.new_pending)
            .await?;

        tx.commit().await?;

        Ok((payment, vendor))
    }

    /// Remove a payment and restore the vendor's pending balance.
    ///
    /// The transaction must belong to the claimed vendor; a mismatch leaves
    /// all state untouched.
    pub async fn delete_payment(
        &self,
        vendor_id: Uuid,
        transaction_id: Uuid,
    ) -> AppResult<(PaymentTransaction, Vendor)> {
        let mut tx = self.pool.begin().await?;

        let vendor = lock_vendor_row(&mut tx, vendor_id).await?;

        let payment = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            DELETE FROM transactions
            WHERE id = $1 AND vendor_id = $2
            RETURNING id, vendor_id, amount, overpayment, transaction_date, note, status_at_payment, created_at, updated_at
            "#,
        )
        .bind(transaction_id)
        .bind(vendor_id)
        .fetch_optional(&mut *tx)
        .await?;

        let payment = match payment {
            Some(payment) => payment,
            None => {
                // Distinguish a missing transaction from one owned by a
                // different vendor.
                let owner = sqlx::query_scalar::<_, Uuid>(
                    "SELECT vendor_id FROM transactions WHERE id = $1",
                )
                .bind(transaction_id)
                .fetch_optional(&mut *tx)
                .await?;

                return Err(match owner {
                    Some(_) => LedgerError::VendorMismatch {
                        transaction_id,
                        vendor_id,
                    }
                    .into(),
                    None => LedgerError::TransactionNotFound(transaction_id).into(),
                });
            }
        };

        let change = reconcile::reverse_payment(
            vendor.pending_amount,
            vendor.total_amount,
            payment.amount,
            payment.overpayment,
        );

        let vendor = self
            .write_pending(&mut tx, vendor_id, change.new_pending)
            .await?;

        tx.commit().await?;

        Ok((payment, vendor))
    }

    /// Compare every vendor's stored pending balance against the balance its
    /// ledger implies, returning the rows that disagree.
    pub async fn find_balance_drift(&self) -> AppResult<Vec<BalanceDrift>> {
        let audits = sqlx::query_as::<_, BalanceDrift>(
            r#"
            SELECT v.id AS vendor_id, v.total_amount, v.pending_amount,
                   COALESCE(SUM(t.amount - t.overpayment), 0) AS ledger_total
            FROM vendors v
            LEFT JOIN transactions t ON t.vendor_id = v.id
            GROUP BY v.id, v.total_amount, v.pending_amount
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(audits
            .into_iter()
            .filter(|audit| !audit.is_consistent())
            .collect())
    }

    async fn write_pending(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        vendor_id: Uuid,
        pending: Decimal,
    ) -> AppResult<Vendor> {
        let vendor = sqlx::query_as::<_, Vendor>(
            r#"
            UPDATE vendors
            SET pending_amount = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, contact_number, address, bill_url, total_amount, pending_amount, created_at, updated_at
            "#,
        )
        .bind(vendor_id)
        .bind(pending)
        .fetch_one(&mut **tx)
        .await?;

        Ok(vendor)
    }
}
