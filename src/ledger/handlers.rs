use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::models::PaymentTransaction;
use crate::error::AppResult;
use crate::server::AppState;
use crate::vendor::models::VendorResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct AddTransactionRequest {
    #[validate(custom = "validate_positive_amount")]
    pub amount: Decimal,
    pub transaction_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTransactionRequest {
    #[validate(custom = "validate_positive_amount")]
    pub amount: Decimal,
    pub transaction_date: Option<NaiveDate>,
    pub note: Option<String>,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut error = ValidationError::new("positive");
        error.message = Some("must be greater than zero".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Serialize)]
pub struct AddTransactionResponse {
    pub transaction: PaymentTransaction,
    pub vendor: VendorResponse,
    /// Portion of the payment beyond the owed balance, absorbed by the zero
    /// floor on pending_amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub overpayment: Decimal,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transaction: PaymentTransaction,
    pub vendor: VendorResponse,
}

/// Record a payment against a vendor.
/// POST /api/v1/vendors/:vendor_id/transactions
pub async fn add_transaction(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<AddTransactionRequest>,
) -> AppResult<(StatusCode, Json<AddTransactionResponse>)> {
    request.validate()?;

    let transaction_date = request
        .transaction_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let (transaction, vendor, overpayment) = state
        .ledger
        .add_payment(vendor_id, request.amount, transaction_date, request.note)
        .await?;

    info!(
        "Payment of {} recorded for vendor {} (pending {})",
        transaction.amount, vendor.id, vendor.pending_amount
    );

    Ok((
        StatusCode::CREATED,
        Json(AddTransactionResponse {
            transaction,
            vendor: VendorResponse::from(vendor),
            overpayment,
        }),
    ))
}

/// Edit a recorded payment's amount, date, or note.
/// PUT /api/v1/vendors/transactions/:transaction_id
pub async fn update_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<UpdateTransactionRequest>,
) -> AppResult<(StatusCode, Json<TransactionResponse>)> {
    request.validate()?;

    let (transaction, vendor) = state
        .ledger
        .update_payment(
            transaction_id,
            request.amount,
            request.transaction_date,
            request.note,
        )
        .await?;

    info!(
        "Payment {} updated for vendor {} (pending {})",
        transaction.id, vendor.id, vendor.pending_amount
    );

    Ok((
        StatusCode::OK,
        Json(TransactionResponse {
            transaction,
            vendor: VendorResponse::from(vendor),
        }),
    ))
}

/// Remove a recorded payment and restore the vendor's balance.
/// DELETE /api/v1/vendors/:vendor_id/transactions/:transaction_id
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path((vendor_id, transaction_id)): Path<(Uuid, Uuid)>,
) -> AppResult<(StatusCode, Json<TransactionResponse>)> {
    let (transaction, vendor) = state.ledger.delete_payment(vendor_id, transaction_id).await?;

    info!(
        "Payment {} deleted for vendor {} (pending {})",
        transaction.id, vendor.id, vendor.pending_amount
    );

    Ok((
        StatusCode::OK,
        Json(TransactionResponse {
            transaction,
            vendor: VendorResponse::from(vendor),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payment_amount_must_be_positive() {
        let request = AddTransactionRequest {
            amount: dec!(400),
            transaction_date: None,
            note: None,
        };
        assert!(request.validate().is_ok());

        let request = AddTransactionRequest {
            amount: dec!(0),
            transaction_date: None,
            note: None,
        };
        assert!(request.validate().is_err());

        let request = AddTransactionRequest {
            amount: dec!(-25),
            transaction_date: None,
            note: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn edited_amount_must_be_positive() {
        let request = UpdateTransactionRequest {
            amount: dec!(0.01),
            transaction_date: Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            note: Some("partial settlement".to_string()),
        };
        assert!(request.validate().is_ok());

        let request = UpdateTransactionRequest {
            amount: dec!(0),
            transaction_date: None,
            note: None,
        };
        assert!(request.validate().is_err());
    }
}
