//! Pending-balance reconciliation math.
//!
//! Every balance mutation in the system reduces to one of the pure functions
//! in this module, applied to a vendor's `(pending_amount, total_amount)`
//! pair under the row lock held by the repository. Amounts are exact
//! decimals, so status comparisons need no epsilon.

use rust_decimal::Decimal;

use crate::vendor::models::PaymentStatus;

/// Outcome of a single balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub new_pending: Decimal,
    pub status: PaymentStatus,
    /// Portion of a payment exceeding the owed balance. Absorbed (pending
    /// floors at zero), never rejected or carried as credit.
    pub overpayment: Decimal,
}

/// Clamp a candidate pending balance into `[0, total]`.
pub fn clamp_pending(value: Decimal, total: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(total)
}

/// Apply a new payment of `amount` against the current balance.
pub fn apply_payment(pending: Decimal, total: Decimal, amount: Decimal) -> BalanceChange {
    let new_pending = clamp_pending(pending - amount, total);
    let overpayment = (amount - pending).max(Decimal::ZERO);

    BalanceChange {
        new_pending,
        status: PaymentStatus::derive(new_pending, total),
        overpayment,
    }
}

/// Reverse a previously applied payment (transaction deleted).
///
/// Only the applied portion `amount - absorbed_overpayment` is restored:
/// the absorbed overpayment never reduced the balance, so crediting it back
/// would leave pending above its pre-payment value. Deleting a payment
/// always returns pending to what it was before that payment, absent other
/// mutations.
pub fn reverse_payment(
    pending: Decimal,
    total: Decimal,
    amount: Decimal,
    absorbed_overpayment: Decimal,
) -> BalanceChange {
    let new_pending = clamp_pending(pending + (amount - absorbed_overpayment), total);

    BalanceChange {
        new_pending,
        status: PaymentStatus::derive(new_pending, total),
        overpayment: Decimal::ZERO,
    }
}

/// Replace a payment of `old_amount` with `new_amount` in one step, rather
/// than persisting two intermediate states: the old payment's applied
/// portion is restored and the new amount is applied against the restored
/// balance, which also yields the edited payment's new overpayment.
pub fn adjust_payment(
    pending: Decimal,
    total: Decimal,
    old_amount: Decimal,
    old_overpayment: Decimal,
    new_amount: Decimal,
) -> BalanceChange {
    let restored = clamp_pending(pending + (old_amount - old_overpayment), total);

    apply_payment(restored, total, new_amount)
}

/// Outcome of a vendor update that may change the billed total and record an
/// additional payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorUpdate {
    pub new_pending: Decimal,
    pub status: PaymentStatus,
    /// Cumulative amount paid after the update, reported back to the caller.
    pub paid_amount: Decimal,
    /// Portion of `extra_paid` absorbed by the zero floor, recorded on the
    /// synthetic transaction so a later delete restores the right balance.
    pub overpayment: Decimal,
}

/// Recompute the balance for a vendor update.
///
/// `already_paid` is derived from the pre-update total so that a changed
/// `total_amount` does not retroactively alter what has been paid.
pub fn apply_vendor_update(
    pre_total: Decimal,
    pre_pending: Decimal,
    new_total: Decimal,
    extra_paid: Decimal,
) -> VendorUpdate {
    let already_paid = pre_total - pre_pending;
    let paid_amount = already_paid + extra_paid;
    let new_pending = (new_total - paid_amount).max(Decimal::ZERO);
    let overpayment = (paid_amount - new_total).max(Decimal::ZERO).min(extra_paid);

    VendorUpdate {
        new_pending,
        status: PaymentStatus::derive(new_pending, new_total),
        paid_amount,
        overpayment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn clamp_holds_balance_invariant() {
        assert_eq!(clamp_pending(dec!(-50), dec!(1000)), dec!(0));
        assert_eq!(clamp_pending(dec!(1200), dec!(1000)), dec!(1000));
        assert_eq!(clamp_pending(dec!(600), dec!(1000)), dec!(600));
    }

    #[test]
    fn partial_payment_reduces_pending() {
        let change = apply_payment(dec!(1000), dec!(1000), dec!(400));

        assert_eq!(change.new_pending, dec!(600));
        assert_eq!(change.status, PaymentStatus::Partial);
        assert_eq!(change.overpayment, dec!(0));
    }

    #[test]
    fn exact_payment_settles_the_bill() {
        let change = apply_payment(dec!(600), dec!(1000), dec!(600));

        assert_eq!(change.new_pending, dec!(0));
        assert_eq!(change.status, PaymentStatus::Paid);
        assert_eq!(change.overpayment, dec!(0));
    }

    #[test]
    fn overpayment_is_absorbed_and_reported() {
        let change = apply_payment(dec!(600), dec!(1000), dec!(700));

        assert_eq!(change.new_pending, dec!(0));
        assert_eq!(change.status, PaymentStatus::Paid);
        assert_eq!(change.overpayment, dec!(100));
    }

    #[test]
    fn reversing_a_payment_restores_pending() {
        let applied = apply_payment(dec!(1000), dec!(1000), dec!(400));
        let reversed = reverse_payment(
            applied.new_pending,
            dec!(1000),
            dec!(400),
            applied.overpayment,
        );

        assert_eq!(reversed.new_pending, dec!(1000));
        assert_eq!(reversed.status, PaymentStatus::Pending);
    }

    #[test]
    fn reversal_does_not_credit_absorbed_overpayment() {
        // The 700 payment only moved pending from 600 to 0; deleting it must
        // restore 600, not credit the 100 that was absorbed as overpayment.
        let change = reverse_payment(dec!(0), dec!(1000), dec!(700), dec!(100));

        assert_eq!(change.new_pending, dec!(600));
        assert_eq!(change.status, PaymentStatus::Partial);
    }

    #[test]
    fn reversal_clamps_at_total() {
        let change = reverse_payment(dec!(800), dec!(1000), dec!(700), dec!(0));

        assert_eq!(change.new_pending, dec!(1000));
        assert_eq!(change.status, PaymentStatus::Pending);
    }

    #[test]
    fn editing_a_payment_adjusts_in_one_step() {
        let change = adjust_payment(dec!(600), dec!(1000), dec!(400), dec!(0), dec!(250));
        assert_eq!(change.new_pending, dec!(750));
        assert_eq!(change.status, PaymentStatus::Partial);

        let change = adjust_payment(dec!(600), dec!(1000), dec!(400), dec!(0), dec!(1000));
        assert_eq!(change.new_pending, dec!(0));
        assert_eq!(change.status, PaymentStatus::Paid);
        assert_eq!(change.overpayment, dec!(0));
    }

    #[test]
    fn editing_an_overpaid_payment_restores_only_its_applied_portion() {
        // A 700 payment against pending 600 applied 600 and absorbed 100.
        // Editing it down to 250 restores the 600, then applies 250.
        let change = adjust_payment(dec!(0), dec!(1000), dec!(700), dec!(100), dec!(250));

        assert_eq!(change.new_pending, dec!(350));
        assert_eq!(change.status, PaymentStatus::Partial);
        assert_eq!(change.overpayment, dec!(0));
    }

    #[test]
    fn editing_a_payment_can_itself_overpay() {
        let change = adjust_payment(dec!(600), dec!(1000), dec!(400), dec!(0), dec!(1200));

        assert_eq!(change.new_pending, dec!(0));
        assert_eq!(change.status, PaymentStatus::Paid);
        assert_eq!(change.overpayment, dec!(200));
    }

    #[test]
    fn worked_example_from_the_vendor_lifecycle() {
        let total = dec!(1000);
        let mut pending = total;
        assert_eq!(PaymentStatus::derive(pending, total), PaymentStatus::Pending);

        let first = apply_payment(pending, total, dec!(400));
        pending = first.new_pending;
        assert_eq!(pending, dec!(600));
        assert_eq!(first.status, PaymentStatus::Partial);
        assert_eq!(first.overpayment, dec!(0));

        let second = apply_payment(pending, total, dec!(700));
        pending = second.new_pending;
        assert_eq!(pending, dec!(0));
        assert_eq!(second.status, PaymentStatus::Paid);
        assert_eq!(second.overpayment, dec!(100));

        // Deleting the 700 restores the pre-add pending of 600: the
        // absorbed 100 is not credited back.
        let deleted = reverse_payment(pending, total, dec!(700), second.overpayment);
        assert_eq!(deleted.new_pending, dec!(600));
        assert_eq!(deleted.status, PaymentStatus::Partial);
    }

    #[test]
    fn vendor_update_uses_pre_update_total_for_already_paid() {
        // 400 already paid against a 1000 bill; total raised to 1500 and a
        // further 200 paid in the same request.
        let update = apply_vendor_update(dec!(1000), dec!(600), dec!(1500), dec!(200));

        assert_eq!(update.paid_amount, dec!(600));
        assert_eq!(update.new_pending, dec!(900));
        assert_eq!(update.status, PaymentStatus::Partial);
        assert_eq!(update.overpayment, dec!(0));
    }

    #[test]
    fn vendor_update_floors_pending_at_zero() {
        // Total lowered below what has already been paid. No new payment,
        // so nothing is attributed as overpayment.
        let update = apply_vendor_update(dec!(1000), dec!(200), dec!(500), dec!(0));

        assert_eq!(update.paid_amount, dec!(800));
        assert_eq!(update.new_pending, dec!(0));
        assert_eq!(update.status, PaymentStatus::Paid);
        assert_eq!(update.overpayment, dec!(0));
    }

    #[test]
    fn vendor_update_records_overpaid_portion_of_new_payment() {
        let update = apply_vendor_update(dec!(1000), dec!(100), dec!(1000), dec!(300));

        assert_eq!(update.paid_amount, dec!(1200));
        assert_eq!(update.new_pending, dec!(0));
        assert_eq!(update.status, PaymentStatus::Paid);
        assert_eq!(update.overpayment, dec!(200));
    }

    #[test]
    fn vendor_update_without_payment_keeps_paid_amount() {
        let update = apply_vendor_update(dec!(1000), dec!(1000), dec!(1000), dec!(0));

        assert_eq!(update.paid_amount, dec!(0));
        assert_eq!(update.new_pending, dec!(1000));
        assert_eq!(update.status, PaymentStatus::Pending);
    }
}
