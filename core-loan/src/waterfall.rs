//! CARD-Act-style payment allocation: late fees, then accrued interest,
//! then principal, with any remainder recorded as overpayment for the
//! caller to apply per product policy. Shared in shape with the credit
//! engine's statement allocation, but loans have no balance-category
//! priority ordering to resolve.

use core_money::MoneyValue;

#[derive(Debug, Clone)]
pub struct LoanPaymentApplication {
    pub to_late_fees: MoneyValue,
    pub to_interest: MoneyValue,
    pub to_principal: MoneyValue,
    pub overpayment: MoneyValue,
}

impl LoanPaymentApplication {
    pub fn total_applied(&self) -> MoneyValue {
        let currency = self.to_late_fees.currency().clone();
        [&self.to_late_fees, &self.to_interest, &self.to_principal]
            .iter()
            .fold(MoneyValue::zero(currency), |acc, m| {
                acc.add(m).unwrap_or(acc)
            })
    }
}

/// Allocates `payment` across outstanding balances in the fixed priority
/// order the spec mandates: late fees, then accrued interest, then
/// principal. Any amount left over is returned as overpayment rather than
/// silently applied; the caller (the loan engine) decides whether to post
/// it against next period's principal or hold it.
pub fn allocate(
    payment: &MoneyValue,
    outstanding_late_fees: &MoneyValue,
    accrued_interest: &MoneyValue,
    outstanding_principal: &MoneyValue,
) -> LoanPaymentApplication {
    let currency = payment.currency().clone();
    let mut remaining = payment.clone();

    let to_late_fees = remaining
        .min(outstanding_late_fees)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
    remaining = remaining
        .sub(&to_late_fees)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

    let to_interest = remaining
        .min(accrued_interest)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
    remaining = remaining
        .sub(&to_interest)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

    let to_principal = remaining
        .min(outstanding_principal)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
    remaining = remaining
        .sub(&to_principal)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

    LoanPaymentApplication {
        to_late_fees,
        to_interest,
        to_principal,
        overpayment: remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_money::Currency;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn allocates_in_fixed_priority_order() {
        let payment = MoneyValue::new(dec!(150.00), Currency::usd());
        let late_fees = MoneyValue::new(dec!(25.00), Currency::usd());
        let interest = MoneyValue::new(dec!(50.00), Currency::usd());
        let principal = MoneyValue::new(dec!(1000.00), Currency::usd());

        let app = allocate(&payment, &late_fees, &interest, &principal);

        assert_eq!(app.to_late_fees, late_fees);
        assert_eq!(app.to_interest, interest);
        assert_eq!(app.to_principal, MoneyValue::new(dec!(75.00), Currency::usd()));
        assert!(app.overpayment.is_zero());
    }

    #[test]
    fn overpayment_is_reported_not_applied() {
        let payment = MoneyValue::new(dec!(2000.00), Currency::usd());
        let late_fees = MoneyValue::zero(Currency::usd());
        let interest = MoneyValue::new(dec!(50.00), Currency::usd());
        let principal = MoneyValue::new(dec!(1000.00), Currency::usd());

        let app = allocate(&payment, &late_fees, &interest, &principal);

        assert_eq!(app.overpayment, MoneyValue::new(dec!(950.00), Currency::usd()));
    }
}
