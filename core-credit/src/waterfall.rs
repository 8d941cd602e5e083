//! Revolving-credit payment allocation: late fees, then other fees, then
//! accrued interest, then principal ordered highest-rate balance category
//! first, oldest charge first within a category. Mirrors the loan
//! engine's fixed-priority waterfall but adds the balance-category
//! ordering a credit card's multiple APRs require.

use core_money::MoneyValue;

use crate::BalanceCategory;

#[derive(Debug, Clone)]
pub struct CreditPaymentApplication {
    pub to_late_fees: MoneyValue,
    pub to_other_fees: MoneyValue,
    pub to_interest: MoneyValue,
    /// Principal applied per category, in the order it was applied.
    pub to_principal_by_category: Vec<(BalanceCategory, MoneyValue)>,
    pub overpayment: MoneyValue,
}

impl CreditPaymentApplication {
    pub fn total_to_principal(&self, currency: &core_money::Currency) -> MoneyValue {
        self.to_principal_by_category
            .iter()
            .fold(MoneyValue::zero(currency.clone()), |acc, (_, m)| {
                acc.add(m).unwrap_or(acc)
            })
    }

    pub fn total_applied(&self, currency: &core_money::Currency) -> MoneyValue {
        [
            self.to_late_fees.clone(),
            self.to_other_fees.clone(),
            self.to_interest.clone(),
        ]
        .into_iter()
        .chain(self.to_principal_by_category.iter().map(|(_, m)| m.clone()))
        .fold(MoneyValue::zero(currency.clone()), |acc, m| {
            acc.add(&m).unwrap_or(acc)
        })
    }
}

/// `category_balances` must already be ordered highest APR first; within
/// a category `oldest_first_balance` is the only amount tracked here
/// (the engine keeps the per-transaction detail needed for true oldest-
/// first attribution and only passes this function the category totals).
pub fn allocate(
    payment: &MoneyValue,
    outstanding_late_fees: &MoneyValue,
    outstanding_other_fees: &MoneyValue,
    accrued_interest: &MoneyValue,
    category_balances: &[(BalanceCategory, MoneyValue)],
) -> CreditPaymentApplication {
    let currency = payment.currency().clone();
    let mut remaining = payment.clone();

    let to_late_fees = remaining
        .min(outstanding_late_fees)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
    remaining = remaining.sub(&to_late_fees).unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

    let to_other_fees = remaining
        .min(outstanding_other_fees)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
    remaining = remaining.sub(&to_other_fees).unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

    let to_interest = remaining
        .min(accrued_interest)
        .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
    remaining = remaining.sub(&to_interest).unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

    let mut to_principal_by_category = Vec::new();
    for (category, balance) in category_balances {
        if remaining.is_zero() {
            break;
        }
        let applied = remaining.min(balance).unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
        if !applied.is_zero() {
            remaining = remaining.sub(&applied).unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
            to_principal_by_category.push((*category, applied));
        }
    }

    CreditPaymentApplication {
        to_late_fees,
        to_other_fees,
        to_interest,
        to_principal_by_category,
        overpayment: remaining,
    }
}
