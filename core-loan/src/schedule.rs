//! Amortization schedule generation. A schedule is always a derived,
//! regenerable view over a loan's terms and its posted payment history --
//! never the system of record for outstanding principal.

use chrono::{DateTime, Datelike, Utc};
use core_money::{Currency, MoneyValue, Rate};
use rust_decimal::Decimal;

use crate::{AmortizationMethod, LoanError, LoanResult, PaymentFrequency};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPayment {
    pub period: u32,
    pub due_date: DateTime<Utc>,
    pub beginning_balance: MoneyValue,
    pub payment_amount: MoneyValue,
    pub principal_portion: MoneyValue,
    pub interest_portion: MoneyValue,
    pub ending_balance: MoneyValue,
}

#[derive(Debug, Clone)]
pub struct AmortizationSchedule {
    pub principal: MoneyValue,
    pub annual_rate: Rate,
    pub term_periods: u32,
    pub frequency: PaymentFrequency,
    pub method: AmortizationMethod,
    pub payments: Vec<ScheduledPayment>,
}

impl AmortizationSchedule {
    pub fn total_interest(&self) -> MoneyValue {
        let currency = self.principal.currency().clone();
        self.payments
            .iter()
            .fold(MoneyValue::zero(currency), |acc, p| {
                acc.add(&p.interest_portion).unwrap_or(acc)
            })
    }

    pub fn balance_after(&self, period: u32) -> MoneyValue {
        self.payments
            .iter()
            .find(|p| p.period == period)
            .map(|p| p.ending_balance.clone())
            .unwrap_or_else(|| self.principal.clone())
    }
}

/// Generates a full schedule for `method`, starting with the first payment
/// due one period after `first_payment_date`'s anchor (the caller passes
/// the first due date directly; subsequent dates step by `frequency`).
pub fn generate(
    principal: &MoneyValue,
    annual_rate: Rate,
    term_periods: u32,
    frequency: PaymentFrequency,
    first_payment_date: DateTime<Utc>,
    method: AmortizationMethod,
) -> LoanResult<AmortizationSchedule> {
    if term_periods == 0 {
        return Err(LoanError::Validation("term_periods must be > 0".into()));
    }
    let periods_per_year = frequency.periods_per_year();
    let period_rate = annual_rate.as_decimal() / Decimal::from(periods_per_year);
    let currency = principal.currency().clone();

    let payments = match method {
        AmortizationMethod::EqualInstallment => {
            equal_installment(principal, period_rate, term_periods, frequency, first_payment_date, &currency)
        }
        AmortizationMethod::EqualPrincipal => {
            equal_principal(principal, period_rate, term_periods, frequency, first_payment_date, &currency)
        }
        AmortizationMethod::Bullet => {
            bullet(principal, period_rate, term_periods, frequency, first_payment_date, &currency)
        }
    };

    Ok(AmortizationSchedule {
        principal: principal.clone(),
        annual_rate,
        term_periods,
        frequency,
        method,
        payments,
    })
}

fn installment_amount(principal: &MoneyValue, period_rate: Decimal, n: u32) -> MoneyValue {
    if period_rate.is_zero() {
        return principal
            .divide_by_rational(Decimal::from(n))
            .unwrap_or_else(|_| principal.clone());
    }
    let base = Decimal::ONE + period_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..n {
        compound *= base;
    }
    let numerator = principal.amount() * period_rate * compound;
    let denominator = compound - Decimal::ONE;
    MoneyValue::new(numerator / denominator, principal.currency().clone())
}

/// Solves for the number of periods a fixed `installment` takes to retire
/// `principal`, used by the reduce-term prepayment strategy to keep the
/// payment amount constant while shortening the remaining term.
pub fn periods_for_installment(principal: &MoneyValue, period_rate: Decimal, installment: &MoneyValue) -> u32 {
    if period_rate.is_zero() {
        if installment.is_zero() {
            return 0;
        }
        let ratio = principal.amount() / installment.amount();
        return ratio.ceil().to_string().parse().unwrap_or(0);
    }
    let mut remaining = principal.amount();
    let mut periods = 0u32;
    while remaining > Decimal::ZERO && periods < 1200 {
        let interest = remaining * period_rate;
        let principal_payment = installment.amount() - interest;
        if principal_payment <= Decimal::ZERO {
            break;
        }
        remaining -= principal_payment;
        periods += 1;
    }
    periods
}

fn equal_installment(
    principal: &MoneyValue,
    period_rate: Decimal,
    n: u32,
    frequency: PaymentFrequency,
    first_payment_date: DateTime<Utc>,
    currency: &Currency,
) -> Vec<ScheduledPayment> {
    let installment = installment_amount(principal, period_rate, n);
    let mut payments = Vec::with_capacity(n as usize);
    let mut balance = principal.clone();

    for period in 1..=n {
        let due_date = frequency.advance(first_payment_date, period - 1);
        let interest_portion = balance.multiply_by_rational(period_rate);
        let mut principal_portion = installment
            .sub(&interest_portion)
            .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
        let mut payment_amount = installment.clone();

        let mut ending_balance = balance
            .sub(&principal_portion)
            .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));
        if ending_balance.is_negative() || period == n {
            // Last period (or overshoot from quantization) absorbs the residual.
            principal_portion = balance.clone();
            payment_amount = principal_portion
                .add(&interest_portion)
                .unwrap_or_else(|_| payment_amount.clone());
            ending_balance = MoneyValue::zero(currency.clone());
        }

        payments.push(ScheduledPayment {
            period,
            due_date,
            beginning_balance: balance.clone(),
            payment_amount,
            principal_portion,
            interest_portion,
            ending_balance: ending_balance.clone(),
        });
        balance = ending_balance;
    }
    payments
}

fn equal_principal(
    principal: &MoneyValue,
    period_rate: Decimal,
    n: u32,
    frequency: PaymentFrequency,
    first_payment_date: DateTime<Utc>,
    currency: &Currency,
) -> Vec<ScheduledPayment> {
    let principal_payment = principal
        .divide_by_rational(Decimal::from(n))
        .unwrap_or_else(|_| principal.clone());
    let mut payments = Vec::with_capacity(n as usize);
    let mut balance = principal.clone();

    for period in 1..=n {
        let due_date = frequency.advance(first_payment_date, period - 1);
        let interest_portion = balance.multiply_by_rational(period_rate);
        let principal_portion = if period == n {
            balance.clone()
        } else {
            principal_payment.clone()
        };
        let payment_amount = principal_portion
            .add(&interest_portion)
            .unwrap_or_else(|_| principal_portion.clone());
        let ending_balance = balance
            .sub(&principal_portion)
            .unwrap_or_else(|_| MoneyValue::zero(currency.clone()));

        payments.push(ScheduledPayment {
            period,
            due_date,
            beginning_balance: balance.clone(),
            payment_amount,
            principal_portion,
            interest_portion,
            ending_balance: ending_balance.clone(),
        });
        balance = ending_balance;
    }
    payments
}

fn bullet(
    principal: &MoneyValue,
    period_rate: Decimal,
    n: u32,
    frequency: PaymentFrequency,
    first_payment_date: DateTime<Utc>,
    currency: &Currency,
) -> Vec<ScheduledPayment> {
    let interest_only = principal.multiply_by_rational(period_rate);
    let mut payments = Vec::with_capacity(n as usize);

    for period in 1..=n {
        let due_date = frequency.advance(first_payment_date, period - 1);
        let is_last = period == n;
        let principal_portion = if is_last {
            principal.clone()
        } else {
            MoneyValue::zero(currency.clone())
        };
        let payment_amount = interest_only
            .add(&principal_portion)
            .unwrap_or_else(|_| interest_only.clone());
        let ending_balance = if is_last {
            MoneyValue::zero(currency.clone())
        } else {
            principal.clone()
        };

        payments.push(ScheduledPayment {
            period,
            due_date,
            beginning_balance: principal.clone(),
            payment_amount,
            principal_portion,
            interest_portion: interest_only.clone(),
            ending_balance,
        });
    }
    payments
}

impl PaymentFrequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::BiWeekly => 26,
            PaymentFrequency::Weekly => 52,
        }
    }

    /// Advances `anchor` by `periods` whole periods of this frequency.
    pub fn advance(self, anchor: DateTime<Utc>, periods: u32) -> DateTime<Utc> {
        match self {
            PaymentFrequency::Monthly => add_months(anchor, periods),
            PaymentFrequency::BiWeekly => anchor + chrono::Duration::days(14 * periods as i64),
            PaymentFrequency::Weekly => anchor + chrono::Duration::days(7 * periods as i64),
        }
    }
}

/// Steps forward `months` whole calendar months, clamping the day of
/// month into range for shorter target months (Jan 31 + 1 month -> Feb
/// 28/29, not an overflow into March).
fn add_months(date: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let total = date.year() * 12 + date.month() as i32 - 1 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    date.with_day(1)
        .and_then(|d| d.with_year(year))
        .and_then(|d| d.with_month(month))
        .and_then(|d| d.with_day(day))
        .unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_money::Currency;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn equal_installment_schedule_amortizes_to_zero() {
        let principal = MoneyValue::new(dec!(10000.00), Currency::usd());
        let rate = Rate::from_percentage(dec!(6));
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let schedule = generate(
            &principal,
            rate,
            12,
            PaymentFrequency::Monthly,
            start,
            AmortizationMethod::EqualInstallment,
        )
        .unwrap();

        assert_eq!(schedule.payments.len(), 12);
        assert!(schedule.payments.last().unwrap().ending_balance.is_zero());
        let first_installment = schedule.payments[0].payment_amount.clone();
        for payment in &schedule.payments[..11] {
            assert_eq!(payment.payment_amount, first_installment);
        }
    }

    #[test]
    fn equal_principal_schedule_has_declining_interest() {
        let principal = MoneyValue::new(dec!(10000.00), Currency::usd());
        let rate = Rate::from_percentage(dec!(6));
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let schedule = generate(
            &principal,
            rate,
            12,
            PaymentFrequency::Monthly,
            start,
            AmortizationMethod::EqualPrincipal,
        )
        .unwrap();

        for window in schedule.payments.windows(2) {
            assert!(window[1].interest_portion.amount() <= window[0].interest_portion.amount());
        }
        assert!(schedule.payments.last().unwrap().ending_balance.is_zero());
    }

    #[test]
    fn bullet_schedule_defers_principal_to_final_payment() {
        let principal = MoneyValue::new(dec!(5000.00), Currency::usd());
        let rate = Rate::from_percentage(dec!(8));
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let schedule = generate(
            &principal,
            rate,
            6,
            PaymentFrequency::Monthly,
            start,
            AmortizationMethod::Bullet,
        )
        .unwrap();

        for payment in &schedule.payments[..5] {
            assert!(payment.principal_portion.is_zero());
        }
        assert_eq!(schedule.payments[5].principal_portion, principal);
    }
}
