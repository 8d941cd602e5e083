//! Daily interest accrual and day-count conventions, shared by loans and
//! (via the same enum, re-exported) credit statements.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use core_money::{MoneyValue, Rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayCountConvention {
    Actual365,
    Actual360,
    Thirty360,
    ActualActual,
}

impl DayCountConvention {
    pub fn days_between(self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        match self {
            DayCountConvention::Thirty360 => {
                days_30_360(start.date_naive(), end.date_naive())
            }
            _ => (end - start).num_days(),
        }
    }

    pub fn year_basis(self, year: i32) -> u32 {
        match self {
            DayCountConvention::Actual365 => 365,
            DayCountConvention::Actual360 | DayCountConvention::Thirty360 => 360,
            DayCountConvention::ActualActual => {
                if is_leap_year(year) {
                    366
                } else {
                    365
                }
            }
        }
    }
}

fn days_30_360(start: NaiveDate, end: NaiveDate) -> i64 {
    let d1 = start.day().min(30) as i64;
    let d2 = if d1 == 30 {
        end.day().min(30) as i64
    } else {
        end.day() as i64
    };
    360 * (end.year() - start.year()) as i64 + 30 * (end.month() as i64 - start.month() as i64)
        + (d2 - d1)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Simple (non-compounding) interest on `principal` over `days`, under
/// `convention`'s year basis for `as_of_year`.
pub fn accrue(
    principal: &MoneyValue,
    annual_rate: Rate,
    days: i64,
    convention: DayCountConvention,
    as_of_year: i32,
) -> MoneyValue {
    if days <= 0 {
        return MoneyValue::zero(principal.currency().clone());
    }
    let year_basis = convention.year_basis(as_of_year);
    let daily_rate = annual_rate.as_decimal() / Decimal::from(year_basis);
    principal.multiply_by_rational(daily_rate * Decimal::from(days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_money::Currency;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn day_count_conventions_agree_on_actual_spans() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(DayCountConvention::Actual365.days_between(start, end), 31);
        assert_eq!(DayCountConvention::Thirty360.days_between(start, end), 30);
    }

    #[test]
    fn accrual_uses_the_selected_year_basis() {
        let principal = MoneyValue::new(dec!(10000.00), Currency::usd());
        let rate = Rate::from_percentage(dec!(5));
        let interest_365 = accrue(&principal, rate, 30, DayCountConvention::Actual365, 2026);
        let interest_360 = accrue(&principal, rate, 30, DayCountConvention::Actual360, 2026);
        assert!(interest_360.amount() > interest_365.amount());
    }
}
