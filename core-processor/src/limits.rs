//! Daily/monthly limit windows. A shared mutable cache rebuildable from
//! the ledger: it only ever accumulates debits already posted through
//! this processor and is safe to discard and re-warm from transaction
//! history if it is ever lost.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use core_money::MoneyValue;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Window {
    day: (i32, u32, u32),
    day_total: MoneyValue,
    month: (i32, u32),
    month_total: MoneyValue,
}

#[derive(Default)]
pub struct LimitTracker {
    windows: Mutex<HashMap<String, Window>>,
}

impl LimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `amount` against `account_id`'s running daily/monthly
    /// windows (resetting a window whose calendar day/month has rolled
    /// over) and returns the totals *after* recording.
    pub async fn record_and_get_totals(
        &self,
        account_id: &str,
        amount: &MoneyValue,
        now: DateTime<Utc>,
    ) -> (MoneyValue, MoneyValue) {
        let today = (now.year(), now.month(), now.day());
        let this_month = (now.year(), now.month());
        let mut guard = self.windows.lock().await;
        let entry = guard.entry(account_id.to_string()).or_insert_with(|| Window {
            day: today,
            day_total: MoneyValue::zero(amount.currency().clone()),
            month: this_month,
            month_total: MoneyValue::zero(amount.currency().clone()),
        });
        if entry.day != today {
            entry.day = today;
            entry.day_total = MoneyValue::zero(amount.currency().clone());
        }
        if entry.month != this_month {
            entry.month = this_month;
            entry.month_total = MoneyValue::zero(amount.currency().clone());
        }
        entry.day_total = entry
            .day_total
            .add(amount)
            .unwrap_or_else(|_| entry.day_total.clone());
        entry.month_total = entry
            .month_total
            .add(amount)
            .unwrap_or_else(|_| entry.month_total.clone());
        (entry.day_total.clone(), entry.month_total.clone())
    }

    /// Peek at current totals without recording a new movement, used to
    /// check whether a *prospective* amount would breach a limit.
    pub async fn peek_totals(&self, account_id: &str, currency: &core_money::Currency, now: DateTime<Utc>) -> (MoneyValue, MoneyValue) {
        let today = (now.year(), now.month(), now.day());
        let this_month = (now.year(), now.month());
        let guard = self.windows.lock().await;
        match guard.get(account_id) {
            Some(w) if w.day == today && w.month == this_month => {
                (w.day_total.clone(), w.month_total.clone())
            }
            Some(w) if w.month == this_month => {
                (MoneyValue::zero(currency.clone()), w.month_total.clone())
            }
            _ => (MoneyValue::zero(currency.clone()), MoneyValue::zero(currency.clone())),
        }
    }
}
