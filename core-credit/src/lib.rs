#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Revolving credit line: statement-cycle compilation, grace-period
//! eligibility, per-category interest accrual, and CARD-Act-style
//! payment allocation on top of `core-processor`'s generic transaction
//! operations.

pub mod waterfall;

pub use waterfall::{allocate as allocate_payment, CreditPaymentApplication};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use core_loan::DayCountConvention;
use core_money::{Currency, MoneyValue, Rate};
use core_processor::{Clock, IdGenerator, ProcessorError, TransactionProcessor};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error, Clone)]
pub enum CreditError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("credit line is not active")]
    CreditLineNotActive,
    #[error("charge would exceed the credit limit")]
    OverLimit,
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

pub type CreditResult<T> = Result<T, CreditError>;

/// A revolving balance's rate bucket. Ordered by typical APR from
/// highest to lowest; [`CreditEngine`] pays principal down in this order
/// during allocation, as CARD Act minimum-payment rules require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BalanceCategory {
    CashAdvance,
    Purchase,
    BalanceTransfer,
    Promotional,
}

impl BalanceCategory {
    pub const ALL: [BalanceCategory; 4] = [
        BalanceCategory::CashAdvance,
        BalanceCategory::Purchase,
        BalanceCategory::BalanceTransfer,
        BalanceCategory::Promotional,
    ];

    /// Whether posting a transaction in this category during a cycle
    /// disqualifies that cycle's grace period, per the product's
    /// standard no-grace-on-cash-advances-or-transfers rule.
    pub fn breaks_grace(&self) -> bool {
        matches!(self, BalanceCategory::CashAdvance | BalanceCategory::BalanceTransfer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditLineState {
    Active,
    Frozen,
    Closed,
    Defaulted,
}

#[derive(Debug, Clone)]
pub struct CreditTerms {
    pub rates: HashMap<BalanceCategory, Rate>,
    pub credit_limit: MoneyValue,
    pub min_payment_percentage: Rate,
    pub min_payment_floor: MoneyValue,
    pub grace_period_days: i64,
    pub statement_cycle_days: i64,
    pub late_fee: MoneyValue,
    pub overlimit_fee: MoneyValue,
    pub cash_advance_fee_rate: Rate,
    pub day_count: DayCountConvention,
}

impl CreditTerms {
    pub fn rate_for(&self, category: BalanceCategory) -> Rate {
        self.rates.get(&category).copied().unwrap_or(Rate::ZERO)
    }
}

#[derive(Debug, Clone)]
pub struct CreditTransaction {
    pub id: String,
    pub category: BalanceCategory,
    pub amount: MoneyValue,
    pub posted_at: DateTime<Utc>,
    pub grace_eligible: bool,
}

#[derive(Debug, Clone)]
pub struct CreditStatement {
    pub cycle_number: u32,
    pub statement_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub previous_balance: MoneyValue,
    pub new_charges: MoneyValue,
    pub interest_charged: MoneyValue,
    pub fees_charged: MoneyValue,
    pub minimum_payment: MoneyValue,
    pub closing_balance: MoneyValue,
    pub grace_active: bool,
    pub paid_in_full_by_due_date: bool,
}

#[derive(Debug, Clone)]
pub struct CreditAccount {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub product_ref: String,
    pub credit_account_id: String,
    pub clearing_account_id: String,
    pub fee_income_account_id: String,
    pub interest_income_account_id: String,
    pub terms: CreditTerms,
    pub state: CreditLineState,
    pub balances_by_category: HashMap<BalanceCategory, MoneyValue>,
    pub accrued_interest: MoneyValue,
    pub outstanding_late_fees: MoneyValue,
    pub outstanding_other_fees: MoneyValue,
    pub transactions: Vec<CreditTransaction>,
    pub statements: Vec<CreditStatement>,
    pub cycle_has_grace_breaking_activity: bool,
    pub cycle_new_charges: MoneyValue,
    pub current_cycle: u32,
    pub last_late_fee_cycle: Option<u32>,
}

impl CreditAccount {
    pub fn total_balance(&self) -> MoneyValue {
        let currency = self.terms.credit_limit.currency().clone();
        self.balances_by_category
            .values()
            .fold(MoneyValue::zero(currency), |acc, m| acc.add(m).unwrap_or(acc))
    }

    /// Balances ordered highest-rate category first, skipping zero
    /// balances, for waterfall allocation and interest accrual.
    fn ordered_balances(&self) -> Vec<(BalanceCategory, MoneyValue)> {
        let mut rated: Vec<(Rate, BalanceCategory, MoneyValue)> = self
            .balances_by_category
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(category, amount)| (self.terms.rate_for(*category), *category, amount.clone()))
            .collect();
        rated.sort_by(|a, b| b.0.cmp(&a.0));
        rated.into_iter().map(|(_, c, m)| (c, m)).collect()
    }

    fn currency(&self) -> &Currency {
        self.terms.credit_limit.currency()
    }
}

pub struct NewCreditLineRequest {
    pub tenant_id: String,
    pub customer_id: String,
    pub product_ref: String,
    pub credit_account_id: String,
    pub clearing_account_id: String,
    pub fee_income_account_id: String,
    pub interest_income_account_id: String,
    pub terms: CreditTerms,
}

pub struct CreditEngine {
    processor: Arc<TransactionProcessor>,
    // Every method here takes its timestamp explicitly (`posted_at`, `as_of`)
    // so callers control statement-cycle dates precisely; kept for
    // constructor symmetry with `LoanEngine`, which does fall back to it.
    #[allow(dead_code)]
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    accounts: AsyncMutex<HashMap<String, CreditAccount>>,
}

impl CreditEngine {
    pub fn new(processor: Arc<TransactionProcessor>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        CreditEngine {
            processor,
            clock,
            ids,
            accounts: AsyncMutex::new(HashMap::new()),
        }
    }

    pub async fn open(&self, request: NewCreditLineRequest) -> CreditResult<CreditAccount> {
        let currency = request.terms.credit_limit.currency().clone();
        let account = CreditAccount {
            id: self.ids.next_id("credit"),
            tenant_id: request.tenant_id,
            customer_id: request.customer_id,
            product_ref: request.product_ref,
            credit_account_id: request.credit_account_id,
            clearing_account_id: request.clearing_account_id,
            fee_income_account_id: request.fee_income_account_id,
            interest_income_account_id: request.interest_income_account_id,
            terms: request.terms,
            state: CreditLineState::Active,
            balances_by_category: HashMap::new(),
            accrued_interest: MoneyValue::zero(currency.clone()),
            outstanding_late_fees: MoneyValue::zero(currency.clone()),
            outstanding_other_fees: MoneyValue::zero(currency.clone()),
            transactions: Vec::new(),
            statements: Vec::new(),
            cycle_has_grace_breaking_activity: false,
            cycle_new_charges: MoneyValue::zero(currency),
            current_cycle: 0,
            last_late_fee_cycle: None,
        };
        let mut guard = self.accounts.lock().await;
        guard.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    pub async fn get(&self, id: &str) -> CreditResult<CreditAccount> {
        self.accounts
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CreditError::NotFound(id.to_string()))
    }

    /// Posts a new charge in `category`. A cash advance also posts its
    /// upfront fee in the same call, per product convention, and both
    /// legs are recorded `grace_eligible = false`.
    pub async fn charge(
        &self,
        credit_line_id: &str,
        actor: &str,
        category: BalanceCategory,
        amount: MoneyValue,
        posted_at: DateTime<Utc>,
        client_reference: Option<String>,
    ) -> CreditResult<()> {
        let mut guard = self.accounts.lock().await;
        let account = guard
            .get_mut(credit_line_id)
            .ok_or_else(|| CreditError::NotFound(credit_line_id.to_string()))?;
        if account.state != CreditLineState::Active {
            return Err(CreditError::CreditLineNotActive);
        }
        let prospective = account
            .total_balance()
            .add(&amount)
            .map_err(|e| CreditError::Validation(e.to_string()))?;
        if prospective
            .compare(&account.terms.credit_limit)
            .map_err(|e| CreditError::Validation(e.to_string()))?
            == std::cmp::Ordering::Greater
        {
            return Err(CreditError::OverLimit);
        }

        self.processor
            .charge(
                &account.tenant_id,
                actor,
                &account.credit_account_id,
                &account.clearing_account_id,
                amount.clone(),
                &format!("{category:?} charge"),
                client_reference,
            )
            .await?;

        let entry = account
            .balances_by_category
            .entry(category)
            .or_insert_with(|| MoneyValue::zero(amount.currency().clone()));
        *entry = entry.add(&amount).map_err(|e| CreditError::Validation(e.to_string()))?;
        account.transactions.push(CreditTransaction {
            id: self.ids.next_id("ctx"),
            category,
            amount: amount.clone(),
            posted_at,
            grace_eligible: !category.breaks_grace(),
        });
        account.cycle_new_charges = account
            .cycle_new_charges
            .add(&amount)
            .map_err(|e| CreditError::Validation(e.to_string()))?;
        if category.breaks_grace() {
            account.cycle_has_grace_breaking_activity = true;
        }

        if category == BalanceCategory::CashAdvance {
            let fee = amount.multiply_by_rational(account.terms.cash_advance_fee_rate.as_decimal());
            if !fee.is_zero() {
                self.processor
                    .fee(
                        &account.tenant_id,
                        actor,
                        &account.credit_account_id,
                        &account.fee_income_account_id,
                        fee.clone(),
                        "cash advance fee",
                        None,
                    )
                    .await?;
                account.outstanding_other_fees = account
                    .outstanding_other_fees
                    .add(&fee)
                    .map_err(|e| CreditError::Validation(e.to_string()))?;
                let cash_entry = account
                    .balances_by_category
                    .entry(BalanceCategory::CashAdvance)
                    .or_insert_with(|| MoneyValue::zero(fee.currency().clone()));
                *cash_entry = cash_entry.add(&fee).map_err(|e| CreditError::Validation(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Accrues one day of interest against every non-grace category
    /// balance and posts the total as a single `INTEREST_ACCRUAL`
    /// operation. No interest accrues while the cycle's grace period is
    /// active.
    pub async fn accrue_daily_interest(
        &self,
        credit_line_id: &str,
        actor: &str,
        as_of: DateTime<Utc>,
        grace_active: bool,
    ) -> CreditResult<MoneyValue> {
        let mut guard = self.accounts.lock().await;
        let account = guard
            .get_mut(credit_line_id)
            .ok_or_else(|| CreditError::NotFound(credit_line_id.to_string()))?;
        let currency = account.currency().clone();
        if grace_active {
            return Ok(MoneyValue::zero(currency));
        }
        let year_basis = account.terms.day_count.year_basis(as_of.naive_utc().date().year_ce().1 as i32);
        let mut total = MoneyValue::zero(currency.clone());
        for (category, balance) in account.ordered_balances() {
            let daily_rate = account.terms.rate_for(category).daily_rate(year_basis);
            let interest = balance.multiply_by_rational(daily_rate.as_decimal());
            total = total.add(&interest).map_err(|e| CreditError::Validation(e.to_string()))?;
        }
        if !total.is_zero() {
            self.processor
                .interest_accrual(
                    &account.tenant_id,
                    actor,
                    &account.credit_account_id,
                    &account.interest_income_account_id,
                    total.clone(),
                    None,
                )
                .await?;
            account.accrued_interest = account
                .accrued_interest
                .add(&total)
                .map_err(|e| CreditError::Validation(e.to_string()))?;
        }
        Ok(total)
    }

    /// Closes the current statement cycle: computes grace eligibility
    /// for the *next* cycle from whether the cycle just ending was paid
    /// in full by its prior due date and had no cash-advance or
    /// balance-transfer activity, assesses a late fee if the prior
    /// statement went unpaid past grace, and appends the new statement.
    pub async fn close_statement(
        &self,
        credit_line_id: &str,
        actor: &str,
        as_of: DateTime<Utc>,
    ) -> CreditResult<CreditStatement> {
        let (tenant_id, credit_account_id, fee_income_account_id, late_fee, should_assess_fee) = {
            let mut guard = self.accounts.lock().await;
            let account = guard
                .get_mut(credit_line_id)
                .ok_or_else(|| CreditError::NotFound(credit_line_id.to_string()))?;

            let previous_balance = account
                .statements
                .last()
                .map(|s| s.closing_balance.clone())
                .unwrap_or_else(|| MoneyValue::zero(account.currency().clone()));
            let paid_in_full = previous_balance.is_zero();
            let prior_due_passed_unpaid = account
                .statements
                .last()
                .map(|s| as_of > s.due_date && !paid_in_full)
                .unwrap_or(false);

            let should_assess = prior_due_passed_unpaid && account.last_late_fee_cycle != Some(account.current_cycle);
            if should_assess {
                account.last_late_fee_cycle = Some(account.current_cycle);
            }

            let grace_active = paid_in_full && !account.cycle_has_grace_breaking_activity;
            account.cycle_has_grace_breaking_activity = false;
            account.current_cycle += 1;
            let zero_currency = account.currency().clone();
            let cycle_new_charges = std::mem::replace(
                &mut account.cycle_new_charges,
                MoneyValue::zero(zero_currency),
            );

            let closing_balance = account.total_balance();
            let min_by_percentage = closing_balance.multiply_by_rational(account.terms.min_payment_percentage.as_decimal());
            let minimum_payment = min_by_percentage
                .max(&account.terms.min_payment_floor)
                .and_then(|m| m.min(&closing_balance))
                .unwrap_or(closing_balance.clone());

            let statement = CreditStatement {
                cycle_number: account.current_cycle,
                statement_date: as_of,
                due_date: as_of + chrono::Duration::days(account.terms.grace_period_days),
                previous_balance,
                new_charges: cycle_new_charges,
                interest_charged: account.accrued_interest.clone(),
                fees_charged: account
                    .outstanding_late_fees
                    .add(&account.outstanding_other_fees)
                    .unwrap_or_else(|_| MoneyValue::zero(account.currency().clone())),
                minimum_payment,
                closing_balance,
                grace_active,
                paid_in_full_by_due_date: paid_in_full,
            };
            account.statements.push(statement.clone());

            (
                account.tenant_id.clone(),
                account.credit_account_id.clone(),
                account.fee_income_account_id.clone(),
                account.terms.late_fee.clone(),
                should_assess,
            )
        };

        if should_assess_fee {
            self.processor
                .fee(&tenant_id, actor, &credit_account_id, &fee_income_account_id, late_fee.clone(), "late payment fee", None)
                .await?;
            let mut guard = self.accounts.lock().await;
            if let Some(account) = guard.get_mut(credit_line_id) {
                account.outstanding_late_fees = account
                    .outstanding_late_fees
                    .add(&late_fee)
                    .map_err(|e| CreditError::Validation(e.to_string()))?;
            }
        }

        self.accounts
            .lock()
            .await
            .get(credit_line_id)
            .and_then(|a| a.statements.last().cloned())
            .ok_or_else(|| CreditError::NotFound(credit_line_id.to_string()))
    }

    /// Applies a payment through the fees -> interest -> highest-rate-
    /// category-principal waterfall and posts it as one `credit_payment`
    /// operation.
    pub async fn record_payment(
        &self,
        credit_line_id: &str,
        actor: &str,
        source_account_id: &str,
        amount: MoneyValue,
        client_reference: Option<String>,
    ) -> CreditResult<CreditPaymentApplication> {
        let mut guard = self.accounts.lock().await;
        let account = guard
            .get_mut(credit_line_id)
            .ok_or_else(|| CreditError::NotFound(credit_line_id.to_string()))?;

        let application = waterfall::allocate(
            &amount,
            &account.outstanding_late_fees,
            &account.outstanding_other_fees,
            &account.accrued_interest,
            &account.ordered_balances(),
        );

        let currency = account.currency().clone();
        self.processor
            .credit_payment(
                &account.tenant_id,
                actor,
                source_account_id,
                &account.credit_account_id,
                application.to_late_fees.add(&application.to_other_fees).map_err(|e| CreditError::Validation(e.to_string()))?,
                application.to_interest.clone(),
                application.total_to_principal(&currency),
                client_reference,
            )
            .await?;

        account.outstanding_late_fees = account
            .outstanding_late_fees
            .sub(&application.to_late_fees)
            .map_err(|e| CreditError::Validation(e.to_string()))?;
        account.outstanding_other_fees = account
            .outstanding_other_fees
            .sub(&application.to_other_fees)
            .map_err(|e| CreditError::Validation(e.to_string()))?;
        account.accrued_interest = account
            .accrued_interest
            .sub(&application.to_interest)
            .map_err(|e| CreditError::Validation(e.to_string()))?;
        for (category, paid) in &application.to_principal_by_category {
            if let Some(balance) = account.balances_by_category.get_mut(category) {
                *balance = balance.sub(paid).map_err(|e| CreditError::Validation(e.to_string()))?;
            }
        }

        Ok(application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_audit::InMemoryAuditChain;
    use core_events::InMemoryDomainEventBus;
    use core_ledger::{Account, AccountKind, AccountLimits, AccountStatus, InMemoryLedger, Ledger};
    use core_processor::{SequentialIdGenerator, SystemClock};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    async fn harness() -> Arc<CreditEngine> {
        harness_with_ledger().await.0
    }

    async fn harness_with_ledger() -> (Arc<CreditEngine>, Arc<dyn Ledger>) {
        let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let audit = Arc::new(InMemoryAuditChain::new());
        let events = Arc::new(InMemoryDomainEventBus::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::default());
        let processor = Arc::new(TransactionProcessor::new(ledger.clone(), audit, events, clock.clone(), ids.clone()));

        for (id, kind) in [
            ("credit-receivable", AccountKind::Asset),
            ("merchant-clearing", AccountKind::Liability),
            ("checking", AccountKind::Liability),
            ("interest-income", AccountKind::Revenue),
            ("fee-income", AccountKind::Revenue),
        ] {
            ledger
                .register_account(
                    "t1",
                    Account {
                        id: id.into(),
                        customer_id: "cust-1".into(),
                        product_ref: "credit-card".into(),
                        currency: Currency::usd(),
                        kind,
                        status: AccountStatus::Active,
                        created_at: Utc::now(),
                        limits: AccountLimits::default(),
                    },
                )
                .await
                .unwrap();
        }

        (Arc::new(CreditEngine::new(processor, clock, ids)), ledger)
    }

    fn standard_terms() -> CreditTerms {
        let mut rates = HashMap::new();
        rates.insert(BalanceCategory::Purchase, Rate::from_percentage(dec!(18)));
        rates.insert(BalanceCategory::CashAdvance, Rate::from_percentage(dec!(24)));
        rates.insert(BalanceCategory::BalanceTransfer, Rate::from_percentage(dec!(15)));
        CreditTerms {
            rates,
            credit_limit: MoneyValue::new(dec!(5000.00), Currency::usd()),
            min_payment_percentage: Rate::from_percentage(dec!(2)),
            min_payment_floor: MoneyValue::new(dec!(25.00), Currency::usd()),
            grace_period_days: 21,
            statement_cycle_days: 30,
            late_fee: MoneyValue::new(dec!(35.00), Currency::usd()),
            overlimit_fee: MoneyValue::new(dec!(35.00), Currency::usd()),
            cash_advance_fee_rate: Rate::from_percentage(dec!(3)),
            day_count: DayCountConvention::Actual365,
        }
    }

    async fn open_line(engine: &CreditEngine) -> CreditAccount {
        engine
            .open(NewCreditLineRequest {
                tenant_id: "t1".into(),
                customer_id: "cust-1".into(),
                product_ref: "rewards-card".into(),
                credit_account_id: "credit-receivable".into(),
                clearing_account_id: "merchant-clearing".into(),
                fee_income_account_id: "fee-income".into(),
                interest_income_account_id: "interest-income".into(),
                terms: standard_terms(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn purchase_is_charged_and_raises_the_balance() {
        let engine = harness().await;
        let line = open_line(&engine).await;
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        engine
            .charge(&line.id, "pos-1", BalanceCategory::Purchase, MoneyValue::new(dec!(200.00), Currency::usd()), now, None)
            .await
            .unwrap();
        let updated = engine.get(&line.id).await.unwrap();
        assert_eq!(updated.total_balance().amount(), dec!(200.00));
    }

    #[tokio::test]
    async fn charge_over_the_credit_limit_is_refused() {
        let engine = harness().await;
        let line = open_line(&engine).await;
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let result = engine
            .charge(&line.id, "pos-1", BalanceCategory::Purchase, MoneyValue::new(dec!(6000.00), Currency::usd()), now, None)
            .await;
        assert!(matches!(result, Err(CreditError::OverLimit)));
    }

    #[tokio::test]
    async fn cash_advance_breaks_grace_eligibility_for_the_cycle() {
        let engine = harness().await;
        let line = open_line(&engine).await;
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        engine
            .charge(&line.id, "atm-1", BalanceCategory::CashAdvance, MoneyValue::new(dec!(100.00), Currency::usd()), now, None)
            .await
            .unwrap();
        let statement = engine.close_statement(&line.id, "system", now + chrono::Duration::days(30)).await.unwrap();
        assert!(!statement.grace_active);
    }

    #[tokio::test]
    async fn payment_allocates_fees_interest_then_highest_rate_principal() {
        let engine = harness().await;
        let line = open_line(&engine).await;
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        engine
            .charge(&line.id, "pos-1", BalanceCategory::Purchase, MoneyValue::new(dec!(500.00), Currency::usd()), now, None)
            .await
            .unwrap();
        engine
            .charge(&line.id, "atm-1", BalanceCategory::CashAdvance, MoneyValue::new(dec!(200.00), Currency::usd()), now, None)
            .await
            .unwrap();

        let app = engine
            .record_payment(&line.id, "teller", "checking", MoneyValue::new(dec!(250.00), Currency::usd()), None)
            .await
            .unwrap();
        assert_eq!(app.to_principal_by_category[0].0, BalanceCategory::CashAdvance);
    }

    #[tokio::test]
    async fn accrued_interest_is_relieved_on_payment_without_double_booking_income() {
        let (engine, ledger) = harness_with_ledger().await;
        let line = open_line(&engine).await;
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        engine
            .charge(&line.id, "pos-1", BalanceCategory::Purchase, MoneyValue::new(dec!(500.00), Currency::usd()), now, None)
            .await
            .unwrap();

        let accrued = engine
            .accrue_daily_interest(&line.id, "system", now + chrono::Duration::days(1), false)
            .await
            .unwrap();
        assert!(accrued.is_positive());

        let income_after_accrual = ledger
            .balance("t1", "interest-income", &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(income_after_accrual.amount(), accrued.amount());

        let receivable_after_accrual = ledger
            .balance("t1", "credit-receivable", &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(receivable_after_accrual.amount(), dec!(500.00) + accrued.amount());

        let app = engine
            .record_payment(&line.id, "teller", "checking", accrued.clone(), None)
            .await
            .unwrap();
        assert_eq!(app.to_interest.amount(), accrued.amount());
        assert!(app.to_principal_by_category.iter().all(|(_, m)| m.is_zero()));

        let income_after_payment = ledger
            .balance("t1", "interest-income", &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(
            income_after_payment.amount(),
            accrued.amount(),
            "paying accrued interest must not re-credit interest income"
        );

        let receivable_after_payment = ledger
            .balance("t1", "credit-receivable", &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(
            receivable_after_payment.amount(),
            dec!(500.00),
            "the interest leg of the payment must relieve the receivable"
        );

        let account_after_payment = engine.get(&line.id).await.unwrap();
        assert!(account_after_payment.accrued_interest.is_zero());
    }
}
