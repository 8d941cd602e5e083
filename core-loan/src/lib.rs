#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Loan origination, amortization, accrual, payment allocation, prepayment
//! and delinquency tracking on top of `core-processor`'s generic
//! transaction operations.

pub mod accrual;
pub mod schedule;
pub mod waterfall;

pub use accrual::DayCountConvention;
pub use schedule::{generate as generate_schedule, periods_for_installment, AmortizationSchedule, ScheduledPayment};
pub use waterfall::{allocate as allocate_payment, LoanPaymentApplication};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use core_money::{MoneyValue, Rate};
use core_processor::{Clock, IdGenerator, ProcessorError, TransactionProcessor};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error, Clone)]
pub enum LoanError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("loan is not disburseable in its current state")]
    LoanNotDisburseable,
    #[error("loan is in the wrong state for this operation: {0}")]
    LoanInWrongState(String),
    #[error("prepayment is not allowed for this loan")]
    PrepaymentNotAllowed,
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

pub type LoanResult<T> = Result<T, LoanError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmortizationMethod {
    EqualInstallment,
    EqualPrincipal,
    Bullet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFrequency {
    Monthly,
    BiWeekly,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanState {
    Originated,
    Disbursed,
    Active,
    PaidOff,
    Defaulted,
    WrittenOff,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepaymentStrategy {
    /// Keep the term, lower the remaining installments.
    ReduceInstallment,
    /// Keep the installment amount, shorten the remaining term.
    ReduceTerm,
}

#[derive(Debug, Clone)]
pub struct LoanTerms {
    pub annual_rate: Rate,
    pub term_periods: u32,
    pub frequency: PaymentFrequency,
    pub amortization_method: AmortizationMethod,
    pub day_count: DayCountConvention,
    pub grace_period_days: i64,
    pub late_fee: MoneyValue,
    pub prepayment_allowed: bool,
    pub prepayment_rate: Rate,
    pub prepayment_strategy: PrepaymentStrategy,
}

#[derive(Debug, Clone)]
pub struct Loan {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub product_ref: String,
    pub receivable_account_id: String,
    pub interest_income_account_id: String,
    pub principal: MoneyValue,
    pub terms: LoanTerms,
    pub first_payment_date: DateTime<Utc>,
    pub state: LoanState,
    pub outstanding_principal: MoneyValue,
    pub accrued_interest: MoneyValue,
    pub total_paid: MoneyValue,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_due_date: Option<DateTime<Utc>>,
    pub days_past_due: i64,
    pub late_fee_accumulator: MoneyValue,
    pub schedule: AmortizationSchedule,
    pub current_period: u32,
    pub last_late_fee_cycle: Option<u32>,
}

impl Loan {
    pub fn days_past_due_bucket(&self) -> &'static str {
        match self.days_past_due {
            d if d <= 0 => "0",
            1..=30 => "1-30",
            31..=60 => "31-60",
            61..=90 => "61-90",
            _ => "90+",
        }
    }
}

pub struct NewLoanRequest {
    pub tenant_id: String,
    pub customer_id: String,
    pub product_ref: String,
    pub receivable_account_id: String,
    pub interest_income_account_id: String,
    pub principal: MoneyValue,
    pub terms: LoanTerms,
    pub first_payment_date: DateTime<Utc>,
}

pub struct LoanEngine {
    processor: Arc<TransactionProcessor>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    loans: AsyncMutex<HashMap<String, Loan>>,
}

impl LoanEngine {
    pub fn new(processor: Arc<TransactionProcessor>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        LoanEngine {
            processor,
            clock,
            ids,
            loans: AsyncMutex::new(HashMap::new()),
        }
    }

    pub async fn originate(&self, request: NewLoanRequest) -> LoanResult<Loan> {
        let schedule = schedule::generate(
            &request.principal,
            request.terms.annual_rate,
            request.terms.term_periods,
            request.terms.frequency,
            request.first_payment_date,
            request.terms.amortization_method,
        )
        .map_err(|e| LoanError::Validation(e.to_string()))?;

        let loan = Loan {
            id: self.ids.next_id("loan"),
            tenant_id: request.tenant_id,
            customer_id: request.customer_id,
            product_ref: request.product_ref,
            receivable_account_id: request.receivable_account_id,
            interest_income_account_id: request.interest_income_account_id,
            accrued_interest: MoneyValue::zero(request.principal.currency().clone()),
            total_paid: MoneyValue::zero(request.principal.currency().clone()),
            late_fee_accumulator: MoneyValue::zero(request.principal.currency().clone()),
            outstanding_principal: request.principal.clone(),
            principal: request.principal,
            terms: request.terms,
            first_payment_date: request.first_payment_date,
            state: LoanState::Originated,
            last_payment_date: None,
            next_payment_due_date: Some(schedule.payments[0].due_date),
            days_past_due: 0,
            current_period: 0,
            last_late_fee_cycle: None,
            schedule,
        };

        let mut guard = self.loans.lock().await;
        guard.insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }

    pub async fn get(&self, loan_id: &str) -> LoanResult<Loan> {
        self.loans
            .lock()
            .await
            .get(loan_id)
            .cloned()
            .ok_or_else(|| LoanError::NotFound(loan_id.to_string()))
    }

    pub async fn disburse(
        &self,
        loan_id: &str,
        actor: &str,
        target_account_id: &str,
    ) -> LoanResult<Loan> {
        let mut guard = self.loans.lock().await;
        let loan = guard.get_mut(loan_id).ok_or_else(|| LoanError::NotFound(loan_id.to_string()))?;
        if loan.state != LoanState::Originated {
            return Err(LoanError::LoanNotDisburseable);
        }
        self.processor
            .loan_disburse(
                &loan.tenant_id,
                actor,
                &loan.receivable_account_id,
                target_account_id,
                loan.principal.clone(),
                Some(format!("loan-disburse-{}", loan.id)),
            )
            .await?;
        loan.state = LoanState::Disbursed;
        Ok(loan.clone())
    }

    pub async fn activate(&self, loan_id: &str) -> LoanResult<Loan> {
        let mut guard = self.loans.lock().await;
        let loan = guard.get_mut(loan_id).ok_or_else(|| LoanError::NotFound(loan_id.to_string()))?;
        if loan.state != LoanState::Disbursed {
            return Err(LoanError::LoanInWrongState(format!("{:?}", loan.state)));
        }
        loan.state = LoanState::Active;
        Ok(loan.clone())
    }

    /// Accrues one day of interest against the current outstanding
    /// principal and posts it via the processor's `interest_accrual`
    /// operation.
    pub async fn accrue_daily_interest(
        &self,
        loan_id: &str,
        actor: &str,
        interest_income_account_id: &str,
        as_of: DateTime<Utc>,
    ) -> LoanResult<MoneyValue> {
        let mut guard = self.loans.lock().await;
        let loan = guard.get_mut(loan_id).ok_or_else(|| LoanError::NotFound(loan_id.to_string()))?;
        if !matches!(loan.state, LoanState::Active | LoanState::Disbursed) {
            return Err(LoanError::LoanInWrongState(format!("{:?}", loan.state)));
        }
        let interest = accrual::accrue(
            &loan.outstanding_principal,
            loan.terms.annual_rate,
            1,
            loan.terms.day_count,
            as_of.naive_utc().date().year(),
        );
        if !interest.is_zero() {
            self.processor
                .interest_accrual(
                    &loan.tenant_id,
                    actor,
                    &loan.receivable_account_id,
                    interest_income_account_id,
                    interest.clone(),
                    None,
                )
                .await?;
            loan.accrued_interest = loan
                .accrued_interest
                .add(&interest)
                .map_err(|e| LoanError::Validation(e.to_string()))?;
        }
        Ok(interest)
    }

    /// Applies a payment through the late-fee -> interest -> principal
    /// waterfall, posts the allocation as a single payment operation, and
    /// advances the loan's lifecycle fields.
    pub async fn record_payment(
        &self,
        loan_id: &str,
        actor: &str,
        source_account_id: &str,
        payment: MoneyValue,
        client_reference: Option<String>,
        as_of: DateTime<Utc>,
    ) -> LoanResult<LoanPaymentApplication> {
        let mut guard = self.loans.lock().await;
        let loan = guard.get_mut(loan_id).ok_or_else(|| LoanError::NotFound(loan_id.to_string()))?;
        if !matches!(loan.state, LoanState::Active | LoanState::Disbursed) {
            return Err(LoanError::LoanInWrongState(format!("{:?}", loan.state)));
        }

        let application = waterfall::allocate(
            &payment,
            &loan.late_fee_accumulator,
            &loan.accrued_interest,
            &loan.outstanding_principal,
        );

        self.processor
            .loan_payment(
                &loan.tenant_id,
                actor,
                source_account_id,
                &loan.receivable_account_id,
                application.to_late_fees.clone(),
                application.to_interest.clone(),
                application.to_principal.clone(),
                client_reference,
            )
            .await?;

        loan.late_fee_accumulator = loan
            .late_fee_accumulator
            .sub(&application.to_late_fees)
            .map_err(|e| LoanError::Validation(e.to_string()))?;
        loan.accrued_interest = loan
            .accrued_interest
            .sub(&application.to_interest)
            .map_err(|e| LoanError::Validation(e.to_string()))?;
        loan.outstanding_principal = loan
            .outstanding_principal
            .sub(&application.to_principal)
            .map_err(|e| LoanError::Validation(e.to_string()))?;
        loan.total_paid = loan
            .total_paid
            .add(&application.total_applied())
            .map_err(|e| LoanError::Validation(e.to_string()))?;
        loan.last_payment_date = Some(as_of);
        loan.days_past_due = 0;
        loan.current_period += 1;
        loan.next_payment_due_date = loan
            .schedule
            .payments
            .iter()
            .find(|p| p.period == loan.current_period + 1)
            .map(|p| p.due_date);

        if loan.outstanding_principal.is_zero() && loan.accrued_interest.is_zero() {
            loan.state = LoanState::PaidOff;
            loan.next_payment_due_date = None;
        }

        Ok(application)
    }

    /// Partial or full prepayment: a penalty of `prepayment_rate *
    /// current_principal` is added to the amount due before it is applied
    /// to principal, and (for a partial prepayment) the schedule is
    /// regenerated under the loan's configured strategy.
    pub async fn prepay(
        &self,
        loan_id: &str,
        actor: &str,
        source_account_id: &str,
        amount: MoneyValue,
        fee_income_account_id: &str,
        client_reference: Option<String>,
    ) -> LoanResult<MoneyValue> {
        let mut guard = self.loans.lock().await;
        let loan = guard.get_mut(loan_id).ok_or_else(|| LoanError::NotFound(loan_id.to_string()))?;
        if !loan.terms.prepayment_allowed {
            return Err(LoanError::PrepaymentNotAllowed);
        }
        if !matches!(loan.state, LoanState::Active | LoanState::Disbursed) {
            return Err(LoanError::LoanInWrongState(format!("{:?}", loan.state)));
        }

        let penalty = loan
            .outstanding_principal
            .multiply_by_rational(loan.terms.prepayment_rate.as_decimal());
        if !penalty.is_zero() {
            self.processor
                .fee(
                    &loan.tenant_id,
                    actor,
                    &loan.receivable_account_id,
                    fee_income_account_id,
                    penalty.clone(),
                    "loan prepayment penalty",
                    None,
                )
                .await?;
        }

        let principal_reduction = amount
            .min(&loan.outstanding_principal)
            .map_err(|e| LoanError::Validation(e.to_string()))?;
        self.processor
            .loan_payment(
                &loan.tenant_id,
                actor,
                source_account_id,
                &loan.receivable_account_id,
                MoneyValue::zero(amount.currency().clone()),
                MoneyValue::zero(amount.currency().clone()),
                principal_reduction.clone(),
                client_reference,
            )
            .await?;

        loan.outstanding_principal = loan
            .outstanding_principal
            .sub(&principal_reduction)
            .map_err(|e| LoanError::Validation(e.to_string()))?;
        loan.total_paid = loan
            .total_paid
            .add(&principal_reduction)
            .map_err(|e| LoanError::Validation(e.to_string()))?;

        if loan.outstanding_principal.is_zero() {
            loan.state = LoanState::PaidOff;
            loan.next_payment_due_date = None;
        } else {
            let remaining_periods = loan.terms.term_periods.saturating_sub(loan.current_period);
            if remaining_periods > 0 {
                let next_due = loan
                    .next_payment_due_date
                    .unwrap_or_else(|| self.clock.now());
                let new_term = match loan.terms.prepayment_strategy {
                    // Keep the term, let generate() derive a lower installment.
                    PrepaymentStrategy::ReduceInstallment => remaining_periods,
                    // Keep the installment fixed, solve for a shorter term.
                    PrepaymentStrategy::ReduceTerm => {
                        let period_rate = loan.terms.annual_rate.as_decimal()
                            / rust_decimal::Decimal::from(loan.terms.frequency.periods_per_year());
                        let fixed_installment = loan
                            .schedule
                            .payments
                            .first()
                            .map(|p| p.payment_amount.clone())
                            .unwrap_or_else(|| loan.outstanding_principal.clone());
                        schedule::periods_for_installment(&loan.outstanding_principal, period_rate, &fixed_installment)
                            .max(1)
                            .min(remaining_periods)
                    }
                };
                let regenerated = schedule::generate(
                    &loan.outstanding_principal,
                    loan.terms.annual_rate,
                    new_term,
                    loan.terms.frequency,
                    next_due,
                    loan.terms.amortization_method,
                )
                .map_err(|e| LoanError::Validation(e.to_string()))?;
                loan.schedule = regenerated;
                loan.current_period = 0;
            }
        }

        Ok(principal_reduction)
    }

    /// Recomputes days-past-due from `next_payment_due_date` and `now`,
    /// assessing at most one late fee per cycle (posted as a real
    /// transaction against `fee_income_account_id`) and transitioning to
    /// defaulted at >= 120 days past due.
    pub async fn recompute_delinquency(
        &self,
        loan_id: &str,
        actor: &str,
        fee_income_account_id: &str,
        now: DateTime<Utc>,
    ) -> LoanResult<Loan> {
        let (tenant_id, receivable_account_id, late_fee, should_assess_fee) = {
            let mut guard = self.loans.lock().await;
            let loan = guard.get_mut(loan_id).ok_or_else(|| LoanError::NotFound(loan_id.to_string()))?;
            let Some(due_date) = loan.next_payment_due_date else {
                return Ok(loan.clone());
            };
            let overdue_days = (now - due_date).num_days();
            loan.days_past_due = overdue_days.max(0);

            let should_assess = loan.days_past_due > loan.terms.grace_period_days
                && loan.last_late_fee_cycle != Some(loan.current_period);
            if should_assess {
                loan.last_late_fee_cycle = Some(loan.current_period);
            }

            if loan.days_past_due >= 120 && loan.state != LoanState::Defaulted {
                loan.state = LoanState::Defaulted;
            }

            (
                loan.tenant_id.clone(),
                loan.receivable_account_id.clone(),
                loan.terms.late_fee.clone(),
                should_assess,
            )
        };

        if should_assess_fee {
            self.processor
                .fee(
                    &tenant_id,
                    actor,
                    &receivable_account_id,
                    fee_income_account_id,
                    late_fee.clone(),
                    "late payment fee",
                    None,
                )
                .await?;
            let mut guard = self.loans.lock().await;
            if let Some(loan) = guard.get_mut(loan_id) {
                loan.late_fee_accumulator = loan
                    .late_fee_accumulator
                    .add(&late_fee)
                    .map_err(|e| LoanError::Validation(e.to_string()))?;
            }
        }

        self.get(loan_id).await
    }
}
