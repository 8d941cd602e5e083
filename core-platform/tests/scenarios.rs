use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use core_audit::{AuditChain, InMemoryAuditChain};
use core_credit::{BalanceCategory, CreditTerms, NewCreditLineRequest};
use core_ledger::{Account, AccountKind, AccountLimits, AccountStatus, Ledger};
use core_loan::{AmortizationMethod, DayCountConvention, LoanTerms, NewLoanRequest, PaymentFrequency, PrepaymentStrategy};
use core_money::{Currency, MoneyValue, Rate};
use core_platform::{CoreConfig, CoreEngine};
use core_processor::{SequentialIdGenerator, SystemClock, TestClock};
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn money(amount: &str, currency: Currency) -> MoneyValue {
    MoneyValue::new(amount.parse().unwrap(), currency)
}

async fn register(engine: &CoreEngine, tenant: &str, id: &str, kind: AccountKind, currency: Currency) {
    engine
        .ledger
        .register_account(
            tenant,
            Account {
                id: id.to_string(),
                customer_id: "cust-1".to_string(),
                product_ref: "prod-1".to_string(),
                currency,
                kind,
                status: AccountStatus::Active,
                created_at: Utc::now(),
                limits: AccountLimits::default(),
            },
        )
        .await
        .unwrap();
}

fn sequential_engine(config: CoreConfig) -> CoreEngine {
    CoreEngine::with_providers(config, Arc::new(SystemClock), Arc::new(SequentialIdGenerator::default()))
}

// S1: a deposit posts one balanced entry, respects the liability sign
// convention, leaves the ledger in trial balance, and replays idempotently
// on a repeated client reference.
#[tokio::test]
async fn s1_deposit_balances_and_is_idempotent() {
    let engine = sequential_engine(CoreConfig::default());
    register(&engine, "t1", "cash", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "customer", AccountKind::Liability, Currency::usd()).await;

    let outcome = engine
        .processor
        .deposit("t1", "teller-1", "customer", "cash", money("100.00", Currency::usd()), "cash deposit", Some("dep-1".into()))
        .await
        .unwrap();
    assert_eq!(outcome.entry.lines.len(), 2);
    assert!(outcome.entry.is_balanced().unwrap());

    let cash_balance = engine.ledger.balance("t1", "cash", &Currency::usd(), None).await.unwrap();
    assert_eq!(cash_balance.amount(), dec!(100.00));
    let customer_balance = engine.ledger.balance("t1", "customer", &Currency::usd(), None).await.unwrap();
    assert_eq!(customer_balance.amount(), dec!(100.00));

    let trial = engine.ledger.trial_balance("t1", &Currency::usd(), None).await.unwrap();
    assert!(trial.is_zero());

    let replay = engine
        .processor
        .deposit("t1", "teller-1", "customer", "cash", money("100.00", Currency::usd()), "cash deposit", Some("dep-1".into()))
        .await
        .unwrap();
    assert_eq!(replay.entry.id, outcome.entry.id);
    let cash_after_replay = engine.ledger.balance("t1", "cash", &Currency::usd(), None).await.unwrap();
    assert_eq!(cash_after_replay.amount(), dec!(100.00));
}

// S2: a cross-currency transfer balances USD and EUR independently on the
// one entry, with the fx suspense account absorbing the conversion and the
// agreed-rate residual.
#[tokio::test]
async fn s2_fx_transfer_balances_each_currency_independently() {
    let engine = sequential_engine(CoreConfig::default());
    register(&engine, "t1", "cash_usd", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "usd_wallet", AccountKind::Liability, Currency::usd()).await;
    register(&engine, "t1", "eur_wallet", AccountKind::Liability, Currency::eur()).await;
    register(&engine, "t1", "fx_gain_loss", AccountKind::Revenue, Currency::usd()).await;

    engine
        .processor
        .deposit("t1", "teller-1", "usd_wallet", "cash_usd", money("1000.00", Currency::usd()), "funding", Some("fund-1".into()))
        .await
        .unwrap();

    let outcome = engine
        .processor
        .transfer_fx(
            "t1",
            "teller-1",
            "usd_wallet",
            "eur_wallet",
            money("1000.00", Currency::usd()),
            money("850.00", Currency::eur()),
            "fx_gain_loss",
            money("15.00", Currency::usd()),
            "fx transfer",
            Some("fx-1".into()),
        )
        .await
        .unwrap();
    assert!(outcome.entry.is_balanced().unwrap());

    let usd_wallet_balance = engine.ledger.balance("t1", "usd_wallet", &Currency::usd(), None).await.unwrap();
    assert!(usd_wallet_balance.is_zero());
    let eur_wallet_balance = engine.ledger.balance("t1", "eur_wallet", &Currency::eur(), None).await.unwrap();
    assert_eq!(eur_wallet_balance.amount(), dec!(850.00));

    let usd_trial = engine.ledger.trial_balance("t1", &Currency::usd(), None).await.unwrap();
    assert!(usd_trial.is_zero());
    let eur_trial = engine.ledger.trial_balance("t1", &Currency::eur(), None).await.unwrap();
    assert!(eur_trial.is_zero());
}

// S3: a 12-period equal-installment amortization schedule retires exactly
// the principal, every installment is equal within the last period's
// rounding absorption, and origination/disbursement post through the
// ledger correctly.
#[tokio::test]
async fn s3_equal_installment_schedule_retires_principal_exactly() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(TestClock::at(start));
    let engine = CoreEngine::with_providers(CoreConfig::default(), clock.clone(), Arc::new(SequentialIdGenerator::default()));
    register(&engine, "t1", "loan_receivable", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "interest_income", AccountKind::Revenue, Currency::usd()).await;
    register(&engine, "t1", "checking", AccountKind::Liability, Currency::usd()).await;

    let loan = engine
        .loans
        .originate(NewLoanRequest {
            tenant_id: "t1".into(),
            customer_id: "cust-1".into(),
            product_ref: "installment-loan".into(),
            receivable_account_id: "loan_receivable".into(),
            interest_income_account_id: "interest_income".into(),
            principal: money("10000.00", Currency::usd()),
            terms: LoanTerms {
                annual_rate: Rate::from_percentage(dec!(6.00)),
                term_periods: 12,
                frequency: PaymentFrequency::Monthly,
                amortization_method: AmortizationMethod::EqualInstallment,
                day_count: DayCountConvention::Actual365,
                grace_period_days: 10,
                late_fee: money("25.00", Currency::usd()),
                prepayment_allowed: true,
                prepayment_rate: Rate::ZERO,
                prepayment_strategy: PrepaymentStrategy::ReduceTerm,
            },
            first_payment_date: start + Duration::days(30),
        })
        .await
        .unwrap();

    assert_eq!(loan.schedule.payments.len(), 12);
    let first_installment = loan.schedule.payments[0].payment_amount.amount();
    for payment in &loan.schedule.payments[..11] {
        assert_eq!(payment.payment_amount.amount(), first_installment);
    }
    let last = loan.schedule.payments.last().unwrap();
    assert!(last.ending_balance.is_zero());

    let total_payments = loan
        .schedule
        .payments
        .iter()
        .fold(MoneyValue::zero(Currency::usd()), |acc, p| acc.add(&p.payment_amount).unwrap());
    let total_interest = loan.schedule.total_interest();
    let implied_principal = total_payments.sub(&total_interest).unwrap();
    assert!((implied_principal.amount() - dec!(10000.00)).abs() <= dec!(0.01));

    let disbursed = engine.loans.disburse(&loan.id, "officer-1", "checking").await.unwrap();
    assert_eq!(disbursed.state, core_loan::LoanState::Disbursed);
    let receivable_after_disbursement = engine.ledger.balance("t1", "loan_receivable", &Currency::usd(), None).await.unwrap();
    assert_eq!(receivable_after_disbursement.amount(), dec!(10000.00));

    let active = engine.loans.activate(&loan.id).await.unwrap();
    assert_eq!(active.state, core_loan::LoanState::Active);
}

fn standard_credit_terms() -> CreditTerms {
    let mut rates = HashMap::new();
    rates.insert(BalanceCategory::Purchase, Rate::from_percentage(dec!(18.00)));
    rates.insert(BalanceCategory::CashAdvance, Rate::from_percentage(dec!(24.00)));
    rates.insert(BalanceCategory::BalanceTransfer, Rate::from_percentage(dec!(15.00)));
    CreditTerms {
        rates,
        credit_limit: money("5000.00", Currency::usd()),
        min_payment_percentage: Rate::from_percentage(dec!(2.00)),
        min_payment_floor: money("25.00", Currency::usd()),
        grace_period_days: 21,
        statement_cycle_days: 30,
        late_fee: money("35.00", Currency::usd()),
        overlimit_fee: money("35.00", Currency::usd()),
        cash_advance_fee_rate: Rate::from_percentage(dec!(3.00)),
        day_count: DayCountConvention::Actual365,
    }
}

// S4: a statement paid in full by its due date, with no grace-breaking
// activity during the cycle, keeps the next cycle's purchases interest-free
// until their own due date.
#[tokio::test]
async fn s4_grace_period_is_preserved_across_a_paid_in_full_cycle() {
    let cycle1_open = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(TestClock::at(cycle1_open));
    let engine = CoreEngine::with_providers(CoreConfig::default(), clock.clone(), Arc::new(SequentialIdGenerator::default()));
    register(&engine, "t1", "credit_receivable", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "merchant_clearing", AccountKind::Liability, Currency::usd()).await;
    register(&engine, "t1", "fee_income", AccountKind::Revenue, Currency::usd()).await;
    register(&engine, "t1", "interest_income", AccountKind::Revenue, Currency::usd()).await;
    register(&engine, "t1", "checking", AccountKind::Liability, Currency::usd()).await;

    let line = engine
        .credit
        .open(NewCreditLineRequest {
            tenant_id: "t1".into(),
            customer_id: "cust-1".into(),
            product_ref: "rewards-card".into(),
            credit_account_id: "credit_receivable".into(),
            clearing_account_id: "merchant_clearing".into(),
            fee_income_account_id: "fee_income".into(),
            interest_income_account_id: "interest_income".into(),
            terms: standard_credit_terms(),
        })
        .await
        .unwrap();

    engine
        .credit
        .charge(&line.id, "merchant-1", BalanceCategory::Purchase, money("100.00", Currency::usd()), cycle1_open, None)
        .await
        .unwrap();

    let cycle1_close = cycle1_open + Duration::days(30);
    let statement1 = engine.credit.close_statement(&line.id, "system", cycle1_close).await.unwrap();
    assert_eq!(statement1.closing_balance.amount(), dec!(100.00));
    assert_eq!(statement1.minimum_payment.amount(), dec!(25.00));
    assert!(statement1.grace_active);

    engine
        .credit
        .record_payment(&line.id, "customer", "checking", money("100.00", Currency::usd()), None)
        .await
        .unwrap();

    let after_payment = engine.credit.get(&line.id).await.unwrap();
    assert!(after_payment.total_balance().is_zero());

    let cycle2_charge_at = statement1.due_date - Duration::days(1);
    engine
        .credit
        .charge(&line.id, "merchant-1", BalanceCategory::Purchase, money("250.00", Currency::usd()), cycle2_charge_at, None)
        .await
        .unwrap();

    let accrued = engine
        .credit
        .accrue_daily_interest(&line.id, "system", cycle2_charge_at + Duration::days(1), statement1.grace_active)
        .await
        .unwrap();
    assert!(accrued.is_zero());
}

// S5: posting several large same-day deposits is purely a ledger/event
// concern in this layer -- all of them post and are independently
// observable, with no compliance judgment made here.
#[tokio::test]
async fn s5_multiple_large_same_day_deposits_all_post_and_are_observed() {
    let engine = sequential_engine(CoreConfig::default());
    register(&engine, "t1", "cash", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "customer", AccountKind::Liability, Currency::usd()).await;

    let recorder = Arc::new(core_events::RecordingHandler::default());
    engine.events.subscribe(recorder.clone());

    for amount in ["9800.00", "9500.00", "4900.00"] {
        engine
            .processor
            .deposit("t1", "teller-1", "customer", "cash", money(amount, Currency::usd()), "cash deposit", None)
            .await
            .unwrap();
    }

    let entries = engine.ledger.transactions("t1", "customer", None, None).await.unwrap();
    assert_eq!(entries.len(), 3);

    let posted_events = recorder
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind == "TRANSACTION_POSTED")
        .count();
    assert_eq!(posted_events, 3);
}

// S6: corrupting one audit record's stored details in place is detected by
// `verify`, which reports the exact sequence number where the hash chain
// breaks.
#[tokio::test]
async fn s6_audit_verify_detects_tampering_at_the_corrupted_sequence() {
    let audit = Arc::new(InMemoryAuditChain::new());
    let engine = CoreEngine::with_providers_and_audit(
        CoreConfig::default(),
        Arc::new(SystemClock),
        Arc::new(SequentialIdGenerator::default()),
        audit.clone(),
    );
    register(&engine, "t1", "cash", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "customer", AccountKind::Liability, Currency::usd()).await;

    for i in 0..10 {
        engine
            .processor
            .deposit("t1", "teller-1", "customer", "cash", money("10.00", Currency::usd()), "cash deposit", Some(format!("dep-{i}")))
            .await
            .unwrap();
    }

    let before = audit.verify("t1", None, None).await.unwrap();
    assert!(before.valid);

    audit.debug_corrupt("t1", 5, serde_json::json!({"tampered": true})).await;

    let after = audit.verify("t1", None, None).await.unwrap();
    assert!(!after.valid);
    assert_eq!(after.first_broken_sequence, Some(5));
}

// Tenant isolation: an account registered under one tenant is invisible to
// another tenant's view of the same ledger.
#[tokio::test]
async fn tenant_isolation_refuses_cross_tenant_account_access() {
    let engine = sequential_engine(CoreConfig::default());
    register(&engine, "t1", "cash", AccountKind::Asset, Currency::usd()).await;

    let result = engine.ledger.balance("t2", "cash", &Currency::usd(), None).await;
    assert!(result.is_err());
}

// Posting sequence numbers are contiguous and monotonically increasing
// within a tenant across unrelated operations.
#[tokio::test]
async fn posting_sequence_numbers_are_contiguous_within_a_tenant() {
    let engine = sequential_engine(CoreConfig::default());
    register(&engine, "t1", "cash", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "customer", AccountKind::Liability, Currency::usd()).await;

    let mut sequences = Vec::new();
    for i in 0..3 {
        let outcome = engine
            .processor
            .deposit("t1", "teller-1", "customer", "cash", money("1.00", Currency::usd()), "cash deposit", Some(format!("seq-{i}")))
            .await
            .unwrap();
        sequences.push(outcome.entry.posting_sequence.unwrap());
    }
    assert_eq!(sequences, vec![1, 2, 3]);
}

// Reversing a posted entry restores the ledger to trial balance.
#[tokio::test]
async fn reversing_an_entry_restores_trial_balance() {
    let engine = sequential_engine(CoreConfig::default());
    register(&engine, "t1", "cash", AccountKind::Asset, Currency::usd()).await;
    register(&engine, "t1", "customer", AccountKind::Liability, Currency::usd()).await;

    let outcome = engine
        .processor
        .deposit("t1", "teller-1", "customer", "cash", money("250.00", Currency::usd()), "cash deposit", Some("rev-1".into()))
        .await
        .unwrap();

    engine.reverse_entry("t1", &outcome.entry.id, "teller-1", "posted in error").await.unwrap();

    let trial = engine.ledger.trial_balance("t1", &Currency::usd(), None).await.unwrap();
    assert!(trial.is_zero());
    let customer_balance = engine.ledger.balance("t1", "customer", &Currency::usd(), None).await.unwrap();
    assert!(customer_balance.is_zero());
}
