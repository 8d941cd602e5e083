//! `CoreError`: the platform-wide error taxonomy from `spec.md` §7, with
//! conversions from every lower crate's error type so callers at the
//! facade boundary only ever match on nine kinds.

use core_audit::AuditLogError;
use core_credit::CreditError;
use core_ledger::LedgerError;
use core_loan::LoanError;
use core_processor::ProcessorError;
use core_tenancy::TenancyError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy violation ({rule}): {detail}")]
    PolicyViolation { rule: String, detail: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("audit chain poisoned, writes refused: {0}")]
    AuditPoisoned(String),
    #[error("transient error, retry: {0}")]
    Transient(String),
    #[error("journal entry committed but the audit append failed; reconciliation required: {0}")]
    CommittedUnaudited(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<LedgerError> for CoreError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(msg) => CoreError::Validation(msg),
            LedgerError::NotFound(msg) => CoreError::NotFound(msg),
            LedgerError::Conflict(msg) => CoreError::Conflict(msg),
            LedgerError::Internal(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<AuditLogError> for CoreError {
    fn from(e: AuditLogError) -> Self {
        match e {
            AuditLogError::Validation(msg) => CoreError::Validation(msg),
            AuditLogError::Poisoned(tenant) => CoreError::AuditPoisoned(tenant),
            AuditLogError::Internal(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<TenancyError> for CoreError {
    fn from(e: TenancyError) -> Self {
        match e {
            TenancyError::NotFound(msg) => CoreError::NotFound(msg),
            TenancyError::Validation(msg) => CoreError::Validation(msg),
            TenancyError::TenantIsolation(msg) => CoreError::TenantIsolation(msg.to_string()),
            TenancyError::Encryption(msg) => CoreError::Internal(msg),
            TenancyError::Internal(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<ProcessorError> for CoreError {
    fn from(e: ProcessorError) -> Self {
        match e {
            ProcessorError::Validation(msg) => CoreError::Validation(msg),
            ProcessorError::PolicyViolation { rule, detail } => CoreError::PolicyViolation { rule, detail },
            ProcessorError::Conflict(msg) => CoreError::Conflict(msg),
            ProcessorError::NotFound(msg) => CoreError::NotFound(msg),
            ProcessorError::TenantIsolation(msg) => CoreError::TenantIsolation(msg),
            ProcessorError::AuditPoisoned(msg) => CoreError::AuditPoisoned(msg),
            ProcessorError::Transient(msg) => CoreError::Transient(msg),
            ProcessorError::CommittedUnaudited(msg) => CoreError::CommittedUnaudited(msg),
            ProcessorError::Internal(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<LoanError> for CoreError {
    fn from(e: LoanError) -> Self {
        match e {
            LoanError::Validation(msg) => CoreError::Validation(msg),
            LoanError::LoanNotDisburseable => {
                CoreError::PolicyViolation { rule: "loan-not-disburseable".into(), detail: e.to_string() }
            }
            LoanError::LoanInWrongState(msg) => {
                CoreError::PolicyViolation { rule: "loan-in-wrong-state".into(), detail: msg }
            }
            LoanError::PrepaymentNotAllowed => {
                CoreError::PolicyViolation { rule: "prepayment-not-allowed".into(), detail: e.to_string() }
            }
            LoanError::NotFound(msg) => CoreError::NotFound(msg),
            LoanError::Processor(inner) => inner.into(),
        }
    }
}

impl From<CreditError> for CoreError {
    fn from(e: CreditError) -> Self {
        match e {
            CreditError::Validation(msg) => CoreError::Validation(msg),
            CreditError::CreditLineNotActive => {
                CoreError::PolicyViolation { rule: "account-not-operable".into(), detail: e.to_string() }
            }
            CreditError::OverLimit => {
                CoreError::PolicyViolation { rule: "credit-limit-exceeded".into(), detail: e.to_string() }
            }
            CreditError::NotFound(msg) => CoreError::NotFound(msg),
            CreditError::Processor(inner) => inner.into(),
        }
    }
}
