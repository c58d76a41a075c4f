//! Pure settlement decisions.
//!
//! This module is the single place that chooses a status transition and a
//! balance delta. Storage adapters call [`decide`] (or
//! [`decide_reversal`]) from inside their own atomic scope and apply
//! whatever comes back; they never compute arithmetic themselves. Webhook,
//! manual fallback and reconciliation all converge here, which is what
//! keeps the three channels from drifting apart.

use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::domain::{IntentStatus, IntentType, TransactionIntent, UserAccount};
use crate::status::ProviderOutcome;

pub const INSUFFICIENT_FUNDS: &str = "insufficient_funds";

/// Amount tolerance when comparing our decimal against a provider-supplied
/// one (redirect params, CSV exports): anything under one centime is the
/// same amount.
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal) -> bool {
    let diff = a - b;
    diff.abs() < "0.01".parse::<BigDecimal>().unwrap_or_else(|_| BigDecimal::from(0))
}

/// The outcome of one decision: what the adapter must persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub next_status: IntentStatus,
    /// Signed delta to apply to the account balance. Zero means no
    /// financial effect.
    pub balance_delta: BigDecimal,
    pub failure_reason: Option<&'static str>,
    /// True exactly when this decision moves the intent into COMPLETED.
    pub fresh_completion: bool,
    /// Idempotent short-circuit: the intent is already terminal, persist
    /// nothing but the audit log row.
    pub duplicate: bool,
}

impl Decision {
    fn noop(current: IntentStatus) -> Self {
        Decision {
            next_status: current,
            balance_delta: BigDecimal::from(0),
            failure_reason: None,
            fresh_completion: false,
            duplicate: true,
        }
    }

    /// Label written into the callback audit log (after the channel
    /// prefix).
    pub fn log_label(&self) -> &'static str {
        if self.duplicate {
            "DUPLICATE_IGNORED"
        } else {
            self.next_status.as_str()
        }
    }
}

/// Decide the transition for one normalized provider outcome.
///
/// Terminal intents (COMPLETED, FAILED, CANCELLED) short-circuit: duplicate
/// webhook delivery, a manual fallback after the webhook, or a late
/// contradicting callback all become audited no-ops. A completed
/// withdrawal may never drive the balance negative; when funds are short
/// the intent settles as FAILED with `insufficient_funds` instead.
///
/// A COMPLETED intent must always be linkable to the provider's ledger:
/// a success delivery carrying no provider transaction id (and none
/// already recorded on the intent) holds the intent in PROCESSING until a
/// delivery with the id arrives.
pub fn decide(
    intent: &TransactionIntent,
    account: &UserAccount,
    outcome: ProviderOutcome,
    provider_transaction_id: Option<&str>,
) -> Decision {
    if intent.status.is_terminal() {
        return Decision::noop(intent.status);
    }

    let hold_processing = Decision {
        next_status: IntentStatus::Processing,
        balance_delta: BigDecimal::from(0),
        failure_reason: None,
        fresh_completion: false,
        duplicate: false,
    };

    match outcome {
        ProviderOutcome::StillProcessing => hold_processing,
        ProviderOutcome::Failed => Decision {
            next_status: IntentStatus::Failed,
            balance_delta: BigDecimal::from(0),
            failure_reason: None,
            fresh_completion: false,
            duplicate: false,
        },
        ProviderOutcome::Completed
            if provider_transaction_id.is_none()
                && intent.provider_transaction_id.is_none() =>
        {
            hold_processing
        }
        ProviderOutcome::Completed => match intent.intent_type {
            IntentType::Deposit => Decision {
                next_status: IntentStatus::Completed,
                balance_delta: intent.amount.clone(),
                failure_reason: None,
                fresh_completion: true,
                duplicate: false,
            },
            IntentType::Withdrawal => {
                if account.balance < intent.amount {
                    Decision {
                        next_status: IntentStatus::Failed,
                        balance_delta: BigDecimal::from(0),
                        failure_reason: Some(INSUFFICIENT_FUNDS),
                        fresh_completion: false,
                        duplicate: false,
                    }
                } else {
                    Decision {
                        next_status: IntentStatus::Completed,
                        balance_delta: -intent.amount.clone(),
                        failure_reason: None,
                        fresh_completion: true,
                        duplicate: false,
                    }
                }
            }
            // Investment confirmation books against the investment account
            // elsewhere; the source account is untouched.
            IntentType::Investment => Decision {
                next_status: IntentStatus::Completed,
                balance_delta: BigDecimal::from(0),
                failure_reason: None,
                fresh_completion: true,
                duplicate: false,
            },
        },
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReversalError {
    #[error("only COMPLETED intents can be reversed (current: {0})")]
    NotCompleted(IntentStatus),

    #[error("reversal target must be FAILED or CANCELLED (got {0})")]
    InvalidTarget(IntentStatus),

    #[error("reversal would drive the account balance negative")]
    WouldGoNegative,
}

/// Decide an administrative reversal out of COMPLETED: the exact inverse of
/// the completion arithmetic, re-validated against non-negativity.
pub fn decide_reversal(
    intent: &TransactionIntent,
    account: &UserAccount,
    target: IntentStatus,
) -> Result<Decision, ReversalError> {
    if intent.status != IntentStatus::Completed {
        return Err(ReversalError::NotCompleted(intent.status));
    }
    if !matches!(target, IntentStatus::Failed | IntentStatus::Cancelled) {
        return Err(ReversalError::InvalidTarget(target));
    }

    let balance_delta = match intent.intent_type {
        IntentType::Deposit => {
            if account.balance < intent.amount {
                return Err(ReversalError::WouldGoNegative);
            }
            -intent.amount.clone()
        }
        IntentType::Withdrawal => intent.amount.clone(),
        IntentType::Investment => BigDecimal::from(0),
    };

    Ok(Decision {
        next_status: target,
        balance_delta,
        failure_reason: None,
        fresh_completion: false,
        duplicate: false,
    })
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CancelError {
    #[error("intent is already terminal ({0})")]
    AlreadyTerminal(IntentStatus),
}

/// Cancel an unsettled intent. No balance effect by construction.
pub fn decide_cancel(intent: &TransactionIntent) -> Result<Decision, CancelError> {
    if intent.status.is_terminal() {
        return Err(CancelError::AlreadyTerminal(intent.status));
    }
    Ok(Decision {
        next_status: IntentStatus::Cancelled,
        balance_delta: BigDecimal::from(0),
        failure_reason: None,
        fresh_completion: false,
        duplicate: false,
    })
}
