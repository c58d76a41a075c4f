//! Transaction intent domain entity.
//! Framework-agnostic representation of a requested transfer awaiting settlement.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which internal ledger the intent belongs to. The variant also fixes the
/// reference-number prefix embedded in provider URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    SamaNaffa,
    ApeInvestment,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::SamaNaffa => "SAMA_NAFFA",
            AccountType::ApeInvestment => "APE_INVESTMENT",
        }
    }

    /// Prefix used in reference numbers. Hyphens only: the provider rejects
    /// underscores in redirect URLs.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            AccountType::SamaNaffa => "SAMA-NAFFA",
            AccountType::ApeInvestment => "APE",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAMA_NAFFA" => Ok(AccountType::SamaNaffa),
            "APE_INVESTMENT" => Ok(AccountType::ApeInvestment),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    Deposit,
    Investment,
    Withdrawal,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Deposit => "DEPOSIT",
            IntentType::Investment => "INVESTMENT",
            IntentType::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl FromStr for IntentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(IntentType::Deposit),
            "INVESTMENT" => Ok(IntentType::Investment),
            "WITHDRAWAL" => Ok(IntentType::Withdrawal),
            other => Err(format!("unknown intent type: {other}")),
        }
    }
}

/// Intent lifecycle. `Completed`, `Failed` and `Cancelled` are terminal for
/// callbacks; only an administrative reversal leaves `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "PENDING",
            IntentStatus::Processing => "PROCESSING",
            IntentStatus::Completed => "COMPLETED",
            IntentStatus::Cancelled => "CANCELLED",
            IntentStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Completed | IntentStatus::Cancelled | IntentStatus::Failed
        )
    }
}

impl FromStr for IntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(IntentStatus::Pending),
            "PROCESSING" => Ok(IntentStatus::Processing),
            "COMPLETED" => Ok(IntentStatus::Completed),
            "CANCELLED" => Ok(IntentStatus::Cancelled),
            "FAILED" => Ok(IntentStatus::Failed),
            other => Err(format!("unknown intent status: {other}")),
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain entity for a transaction intent. Never deleted: the row is the
/// financial audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub id: Uuid,
    pub reference_number: String,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub account_type: AccountType,
    pub intent_type: IntentType,
    pub amount: BigDecimal,
    pub payment_method: String,
    pub investment_tranche: Option<String>,
    pub investment_term: Option<String>,
    pub status: IntentStatus,
    pub failure_reason: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub provider_status: Option<String>,
    pub last_callback_at: Option<DateTime<Utc>>,
    pub last_callback_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the client when opening an intent. The reference is
/// optional: callers that retry a logical request should pass the same one.
#[derive(Debug, Clone)]
pub struct NewIntent {
    pub reference_number: String,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub account_type: AccountType,
    pub intent_type: IntentType,
    pub amount: BigDecimal,
    pub payment_method: String,
    pub investment_tranche: Option<String>,
    pub investment_term: Option<String>,
}

impl TransactionIntent {
    pub fn open(new: NewIntent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference_number: new.reference_number,
            user_id: new.user_id,
            account_id: new.account_id,
            account_type: new.account_type,
            intent_type: new.intent_type,
            amount: new.amount,
            payment_method: new.payment_method,
            investment_tranche: new.investment_tranche,
            investment_term: new.investment_term,
            status: IntentStatus::Pending,
            failure_reason: None,
            provider_transaction_id: None,
            provider_status: None,
            last_callback_at: None,
            last_callback_payload: None,
            created_at: now,
            updated_at: now,
        }
    }
}
