//! User account domain entity.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::intent::AccountType;

/// One ledger account per (user, account type). `balance` is the only
/// contended financial field and is written exclusively by the settlement
/// engine while the account row is locked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: AccountType,
    pub balance: BigDecimal,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(user_id: Uuid, account_type: AccountType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_type,
            balance: BigDecimal::from(0),
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }
}
