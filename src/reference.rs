//! Reference-number generation.
//!
//! The reference is the sole join key between internal intents and the
//! provider's ledger, so it must be globally unique and survive being
//! embedded in redirect/callback URLs unescaped: upper-case, digits and
//! hyphens only, never underscores.
//!
//! Format: `{ACCOUNT_PREFIX}-{INTENT_TYPE}-{unix_seconds}-{SUFFIX}`.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{AccountType, IntentType};

const SUFFIX_LEN: usize = 6;

/// Generate a fresh reference number.
pub fn generate(account_type: AccountType, intent_type: IntentType) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect::<String>()
        .to_uppercase();
    format!(
        "{}-{}-{}-{}",
        account_type.reference_prefix(),
        intent_type.as_str(),
        Utc::now().timestamp(),
        suffix
    )
}

/// Use the caller-supplied reference when it is well-formed, otherwise
/// generate one. Client retries of the same logical request should supply
/// the previous reference so the unique constraint collapses them into one
/// intent.
pub fn resolve(
    supplied: Option<&str>,
    account_type: AccountType,
    intent_type: IntentType,
) -> String {
    match supplied {
        Some(reference) if is_well_formed(reference) => reference.to_string(),
        _ => generate(account_type, intent_type),
    }
}

/// Charset check for externally supplied references: upper-case
/// alphanumerics and hyphens, nothing a provider URL would escape.
pub fn is_well_formed(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 64
        && reference
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}

/// Does a reference belong to this system's namespace? Used by the
/// reconciliation engine to drop provider rows that belong to other
/// partners sharing the same export.
pub fn is_local_reference(reference: &str) -> bool {
    reference.starts_with("SAMA-NAFFA-") || reference.starts_with("APE-")
}
