//! Provider status-code mapping.
//!
//! Every channel (live webhook, manual fallback, reconciliation apply) must
//! map provider codes through this one table. The codes are matched exactly
//! first, then by prefix; anything unrecognized is a failure, never a
//! success.

use serde::{Deserialize, Serialize};

/// Settlement-relevant meaning of a provider status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderOutcome {
    Completed,
    StillProcessing,
    Failed,
}

impl ProviderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Completed => "COMPLETED",
            ProviderOutcome::StillProcessing => "PROCESSING",
            ProviderOutcome::Failed => "FAILED",
        }
    }
}

/// Map a raw provider code to an outcome.
///
/// Exact `"200"`, `"0"` and `"00"` are success; exact `"420"` is the
/// provider's failure convention; other codes starting with `1` or `2` mean
/// the provider is still processing; everything else (including empty) is a
/// failure.
pub fn map_provider_code(code: &str) -> ProviderOutcome {
    match code.trim() {
        "200" | "0" | "00" => ProviderOutcome::Completed,
        "420" => ProviderOutcome::Failed,
        c if c.starts_with('1') || c.starts_with('2') => ProviderOutcome::StillProcessing,
        _ => ProviderOutcome::Failed,
    }
}
