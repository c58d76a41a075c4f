pub mod account;
pub mod callback;
pub mod intent;
pub mod reconciliation;

pub use account::UserAccount;
pub use callback::{CallbackChannel, NormalizedCallback, PaymentCallbackLog};
pub use intent::{AccountType, IntentStatus, IntentType, TransactionIntent};
pub use reconciliation::{MatchType, ProviderRow, ReconciliationMatch, ReconciliationReport};
