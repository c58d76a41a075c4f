pub mod fallback;
pub mod notifier;
pub mod reconcile;
