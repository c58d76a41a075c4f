pub mod engine;
pub mod machine;

pub use engine::SettlementEngine;
