pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;
