// Thin re-export module: implementation is split across `ledger/` by
// responsibility (chain management, participant registry, read-only
// queries).

pub mod chain;
pub mod queries;
pub mod registry;

pub use chain::*;
pub use queries::*;
pub use registry::*;
