//! Core types shared by every pgsift crate.

mod ids;
mod relkind;

pub use ids::{Lsn, Oid, TransactionId};
pub use relkind::RelKind;
