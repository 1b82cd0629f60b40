//! # pgsift-common
//!
//! Shared types and constants for pgsift.
//!
//! This crate provides the foundational pieces used across all pgsift
//! components:
//!
//! - **Types**: core identifiers (`Oid`, `TransactionId`, `Lsn`) and the
//!   relation-kind enumeration
//! - **Constants**: page geometry, fixed catalog OIDs, and file magics

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, Oid, RelKind, TransactionId};
