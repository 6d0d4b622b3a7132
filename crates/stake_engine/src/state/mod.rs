//! State structures mirrored from the staking ledger.
//!
//! This module defines the client-side view of stakes, the ledger's cap
//! policy and rate schedule, and the raw per-stake record layout.

pub mod policy;
pub mod rate;
pub mod stake;
pub mod stake_record;

pub use policy::*;
pub use rate::*;
pub use stake::*;
pub use stake_record::*;

/// Token amount in base units (18 decimals)
pub type Amount = u128;

/// Seconds since the unix epoch
pub type UnixTimestamp = i64;

/// Per-account stake identifier assigned by the ledger
pub type StakeId = u64;
