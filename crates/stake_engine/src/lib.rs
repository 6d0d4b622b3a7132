//! # Stake Engine
//!
//! Client-side engine for a time-locked token staking ledger. It models yield
//! accrual locally and drives every mutating operation through a guarded
//! approve → simulate → submit → confirm protocol.
//!
//! ## Components
//! - **Accrual model**: per-second integer yield over fixed or linearly
//!   growing APR schedules, with 256-bit intermediates
//! - **Stake registry**: read-through cache with bounded staleness and a
//!   stale-value fallback when the ledger is unreachable
//! - **Lifecycle guard**: pure pre-flight checks for caps, balance, periods
//!   and lock expiry
//! - **Transaction orchestrator**: single-flight per stake, confirmed
//!   approvals, simulation before submission, idempotent retries
//! - **Yield ticker**: display-only recomputation from cached snapshots
//!
//! The engine never talks to a network itself. Ledger, indexer and clock are
//! traits in [`ledger`] implemented by adapters. Adapters with raw account
//! access can build stake reads on [`ledger::read_stake_record`].

use anchor_lang::prelude::*;

// Address of the staking ledger program; default spender for approvals.
declare_id!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");

pub mod accrual;
pub mod config;
pub mod constants;
pub mod display;
pub mod error;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod math;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod ticker;

#[cfg(test)]
mod testing;

pub use accrual::{accrue, accrued_yield};
pub use config::EngineConfig;
pub use error::{EngineError, LedgerError, RejectReason, Result, RevertReason};
pub use events::{ChannelSink, LifecycleEvent, NoopSink, NotificationSink, TracingSink};
pub use orchestrator::{Intent, Orchestrator, RetryPolicy, Settlement};
pub use registry::StakeRegistry;
pub use ticker::{YieldTick, YieldTicker};
