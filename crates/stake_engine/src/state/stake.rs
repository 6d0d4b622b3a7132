use std::fmt;

use anchor_lang::prelude::Pubkey;

use super::{Amount, StakeId, UnixTimestamp};

/// Identity of a stake: the owning account plus its ledger-assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StakeKey {
    pub account: Pubkey,
    pub stake_id: StakeId,
}

impl StakeKey {
    pub fn new(account: Pubkey, stake_id: StakeId) -> Self {
        Self { account, stake_id }
    }
}

impl fmt::Display for StakeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.account, self.stake_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakeStatus {
    Active,
    /// Terminal; principal has been fully withdrawn.
    Withdrawn,
}

/// Authoritative-as-known state of one stake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stake {
    pub account: Pubkey,
    pub stake_id: StakeId,

    pub principal: Amount,

    pub start_time: UnixTimestamp,
    /// Lock duration in seconds, chosen at creation.
    pub staking_period: i64,
    pub last_yield_claim_at: UnixTimestamp,

    pub status: StakeStatus,
}

impl Stake {
    pub fn key(&self) -> StakeKey {
        StakeKey::new(self.account, self.stake_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == StakeStatus::Active
    }

    /// First second at which principal may be withdrawn.
    pub fn lock_ends_at(&self) -> UnixTimestamp {
        self.start_time.saturating_add(self.staking_period)
    }

    pub fn is_lock_ended(&self, now: UnixTimestamp) -> bool {
        now >= self.lock_ends_at()
    }

    /// Yield accrues from the later of creation and the last claim.
    pub fn accrual_start(&self) -> UnixTimestamp {
        self.last_yield_claim_at.max(self.start_time)
    }
}
