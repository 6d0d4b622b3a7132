use anchor_lang::prelude::*;

use super::{Stake, StakeStatus};
use crate::constants::STAKE_RECORD_SEED;
use crate::error::LedgerError;
use crate::ledger::StakeInfo;

/// Raw per-stake account as laid out by the staking ledger program.
///
/// Ledger-read adapters fetch the account data for
/// [`StakeRecord::address`] and decode it with [`StakeRecord::decode`];
/// [`crate::ledger::read_stake_record`] does both.
#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct StakeRecord {
    pub owner: Pubkey,
    pub stake_id: u64,

    pub principal: u128,

    pub start_time: i64,
    pub staking_period: i64,
    pub last_yield_claim_at: i64,

    pub is_active: bool,
    pub bump: u8,
}

impl StakeRecord {
    pub const LEN: usize = 8 + 32 + 8 + 16 + (8 * 3) + 1 + 1;

    /// Ledger address of the record for `(owner, stake_id)`.
    pub fn address(owner: &Pubkey, stake_id: u64) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[STAKE_RECORD_SEED, owner.as_ref(), &stake_id.to_le_bytes()],
            &crate::ID,
        )
    }

    /// Decode raw account data, discriminator included.
    pub fn decode(data: &[u8]) -> std::result::Result<Self, LedgerError> {
        let mut slice = data;
        <StakeRecord as AccountDeserialize>::try_deserialize(&mut slice)
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    pub fn status(&self) -> StakeStatus {
        if self.is_active {
            StakeStatus::Active
        } else {
            StakeStatus::Withdrawn
        }
    }

    /// Live fields as returned by a ledger stake-info read.
    pub fn stake_info(&self) -> StakeInfo {
        StakeInfo {
            principal: self.principal,
            last_yield_claim_at: self.last_yield_claim_at,
            status: self.status(),
        }
    }

    pub fn into_stake(self) -> Stake {
        Stake {
            account: self.owner,
            stake_id: self.stake_id,
            principal: self.principal,
            start_time: self.start_time,
            staking_period: self.staking_period,
            last_yield_claim_at: self.last_yield_claim_at.max(self.start_time),
            status: self.status(),
        }
    }
}
