use std::fmt;

use anchor_lang::prelude::*;

use crate::error::{EngineError, Result as EngineResult};
use crate::state::{Amount, StakeId, StakeKey};

/// A mutating ledger operation, as simulated and submitted.
#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub enum Operation {
    /// Raise the token allowance `owner` grants to `spender`.
    Approve {
        owner: Pubkey,
        spender: Pubkey,
        amount: u128,
    },
    Stake {
        account: Pubkey,
        amount: u128,
        staking_period: i64,
    },
    /// Several stakes created atomically by one ledger operation.
    StakeBatch {
        account: Pubkey,
        amounts: Vec<u128>,
        staking_periods: Vec<i64>,
    },
    WithdrawYield {
        account: Pubkey,
        stake_id: u64,
    },
    /// Partial principal withdrawal.
    Withdraw {
        account: Pubkey,
        stake_id: u64,
        amount: u128,
    },
    WithdrawAll {
        account: Pubkey,
        stake_id: u64,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Approve { .. } => OperationKind::Approve,
            Operation::Stake { .. } | Operation::StakeBatch { .. } => OperationKind::Stake,
            Operation::WithdrawYield { .. } => OperationKind::WithdrawYield,
            Operation::Withdraw { .. } | Operation::WithdrawAll { .. } => {
                OperationKind::WithdrawStake
            }
        }
    }

    /// Token allowance the ledger needs before this operation can settle.
    pub fn required_allowance(&self) -> Option<Amount> {
        match self {
            Operation::Stake { amount, .. } => Some(*amount),
            Operation::StakeBatch { amounts, .. } => {
                Some(amounts.iter().fold(0u128, |acc, a| acc.saturating_add(*a)))
            }
            _ => None,
        }
    }

    /// Existing stake this operation mutates.
    pub fn target(&self) -> Option<StakeKey> {
        match self {
            Operation::WithdrawYield { account, stake_id }
            | Operation::Withdraw {
                account, stake_id, ..
            }
            | Operation::WithdrawAll { account, stake_id } => Some(StakeKey::new(*account, *stake_id)),
            _ => None,
        }
    }

    /// blake3 digest of the operation's borsh encoding.
    pub fn fingerprint(&self) -> EngineResult<[u8; 32]> {
        let bytes = self
            .try_to_vec()
            .map_err(|e| EngineError::Encoding(e.to_string()))?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Approve,
    Stake,
    WithdrawYield,
    WithdrawStake,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Approve => "approve",
            OperationKind::Stake => "stake",
            OperationKind::WithdrawYield => "withdraw_yield",
            OperationKind::WithdrawStake => "withdraw_stake",
        };
        f.write_str(name)
    }
}

/// Which of an account's stakes an operation occupies.
///
/// Stake creations have no id until the ledger assigns one, so they share
/// the account's `NewStake` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StakeSlot {
    NewStake,
    Existing(StakeId),
}

impl fmt::Display for StakeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeSlot::NewStake => f.write_str("<new>"),
            StakeSlot::Existing(id) => write!(f, "{}", id),
        }
    }
}

/// `(account, stakeId, kind)`: identity of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub account: Pubkey,
    pub slot: StakeSlot,
    pub kind: OperationKind,
}

impl OperationKey {
    pub fn new(account: Pubkey, slot: StakeSlot, kind: OperationKind) -> Self {
        Self { account, slot, kind }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}#{}", self.kind, self.account, self.slot)
    }
}

/// A caller's request, before validation turns it into an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Stake {
        account: Pubkey,
        amount: Amount,
        /// Lock duration in seconds.
        staking_period: i64,
    },
    StakeBatch {
        account: Pubkey,
        amounts: Vec<Amount>,
        staking_periods: Vec<i64>,
    },
    WithdrawYield {
        account: Pubkey,
        stake_id: StakeId,
    },
    WithdrawStake {
        account: Pubkey,
        stake_id: StakeId,
    },
    Withdraw {
        account: Pubkey,
        stake_id: StakeId,
        amount: Amount,
    },
}

impl Intent {
    pub fn key(&self) -> OperationKey {
        match self {
            Intent::Stake { account, .. } | Intent::StakeBatch { account, .. } => {
                OperationKey::new(*account, StakeSlot::NewStake, OperationKind::Stake)
            }
            Intent::WithdrawYield { account, stake_id } => OperationKey::new(
                *account,
                StakeSlot::Existing(*stake_id),
                OperationKind::WithdrawYield,
            ),
            Intent::WithdrawStake { account, stake_id } | Intent::Withdraw { account, stake_id, .. } => {
                OperationKey::new(
                    *account,
                    StakeSlot::Existing(*stake_id),
                    OperationKind::WithdrawStake,
                )
            }
        }
    }

    /// The ledger operation this intent submits once validated.
    pub fn to_operation(&self) -> Operation {
        match self.clone() {
            Intent::Stake {
                account,
                amount,
                staking_period,
            } => Operation::Stake {
                account,
                amount,
                staking_period,
            },
            Intent::StakeBatch {
                account,
                amounts,
                staking_periods,
            } => Operation::StakeBatch {
                account,
                amounts,
                staking_periods,
            },
            Intent::WithdrawYield { account, stake_id } => {
                Operation::WithdrawYield { account, stake_id }
            }
            Intent::WithdrawStake { account, stake_id } => Operation::WithdrawAll { account, stake_id },
            Intent::Withdraw {
                account,
                stake_id,
                amount,
            } => Operation::Withdraw {
                account,
                stake_id,
                amount,
            },
        }
    }
}
