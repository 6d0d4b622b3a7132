use super::Amount;
use crate::error::{EngineError, Result};

/// Minimum and maximum principal the ledger accepts for a single stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeCapPolicy {
    minimum_stake: Amount,
    maximum_stake: Amount,
}

impl StakeCapPolicy {
    pub fn new(minimum_stake: Amount, maximum_stake: Amount) -> Result<Self> {
        if minimum_stake > maximum_stake {
            return Err(EngineError::InvalidCapPolicy {
                minimum: minimum_stake,
                maximum: maximum_stake,
            });
        }
        Ok(Self {
            minimum_stake,
            maximum_stake,
        })
    }

    pub fn minimum_stake(&self) -> Amount {
        self.minimum_stake
    }

    pub fn maximum_stake(&self) -> Amount {
        self.maximum_stake
    }
}
