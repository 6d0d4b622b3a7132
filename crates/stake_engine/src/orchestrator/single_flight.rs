use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anchor_lang::prelude::Pubkey;
use indexmap::IndexMap;
use tokio::time::Instant;
use tracing::debug;

use super::{OperationKey, OperationPhase, StakeSlot};
use crate::error::{EngineError, Result};

/// An operation currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub key: OperationKey,
    pub phase: OperationPhase,
    pub started_at: Instant,
}

/// In-flight table enforcing at most one operation per `(account, stake)`.
///
/// The lock is only held for map updates, never across an await.
#[derive(Debug, Default)]
pub struct PendingOperations {
    slots: Mutex<IndexMap<(Pubkey, StakeSlot), PendingOperation>>,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, IndexMap<(Pubkey, StakeSlot), PendingOperation>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for `key`, across all operation kinds.
    ///
    /// Fails with `OperationInProgress` if any operation already holds it.
    pub fn acquire(self: &Arc<Self>, key: OperationKey) -> Result<SlotGuard> {
        let mut slots = self.slots();
        let slot = (key.account, key.slot);
        if let Some(existing) = slots.get(&slot) {
            debug!(
                "Single-flight: rejecting {} while {} is {}",
                key, existing.key, existing.phase
            );
            return Err(EngineError::OperationInProgress {
                account: key.account,
                slot: key.slot,
            });
        }
        slots.insert(
            slot,
            PendingOperation {
                key,
                phase: OperationPhase::Idle,
                started_at: Instant::now(),
            },
        );
        Ok(SlotGuard {
            table: Arc::clone(self),
            key,
        })
    }

    pub fn get(&self, account: &Pubkey, slot: StakeSlot) -> Option<PendingOperation> {
        self.slots().get(&(*account, slot)).cloned()
    }

    /// In-flight operations, oldest first.
    pub fn in_flight(&self) -> Vec<PendingOperation> {
        self.slots().values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn set_phase(&self, key: &OperationKey, phase: OperationPhase) {
        if let Some(pending) = self.slots().get_mut(&(key.account, key.slot)) {
            pending.phase = phase;
        }
    }

    fn release(&self, key: &OperationKey) {
        self.slots().shift_remove(&(key.account, key.slot));
    }
}

/// Ownership of a single-flight slot; dropping it releases the slot.
#[derive(Debug)]
pub struct SlotGuard {
    table: Arc<PendingOperations>,
    key: OperationKey,
}

impl SlotGuard {
    pub fn key(&self) -> OperationKey {
        self.key
    }

    pub fn set_phase(&mut self, phase: OperationPhase) {
        debug!("{} -> {}", self.key, phase);
        self.table.set_phase(&self.key, phase);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OperationKind;

    fn key(account: Pubkey, slot: StakeSlot, kind: OperationKind) -> OperationKey {
        OperationKey::new(account, slot, kind)
    }

    #[tokio::test]
    async fn test_one_operation_per_stake_across_kinds() {
        let table = Arc::new(PendingOperations::new());
        let account = Pubkey::new_unique();
        let slot = StakeSlot::Existing(1);

        let _claim = table
            .acquire(key(account, slot, OperationKind::WithdrawYield))
            .unwrap();
        let err = table
            .acquire(key(account, slot, OperationKind::WithdrawStake))
            .unwrap_err();
        assert_eq!(err, EngineError::OperationInProgress { account, slot });

        // other stakes and other accounts are independent
        assert!(table
            .acquire(key(account, StakeSlot::Existing(2), OperationKind::WithdrawStake))
            .is_ok());
        assert!(table
            .acquire(key(Pubkey::new_unique(), slot, OperationKind::WithdrawStake))
            .is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases_slot_and_phase_is_tracked() {
        let table = Arc::new(PendingOperations::new());
        let account = Pubkey::new_unique();
        let k = key(account, StakeSlot::NewStake, OperationKind::Stake);

        let mut guard = table.acquire(k).unwrap();
        guard.set_phase(OperationPhase::Approving);
        assert_eq!(
            table.get(&account, StakeSlot::NewStake).map(|p| p.phase),
            Some(OperationPhase::Approving)
        );
        assert_eq!(table.in_flight().len(), 1);

        drop(guard);
        assert!(table.is_empty());
        assert!(table.acquire(k).is_ok());
    }
}
