//! External collaborator interfaces.
//!
//! The engine never talks to a chain, an RPC node, or an indexing service
//! directly. Adapters implement these traits; the engine only depends on
//! their contracts:
//!
//! - **Reads may fail transiently**: the registry falls back to cached data
//! - **Writes are asynchronous**: `submit` returns a handle that is confirmed
//!   separately, and confirmation may time out without telling us the outcome
//! - **The indexer is eventually consistent**: a freshly confirmed stake may
//!   not be listed yet

use std::time::{SystemTime, UNIX_EPOCH};

use anchor_lang::prelude::Pubkey;
use async_trait::async_trait;

use crate::error::{LedgerError, LedgerResult};
use crate::orchestrator::Operation;
use crate::state::{Amount, RateSchedule, StakeCapPolicy, StakeId, StakeRecord, StakeStatus, UnixTimestamp};

/// Live per-stake fields read directly from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeInfo {
    pub principal: Amount,
    pub last_yield_claim_at: UnixTimestamp,
    pub status: StakeStatus,
}

/// Creation facts for one stake as listed by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedStake {
    pub stake_id: StakeId,
    pub principal: Amount,
    pub start_time: UnixTimestamp,
    pub staking_period: i64,
    /// Reference to the ledger operation that created the stake.
    pub creation_ref: String,
}

/// Opaque reference to a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(pub String);

/// Finality report for a confirmed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Confirmation identifier reported back to callers (e.g. a signature).
    pub id: String,
    pub confirmed_at: UnixTimestamp,
    /// Stakes created by the operation, in submission order.
    pub created_stake_ids: Vec<StakeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed(Confirmation),
    /// Raw ledger revert text.
    Reverted(String),
    TimedOut,
}

#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn read_stake_info(&self, account: &Pubkey, stake_id: StakeId) -> LedgerResult<StakeInfo>;

    /// Amount `spender` may currently move out of `account`.
    async fn read_allowance(&self, account: &Pubkey, spender: &Pubkey) -> LedgerResult<Amount>;

    async fn read_cap_policy(&self) -> LedgerResult<StakeCapPolicy>;

    async fn read_token_balance(&self, account: &Pubkey) -> LedgerResult<Amount>;

    /// The deployed APR schedule.
    async fn read_rate_schedule(&self) -> LedgerResult<RateSchedule>;
}

#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Dry run against current ledger state.
    ///
    /// A refusal is reported as `LedgerError::Rejected` carrying the raw reason.
    async fn simulate(&self, operation: &Operation) -> LedgerResult<()>;

    async fn submit(&self, operation: &Operation) -> LedgerResult<OperationHandle>;

    /// Wait for finality of a previously submitted operation.
    ///
    /// Safe to call again for the same handle after a `TimedOut`.
    async fn await_confirmation(&self, handle: &OperationHandle) -> LedgerResult<ConfirmationOutcome>;
}

#[async_trait]
pub trait Indexer: Send + Sync {
    async fn list_stakes_for_account(&self, account: &Pubkey) -> LedgerResult<Vec<IndexedStake>>;
}

/// Raw account access, for adapters that read stake records themselves.
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    /// Account data at `address`, or `None` when no account exists there.
    async fn fetch_account_data(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>>;
}

/// Read the live fields of one stake from its ledger record.
///
/// Building block for [`LedgerReader::read_stake_info`] in adapters that
/// fetch raw accounts. A missing account or a record that belongs to another
/// owner or stake is reported as `Decode`.
pub async fn read_stake_record(
    fetcher: &dyn AccountFetcher,
    owner: &Pubkey,
    stake_id: StakeId,
) -> LedgerResult<StakeInfo> {
    let (address, _) = StakeRecord::address(owner, stake_id);
    let data = fetcher
        .fetch_account_data(&address)
        .await?
        .ok_or_else(|| LedgerError::Decode(format!("no stake record at {}", address)))?;

    let record = StakeRecord::decode(&data)?;
    if record.owner != *owner || record.stake_id != stake_id {
        return Err(LedgerError::Decode(format!(
            "record at {} is stake {} of {}",
            address, record.stake_id, record.owner
        )));
    }
    Ok(record.stake_info())
}

/// Source of wall-clock time in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> UnixTimestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTimestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::AccountSerialize;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Accounts(HashMap<Pubkey, Vec<u8>>);

    impl Accounts {
        fn put(&mut self, address: Pubkey, record: &StakeRecord) {
            let mut data = Vec::new();
            record.try_serialize(&mut data).unwrap();
            self.0.insert(address, data);
        }
    }

    #[async_trait]
    impl AccountFetcher for Accounts {
        async fn fetch_account_data(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
            Ok(self.0.get(address).cloned())
        }
    }

    fn record(owner: Pubkey, stake_id: StakeId, is_active: bool) -> StakeRecord {
        StakeRecord {
            owner,
            stake_id,
            principal: 750,
            start_time: 1_700_000_000,
            staking_period: 30 * 86_400,
            last_yield_claim_at: 1_700_086_400,
            is_active,
            bump: 255,
        }
    }

    #[tokio::test]
    async fn test_read_stake_record_decodes_live_fields() {
        let owner = Pubkey::new_unique();
        let mut accounts = Accounts::default();
        accounts.put(StakeRecord::address(&owner, 2).0, &record(owner, 2, false));

        let info = read_stake_record(&accounts, &owner, 2).await.unwrap();
        assert_eq!(
            info,
            StakeInfo {
                principal: 750,
                last_yield_claim_at: 1_700_086_400,
                status: StakeStatus::Withdrawn,
            }
        );
    }

    #[tokio::test]
    async fn test_read_stake_record_rejects_missing_or_foreign_records() {
        let owner = Pubkey::new_unique();
        let mut accounts = Accounts::default();
        assert!(matches!(
            read_stake_record(&accounts, &owner, 1).await,
            Err(LedgerError::Decode(_))
        ));

        // a record of stake 3 stored where stake 1 should live
        accounts.put(StakeRecord::address(&owner, 1).0, &record(owner, 3, true));
        assert!(matches!(
            read_stake_record(&accounts, &owner, 1).await,
            Err(LedgerError::Decode(_))
        ));
    }
}
