//! Stake registry.
//!
//! Read-through cache of stake state with bounded staleness. Creation facts
//! (start time, lock period) come from the indexer once and never change;
//! live fields (principal, last claim, status) are re-read from the ledger
//! whenever an entry is older than the staleness window.
//!
//! # Properties
//!
//! - **Bounded staleness**: a `get` within the window never reads upstream
//! - **Stale over failed**: a failed refresh serves the last-known value
//! - **Single writer**: only refreshes and orchestrator invalidations mutate
//!   entries; concurrent refreshes are last-writer-wins
//! - **Active only**: a refresh that finds a stake withdrawn evicts it

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anchor_lang::prelude::Pubkey;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::accrual::accrued_yield;
use crate::error::{EngineError, Result};
use crate::ledger::{Indexer, IndexedStake, LedgerReader, StakeInfo};
use crate::state::{Amount, RateSchedule, Stake, StakeId, StakeKey, UnixTimestamp};

/// Immutable facts fixed when the stake was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CreationFacts {
    start_time: UnixTimestamp,
    staking_period: i64,
}

impl From<&IndexedStake> for CreationFacts {
    fn from(indexed: &IndexedStake) -> Self {
        Self {
            start_time: indexed.start_time,
            staking_period: indexed.staking_period,
        }
    }
}

impl From<&Stake> for CreationFacts {
    fn from(stake: &Stake) -> Self {
        Self {
            start_time: stake.start_time,
            staking_period: stake.staking_period,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    stake: Stake,
    /// `None` once invalidated.
    fetched_at: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self, window: Duration) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() < window)
            .unwrap_or(false)
    }
}

/// Injectable read-through cache of stakes.
pub struct StakeRegistry {
    reader: Arc<dyn LedgerReader>,
    indexer: Arc<dyn Indexer>,
    staleness_window: Duration,
    entries: RwLock<HashMap<StakeKey, CacheEntry>>,
}

impl StakeRegistry {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        indexer: Arc<dyn Indexer>,
        staleness_window: Duration,
    ) -> Self {
        Self {
            reader,
            indexer,
            staleness_window,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    /// Current state of `(account, stake_id)`, refreshed if stale.
    pub async fn get(&self, account: &Pubkey, stake_id: StakeId) -> Result<Stake> {
        self.resolve(StakeKey::new(*account, stake_id), None).await
    }

    /// All stakes the indexer lists for `account`, each resolved through the cache.
    pub async fn list_for_account(&self, account: &Pubkey) -> Result<Vec<Stake>> {
        let indexed = self
            .indexer
            .list_stakes_for_account(account)
            .await
            .map_err(EngineError::upstream)?;

        let mut stakes = Vec::with_capacity(indexed.len());
        for entry in &indexed {
            let key = StakeKey::new(*account, entry.stake_id);
            stakes.push(self.resolve(key, Some(CreationFacts::from(entry))).await?);
        }
        Ok(stakes)
    }

    /// Cached value only; never reads upstream.
    pub async fn snapshot(&self, key: &StakeKey) -> Option<Stake> {
        self.entries.read().await.get(key).map(|e| e.stake.clone())
    }

    /// Yield currently owed on `(account, stake_id)` as of `now`.
    pub async fn current_yield(
        &self,
        account: &Pubkey,
        stake_id: StakeId,
        schedule: &RateSchedule,
        now: UnixTimestamp,
    ) -> Result<Amount> {
        let stake = self.get(account, stake_id).await?;
        accrued_yield(&stake, schedule, now)
    }

    /// Force the next `get` for `key` to read upstream.
    ///
    /// The last-known value is kept as a fallback for failed refreshes.
    pub(crate) async fn invalidate(&self, key: &StakeKey) {
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.fetched_at = None;
            debug!("Registry: invalidated {}", key);
        }
    }

    async fn resolve(&self, key: StakeKey, facts: Option<CreationFacts>) -> Result<Stake> {
        let cached = self.entries.read().await.get(&key).cloned();
        if let Some(entry) = &cached {
            if entry.is_fresh(self.staleness_window) {
                return Ok(entry.stake.clone());
            }
        }

        let facts = facts.or_else(|| cached.as_ref().map(|e| CreationFacts::from(&e.stake)));
        match self.fetch(&key, facts).await {
            Ok(stake) => {
                let mut entries = self.entries.write().await;
                if stake.is_active() {
                    entries.insert(
                        key,
                        CacheEntry {
                            stake: stake.clone(),
                            fetched_at: Some(Instant::now()),
                        },
                    );
                    debug!("Registry: refreshed {}", key);
                } else {
                    // withdrawn stakes never change again
                    entries.remove(&key);
                    debug!("Registry: evicted withdrawn {}", key);
                }
                Ok(stake)
            }
            Err(err) => match cached {
                Some(entry) => {
                    warn!("Registry: refresh of {} failed ({}), serving stale entry", key, err);
                    Ok(entry.stake)
                }
                None => Err(err),
            },
        }
    }

    async fn fetch(&self, key: &StakeKey, facts: Option<CreationFacts>) -> Result<Stake> {
        let facts = match facts {
            Some(facts) => facts,
            None => self.creation_facts(key).await?,
        };
        let info = self
            .reader
            .read_stake_info(&key.account, key.stake_id)
            .await
            .map_err(EngineError::upstream)?;
        Ok(merge(key, facts, info))
    }

    async fn creation_facts(&self, key: &StakeKey) -> Result<CreationFacts> {
        let indexed = self
            .indexer
            .list_stakes_for_account(&key.account)
            .await
            .map_err(EngineError::upstream)?;
        indexed
            .iter()
            .find(|s| s.stake_id == key.stake_id)
            .map(CreationFacts::from)
            .ok_or(EngineError::StakeNotFound {
                account: key.account,
                stake_id: key.stake_id,
            })
    }
}

fn merge(key: &StakeKey, facts: CreationFacts, info: StakeInfo) -> Stake {
    Stake {
        account: key.account,
        stake_id: key.stake_id,
        principal: info.principal,
        start_time: facts.start_time,
        staking_period: facts.staking_period,
        last_yield_claim_at: info.last_yield_claim_at.max(facts.start_time),
        status: info.status,
    }
}
