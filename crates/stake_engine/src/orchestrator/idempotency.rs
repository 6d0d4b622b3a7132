use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::OperationKey;
use crate::ledger::OperationHandle;

#[derive(Debug, Clone)]
struct Submitted {
    fingerprint: [u8; 32],
    handle: OperationHandle,
}

/// Submissions whose outcome is still unknown, keyed by operation key.
///
/// When a confirmation times out the submission may still land. Retrying
/// the same intent re-awaits the recorded handle instead of submitting it a
/// second time. Entries are cleared on any definitive outcome.
#[derive(Debug, Default)]
pub struct SubmittedOperations {
    records: Mutex<HashMap<OperationKey, Submitted>>,
}

impl SubmittedOperations {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<OperationKey, Submitted>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, key: OperationKey, fingerprint: [u8; 32], handle: OperationHandle) {
        self.records().insert(key, Submitted { fingerprint, handle });
    }

    /// Handle of an unresolved submission of the same operation under `key`.
    ///
    /// A different operation under the same key (say, another amount)
    /// replaces nothing here; it simply does not match.
    pub fn unresolved(&self, key: &OperationKey, fingerprint: &[u8; 32]) -> Option<OperationHandle> {
        self.records()
            .get(key)
            .filter(|s| &s.fingerprint == fingerprint)
            .map(|s| s.handle.clone())
    }

    pub fn clear(&self, key: &OperationKey) {
        self.records().remove(key);
    }
}
