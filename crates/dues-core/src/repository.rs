//! Session-scoped read-through / write-through cache over [`ClubStorage`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use dues_domain::{BillingSnapshot, ClubCode, LedgerSnapshot};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{storage::snapshot_warnings, ClubStorage, CoreError};

/// Caches club snapshots for the lifetime of the owning engine.
///
/// Reads are served from the cache after the first load. Saves go to storage
/// first and only replace the cached copy once the write succeeded; a failed
/// write drops the cached copy so the next read reloads from storage.
pub struct ClubRepository {
    storage: Arc<dyn ClubStorage>,
    billing: Mutex<HashMap<ClubCode, BillingSnapshot>>,
    ledger: Mutex<HashMap<ClubCode, LedgerSnapshot>>,
    locks: Mutex<HashMap<ClubCode, Arc<AsyncMutex<()>>>>,
}

impl ClubRepository {
    pub fn new(storage: Arc<dyn ClubStorage>) -> Self {
        Self {
            storage,
            billing: Mutex::new(HashMap::new()),
            ledger: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn ClubStorage> {
        &self.storage
    }

    /// Serialises mutators for one club. Hold the guard across a whole
    /// read-modify-write; the lock is not re-entrant.
    pub async fn lock(&self, club: &ClubCode) -> Result<OwnedMutexGuard<()>, CoreError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(poisoned)?;
            locks.entry(club.clone()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }

    pub async fn billing(&self, club: &ClubCode) -> Result<BillingSnapshot, CoreError> {
        let cached = self.billing.lock().map_err(poisoned)?.get(club).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let snapshot = self.storage.load_billing(club).await?;
        self.billing
            .lock()
            .map_err(poisoned)?
            .insert(club.clone(), snapshot.clone());
        Ok(snapshot)
    }

    pub async fn ledger(&self, club: &ClubCode) -> Result<LedgerSnapshot, CoreError> {
        let cached = self.ledger.lock().map_err(poisoned)?.get(club).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let snapshot = self.storage.load_ledger(club).await?;
        self.ledger
            .lock()
            .map_err(poisoned)?
            .insert(club.clone(), snapshot.clone());
        Ok(snapshot)
    }

    pub async fn save_billing(
        &self,
        club: &ClubCode,
        snapshot: BillingSnapshot,
    ) -> Result<(), CoreError> {
        match self.storage.save_billing(club, &snapshot).await {
            Ok(()) => {
                self.billing
                    .lock()
                    .map_err(poisoned)?
                    .insert(club.clone(), snapshot);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(club = %club, error = %err, "billing snapshot write failed");
                self.billing.lock().map_err(poisoned)?.remove(club);
                Err(err)
            }
        }
    }

    pub async fn save_ledger(
        &self,
        club: &ClubCode,
        snapshot: LedgerSnapshot,
    ) -> Result<(), CoreError> {
        match self.storage.save_ledger(club, &snapshot).await {
            Ok(()) => {
                self.ledger
                    .lock()
                    .map_err(poisoned)?
                    .insert(club.clone(), snapshot);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(club = %club, error = %err, "ledger snapshot write failed");
                self.ledger.lock().map_err(poisoned)?.remove(club);
                Err(err)
            }
        }
    }

    /// Drops every cached snapshot for `club`.
    pub fn invalidate(&self, club: &ClubCode) -> Result<(), CoreError> {
        self.billing.lock().map_err(poisoned)?.remove(club);
        self.ledger.lock().map_err(poisoned)?.remove(club);
        Ok(())
    }

    /// Loads both snapshots and returns any cross-snapshot inconsistencies.
    pub async fn audit(&self, club: &ClubCode) -> Result<Vec<String>, CoreError> {
        let billing = self.billing(club).await?;
        let ledger = self.ledger(club).await?;
        let warnings = snapshot_warnings(&billing, &ledger);
        for warning in &warnings {
            tracing::warn!(club = %club, "{warning}");
        }
        Ok(warnings)
    }
}

fn poisoned(_: impl std::fmt::Display) -> CoreError {
    CoreError::Storage("snapshot cache lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryClubStorage;
    use chrono::Utc;
    use dues_domain::BillingPeriod;

    fn repository() -> (Arc<InMemoryClubStorage>, ClubRepository) {
        let storage = Arc::new(InMemoryClubStorage::new());
        let repo = ClubRepository::new(storage.clone());
        (storage, repo)
    }

    #[tokio::test]
    async fn failed_write_invalidates_cache() {
        let (storage, repo) = repository();
        let club = ClubCode::new("fc");
        let mut snapshot = repo.billing(&club).await.unwrap();
        snapshot.insert_period(BillingPeriod::new("1월", 10_000, Utc::now()), vec![]);
        repo.save_billing(&club, snapshot.clone()).await.unwrap();

        storage.set_fail_writes(true);
        let err = repo
            .save_billing(&club, BillingSnapshot::default())
            .await
            .expect_err("write must fail");
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(repo.billing(&club).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn cached_reads_skip_storage_until_invalidated() {
        let (storage, repo) = repository();
        let club = ClubCode::new("fc");
        assert!(repo.billing(&club).await.unwrap().billing_periods.is_empty());

        let mut external = BillingSnapshot::default();
        external.insert_period(BillingPeriod::new("외부", 5_000, Utc::now()), vec![]);
        storage.save_billing(&club, &external).await.unwrap();

        assert!(repo.billing(&club).await.unwrap().billing_periods.is_empty());
        repo.invalidate(&club).unwrap();
        assert_eq!(repo.billing(&club).await.unwrap(), external);
    }
}
