//! Persistence seam for club-scoped snapshots.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use dues_domain::{BillingSnapshot, ClubCode, LedgerSnapshot};

use crate::CoreError;

/// Abstraction over backends holding one billing and one ledger blob per club.
///
/// A club that has never been saved loads as an empty snapshot. A save
/// replaces the whole blob.
#[async_trait]
pub trait ClubStorage: Send + Sync {
    async fn load_billing(&self, club: &ClubCode) -> Result<BillingSnapshot, CoreError>;
    async fn save_billing(&self, club: &ClubCode, snapshot: &BillingSnapshot)
        -> Result<(), CoreError>;
    async fn load_ledger(&self, club: &ClubCode) -> Result<LedgerSnapshot, CoreError>;
    async fn save_ledger(&self, club: &ClubCode, snapshot: &LedgerSnapshot)
        -> Result<(), CoreError>;
}

/// Process-local storage, mainly for tests and previews.
#[derive(Debug, Default)]
pub struct InMemoryClubStorage {
    billing: Mutex<HashMap<ClubCode, BillingSnapshot>>,
    ledger: Mutex<HashMap<ClubCode, LedgerSnapshot>>,
    fail_billing_writes: AtomicBool,
    fail_ledger_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryClubStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.set_fail_billing_writes(fail);
        self.set_fail_ledger_writes(fail);
    }

    pub fn set_fail_billing_writes(&self, fail: bool) {
        self.fail_billing_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(flag: &AtomicBool) -> Result<(), CoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("write rejected by storage".into()));
        }
        Ok(())
    }
}

fn poisoned(_: impl std::fmt::Display) -> CoreError {
    CoreError::Storage("in-memory storage lock poisoned".into())
}

#[async_trait]
impl ClubStorage for InMemoryClubStorage {
    async fn load_billing(&self, club: &ClubCode) -> Result<BillingSnapshot, CoreError> {
        let guard = self.billing.lock().map_err(poisoned)?;
        Ok(guard.get(club).cloned().unwrap_or_default())
    }

    async fn save_billing(
        &self,
        club: &ClubCode,
        snapshot: &BillingSnapshot,
    ) -> Result<(), CoreError> {
        Self::check_writable(&self.fail_billing_writes)?;
        let mut guard = self.billing.lock().map_err(poisoned)?;
        guard.insert(club.clone(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_ledger(&self, club: &ClubCode) -> Result<LedgerSnapshot, CoreError> {
        let guard = self.ledger.lock().map_err(poisoned)?;
        Ok(guard.get(club).cloned().unwrap_or_default())
    }

    async fn save_ledger(
        &self,
        club: &ClubCode,
        snapshot: &LedgerSnapshot,
    ) -> Result<(), CoreError> {
        Self::check_writable(&self.fail_ledger_writes)?;
        let mut guard = self.ledger.lock().map_err(poisoned)?;
        guard.insert(club.clone(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Detects dangling references between a club's billing and ledger snapshots.
pub fn snapshot_warnings(billing: &BillingSnapshot, ledger: &LedgerSnapshot) -> Vec<String> {
    let period_ids: HashSet<_> = billing.billing_periods.iter().map(|p| p.id).collect();
    let mut warnings = Vec::new();

    for period_id in billing.payments.keys() {
        if !period_ids.contains(period_id) {
            warnings.push(format!(
                "payment records reference unknown billing period {}",
                period_id
            ));
        }
    }
    for entry in &ledger.entries {
        if let Some(period_id) = entry.billing_period_id {
            if !period_ids.contains(&period_id) {
                warnings.push(format!(
                    "ledger entry {} references unknown billing period {}",
                    entry.id, period_id
                ));
            }
        }
    }
    for period in &billing.billing_periods {
        let bound = ledger
            .entries
            .iter()
            .filter(|entry| entry.billing_period_id == Some(period.id))
            .count();
        match (&period.ledger_category, bound) {
            (Some(_), 0) => warnings.push(format!(
                "billing period {} has a ledger category but no bound entry",
                period.id
            )),
            (_, count) if count > 1 => warnings.push(format!(
                "billing period {} has {} bound ledger entries",
                period.id, count
            )),
            _ => {}
        }
    }
    warnings
}
