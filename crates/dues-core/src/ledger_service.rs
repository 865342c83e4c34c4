//! Club ledger CRUD, reporting and the billing-period bindings.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dues_domain::{
    BillingPeriod, ClubCode, EntryType, LedgerCategory, LedgerEntry, LedgerFilter, LedgerRow,
    LedgerSnapshot, LedgerSummary, PaymentProgress, PaymentRecord,
};
use uuid::Uuid;

use crate::{amount_calculator::parse_amount, ClubRepository, Clock, CoreError};

/// User-editable fields of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub date: NaiveDate,
    pub description: String,
    pub entry_type: EntryType,
    pub amount: String,
    pub category: String,
    pub memo: Option<String>,
}

impl EntryDraft {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        entry_type: EntryType,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            entry_type,
            amount: amount.into(),
            category: category.into(),
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    fn validate(&self, ledger: &LedgerSnapshot) -> Result<ValidEntry, CoreError> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(CoreError::validation("description must not be empty"));
        }
        let amount = parse_amount(&self.amount, "amount")?;
        let category = self.category.trim();
        if !ledger.has_category(category, self.entry_type) {
            return Err(CoreError::validation(format!(
                "unknown {} category `{}`",
                self.entry_type, category
            )));
        }
        let memo = self
            .memo
            .as_deref()
            .map(str::trim)
            .filter(|memo| !memo.is_empty())
            .map(str::to_string);
        Ok(ValidEntry {
            description: description.to_string(),
            amount,
            category: category.to_string(),
            memo,
        })
    }
}

struct ValidEntry {
    description: String,
    amount: i64,
    category: String,
    memo: Option<String>,
}

/// Validated CRUD and reporting over a club's ledger snapshot.
#[derive(Clone)]
pub struct LedgerStore {
    repo: Arc<ClubRepository>,
    clock: Arc<dyn Clock>,
}

impl LedgerStore {
    pub fn new(repo: Arc<ClubRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn add_entry(&self, club: &ClubCode, draft: EntryDraft) -> Result<LedgerEntry, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        let valid = draft.validate(&ledger)?;
        let mut entry = LedgerEntry::new(
            draft.date,
            valid.description,
            draft.entry_type,
            valid.amount,
            valid.category,
            self.clock.now(),
        );
        entry.memo = valid.memo;
        ledger.entries.push(entry.clone());
        self.repo.save_ledger(club, ledger).await?;
        tracing::info!(club = %club, entry = %entry.id, amount = entry.amount, "ledger entry added");
        Ok(entry)
    }

    /// Replaces the editable fields; id and creation time are kept. Entries
    /// bound to a billing period are rejected.
    pub async fn update_entry(
        &self,
        club: &ClubCode,
        id: Uuid,
        draft: EntryDraft,
    ) -> Result<LedgerEntry, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        let valid = draft.validate(&ledger)?;
        let entry = ledger.entry_mut(id).ok_or(CoreError::EntryNotFound(id))?;
        ensure_unbound(entry)?;
        entry.date = draft.date;
        entry.description = valid.description;
        entry.entry_type = draft.entry_type;
        entry.amount = valid.amount;
        entry.category = valid.category;
        entry.memo = valid.memo;
        let updated = entry.clone();
        self.repo.save_ledger(club, ledger).await?;
        Ok(updated)
    }

    pub async fn delete_entry(&self, club: &ClubCode, id: Uuid) -> Result<LedgerEntry, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        ensure_unbound(ledger.entry(id).ok_or(CoreError::EntryNotFound(id))?)?;
        let removed = ledger.remove_entry(id).ok_or(CoreError::EntryNotFound(id))?;
        self.repo.save_ledger(club, ledger).await?;
        tracing::info!(club = %club, entry = %id, "ledger entry deleted");
        Ok(removed)
    }

    pub async fn entry(&self, club: &ClubCode, id: Uuid) -> Result<LedgerEntry, CoreError> {
        let ledger = self.repo.ledger(club).await?;
        ledger.entry(id).cloned().ok_or(CoreError::EntryNotFound(id))
    }

    /// Rows matching `filter` in chronological order. Each row's running
    /// balance is computed over the whole ledger, not only the shown rows.
    pub async fn entries(&self, club: &ClubCode, filter: &LedgerFilter) -> Result<Vec<LedgerRow>, CoreError> {
        Ok(self.repo.ledger(club).await?.rows(filter))
    }

    pub async fn summary(&self, club: &ClubCode, filter: &LedgerFilter) -> Result<LedgerSummary, CoreError> {
        Ok(self.repo.ledger(club).await?.summarize(filter))
    }

    pub async fn categories(
        &self,
        club: &ClubCode,
        entry_type: EntryType,
    ) -> Result<Vec<LedgerCategory>, CoreError> {
        Ok(self.repo.ledger(club).await?.categories(entry_type))
    }

    /// Appends a club category. Labels are unique across both entry types.
    pub async fn add_custom_category(
        &self,
        club: &ClubCode,
        label: &str,
        entry_type: EntryType,
    ) -> Result<LedgerCategory, CoreError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CoreError::validation("category label must not be empty"));
        }
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        let normalized = label.to_lowercase();
        let duplicate = [EntryType::Income, EntryType::Expense]
            .into_iter()
            .flat_map(|kind| ledger.categories(kind))
            .any(|existing| existing.label.trim().to_lowercase() == normalized);
        if duplicate {
            return Err(CoreError::validation(format!(
                "category `{label}` already exists"
            )));
        }
        let category = LedgerCategory::new(label, entry_type);
        ledger.custom_categories.push(category.clone());
        self.repo.save_ledger(club, ledger).await?;
        Ok(category)
    }

    /// Removes every entry bound to `period_id`; returns how many were removed.
    pub async fn delete_by_billing_period(&self, club: &ClubCode, period_id: Uuid) -> Result<usize, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        let removed = ledger.remove_bound_entries(period_id);
        if removed > 0 {
            self.repo.save_ledger(club, ledger).await?;
        }
        Ok(removed)
    }

    /// Overwrites the bound entry's amount and description. Returns `false`
    /// when the period has no bound entry.
    pub async fn update_by_billing_period(
        &self,
        club: &ClubCode,
        period_id: Uuid,
        amount: i64,
        description: &str,
    ) -> Result<bool, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        if !write_bound_entry(&mut ledger, period_id, amount, description) {
            return Ok(false);
        }
        self.repo.save_ledger(club, ledger).await?;
        Ok(true)
    }
}

fn ensure_unbound(entry: &LedgerEntry) -> Result<(), CoreError> {
    match entry.billing_period_id {
        Some(period_id) => Err(CoreError::validation(format!(
            "entry {} is managed by billing period {period_id}",
            entry.id
        ))),
        None => Ok(()),
    }
}

/// Description of a period's bound entry, e.g. `3월 회비 (2/3명 입금)`.
pub fn bound_description(period_name: &str, progress: &PaymentProgress) -> String {
    format!("{} ({})", period_name, progress.label())
}

pub(crate) fn new_bound_entry(
    period: &BillingPeriod,
    records: &[PaymentRecord],
    fallback_date: NaiveDate,
    created_at: DateTime<Utc>,
) -> Option<LedgerEntry> {
    let category = period.ledger_category.as_ref()?;
    let progress = PaymentProgress::from_records(records);
    let entry = LedgerEntry::new(
        period.date.unwrap_or(fallback_date),
        bound_description(&period.name, &progress),
        EntryType::Income,
        progress.confirmed_amount,
        category.clone(),
        created_at,
    )
    .bound_to(period.id);
    Some(entry)
}

/// Recomputes a bound entry from the period's records. Never creates an entry;
/// returns `true` when the snapshot changed.
pub(crate) fn sync_bound_entry(
    ledger: &mut LedgerSnapshot,
    period: &BillingPeriod,
    records: &[PaymentRecord],
) -> bool {
    if period.ledger_category.is_none() {
        return false;
    }
    let progress = PaymentProgress::from_records(records);
    let description = bound_description(&period.name, &progress);
    write_bound_entry(ledger, period.id, progress.confirmed_amount, &description)
}

fn write_bound_entry(ledger: &mut LedgerSnapshot, period_id: Uuid, amount: i64, description: &str) -> bool {
    let Some(entry) = ledger.bound_entry_mut(period_id) else {
        return false;
    };
    if entry.amount == amount && entry.description == description {
        return false;
    }
    entry.amount = amount;
    entry.description = description.to_string();
    tracing::debug!(period = %period_id, amount, "bound ledger entry synced");
    true
}
