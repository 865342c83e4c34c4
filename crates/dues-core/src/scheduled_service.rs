//! Deferred billings that turn into periods once their instant passes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dues_domain::{BillingPeriod, ClubCode, ScheduledBilling};
use uuid::Uuid;

use crate::{
    billing_service::PeriodDraft, ledger_service::new_bound_entry, ClubRepository, Clock,
    CoreError,
};

#[derive(Clone)]
pub struct ScheduledBillingProcessor {
    repo: Arc<ClubRepository>,
    clock: Arc<dyn Clock>,
}

impl ScheduledBillingProcessor {
    pub fn new(repo: Arc<ClubRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Validates `draft` like a direct creation and stores it with member
    /// amounts resolved now.
    pub async fn schedule(
        &self,
        club: &ClubCode,
        draft: PeriodDraft,
        scheduled_at: DateTime<Utc>,
    ) -> Result<ScheduledBilling, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let ledger = self.repo.ledger(club).await?;
        let valid = draft.validate(&ledger)?;
        let now = self.clock.now();
        if scheduled_at <= now {
            return Err(CoreError::validation("scheduled time must be in the future"));
        }

        let scheduled = ScheduledBilling {
            id: Uuid::new_v4(),
            scheduled_at,
            name: valid.name,
            amount: valid.amount,
            date: valid.date,
            ledger_category: valid.ledger_category,
            member_amounts: valid.member_amounts,
            created_at: now,
        };
        let mut billing = self.repo.billing(club).await?;
        billing.scheduled_billings.push(scheduled.clone());
        self.repo.save_billing(club, billing).await?;
        tracing::info!(
            club = %club,
            scheduled = %scheduled.id,
            at = %scheduled.scheduled_at,
            "billing scheduled"
        );
        Ok(scheduled)
    }

    pub async fn cancel(&self, club: &ClubCode, id: Uuid) -> Result<ScheduledBilling, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut billing = self.repo.billing(club).await?;
        let removed = billing
            .remove_scheduled(id)
            .ok_or(CoreError::ScheduleNotFound(id))?;
        self.repo.save_billing(club, billing).await?;

        // A failed run may have booked the entry already.
        let mut ledger = self.repo.ledger(club).await?;
        if ledger.remove_bound_entries(id) > 0 {
            self.repo.save_ledger(club, ledger).await?;
        }
        tracing::info!(club = %club, scheduled = %id, "scheduled billing cancelled");
        Ok(removed)
    }

    pub async fn scheduled(&self, club: &ClubCode) -> Result<Vec<ScheduledBilling>, CoreError> {
        Ok(self.repo.billing(club).await?.scheduled_billings)
    }

    /// Materializes every due template. Running it again finds nothing.
    ///
    /// Bound entries are booked before the templates leave the billing
    /// snapshot, so a run that fails on either write can be retried.
    pub async fn process_due(&self, club: &ClubCode) -> Result<Vec<BillingPeriod>, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut billing = self.repo.billing(club).await?;
        let now = self.clock.now();
        let due = billing.take_due(now);
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for scheduled in &due {
            if billing.period(scheduled.id).is_some() {
                tracing::warn!(club = %club, period = %scheduled.id, "scheduled billing already materialized");
                continue;
            }
            let period = scheduled.to_period(now);
            let records = scheduled.to_records();
            billing.insert_period(period.clone(), records.clone());
            created.push((period, records));
        }

        let mut ledger = self.repo.ledger(club).await?;
        let mut booked = false;
        for (period, records) in &created {
            if ledger.bound_entry(period.id).is_some() {
                continue;
            }
            if let Some(entry) = new_bound_entry(period, records, self.clock.today(), now) {
                ledger.entries.push(entry);
                booked = true;
            }
        }
        if booked {
            self.repo.save_ledger(club, ledger).await?;
        }
        self.repo.save_billing(club, billing).await?;

        tracing::info!(
            club = %club,
            due = due.len(),
            created = created.len(),
            "scheduled billings processed"
        );
        Ok(created.into_iter().map(|(period, _)| period).collect())
    }
}
