//! Payment record lifecycle, keyed by what triggered the change.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use dues_domain::{BillingPeriod, BillingSnapshot, ClubCode, PaymentRecord, PaymentStatus};
use uuid::Uuid;

use crate::{ledger_service::sync_bound_entry, ClubRepository, Clock, CoreError};

/// A named status change. The same target can be reached by several triggers
/// with different legal source states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// The member reports having paid.
    MemberPaid,
    AdminConfirmed,
    /// A deposit notification matched the billed amount.
    AutoConfirmed,
    /// A deposit notification matched the name but not the amount.
    AutoFlagged,
    AdminRejected,
    /// The member withdraws a payment report.
    MemberRetried,
    AdminRevoked,
}

impl Transition {
    pub fn target(self) -> PaymentStatus {
        match self {
            Transition::MemberPaid | Transition::AutoFlagged => PaymentStatus::PendingConfirmation,
            Transition::AdminConfirmed | Transition::AutoConfirmed => PaymentStatus::Confirmed,
            Transition::AdminRejected | Transition::MemberRetried | Transition::AdminRevoked => {
                PaymentStatus::Unpaid
            }
        }
    }

    /// Whether `from` is a legal source state. Same-state taps are handled
    /// separately as no-ops.
    pub fn allows(self, from: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match self {
            Transition::MemberPaid | Transition::AutoFlagged => from == Unpaid,
            Transition::AdminConfirmed | Transition::AutoConfirmed => {
                matches!(from, Unpaid | PendingConfirmation)
            }
            Transition::AdminRejected | Transition::MemberRetried => from == PendingConfirmation,
            Transition::AdminRevoked => from == Confirmed,
        }
    }

    pub fn is_automatic(self) -> bool {
        matches!(self, Transition::AutoConfirmed | Transition::AutoFlagged)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Transition::MemberPaid => "member paid",
            Transition::AdminConfirmed => "admin confirmed",
            Transition::AutoConfirmed => "auto confirmed",
            Transition::AutoFlagged => "auto flagged",
            Transition::AdminRejected => "admin rejected",
            Transition::MemberRetried => "member retried",
            Transition::AdminRevoked => "admin revoked",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub period: BillingPeriod,
    pub record: PaymentRecord,
    pub previous: PaymentStatus,
    /// `false` when the record already had the target status.
    pub changed: bool,
}

/// Applies `transition` to a snapshot in place.
pub fn apply(
    billing: &mut BillingSnapshot,
    period_id: Uuid,
    player_name: &str,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, CoreError> {
    let period = billing
        .period(period_id)
        .cloned()
        .ok_or_else(|| CoreError::record_not_found(period_id, player_name))?;
    let record = billing
        .record_mut(period_id, player_name)
        .ok_or_else(|| CoreError::record_not_found(period_id, player_name))?;

    let previous = record.status;
    let target = transition.target();
    if previous == target {
        return Ok(TransitionOutcome {
            period,
            record: record.clone(),
            previous,
            changed: false,
        });
    }
    if !transition.allows(previous) {
        return Err(CoreError::InvalidTransition {
            from: previous,
            to: target,
        });
    }
    record.status = target;
    record.updated_at = Some(now);
    Ok(TransitionOutcome {
        period,
        record: record.clone(),
        previous,
        changed: true,
    })
}

/// Drives status changes and keeps the bound ledger entry in step.
#[derive(Clone)]
pub struct PaymentStatusMachine {
    repo: Arc<ClubRepository>,
    clock: Arc<dyn Clock>,
}

impl PaymentStatusMachine {
    pub fn new(repo: Arc<ClubRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn transition(
        &self,
        club: &ClubCode,
        period_id: Uuid,
        player_name: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome, CoreError> {
        let _guard = self.repo.lock(club).await?;
        self.transition_locked(club, period_id, player_name, transition)
            .await
    }

    /// Caller must hold the club lock.
    pub(crate) async fn transition_locked(
        &self,
        club: &ClubCode,
        period_id: Uuid,
        player_name: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome, CoreError> {
        let mut billing = self.repo.billing(club).await?;
        let outcome = apply(&mut billing, period_id, player_name, transition, self.clock.now())?;
        let records = billing.records(period_id).to_vec();
        if outcome.changed {
            self.repo.save_billing(club, billing).await?;
            tracing::info!(
                club = %club,
                period = %period_id,
                player = player_name,
                %transition,
                from = %outcome.previous,
                to = %outcome.record.status,
                "payment status changed"
            );
        }
        // Same-state taps still repair a drifted bound entry.
        resync_ledger_locked(&self.repo, club, &outcome.period, &records).await?;
        Ok(outcome)
    }
}

/// Rewrites the period's bound entry if it drifted. Caller must hold the club lock.
pub(crate) async fn resync_ledger_locked(
    repo: &ClubRepository,
    club: &ClubCode,
    period: &BillingPeriod,
    records: &[PaymentRecord],
) -> Result<(), CoreError> {
    if period.ledger_category.is_none() {
        return Ok(());
    }
    let mut ledger = repo.ledger(club).await?;
    if sync_bound_entry(&mut ledger, period, records) {
        repo.save_ledger(club, ledger).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use PaymentStatus::*;

    fn snapshot() -> (BillingSnapshot, Uuid) {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let period = BillingPeriod::new("3월 회비", 20_000, now);
        let id = period.id;
        let mut billing = BillingSnapshot::default();
        billing.insert_period(period, vec![PaymentRecord::new("김철수", 20_000)]);
        (billing, id)
    }

    fn set_status(billing: &mut BillingSnapshot, id: Uuid, status: PaymentStatus) {
        billing.record_mut(id, "김철수").unwrap().status = status;
    }

    #[test]
    fn transition_table() {
        let cases = [
            (Transition::MemberPaid, Unpaid, Some(PendingConfirmation)),
            (Transition::MemberPaid, Confirmed, None),
            (Transition::AdminConfirmed, Unpaid, Some(Confirmed)),
            (Transition::AdminConfirmed, PendingConfirmation, Some(Confirmed)),
            (Transition::AutoConfirmed, PendingConfirmation, Some(Confirmed)),
            (Transition::AutoFlagged, Unpaid, Some(PendingConfirmation)),
            (Transition::AutoFlagged, Confirmed, None),
            (Transition::AdminRejected, PendingConfirmation, Some(Unpaid)),
            (Transition::AdminRejected, Confirmed, None),
            (Transition::MemberRetried, PendingConfirmation, Some(Unpaid)),
            (Transition::AdminRevoked, Confirmed, Some(Unpaid)),
            (Transition::AdminRevoked, PendingConfirmation, None),
        ];
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        for (transition, from, expected) in cases {
            let (mut billing, id) = snapshot();
            set_status(&mut billing, id, from);
            let result = apply(&mut billing, id, "김철수", transition, now);
            match expected {
                Some(to) => {
                    let outcome = result.unwrap();
                    assert!(outcome.changed);
                    assert_eq!(outcome.record.status, to, "{transition} from {from}");
                    assert_eq!(outcome.record.updated_at, Some(now));
                }
                None => assert!(
                    matches!(result, Err(CoreError::InvalidTransition { .. })),
                    "{transition} from {from} should be rejected"
                ),
            }
        }
    }

    #[test]
    fn same_state_is_a_no_op() {
        let (mut billing, id) = snapshot();
        set_status(&mut billing, id, Confirmed);
        let before = billing.clone();
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        let outcome = apply(&mut billing, id, "김철수", Transition::AdminConfirmed, now).unwrap();
        assert!(!outcome.changed);
        assert_eq!(billing, before);
    }

    #[test]
    fn missing_targets_are_not_found() {
        let (mut billing, id) = snapshot();
        let now = Utc::now();
        let err = apply(&mut billing, id, "이영희", Transition::MemberPaid, now).unwrap_err();
        assert!(matches!(err, CoreError::RecordNotFound { .. }));
        let err = apply(&mut billing, Uuid::new_v4(), "김철수", Transition::MemberPaid, now)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
