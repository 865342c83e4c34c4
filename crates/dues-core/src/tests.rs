use std::sync::Arc;

use chrono::{TimeZone, Utc};
use dues_domain::{ClubCode, DifferentialRule, LedgerFilter, PaymentStatus};

use crate::{
    BillingStore, ClubRepository, DepositParser, FixedClock, InMemoryClubStorage, LedgerStore,
    MemberSelection, NotificationMatcher, PeriodDraft, Transition,
};

struct Services {
    storage: Arc<InMemoryClubStorage>,
    repo: Arc<ClubRepository>,
    billing: BillingStore,
    ledger: LedgerStore,
}

fn services() -> Services {
    let storage = Arc::new(InMemoryClubStorage::new());
    let repo = Arc::new(ClubRepository::new(storage.clone()));
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
    Services {
        billing: BillingStore::new(repo.clone(), clock.clone()),
        ledger: LedgerStore::new(repo.clone(), clock),
        storage,
        repo,
    }
}

fn draft() -> PeriodDraft {
    PeriodDraft::new("3월 회비", "20,000")
        .with_ledger_category("회비")
        .with_member(MemberSelection::new("김철수"))
        .with_member(MemberSelection::new("이영희").with_rule(DifferentialRule::PercentDiscount(50.0)))
}

async fn assert_bound_entry_consistent(services: &Services, club: &ClubCode, period_id: uuid::Uuid) {
    let billing = services.repo.billing(club).await.unwrap();
    let ledger = services.repo.ledger(club).await.unwrap();
    let progress = billing.progress(period_id);
    let bound: Vec<_> = ledger
        .entries
        .iter()
        .filter(|entry| entry.billing_period_id == Some(period_id))
        .collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].amount, progress.confirmed_amount);
    assert!(bound[0].description.contains(&progress.label()));
}

#[tokio::test]
async fn bound_entry_tracks_every_transition() {
    let services = services();
    let club = ClubCode::new("fc");
    let period = services.billing.create_period(&club, draft()).await.unwrap();

    let steps = [
        ("김철수", Transition::MemberPaid),
        ("김철수", Transition::AdminConfirmed),
        ("이영희", Transition::AdminConfirmed),
        ("김철수", Transition::AdminRevoked),
        ("김철수", Transition::MemberPaid),
        ("김철수", Transition::AdminRejected),
        ("김철수", Transition::AutoConfirmed),
    ];
    for (player, transition) in steps {
        services
            .billing
            .update_status(&club, period.id, player, transition)
            .await
            .unwrap();
        assert_bound_entry_consistent(&services, &club, period.id).await;
    }

    let ledger = services.repo.ledger(&club).await.unwrap();
    let entry = ledger.bound_entry(period.id).unwrap();
    assert_eq!(entry.amount, 30_000);
    assert!(entry.description.contains("2/2명 입금"));
}

#[tokio::test]
async fn rejected_transition_leaves_state_untouched() {
    let services = services();
    let club = ClubCode::new("fc");
    let period = services.billing.create_period(&club, draft()).await.unwrap();
    services
        .billing
        .update_status(&club, period.id, "김철수", Transition::AdminConfirmed)
        .await
        .unwrap();
    let writes = services.storage.write_count();

    let err = services
        .billing
        .update_status(&club, period.id, "김철수", Transition::MemberPaid)
        .await
        .unwrap_err();
    assert!(matches!(err, crate::CoreError::InvalidTransition { .. }));
    assert_eq!(services.storage.write_count(), writes);

    let noop = services
        .billing
        .update_status(&club, period.id, "김철수", Transition::AutoConfirmed)
        .await
        .unwrap();
    assert!(!noop.changed);
    assert_eq!(services.storage.write_count(), writes);
}

#[tokio::test]
async fn failed_write_is_reported_and_cache_reloads() {
    let services = services();
    let club = ClubCode::new("fc");
    let period = services.billing.create_period(&club, draft()).await.unwrap();

    services.storage.set_fail_writes(true);
    let err = services
        .billing
        .update_status(&club, period.id, "김철수", Transition::AdminConfirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, crate::CoreError::Storage(_)));
    services.storage.set_fail_writes(false);

    let records = services.billing.records(&club, period.id).await.unwrap();
    assert!(records.iter().all(|record| record.status == PaymentStatus::Unpaid));
}

#[tokio::test]
async fn matcher_and_manual_edits_share_ledger_view() {
    let services = services();
    let club = ClubCode::new("fc");
    let period = services.billing.create_period(&club, draft()).await.unwrap();
    let matcher = NotificationMatcher::new(
        services.repo.clone(),
        services.billing.status_machine().clone(),
        DepositParser::default(),
    );

    let outcome = matcher.handle_text(&club, "[국민] 입금 이영희 10,000원").await;
    assert!(outcome.success);
    services
        .billing
        .update_status(&club, period.id, "김철수", Transition::AdminConfirmed)
        .await
        .unwrap();

    let rows = services.ledger.entries(&club, &LedgerFilter::month(2024, 3)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].running_balance, 30_000);
    assert_bound_entry_consistent(&services, &club, period.id).await;
}

#[tokio::test]
async fn first_stored_period_wins_for_shared_player() {
    let services = services();
    let club = ClubCode::new("fc");
    let first = services.billing.create_period(&club, draft()).await.unwrap();
    let second = services
        .billing
        .create_period(&club, PeriodDraft::new("대회비", "20000").with_member(MemberSelection::new("김철수")))
        .await
        .unwrap();
    let matcher = NotificationMatcher::new(
        services.repo.clone(),
        services.billing.status_machine().clone(),
        DepositParser::default(),
    );

    let outcome = matcher.handle_text(&club, "입금 김철수 20,000원").await;
    assert_eq!(outcome.period_id, Some(first.id));
    let outcome = matcher.handle_text(&club, "입금 김철수 20,000원").await;
    assert_eq!(outcome.period_id, Some(second.id));
}
