//! Billing period lifecycle and per-member payment records.

use std::{collections::HashSet, sync::Arc};

use chrono::NaiveDate;
use dues_domain::{
    BillingPeriod, BillingSnapshot, ClubCode, DifferentialRule, DifferentialSettings, EntryType,
    LedgerSnapshot, MemberAmount, PaymentProgress, PaymentRecord, Player,
};
use uuid::Uuid;

use crate::{
    amount_calculator::{parse_amount, AmountCalculator},
    ledger_service::new_bound_entry,
    payment_status::{resync_ledger_locked, PaymentStatusMachine, Transition, TransitionOutcome},
    ClubRepository, Clock, CoreError,
};

/// A member picked for a billing period and the rule adjusting their amount.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSelection {
    pub player_name: String,
    pub rule: Option<DifferentialRule>,
}

impl MemberSelection {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            rule: None,
        }
    }

    pub fn with_rule(mut self, rule: DifferentialRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Selects the roster players named in `selected`, in roster order, with
    /// the rule configured for each player's admin rank.
    pub fn from_roster(
        roster: &[Player],
        selected: &[&str],
        settings: &DifferentialSettings,
    ) -> Vec<Self> {
        roster
            .iter()
            .filter(|player| selected.contains(&player.name.as_str()))
            .map(|player| Self {
                player_name: player.name.clone(),
                rule: settings.rule_for(player.admin_rank.as_deref()),
            })
            .collect()
    }
}

/// Unvalidated input for a new billing period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodDraft {
    pub name: String,
    pub amount: String,
    pub date: Option<NaiveDate>,
    pub ledger_category: Option<String>,
    pub members: Vec<MemberSelection>,
}

impl PeriodDraft {
    pub fn new(name: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: amount.into(),
            date: None,
            ledger_category: None,
            members: Vec::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_ledger_category(mut self, category: impl Into<String>) -> Self {
        self.ledger_category = Some(category.into());
        self
    }

    pub fn with_member(mut self, member: MemberSelection) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = MemberSelection>) -> Self {
        self.members.extend(members);
        self
    }

    pub(crate) fn validate(&self, ledger: &LedgerSnapshot) -> Result<ValidatedDraft, CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("billing name must not be empty"));
        }
        let amount = parse_amount(&self.amount, "amount")?;
        if self.members.is_empty() {
            return Err(CoreError::validation("select at least one member"));
        }
        let mut seen = HashSet::new();
        for member in &self.members {
            let player = member.player_name.trim();
            if player.is_empty() {
                return Err(CoreError::validation("member name must not be empty"));
            }
            if !seen.insert(player) {
                return Err(CoreError::validation(format!(
                    "member `{player}` is selected twice"
                )));
            }
        }
        let ledger_category = self
            .ledger_category
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);
        if let Some(category) = &ledger_category {
            if !ledger.has_category(category, EntryType::Income) {
                return Err(CoreError::validation(format!(
                    "unknown income category `{category}`"
                )));
            }
        }
        let members = self
            .members
            .iter()
            .map(|member| MemberSelection {
                player_name: member.player_name.trim().to_string(),
                rule: member.rule,
            })
            .collect::<Vec<_>>();
        Ok(ValidatedDraft {
            name: name.to_string(),
            amount,
            date: self.date,
            ledger_category,
            member_amounts: AmountCalculator::member_amounts(amount, &members),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidatedDraft {
    pub name: String,
    pub amount: i64,
    pub date: Option<NaiveDate>,
    pub ledger_category: Option<String>,
    pub member_amounts: Vec<MemberAmount>,
}

/// Metadata edits for an existing period. Member amounts are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodUpdate {
    pub name: Option<String>,
    pub amount: Option<String>,
}

impl PeriodUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }
}

/// Club-scoped billing periods and their payment records.
#[derive(Clone)]
pub struct BillingStore {
    repo: Arc<ClubRepository>,
    clock: Arc<dyn Clock>,
    status: PaymentStatusMachine,
}

impl BillingStore {
    pub fn new(repo: Arc<ClubRepository>, clock: Arc<dyn Clock>) -> Self {
        let status = PaymentStatusMachine::new(repo.clone(), clock.clone());
        Self {
            repo,
            clock,
            status,
        }
    }

    pub fn status_machine(&self) -> &PaymentStatusMachine {
        &self.status
    }

    pub async fn periods(&self, club: &ClubCode) -> Result<Vec<BillingPeriod>, CoreError> {
        Ok(self.repo.billing(club).await?.billing_periods)
    }

    pub async fn period(&self, club: &ClubCode, id: Uuid) -> Result<BillingPeriod, CoreError> {
        let billing = self.repo.billing(club).await?;
        billing.period(id).cloned().ok_or(CoreError::PeriodNotFound(id))
    }

    pub async fn records(&self, club: &ClubCode, id: Uuid) -> Result<Vec<PaymentRecord>, CoreError> {
        let billing = self.repo.billing(club).await?;
        if billing.period(id).is_none() {
            return Err(CoreError::PeriodNotFound(id));
        }
        Ok(billing.records(id).to_vec())
    }

    pub async fn period_progress(&self, club: &ClubCode, id: Uuid) -> Result<PaymentProgress, CoreError> {
        let billing = self.repo.billing(club).await?;
        if billing.period(id).is_none() {
            return Err(CoreError::PeriodNotFound(id));
        }
        Ok(billing.progress(id))
    }

    /// Creates a period with one unpaid record per member. A period with a
    /// ledger category also gets its bound income entry at `0/N`.
    pub async fn create_period(&self, club: &ClubCode, draft: PeriodDraft) -> Result<BillingPeriod, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut ledger = self.repo.ledger(club).await?;
        let valid = draft.validate(&ledger)?;
        let now = self.clock.now();

        let period = BillingPeriod::new(valid.name, valid.amount, now)
            .with_date(valid.date)
            .with_ledger_category(valid.ledger_category);
        let records: Vec<PaymentRecord> = valid.member_amounts.iter().map(PaymentRecord::from).collect();

        let bound = new_bound_entry(&period, &records, self.clock.today(), now);
        if let Some(entry) = &bound {
            ledger.entries.push(entry.clone());
            self.repo.save_ledger(club, ledger).await?;
        }

        let mut billing = self.repo.billing(club).await?;
        billing.insert_period(period.clone(), records.clone());
        if let Err(err) = self.repo.save_billing(club, billing).await {
            if let Some(entry) = bound {
                self.unbook(club, entry.id).await;
            }
            return Err(err);
        }
        tracing::info!(
            club = %club,
            period = %period.id,
            name = %period.name,
            members = records.len(),
            "billing period created"
        );
        Ok(period)
    }

    /// Drops an entry booked for a period whose billing write failed.
    async fn unbook(&self, club: &ClubCode, entry_id: Uuid) {
        let result = async {
            let mut ledger = self.repo.ledger(club).await?;
            if ledger.remove_entry(entry_id).is_some() {
                self.repo.save_ledger(club, ledger).await?;
            }
            Ok::<_, CoreError>(())
        }
        .await;
        if let Err(err) = result {
            tracing::warn!(club = %club, entry = %entry_id, error = %err, "orphaned bound entry left in ledger");
        }
    }

    pub async fn update_period(
        &self,
        club: &ClubCode,
        id: Uuid,
        update: PeriodUpdate,
    ) -> Result<BillingPeriod, CoreError> {
        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(CoreError::validation("billing name must not be empty")),
            other => other.map(str::to_string),
        };
        let amount = update
            .amount
            .as_deref()
            .map(|raw| parse_amount(raw, "amount"))
            .transpose()?;

        let _guard = self.repo.lock(club).await?;
        let mut billing = self.repo.billing(club).await?;
        let period = billing.period_mut(id).ok_or(CoreError::PeriodNotFound(id))?;
        if let Some(name) = name {
            period.name = name;
        }
        if let Some(amount) = amount {
            period.amount = amount;
        }
        let period = period.clone();
        let records = billing.records(id).to_vec();
        self.repo.save_billing(club, billing).await?;
        resync_ledger_locked(&self.repo, club, &period, &records).await?;
        Ok(period)
    }

    /// Adds a member at the period's base amount adjusted by their rule.
    pub async fn add_member(
        &self,
        club: &ClubCode,
        id: Uuid,
        member: MemberSelection,
    ) -> Result<PaymentRecord, CoreError> {
        let player_name = member.player_name.trim();
        if player_name.is_empty() {
            return Err(CoreError::validation("member name must not be empty"));
        }
        self.edit_records(club, id, |period, records| {
            if records.iter().any(|record| record.player_name == player_name) {
                return Err(CoreError::validation(format!(
                    "member `{player_name}` is already billed"
                )));
            }
            let amount = AmountCalculator::amount_for(period.amount, member.rule.as_ref());
            let record = PaymentRecord::new(player_name, amount);
            records.push(record.clone());
            Ok(record)
        })
        .await
    }

    pub async fn remove_member(
        &self,
        club: &ClubCode,
        id: Uuid,
        player_name: &str,
    ) -> Result<PaymentRecord, CoreError> {
        let player_name = player_name.trim();
        self.edit_records(club, id, |_, records| {
            let index = records
                .iter()
                .position(|record| record.player_name == player_name)
                .ok_or_else(|| CoreError::record_not_found(id, player_name))?;
            Ok(records.remove(index))
        })
        .await
    }

    pub async fn update_record_amount(
        &self,
        club: &ClubCode,
        id: Uuid,
        player_name: &str,
        raw_amount: &str,
    ) -> Result<PaymentRecord, CoreError> {
        let player_name = player_name.trim();
        let amount = parse_amount(raw_amount, "amount")?;
        let now = self.clock.now();
        self.edit_records(club, id, |_, records| {
            let record = records
                .iter_mut()
                .find(|record| record.player_name == player_name)
                .ok_or_else(|| CoreError::record_not_found(id, player_name))?;
            record.amount = amount;
            record.updated_at = Some(now);
            Ok(record.clone())
        })
        .await
    }

    pub async fn update_status(
        &self,
        club: &ClubCode,
        id: Uuid,
        player_name: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome, CoreError> {
        self.status.transition(club, id, player_name.trim(), transition).await
    }

    /// Removes the period, its records and any ledger entries bound to it.
    pub async fn delete_period(&self, club: &ClubCode, id: Uuid) -> Result<BillingPeriod, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut billing = self.repo.billing(club).await?;
        let (period, records) = billing.remove_period(id).ok_or(CoreError::PeriodNotFound(id))?;
        self.repo.save_billing(club, billing).await?;

        let mut ledger = self.repo.ledger(club).await?;
        let removed = ledger.remove_bound_entries(id);
        if removed > 0 {
            self.repo.save_ledger(club, ledger).await?;
        }
        tracing::info!(
            club = %club,
            period = %id,
            records = records.len(),
            ledger_entries = removed,
            "billing period deleted"
        );
        Ok(period)
    }

    async fn edit_records<T>(
        &self,
        club: &ClubCode,
        id: Uuid,
        edit: impl FnOnce(&BillingPeriod, &mut Vec<PaymentRecord>) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let mut billing: BillingSnapshot = self.repo.billing(club).await?;
        let period = billing.period(id).cloned().ok_or(CoreError::PeriodNotFound(id))?;
        let records = billing.records_mut(id).ok_or(CoreError::PeriodNotFound(id))?;
        let result = edit(&period, records)?;
        let records = records.clone();
        self.repo.save_billing(club, billing).await?;
        resync_ledger_locked(&self.repo, club, &period, &records).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedClock, InMemoryClubStorage};
    use chrono::{TimeZone, Utc};
    use dues_domain::PaymentStatus;

    fn store() -> (BillingStore, Arc<ClubRepository>) {
        let repo = Arc::new(ClubRepository::new(Arc::new(InMemoryClubStorage::new())));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
        (BillingStore::new(repo.clone(), clock), repo)
    }

    fn draft() -> PeriodDraft {
        PeriodDraft::new("3월 회비", "20,000")
            .with_ledger_category("회비")
            .with_member(MemberSelection::new("김철수"))
            .with_member(MemberSelection::new("이영희").with_rule(DifferentialRule::PercentDiscount(50.0)))
    }

    #[test]
    fn from_roster_keeps_roster_order_and_resolves_ranks() {
        let roster = vec![
            Player::new("김철수").with_rank("회장"),
            Player::new("이영희"),
            Player::new("박민수").with_rank("총무"),
        ];
        let settings = DifferentialSettings::default()
            .with_rule("회장", DifferentialRule::Exempt)
            .with_rule("총무", DifferentialRule::Manual(5_000));
        let members = MemberSelection::from_roster(&roster, &["박민수", "김철수"], &settings);
        assert_eq!(
            members,
            vec![
                MemberSelection::new("김철수").with_rule(DifferentialRule::Exempt),
                MemberSelection::new("박민수").with_rule(DifferentialRule::Manual(5_000)),
            ]
        );
    }

    #[test]
    fn validation_rejects_bad_drafts() {
        let ledger = LedgerSnapshot::default();
        let cases = [
            (PeriodDraft::new(" ", "1000").with_member(MemberSelection::new("a")), "name"),
            (PeriodDraft::new("x", "-5").with_member(MemberSelection::new("a")), "amount"),
            (PeriodDraft::new("x", "abc").with_member(MemberSelection::new("a")), "amount"),
            (PeriodDraft::new("x", "1000"), "select at least one member"),
            (
                PeriodDraft::new("x", "1000")
                    .with_member(MemberSelection::new("a"))
                    .with_member(MemberSelection::new(" a ")),
                "twice",
            ),
            (
                PeriodDraft::new("x", "1000")
                    .with_member(MemberSelection::new("a"))
                    .with_ledger_category("구장비"),
                "income category",
            ),
        ];
        for (draft, needle) in cases {
            let err = draft.validate(&ledger).expect_err("draft should be rejected");
            assert!(err.to_string().contains(needle), "{err} should mention {needle}");
        }
    }

    #[test]
    fn empty_category_means_unbound() {
        let valid = PeriodDraft::new("x", "1000")
            .with_member(MemberSelection::new("a"))
            .with_ledger_category("  ")
            .validate(&LedgerSnapshot::default())
            .unwrap();
        assert_eq!(valid.ledger_category, None);
    }

    #[tokio::test]
    async fn create_period_books_bound_entry_at_zero() {
        let (store, repo) = store();
        let club = ClubCode::new("fc");
        let period = store.create_period(&club, draft()).await.unwrap();

        let records = store.records(&club, period.id).await.unwrap();
        assert_eq!(records.iter().map(|r| r.amount).collect::<Vec<_>>(), vec![20_000, 10_000]);
        assert!(records.iter().all(|r| r.status == PaymentStatus::Unpaid));

        let ledger = repo.ledger(&club).await.unwrap();
        let entry = ledger.bound_entry(period.id).unwrap();
        assert_eq!(entry.amount, 0);
        assert_eq!(entry.description, "3월 회비 (0/2명 입금)");
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[tokio::test]
    async fn invalid_draft_writes_nothing() {
        let storage = Arc::new(InMemoryClubStorage::new());
        let repo = Arc::new(ClubRepository::new(storage.clone()));
        let store = BillingStore::new(repo, Arc::new(FixedClock::new(Utc::now())));
        let err = store
            .create_period(&ClubCode::new("fc"), PeriodDraft::new("x", "0"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn member_edits_resync_the_bound_entry() {
        let (store, repo) = store();
        let club = ClubCode::new("fc");
        let period = store.create_period(&club, draft()).await.unwrap();

        store
            .update_status(&club, period.id, "이영희", Transition::AdminConfirmed)
            .await
            .unwrap();
        store
            .update_record_amount(&club, period.id, "이영희", "12,000")
            .await
            .unwrap();
        store.add_member(&club, period.id, MemberSelection::new("박민수")).await.unwrap();

        let ledger = repo.ledger(&club).await.unwrap();
        let entry = ledger.bound_entry(period.id).unwrap();
        assert_eq!(entry.amount, 12_000);
        assert_eq!(entry.description, "3월 회비 (1/3명 입금)");

        store.remove_member(&club, period.id, "이영희").await.unwrap();
        let renamed = store
            .update_period(&club, period.id, PeriodUpdate::default().name("3월 정기회비"))
            .await
            .unwrap();
        assert_eq!(renamed.amount, 20_000);

        let ledger = repo.ledger(&club).await.unwrap();
        let entry = ledger.bound_entry(period.id).unwrap();
        assert_eq!(entry.amount, 0);
        assert_eq!(entry.description, "3월 정기회비 (0/2명 입금)");
    }

    #[tokio::test]
    async fn duplicate_member_is_rejected() {
        let (store, _) = store();
        let club = ClubCode::new("fc");
        let period = store.create_period(&club, draft()).await.unwrap();
        let err = store
            .add_member(&club, period.id, MemberSelection::new("김철수"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already billed"));
        assert_eq!(store.records(&club, period.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_period_cascades() {
        let (store, repo) = store();
        let club = ClubCode::new("fc");
        let period = store.create_period(&club, draft()).await.unwrap();
        store.delete_period(&club, period.id).await.unwrap();

        let billing = repo.billing(&club).await.unwrap();
        assert!(billing.period(period.id).is_none());
        assert!(!billing.payments.contains_key(&period.id));
        assert!(repo.ledger(&club).await.unwrap().bound_entry(period.id).is_none());
        assert!(matches!(
            store.delete_period(&club, period.id).await,
            Err(CoreError::PeriodNotFound(_))
        ));
    }

    #[tokio::test]
    async fn added_members_follow_their_rule() {
        let (store, _) = store();
        let club = ClubCode::new("fc");
        let period = store.create_period(&club, draft()).await.unwrap();
        let exempt = store
            .add_member(&club, period.id, MemberSelection::new("회장님").with_rule(DifferentialRule::Exempt))
            .await
            .unwrap();
        let discounted = store
            .add_member(
                &club,
                period.id,
                MemberSelection::new("박민수").with_rule(DifferentialRule::PercentDiscount(50.0)),
            )
            .await
            .unwrap();
        assert_eq!(exempt.amount, 0);
        assert_eq!(discounted.amount, 10_000);
    }

    #[tokio::test]
    async fn member_names_are_trimmed_everywhere() {
        let (store, _) = store();
        let club = ClubCode::new("fc");
        let period = store.create_period(&club, draft()).await.unwrap();
        store
            .add_member(&club, period.id, MemberSelection::new(" 박민수 "))
            .await
            .unwrap();
        let updated = store
            .update_record_amount(&club, period.id, "박민수 ", "5,000")
            .await
            .unwrap();
        assert_eq!(updated.amount, 5_000);
        store
            .update_status(&club, period.id, " 박민수", Transition::AdminConfirmed)
            .await
            .unwrap();
        let removed = store.remove_member(&club, period.id, " 박민수").await.unwrap();
        assert_eq!(removed.player_name, "박민수");
        assert_eq!(store.records(&club, period.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_period_survives_ledger_write_failure() {
        let storage = Arc::new(InMemoryClubStorage::new());
        let repo = Arc::new(ClubRepository::new(storage.clone()));
        let store = BillingStore::new(repo.clone(), Arc::new(FixedClock::new(Utc::now())));
        let club = ClubCode::new("fc");

        storage.set_fail_ledger_writes(true);
        assert!(store.create_period(&club, draft()).await.is_err());
        assert!(store.periods(&club).await.unwrap().is_empty());
        storage.set_fail_ledger_writes(false);

        let period = store.create_period(&club, draft()).await.unwrap();
        let billing = repo.billing(&club).await.unwrap();
        let ledger = repo.ledger(&club).await.unwrap();
        assert!(ledger.bound_entry(period.id).is_some());
        assert!(crate::snapshot_warnings(&billing, &ledger).is_empty());
    }

    #[tokio::test]
    async fn failed_billing_write_unbooks_the_entry() {
        let storage = Arc::new(InMemoryClubStorage::new());
        let repo = Arc::new(ClubRepository::new(storage.clone()));
        let store = BillingStore::new(repo.clone(), Arc::new(FixedClock::new(Utc::now())));
        let club = ClubCode::new("fc");

        storage.set_fail_billing_writes(true);
        assert!(store.create_period(&club, draft()).await.is_err());
        assert!(repo.ledger(&club).await.unwrap().entries.is_empty());
        storage.set_fail_billing_writes(false);
        assert!(store.periods(&club).await.unwrap().is_empty());
    }
}
