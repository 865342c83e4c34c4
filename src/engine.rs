use std::sync::Arc;

use dues_config::{Config, ConfigManager};
use dues_core::{
    compose_reminder, AmountCalculator, BillingStore, ClubRepository, ClubStorage, Clock,
    ComposedMessage, DepositParser, IncomingNotification, LedgerStore, ListenerReport,
    MemberSelection, NotificationListener, NotificationMatcher, ReminderScope, ScheduledBillingProcessor, SystemClock,
};
use dues_domain::{BillingPeriod, ClubCode, Player};
use dues_storage_json::JsonClubStorage;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::EngineError;

/// Owns the snapshot cache and the services sharing it.
#[derive(Clone)]
pub struct DuesEngine {
    config: Config,
    repo: Arc<ClubRepository>,
    billing: BillingStore,
    ledger: LedgerStore,
    scheduled: ScheduledBillingProcessor,
}

impl DuesEngine {
    /// JSON storage under the configured data root, system clock.
    pub fn open(config: Config) -> Result<Self, EngineError> {
        let root = config.resolve_data_root()?;
        tracing::info!(root = %root.display(), "opening club dues engine");
        let storage = Arc::new(JsonClubStorage::new(root));
        Ok(Self::with_storage(config, storage, Arc::new(SystemClock)))
    }

    pub fn from_manager(manager: &ConfigManager) -> Result<Self, EngineError> {
        Self::open(manager.load()?)
    }

    pub fn with_storage(config: Config, storage: Arc<dyn ClubStorage>, clock: Arc<dyn Clock>) -> Self {
        let repo = Arc::new(ClubRepository::new(storage));
        Self {
            billing: BillingStore::new(repo.clone(), clock.clone()),
            ledger: LedgerStore::new(repo.clone(), clock.clone()),
            scheduled: ScheduledBillingProcessor::new(repo.clone(), clock),
            repo,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn billing(&self) -> &BillingStore {
        &self.billing
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn scheduled(&self) -> &ScheduledBillingProcessor {
        &self.scheduled
    }

    /// Entry point for the dues surface: materializes due scheduled billings
    /// and logs any snapshot inconsistencies.
    pub async fn open_dues(&self, club: &ClubCode) -> Result<Vec<BillingPeriod>, EngineError> {
        let created = self.scheduled.process_due(club).await?;
        let warnings = self.repo.audit(club).await?;
        if !warnings.is_empty() {
            tracing::warn!(club = %club, count = warnings.len(), "club snapshots are inconsistent");
        }
        Ok(created)
    }

    /// Member selections for `selected`, using the configured rank rules.
    pub fn resolve_members(&self, roster: &[Player], selected: &[&str]) -> Vec<MemberSelection> {
        AmountCalculator::resolve_members(roster, selected, &self.config.differential)
    }

    pub fn matcher(&self) -> NotificationMatcher {
        NotificationMatcher::new(
            self.repo.clone(),
            self.billing.status_machine().clone(),
            DepositParser::new(self.config.notification.deposit_keywords.clone()),
        )
    }

    pub fn notification_listener(&self) -> Result<NotificationListener, EngineError> {
        if !self.config.notification.enabled {
            return Err(EngineError::NotificationsDisabled);
        }
        Ok(NotificationListener::new(
            self.matcher(),
            self.config.notification.allowed_sources.clone(),
        ))
    }

    /// Runs the listener for `club` on the current runtime until `rx` closes.
    pub fn spawn_listener(
        &self,
        club: ClubCode,
        rx: mpsc::Receiver<IncomingNotification>,
    ) -> Result<JoinHandle<ListenerReport>, EngineError> {
        let listener = self.notification_listener()?;
        Ok(tokio::spawn(async move { listener.run(club, rx).await }))
    }

    pub async fn compose_reminder(
        &self,
        club: &ClubCode,
        period_id: Uuid,
        roster: &[Player],
        scope: ReminderScope,
    ) -> Result<ComposedMessage, EngineError> {
        let period = self.billing.period(club, period_id).await?;
        let records = self.billing.records(club, period_id).await?;
        Ok(compose_reminder(
            &period,
            &records,
            roster,
            scope,
            self.config.bank_account.as_ref(),
        ))
    }

    /// Text to place on the clipboard for the club account, if configured.
    pub fn account_clipboard_text(&self) -> Option<String> {
        self.config
            .bank_account
            .as_ref()
            .map(|account| account.clipboard_text())
    }
}
