use std::sync::Arc;

use dues_domain::{ClubCode, PaymentStatus};
use uuid::Uuid;

use super::parser::{DepositParser, ParsedDeposit};
use crate::{
    payment_status::{PaymentStatusMachine, Transition},
    ClubRepository, CoreError,
};

/// What a deposit did to the matched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchAction {
    Confirmed,
    /// Name matched an unpaid record but the amount differed.
    FlaggedForReview,
    /// Name matched a record already awaiting review; amount differed.
    LeftPending,
    NoMatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub success: bool,
    pub action: MatchAction,
    pub player_name: Option<String>,
    pub period_id: Option<Uuid>,
    pub period_name: Option<String>,
    pub parsed: Option<ParsedDeposit>,
}

impl MatchOutcome {
    fn no_match(parsed: Option<ParsedDeposit>) -> Self {
        Self {
            success: false,
            action: MatchAction::NoMatch,
            player_name: None,
            period_id: None,
            period_name: None,
            parsed,
        }
    }

    pub fn message(&self) -> String {
        match (&self.action, &self.parsed) {
            (MatchAction::NoMatch, None) => "no deposit found in notification".to_string(),
            (MatchAction::NoMatch, Some(parsed)) => {
                format!("no open payment for {} ({})", parsed.name, parsed.amount)
            }
            (action, _) => format!(
                "{:?}: {} in {}",
                action,
                self.player_name.as_deref().unwrap_or_default(),
                self.period_name.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Turns deposit notifications into payment status transitions.
#[derive(Clone)]
pub struct NotificationMatcher {
    repo: Arc<ClubRepository>,
    status: PaymentStatusMachine,
    parser: Arc<DepositParser>,
}

impl NotificationMatcher {
    pub fn new(repo: Arc<ClubRepository>, status: PaymentStatusMachine, parser: DepositParser) -> Self {
        Self {
            repo,
            status,
            parser: Arc::new(parser),
        }
    }

    pub fn parser(&self) -> &DepositParser {
        &self.parser
    }

    pub async fn handle_text(&self, club: &ClubCode, text: &str) -> MatchOutcome {
        match self.parser.parse(text) {
            Some(parsed) => self.match_deposit(club, parsed).await,
            None => MatchOutcome::no_match(None),
        }
    }

    /// Never fails: storage or transition errors are logged and reported as
    /// no match.
    pub async fn match_deposit(&self, club: &ClubCode, parsed: ParsedDeposit) -> MatchOutcome {
        match self.try_match(club, &parsed).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(club = %club, name = %parsed.name, error = %err, "deposit matching failed");
                MatchOutcome::no_match(Some(parsed))
            }
        }
    }

    async fn try_match(&self, club: &ClubCode, parsed: &ParsedDeposit) -> Result<MatchOutcome, CoreError> {
        let _guard = self.repo.lock(club).await?;
        let billing = self.repo.billing(club).await?;

        let found = billing.billing_periods.iter().find_map(|period| {
            billing
                .record(period.id, &parsed.name)
                .filter(|record| record.status.is_unresolved())
                .map(|record| (period.clone(), record.clone()))
        });
        let Some((period, record)) = found else {
            tracing::info!(club = %club, name = %parsed.name, "no open payment for deposit");
            return Ok(MatchOutcome::no_match(Some(parsed.clone())));
        };

        let amount_equal = record.amount == parsed.amount;
        let (action, transition) = match (amount_equal, record.status) {
            (_, PaymentStatus::Confirmed) => return Ok(MatchOutcome::no_match(Some(parsed.clone()))),
            (true, _) => (MatchAction::Confirmed, Some(Transition::AutoConfirmed)),
            (false, PaymentStatus::Unpaid) => {
                (MatchAction::FlaggedForReview, Some(Transition::AutoFlagged))
            }
            (false, PaymentStatus::PendingConfirmation) => (MatchAction::LeftPending, None),
        };
        if !amount_equal {
            tracing::warn!(
                club = %club,
                period = %period.id,
                player = %record.player_name,
                billed = record.amount,
                deposited = parsed.amount,
                "deposit amount differs from billed amount"
            );
        }
        if let Some(transition) = transition {
            self.status
                .transition_locked(club, period.id, &record.player_name, transition)
                .await?;
        }

        Ok(MatchOutcome {
            success: action == MatchAction::Confirmed,
            action,
            player_name: Some(record.player_name),
            period_id: Some(period.id),
            period_name: Some(period.name),
            parsed: Some(parsed.clone()),
        })
    }
}
