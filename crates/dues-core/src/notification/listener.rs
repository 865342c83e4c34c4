use chrono::{DateTime, Utc};
use dues_domain::ClubCode;
use tokio::sync::mpsc;

use super::matcher::{MatchAction, MatchOutcome, NotificationMatcher};

/// A raw notification as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingNotification {
    /// Package or app identifier of the sender.
    pub source: String,
    pub title: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl IncomingNotification {
    pub fn new(source: impl Into<String>, text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            title: None,
            text: text.into(),
            received_at,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn full_text(&self) -> String {
        match &self.title {
            Some(title) => format!("{title} {}", self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerReport {
    pub received: usize,
    pub ignored: usize,
    pub confirmed: usize,
    pub flagged: usize,
    pub unmatched: usize,
}

/// Feeds notifications for one club into the matcher, one at a time.
#[derive(Clone)]
pub struct NotificationListener {
    matcher: NotificationMatcher,
    allowed_sources: Vec<String>,
}

impl NotificationListener {
    /// An empty `allowed_sources` accepts every source.
    pub fn new(matcher: NotificationMatcher, allowed_sources: Vec<String>) -> Self {
        Self {
            matcher,
            allowed_sources,
        }
    }

    pub fn accepts(&self, notification: &IncomingNotification) -> bool {
        self.allowed_sources.is_empty()
            || self
                .allowed_sources
                .iter()
                .any(|source| source == &notification.source)
    }

    /// Returns `None` for notifications from sources not on the allow list.
    pub async fn handle(&self, club: &ClubCode, notification: &IncomingNotification) -> Option<MatchOutcome> {
        if !self.accepts(notification) {
            tracing::debug!(source = %notification.source, "notification source ignored");
            return None;
        }
        let outcome = self.matcher.handle_text(club, &notification.full_text()).await;
        tracing::info!(
            club = %club,
            source = %notification.source,
            success = outcome.success,
            "{}",
            outcome.message()
        );
        Some(outcome)
    }

    /// Processes notifications until the sending side closes.
    pub async fn run(&self, club: ClubCode, mut rx: mpsc::Receiver<IncomingNotification>) -> ListenerReport {
        let mut report = ListenerReport::default();
        tracing::info!(club = %club, "notification listener started");
        while let Some(notification) = rx.recv().await {
            report.received += 1;
            match self.handle(&club, &notification).await.map(|outcome| outcome.action) {
                None => report.ignored += 1,
                Some(MatchAction::Confirmed) => report.confirmed += 1,
                Some(MatchAction::FlaggedForReview) => report.flagged += 1,
                Some(MatchAction::LeftPending | MatchAction::NoMatch) => report.unmatched += 1,
            }
        }
        tracing::info!(club = %club, received = report.received, "channel closed, notification listener exiting");
        report
    }
}
