//! Builds the recipients and body of reminder messages. Sending is left to
//! the platform.

use dues_domain::{BankAccount, BillingPeriod, PaymentRecord, PaymentStatus, Player};

use crate::format::format_won;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderScope {
    /// Members whose payment is not yet confirmed.
    Unpaid,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub recipients: Vec<String>,
    pub body: String,
    /// Billed members without a phone number on the roster.
    pub missing_phone: Vec<String>,
}

fn phone_of<'a>(roster: &'a [Player], name: &str) -> Option<&'a str> {
    roster
        .iter()
        .find(|player| player.name == name)
        .and_then(|player| player.phone.as_deref())
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
}

pub fn compose_reminder(
    period: &BillingPeriod,
    records: &[PaymentRecord],
    roster: &[Player],
    scope: ReminderScope,
    account: Option<&BankAccount>,
) -> ComposedMessage {
    let targets: Vec<&PaymentRecord> = records
        .iter()
        .filter(|record| match scope {
            ReminderScope::Unpaid => record.status.is_unresolved(),
            ReminderScope::All => true,
        })
        .collect();

    let mut recipients = Vec::new();
    let mut missing_phone = Vec::new();
    for record in &targets {
        match phone_of(roster, &record.player_name) {
            Some(phone) => recipients.push(phone.to_string()),
            None => missing_phone.push(record.player_name.clone()),
        }
    }

    let mut body = format!("[{}] 회비 안내\n", period.name);
    if let Some(date) = period.date {
        body.push_str(&format!("기준일: {date}\n"));
    }
    for record in &targets {
        body.push_str(&format!(
            "- {}: {} ({})\n",
            record.player_name,
            format_won(record.amount),
            record.status
        ));
    }
    if let Some(account) = account {
        body.push_str(&format!("입금 계좌: {}\n", account.clipboard_text()));
    }

    ComposedMessage {
        recipients,
        body: body.trim_end().to_string(),
        missing_phone,
    }
}

pub fn compose_payment_notice(
    period: &BillingPeriod,
    record: &PaymentRecord,
    account: Option<&BankAccount>,
) -> String {
    let mut body = match record.status {
        PaymentStatus::Confirmed => format!(
            "{}님, {} {} 입금이 확인되었습니다.",
            record.player_name,
            period.name,
            format_won(record.amount)
        ),
        PaymentStatus::Unpaid | PaymentStatus::PendingConfirmation => format!(
            "{}님, {} {} 납부 부탁드립니다.",
            record.player_name,
            period.name,
            format_won(record.amount)
        ),
    };
    if record.status != PaymentStatus::Confirmed {
        if let Some(account) = account {
            body.push_str(&format!("\n입금 계좌: {}", account.clipboard_text()));
        }
    }
    body
}
