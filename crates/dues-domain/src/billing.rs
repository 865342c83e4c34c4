//! Billing periods, payment records and deferred billing templates.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Lifecycle state of one member's payment within a billing period.
///
/// The serialized literals match the persisted club snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "미납")]
    Unpaid,
    #[serde(rename = "확인요망")]
    PendingConfirmation,
    #[serde(rename = "입금완료")]
    Confirmed,
}

impl PaymentStatus {
    /// Returns `true` while the payment still awaits confirmation.
    pub fn is_unresolved(self) -> bool {
        match self {
            PaymentStatus::Unpaid | PaymentStatus::PendingConfirmation => true,
            PaymentStatus::Confirmed => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "미납",
            PaymentStatus::PendingConfirmation => "확인요망",
            PaymentStatus::Confirmed => "입금완료",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One club-wide charge with a base amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingPeriod {
    pub id: Uuid,
    pub name: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BillingPeriod {
    pub fn new(name: impl Into<String>, amount: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            amount,
            date: None,
            ledger_category: None,
            created_at,
        }
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }

    pub fn with_ledger_category(mut self, category: Option<String>) -> Self {
        self.ledger_category = category;
        self
    }
}

impl Identifiable for BillingPeriod {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for BillingPeriod {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for BillingPeriod {
    fn display_label(&self) -> String {
        match self.date {
            Some(date) => format!("{} ({})", self.name, date),
            None => self.name.clone(),
        }
    }
}

/// One member's obligation inside a billing period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub player_name: String,
    pub amount: i64,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn new(player_name: impl Into<String>, amount: i64) -> Self {
        Self {
            player_name: player_name.into(),
            amount,
            status: PaymentStatus::Unpaid,
            updated_at: None,
        }
    }
}

/// A resolved per-member amount captured when a billing is scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberAmount {
    pub player_name: String,
    pub amount: i64,
}

impl From<&MemberAmount> for PaymentRecord {
    fn from(member: &MemberAmount) -> Self {
        PaymentRecord::new(member.player_name.clone(), member.amount)
    }
}

/// A billing period template waiting for its scheduled instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBilling {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub name: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_category: Option<String>,
    pub member_amounts: Vec<MemberAmount>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledBilling {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    /// Builds the period this template turns into. The period reuses the
    /// template id so a materialized template can be recognised later.
    pub fn to_period(&self, created_at: DateTime<Utc>) -> BillingPeriod {
        BillingPeriod {
            id: self.id,
            name: self.name.clone(),
            amount: self.amount,
            date: self.date,
            ledger_category: self.ledger_category.clone(),
            created_at,
        }
    }

    pub fn to_records(&self) -> Vec<PaymentRecord> {
        self.member_amounts.iter().map(PaymentRecord::from).collect()
    }
}

impl Identifiable for ScheduledBilling {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for ScheduledBilling {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Confirmation progress of a billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaymentProgress {
    pub confirmed_count: usize,
    pub total_count: usize,
    pub confirmed_amount: i64,
    pub billed_amount: i64,
}

impl PaymentProgress {
    pub fn from_records(records: &[PaymentRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, record| {
            acc.total_count += 1;
            acc.billed_amount += record.amount;
            if record.status == PaymentStatus::Confirmed {
                acc.confirmed_count += 1;
                acc.confirmed_amount += record.amount;
            }
            acc
        })
    }

    /// Short label such as `2/3명 입금`.
    pub fn label(&self) -> String {
        format!("{}/{}명 입금", self.confirmed_count, self.total_count)
    }

    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.confirmed_count == self.total_count
    }
}

/// Club-scoped billing aggregate persisted as a single blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingSnapshot {
    #[serde(default)]
    pub billing_periods: Vec<BillingPeriod>,
    #[serde(default)]
    pub payments: BTreeMap<Uuid, Vec<PaymentRecord>>,
    #[serde(default)]
    pub scheduled_billings: Vec<ScheduledBilling>,
}

impl BillingSnapshot {
    pub fn period(&self, id: Uuid) -> Option<&BillingPeriod> {
        self.billing_periods.iter().find(|period| period.id == id)
    }

    pub fn period_mut(&mut self, id: Uuid) -> Option<&mut BillingPeriod> {
        self.billing_periods.iter_mut().find(|period| period.id == id)
    }

    pub fn records(&self, period_id: Uuid) -> &[PaymentRecord] {
        self.payments
            .get(&period_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn records_mut(&mut self, period_id: Uuid) -> Option<&mut Vec<PaymentRecord>> {
        if self.period(period_id).is_none() {
            return None;
        }
        Some(self.payments.entry(period_id).or_default())
    }

    pub fn record(&self, period_id: Uuid, player_name: &str) -> Option<&PaymentRecord> {
        self.records(period_id)
            .iter()
            .find(|record| record.player_name == player_name)
    }

    pub fn record_mut(&mut self, period_id: Uuid, player_name: &str) -> Option<&mut PaymentRecord> {
        self.records_mut(period_id)?
            .iter_mut()
            .find(|record| record.player_name == player_name)
    }

    /// Appends a period together with its records.
    pub fn insert_period(&mut self, period: BillingPeriod, records: Vec<PaymentRecord>) {
        self.payments.insert(period.id, records);
        self.billing_periods.push(period);
    }

    /// Removes a period and every record it owns.
    pub fn remove_period(&mut self, id: Uuid) -> Option<(BillingPeriod, Vec<PaymentRecord>)> {
        let index = position_of(&self.billing_periods, id)?;
        let period = self.billing_periods.remove(index);
        let records = self.payments.remove(&id).unwrap_or_default();
        Some((period, records))
    }

    pub fn progress(&self, period_id: Uuid) -> PaymentProgress {
        PaymentProgress::from_records(self.records(period_id))
    }

    pub fn scheduled(&self, id: Uuid) -> Option<&ScheduledBilling> {
        self.scheduled_billings.iter().find(|entry| entry.id == id)
    }

    pub fn remove_scheduled(&mut self, id: Uuid) -> Option<ScheduledBilling> {
        let index = position_of(&self.scheduled_billings, id)?;
        Some(self.scheduled_billings.remove(index))
    }

    /// Removes and returns every template due at `now`, keeping stored order.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledBilling> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled_billings)
            .into_iter()
            .partition(|entry| entry.is_due(now));
        self.scheduled_billings = pending;
        due
    }
}
