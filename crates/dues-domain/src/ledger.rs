//! Club ledger entries, categories and balance arithmetic.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

pub const OTHER_INCOME: &str = "기타수입";
pub const OTHER_EXPENSE: &str = "기타지출";
pub const DEFAULT_INCOME_CATEGORIES: &[&str] = &["회비", "찬조금"];
pub const DEFAULT_EXPENSE_CATEGORIES: &[&str] = &["구장비", "장비구입", "회식비", "대회참가비"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    /// Sign applied to an entry's amount when accumulating a balance.
    pub fn sign(self) -> i64 {
        match self {
            EntryType::Income => 1,
            EntryType::Expense => -1,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryType::Income => "수입",
            EntryType::Expense => "지출",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerCategory {
    pub label: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

impl LedgerCategory {
    pub fn new(label: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            label: label.into(),
            entry_type,
        }
    }

    /// The fixed "other" category for `entry_type`.
    pub fn catch_all(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Income => Self::new(OTHER_INCOME, EntryType::Income),
            EntryType::Expense => Self::new(OTHER_EXPENSE, EntryType::Expense),
        }
    }

    pub fn defaults(entry_type: EntryType) -> Vec<Self> {
        let labels = match entry_type {
            EntryType::Income => DEFAULT_INCOME_CATEGORIES,
            EntryType::Expense => DEFAULT_EXPENSE_CATEGORIES,
        };
        labels
            .iter()
            .map(|label| Self::new(*label, entry_type))
            .collect()
    }
}

impl Displayable for LedgerCategory {
    fn display_label(&self) -> String {
        format!("{} ({})", self.label, self.entry_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: i64,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        entry_type: EntryType,
        amount: i64,
        category: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            description: description.into(),
            entry_type,
            amount,
            category: category.into(),
            memo: None,
            billing_period_id: None,
            created_at,
        }
    }

    pub fn bound_to(mut self, period_id: Uuid) -> Self {
        self.billing_period_id = Some(period_id);
        self
    }

    pub fn signed_amount(&self) -> i64 {
        self.amount * self.entry_type.sign()
    }
}

impl Identifiable for LedgerEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Calendar month used to narrow ledger views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Narrows which ledger rows are shown; never changes the balance baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub month: Option<YearMonth>,
    pub category: Option<String>,
}

impl LedgerFilter {
    pub fn month(year: i32, month: u32) -> Self {
        Self {
            month: Some(YearMonth::new(year, month)),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        let month_ok = self.month.map_or(true, |month| month.contains(entry.date));
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |category| entry.category == category);
        month_ok && category_ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub total_income: i64,
    pub total_expense: i64,
    pub balance: i64,
}

impl LedgerSummary {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.entry_type {
                EntryType::Income => summary.total_income += entry.amount,
                EntryType::Expense => summary.total_expense += entry.amount,
            }
        }
        summary.balance = summary.total_income - summary.total_expense;
        summary
    }
}

/// A ledger entry paired with the club balance right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub entry: LedgerEntry,
    pub running_balance: i64,
}

/// Club-scoped ledger aggregate persisted as a single blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
    #[serde(default)]
    pub custom_categories: Vec<LedgerCategory>,
}

impl LedgerSnapshot {
    pub fn entry(&self, id: Uuid) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entry_mut(&mut self, id: Uuid) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    pub fn remove_entry(&mut self, id: Uuid) -> Option<LedgerEntry> {
        let index = position_of(&self.entries, id)?;
        Some(self.entries.remove(index))
    }

    pub fn bound_entry(&self, period_id: Uuid) -> Option<&LedgerEntry> {
        self.entries
            .iter()
            .find(|entry| entry.billing_period_id == Some(period_id))
    }

    pub fn bound_entry_mut(&mut self, period_id: Uuid) -> Option<&mut LedgerEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.billing_period_id == Some(period_id))
    }

    /// Removes every entry referencing `period_id`, returning how many were dropped.
    pub fn remove_bound_entries(&mut self, period_id: Uuid) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.billing_period_id != Some(period_id));
        before - self.entries.len()
    }

    /// Defaults first, then club categories, then the catch-all.
    pub fn categories(&self, entry_type: EntryType) -> Vec<LedgerCategory> {
        let mut categories = LedgerCategory::defaults(entry_type);
        categories.extend(
            self.custom_categories
                .iter()
                .filter(|category| category.entry_type == entry_type)
                .cloned(),
        );
        categories.push(LedgerCategory::catch_all(entry_type));
        categories
    }

    pub fn has_category(&self, label: &str, entry_type: EntryType) -> bool {
        self.categories(entry_type)
            .iter()
            .any(|category| category.label == label)
    }

    /// Entries sorted by `(date, created_at)` ascending.
    pub fn chronological(&self) -> Vec<&LedgerEntry> {
        let mut ordered: Vec<&LedgerEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
        ordered
    }

    /// Chronological rows matching `filter`, each carrying the full-ledger balance.
    pub fn rows(&self, filter: &LedgerFilter) -> Vec<LedgerRow> {
        let mut balance = 0;
        let mut rows = Vec::new();
        for entry in self.chronological() {
            balance += entry.signed_amount();
            if filter.matches(entry) {
                rows.push(LedgerRow {
                    entry: entry.clone(),
                    running_balance: balance,
                });
            }
        }
        rows
    }

    pub fn summarize(&self, filter: &LedgerFilter) -> LedgerSummary {
        LedgerSummary::from_entries(self.entries.iter().filter(|entry| filter.matches(entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn sample() -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::default();
        snapshot.entries = vec![
            LedgerEntry::new(day(2, 3), "구장 대여", EntryType::Expense, 50_000, "구장비", at(2)),
            LedgerEntry::new(day(1, 10), "1월 회비", EntryType::Income, 100_000, "회비", at(1)),
            LedgerEntry::new(day(2, 3), "찬조", EntryType::Income, 30_000, "찬조금", at(3)),
        ];
        snapshot
    }

    #[test]
    fn rows_keep_full_balance_under_filter() {
        let snapshot = sample();
        let rows = snapshot.rows(&LedgerFilter::month(2024, 2));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry.description, "구장 대여");
        assert_eq!(rows[0].running_balance, 50_000);
        assert_eq!(rows[1].running_balance, 80_000);
    }

    #[test]
    fn created_at_breaks_same_day_ties() {
        let snapshot = sample();
        let ordered: Vec<_> = snapshot
            .chronological()
            .into_iter()
            .map(|entry| entry.description.as_str())
            .collect();
        assert_eq!(ordered, vec!["1월 회비", "구장 대여", "찬조"]);
    }

    #[test]
    fn summary_respects_category_filter() {
        let snapshot = sample();
        let summary = snapshot.summarize(&LedgerFilter::default().with_category("구장비"));
        assert_eq!(summary.total_income, 0);
        assert_eq!(summary.total_expense, 50_000);
        assert_eq!(summary.balance, -50_000);

        let all = snapshot.summarize(&LedgerFilter::default());
        assert_eq!(all.balance, 80_000);
    }

    #[test]
    fn catch_all_category_sorts_last() {
        let mut snapshot = LedgerSnapshot::default();
        snapshot
            .custom_categories
            .push(LedgerCategory::new("후원금", EntryType::Income));
        let labels: Vec<_> = snapshot
            .categories(EntryType::Income)
            .into_iter()
            .map(|category| category.label)
            .collect();
        assert_eq!(labels.last().map(String::as_str), Some(OTHER_INCOME));
        assert_eq!(labels[labels.len() - 2], "후원금");
    }

    #[test]
    fn entry_serializes_type_field() {
        let entry = LedgerEntry::new(day(1, 1), "x", EntryType::Income, 1, "회비", at(0));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"income\""), "unexpected json: {json}");
        assert!(json.contains("createdAt"));
    }
}
