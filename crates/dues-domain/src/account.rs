//! The club's bank account shown to members who pay by transfer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub bank: String,
    pub number: String,
    pub holder: String,
}

impl BankAccount {
    pub fn new(bank: impl Into<String>, number: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            bank: bank.into(),
            number: number.into(),
            holder: holder.into(),
        }
    }

    /// Text placed on the clipboard, e.g. `카카오뱅크 3333-01-1234567 (홍길동)`.
    pub fn clipboard_text(&self) -> String {
        format!("{} {} ({})", self.bank.trim(), self.number.trim(), self.holder.trim())
    }
}
