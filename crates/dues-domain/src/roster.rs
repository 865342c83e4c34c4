//! Read-only view of the club roster supplied by the directory collaborator.

use serde::{Deserialize, Serialize};

use crate::common::NamedEntity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_rank: Option<String>,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
            admin_rank: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.admin_rank = Some(rank.into());
        self
    }
}

impl NamedEntity for Player {
    fn name(&self) -> &str {
        &self.name
    }
}
