//! Per-rank amount adjustments applied to a billing period's base amount.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Selects how a member's amount departs from the base amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DifferentialMode {
    Manual,
    PercentDiscount,
    Exempt,
}

impl fmt::Display for DifferentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DifferentialMode::Manual => "Manual",
            DifferentialMode::PercentDiscount => "PercentDiscount",
            DifferentialMode::Exempt => "Exempt",
        };
        f.write_str(label)
    }
}

/// A validated adjustment rule.
///
/// Raw `{mode, value}` pairs are converted once, when the rule is built or
/// deserialized: an unparseable or negative manual amount becomes `0`, and an
/// unparseable percentage becomes `0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawDifferentialRule", into = "RawDifferentialRule")]
pub enum DifferentialRule {
    Manual(i64),
    PercentDiscount(f64),
    Exempt,
}

impl DifferentialRule {
    pub fn from_raw(mode: DifferentialMode, value: &str) -> Self {
        let value = value.trim();
        match mode {
            DifferentialMode::Exempt => DifferentialRule::Exempt,
            DifferentialMode::Manual => {
                let amount = value
                    .replace(',', "")
                    .parse::<i64>()
                    .ok()
                    .filter(|amount| *amount >= 0)
                    .unwrap_or(0);
                DifferentialRule::Manual(amount)
            }
            DifferentialMode::PercentDiscount => {
                let percent = value
                    .trim_end_matches('%')
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|percent| percent.is_finite())
                    .unwrap_or(0.0);
                DifferentialRule::PercentDiscount(percent)
            }
        }
    }

    pub fn mode(&self) -> DifferentialMode {
        match self {
            DifferentialRule::Manual(_) => DifferentialMode::Manual,
            DifferentialRule::PercentDiscount(_) => DifferentialMode::PercentDiscount,
            DifferentialRule::Exempt => DifferentialMode::Exempt,
        }
    }
}

impl fmt::Display for DifferentialRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifferentialRule::Manual(amount) => write!(f, "Manual({amount})"),
            DifferentialRule::PercentDiscount(percent) => write!(f, "{percent}% off"),
            DifferentialRule::Exempt => f.write_str("Exempt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDifferentialRule {
    mode: DifferentialMode,
    #[serde(default)]
    value: String,
}

impl From<RawDifferentialRule> for DifferentialRule {
    fn from(raw: RawDifferentialRule) -> Self {
        DifferentialRule::from_raw(raw.mode, &raw.value)
    }
}

impl From<DifferentialRule> for RawDifferentialRule {
    fn from(rule: DifferentialRule) -> Self {
        let value = match rule {
            DifferentialRule::Manual(amount) => amount.to_string(),
            DifferentialRule::PercentDiscount(percent) => percent.to_string(),
            DifferentialRule::Exempt => String::new(),
        };
        Self {
            mode: rule.mode(),
            value,
        }
    }
}

/// Associates an admin rank with the rule applied to members holding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankRule {
    pub rank: String,
    pub rule: DifferentialRule,
}

/// Club-wide differential configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rank_rules: Vec<RankRule>,
}

impl DifferentialSettings {
    pub fn with_rule(mut self, rank: impl Into<String>, rule: DifferentialRule) -> Self {
        self.enabled = true;
        self.rank_rules.push(RankRule {
            rank: rank.into(),
            rule,
        });
        self
    }

    /// Looks up the rule for `rank`; disabled settings never yield a rule.
    pub fn rule_for(&self, rank: Option<&str>) -> Option<DifferentialRule> {
        if !self.enabled {
            return None;
        }
        let rank = rank?.trim();
        self.rank_rules
            .iter()
            .find(|entry| entry.rank.trim() == rank)
            .map(|entry| entry.rule)
    }
}
