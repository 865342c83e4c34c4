//! Differential amount computation and amount input validation.

use dues_domain::{DifferentialMode, DifferentialRule, DifferentialSettings, MemberAmount, Player};

use crate::{billing_service::MemberSelection, CoreError};

const ROUNDING_UNIT: i64 = 100;

/// Pure helpers computing what a member owes for a billing period.
pub struct AmountCalculator;

impl AmountCalculator {
    /// Applies `rule` to `base`. Never fails; negative bases count as zero.
    ///
    /// Percent discounts round half-up to the nearest 100, so
    /// `15000 * 0.67 = 10050` becomes `10100`.
    pub fn compute(base: i64, rule: &DifferentialRule) -> i64 {
        let base = base.max(0);
        match *rule {
            DifferentialRule::Exempt => 0,
            DifferentialRule::Manual(amount) => amount.max(0),
            DifferentialRule::PercentDiscount(percent) => {
                let discounted = base as f64 * (100.0 - percent) / 100.0;
                round_half_up(discounted, ROUNDING_UNIT).max(0)
            }
        }
    }

    /// Same as [`AmountCalculator::compute`] for an unvalidated `(mode, value)` pair.
    pub fn compute_raw(base: i64, mode: DifferentialMode, value: &str) -> i64 {
        Self::compute(base, &DifferentialRule::from_raw(mode, value))
    }

    /// The base amount when no rule applies, the adjusted amount otherwise.
    pub fn amount_for(base: i64, rule: Option<&DifferentialRule>) -> i64 {
        rule.map_or(base, |rule| Self::compute(base, rule))
    }

    pub fn member_amounts(base: i64, members: &[MemberSelection]) -> Vec<MemberAmount> {
        members
            .iter()
            .map(|member| MemberAmount {
                player_name: member.player_name.clone(),
                amount: Self::amount_for(base, member.rule.as_ref()),
            })
            .collect()
    }

    /// Member selections for `selected` roster names, each carrying the rule
    /// configured for the player's admin rank.
    pub fn resolve_members(
        roster: &[Player],
        selected: &[&str],
        settings: &DifferentialSettings,
    ) -> Vec<MemberSelection> {
        MemberSelection::from_roster(roster, selected, settings)
    }
}

fn round_half_up(value: f64, unit: i64) -> i64 {
    let unit = unit as f64;
    ((value / unit) + 0.5).floor() as i64 * unit as i64
}

/// Parses user amount input (`"20,000"`, `" 5000 "`) into a positive integer.
pub fn parse_amount(raw: &str, field: &str) -> Result<i64, CoreError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    match cleaned.parse::<i64>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(CoreError::validation(format!(
            "{field} must be a positive integer, got `{}`",
            raw.trim()
        ))),
    }
}
