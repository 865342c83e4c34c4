/// Formats amounts for member-facing text.
pub trait CurrencyFormatter: Send + Sync {
    fn format_amount(&self, amount: i64) -> String;
}

/// Korean won with comma grouping: `20,000원`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WonFormatter;

impl CurrencyFormatter for WonFormatter {
    fn format_amount(&self, amount: i64) -> String {
        format_won(amount)
    }
}

pub fn format_won(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped}원")
}
