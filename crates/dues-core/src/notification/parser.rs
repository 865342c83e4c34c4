use once_cell::sync::Lazy;
use regex::Regex;

/// A depositor name and amount lifted from notification text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDeposit {
    pub name: String,
    pub amount: i64,
}

/// One way of reading a deposit out of free-form text.
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn try_parse(&self, text: &str) -> Option<ParsedDeposit>;
}

/// Words that look like names in bank notifications but never are.
const NON_NAMES: &[&str] = &[
    "입금", "출금", "잔액", "이체", "송금", "계좌", "승인", "알림", "발신", "누적", "잔고", "통장",
    "은행", "입금자", "보낸분", "받는분", "국민", "신한", "우리", "하나", "농협", "기업", "카카오",
    "케이뱅크", "토스", "우체국", "새마을", "수협", "씨티", "대구", "부산", "광주", "전북", "경남",
];

/// A bare name ends before the `님` honorific; `김철님이` is not a name.
fn is_depositor_name(candidate: &str) -> bool {
    let len = candidate.chars().count();
    (2..=4).contains(&len)
        && candidate.chars().all(|c| ('가'..='힣').contains(&c))
        && !candidate.ends_with('님')
        && !candidate.ends_with("님이")
        && !NON_NAMES.contains(&candidate)
}

fn parse_won(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.parse::<i64>().ok().filter(|amount| *amount > 0)
}

/// A regex with one name group and one amount group.
pub struct RegexStrategy {
    name: String,
    pattern: Regex,
    name_group: usize,
    amount_group: usize,
}

impl RegexStrategy {
    pub fn new(name: impl Into<String>, pattern: Regex, name_group: usize, amount_group: usize) -> Self {
        Self {
            name: name.into(),
            pattern,
            name_group,
            amount_group,
        }
    }

    /// `김철수 20,000원`
    pub fn name_then_amount() -> Self {
        Self::new("name-amount", NAME_THEN_AMOUNT.clone(), 1, 2)
    }

    /// `김철수님이 20,000원`
    pub fn honorific() -> Self {
        Self::new("honorific", HONORIFIC.clone(), 1, 2)
    }

    /// `20,000원 김철수`
    pub fn amount_then_name() -> Self {
        Self::new("amount-name", AMOUNT_THEN_NAME.clone(), 2, 1)
    }

    /// `입금: 김철수 / 20000`
    pub fn keyword_name_amount() -> Self {
        Self::new("keyword-name-amount", KEYWORD_NAME_AMOUNT.clone(), 1, 2)
    }
}

impl ParseStrategy for RegexStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_parse(&self, text: &str) -> Option<ParsedDeposit> {
        self.pattern.captures_iter(text).find_map(|caps| {
            let name = caps.get(self.name_group)?.as_str();
            if !is_depositor_name(name) {
                return None;
            }
            let amount = parse_won(caps.get(self.amount_group)?.as_str())?;
            Some(ParsedDeposit {
                name: name.to_string(),
                amount,
            })
        })
    }
}

static NAME_THEN_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([가-힣]{2,4})\s*(\d[\d,]*)\s*원").expect("valid pattern"));
static HONORIFIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([가-힣]{2,4})님이\s*(\d[\d,]*)\s*원").expect("valid pattern"));
static AMOUNT_THEN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d[\d,]*)\s*원\s*([가-힣]{2,4})\b").expect("valid pattern"));
static KEYWORD_NAME_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"입금\s*[:：]?\s*([가-힣]{2,4})\b\D*?(\d[\d,]*)").expect("valid pattern")
});

/// Tries each strategy in order on texts carrying a deposit keyword.
pub struct DepositParser {
    keywords: Vec<String>,
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl Default for DepositParser {
    fn default() -> Self {
        Self::new(vec!["입금".to_string()])
    }
}

impl DepositParser {
    /// Builds a parser with the built-in strategies. An empty keyword list
    /// falls back to `입금`.
    pub fn new(keywords: Vec<String>) -> Self {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        let keywords = if keywords.is_empty() {
            vec!["입금".to_string()]
        } else {
            keywords
        };
        let strategies: Vec<Box<dyn ParseStrategy>> = vec![
            Box::new(RegexStrategy::name_then_amount()),
            Box::new(RegexStrategy::honorific()),
            Box::new(RegexStrategy::amount_then_name()),
            Box::new(RegexStrategy::keyword_name_amount()),
        ];
        Self {
            keywords,
            strategies,
        }
    }

    /// Appends a strategy tried after the built-in ones.
    pub fn with_strategy(mut self, strategy: impl ParseStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn parse(&self, text: &str) -> Option<ParsedDeposit> {
        if !self.keywords.iter().any(|keyword| text.contains(keyword.as_str())) {
            return None;
        }
        self.strategies.iter().find_map(|strategy| {
            let parsed = strategy.try_parse(text)?;
            tracing::debug!(strategy = strategy.name(), name = %parsed.name, amount = parsed.amount, "deposit parsed");
            Some(parsed)
        })
    }
}
