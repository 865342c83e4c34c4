//! Deposit notification handling: text parsing, payment matching and the
//! event listener feeding both.

mod listener;
mod matcher;
mod parser;

pub use listener::{IncomingNotification, ListenerReport, NotificationListener};
pub use matcher::{MatchAction, MatchOutcome, NotificationMatcher};
pub use parser::{DepositParser, ParseStrategy, ParsedDeposit, RegexStrategy};
