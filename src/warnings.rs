//! Non-fatal findings accumulated during replay and classification.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// A condition that does not stop the evaluation but makes the result worth
/// a second look. Surfaced in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Fees consumed more than was ever acquired; the remainder was never
    /// settled by a later acquisition.
    OutstandingFee {
        platform: String,
        coin: String,
        amount: Decimal,
    },
    /// A non-fiat withdrawal without a known transfer match. The coins left
    /// the ledger untracked, so the evaluation may be incomplete.
    UnresolvedWithdrawal {
        platform: String,
        coin: String,
        amount: Decimal,
        time: DateTime<Utc>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::OutstandingFee {
                platform,
                coin,
                amount,
            } => write!(
                f,
                "outstanding fees of {} {} on {} were never covered by an acquisition",
                amount, coin, platform
            ),
            Warning::UnresolvedWithdrawal {
                platform,
                coin,
                amount,
                time,
            } => write!(
                f,
                "unresolved withdrawal of {} {} from {} at {}; the evaluation might be wrong",
                amount, coin, platform, time
            ),
        }
    }
}
