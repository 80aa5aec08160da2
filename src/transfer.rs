//! Known withdrawal/deposit correspondences across platforms.
//!
//! The pairs come from an external reconciliation step; this module only
//! validates and consumes them. A matched pair lets the replay carry the
//! withdrawn lots over to the destination queue instead of treating the
//! deposit as a fresh acquisition.

use crate::ledger::Operation;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("more than one transfer match for withdrawal of {amount} {coin} from {platform} at {time}")]
    DuplicateWithdrawal {
        platform: String,
        time: DateTime<Utc>,
        coin: String,
        amount: Decimal,
    },
    #[error("more than one transfer match for deposit of {amount} {coin} to {platform} at {time}")]
    DuplicateDeposit {
        platform: String,
        time: DateTime<Utc>,
        coin: String,
        amount: Decimal,
    },
    #[error("invalid transfers json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A withdrawal on one platform paired with the deposit of the same amount
/// of the same coin on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferMatch {
    pub source_platform: String,
    pub source_time: DateTime<Utc>,
    pub dest_platform: String,
    pub dest_time: DateTime<Utc>,
    pub coin: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct TransferInput {
    transfers: Vec<TransferMatch>,
}

/// The full set of known matches, consulted read-only during replay.
#[derive(Debug, Default)]
pub struct TransferBook {
    matches: Vec<TransferMatch>,
}

impl TransferBook {
    /// Build a book, rejecting ambiguous pairings: each withdrawal matches
    /// at most one deposit and vice versa.
    pub fn new(matches: Vec<TransferMatch>) -> Result<Self, TransferError> {
        let mut sources = HashSet::new();
        let mut dests = HashSet::new();
        for m in &matches {
            let source_key = (
                m.source_platform.clone(),
                m.source_time,
                m.coin.clone(),
                m.amount,
            );
            if !sources.insert(source_key) {
                return Err(TransferError::DuplicateWithdrawal {
                    platform: m.source_platform.clone(),
                    time: m.source_time,
                    coin: m.coin.clone(),
                    amount: m.amount,
                });
            }
            let dest_key = (m.dest_platform.clone(), m.dest_time, m.coin.clone(), m.amount);
            if !dests.insert(dest_key) {
                return Err(TransferError::DuplicateDeposit {
                    platform: m.dest_platform.clone(),
                    time: m.dest_time,
                    coin: m.coin.clone(),
                    amount: m.amount,
                });
            }
        }
        Ok(TransferBook { matches })
    }

    pub fn empty() -> Self {
        TransferBook::default()
    }

    pub fn read_json<R: Read>(reader: R) -> Result<Self, TransferError> {
        let input: TransferInput = serde_json::from_reader(reader)?;
        TransferBook::new(input.transfers)
    }

    /// The match whose destination leg is this deposit, if known.
    pub fn for_deposit(&self, op: &Operation) -> Option<&TransferMatch> {
        self.matches.iter().find(|m| {
            m.dest_platform == op.platform
                && m.dest_time == op.utc_time
                && m.coin == op.coin
                && m.amount == op.change
        })
    }

    /// The match whose source leg is this withdrawal, if known.
    pub fn for_withdrawal(&self, op: &Operation) -> Option<&TransferMatch> {
        self.matches.iter().find(|m| {
            m.source_platform == op.platform
                && m.source_time == op.utc_time
                && m.coin == op.coin
                && m.amount == op.change
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OperationKind, SourceRef};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn transfer(day_out: u32, day_in: u32) -> TransferMatch {
        TransferMatch {
            source_platform: "kraken".to_string(),
            source_time: Utc.with_ymd_and_hms(2024, 1, day_out, 12, 0, 0).unwrap(),
            dest_platform: "binance".to_string(),
            dest_time: Utc.with_ymd_and_hms(2024, 1, day_in, 14, 0, 0).unwrap(),
            coin: "BTC".to_string(),
            amount: dec!(2),
        }
    }

    fn op(kind: OperationKind, platform: &str, day: u32, hour: u32) -> Operation {
        Operation {
            kind,
            utc_time: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            platform: platform.to_string(),
            coin: "BTC".to_string(),
            change: dec!(2),
            source: SourceRef {
                file: "test".to_string(),
                row: 1,
            },
        }
    }

    #[test]
    fn lookup_by_both_legs() {
        let book = TransferBook::new(vec![transfer(5, 6)]).unwrap();

        let withdrawal = op(OperationKind::Withdrawal, "kraken", 5, 12);
        let deposit = op(OperationKind::Deposit, "binance", 6, 14);
        assert!(book.for_withdrawal(&withdrawal).is_some());
        assert!(book.for_deposit(&deposit).is_some());

        // Different amount does not match
        let mut other = deposit.clone();
        other.change = dec!(3);
        assert!(book.for_deposit(&other).is_none());
    }

    #[test]
    fn duplicate_withdrawal_leg_rejected() {
        let mut second = transfer(5, 7);
        second.dest_platform = "coinbase".to_string();
        let err = TransferBook::new(vec![transfer(5, 6), second]).unwrap_err();
        assert!(matches!(err, TransferError::DuplicateWithdrawal { .. }));
    }

    #[test]
    fn duplicate_deposit_leg_rejected() {
        let mut second = transfer(4, 6);
        second.source_platform = "coinbase".to_string();
        let err = TransferBook::new(vec![transfer(5, 6), second]).unwrap_err();
        assert!(matches!(err, TransferError::DuplicateDeposit { .. }));
    }

    #[test]
    fn read_from_json() {
        let json = r#"{
            "transfers": [
                {
                    "source_platform": "kraken",
                    "source_time": "2024-01-05T12:00:00Z",
                    "dest_platform": "binance",
                    "dest_time": "2024-01-06T14:00:00Z",
                    "coin": "BTC",
                    "amount": "2"
                }
            ]
        }"#;
        let book = TransferBook::read_json(json.as_bytes()).unwrap();
        let withdrawal = op(OperationKind::Withdrawal, "kraken", 5, 12);
        assert!(book.for_withdrawal(&withdrawal).is_some());
    }
}
