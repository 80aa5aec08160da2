//! Operation model and the ledger-source boundary.
//!
//! The ledger source hands the engine a validated, time-ordered sequence of
//! typed operations. Parsing raw exchange statements into this shape happens
//! upstream; here we only read the normalized JSON form, reject structurally
//! invalid rows and pin the replay order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{file} row {row}: change must be positive, got {change}")]
    NonPositiveChange {
        file: String,
        row: usize,
        change: Decimal,
    },
    #[error("invalid ledger json: {0}")]
    Json(#[from] serde_json::Error),
}

/// The closed set of operation kinds.
///
/// Direction (acquire vs. dispose) is determined by the variant, never by the
/// sign of `change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
    Fee,
    Airdrop,
    Commission,
    CoinLend,
    CoinLendEnd,
    CoinLendInterest,
    Staking,
    StakingEnd,
    StakingInterest,
}

impl OperationKind {
    /// Kinds that create a new lot in the balance queue.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            OperationKind::Buy
                | OperationKind::Deposit
                | OperationKind::Airdrop
                | OperationKind::Commission
                | OperationKind::CoinLendInterest
                | OperationKind::StakingInterest
        )
    }

    /// Kinds that consume lots from the balance queue.
    pub fn is_disposal(&self) -> bool {
        matches!(
            self,
            OperationKind::Sell | OperationKind::Fee | OperationKind::Withdrawal
        )
    }

    /// State-bracket markers with no balance effect.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            OperationKind::CoinLend
                | OperationKind::CoinLendEnd
                | OperationKind::Staking
                | OperationKind::StakingEnd
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Buy => "Buy",
            OperationKind::Sell => "Sell",
            OperationKind::Deposit => "Deposit",
            OperationKind::Withdrawal => "Withdrawal",
            OperationKind::Fee => "Fee",
            OperationKind::Airdrop => "Airdrop",
            OperationKind::Commission => "Commission",
            OperationKind::CoinLend => "CoinLend",
            OperationKind::CoinLendEnd => "CoinLendEnd",
            OperationKind::CoinLendInterest => "CoinLendInterest",
            OperationKind::Staking => "Staking",
            OperationKind::StakingEnd => "StakingEnd",
            OperationKind::StakingInterest => "StakingInterest",
        };
        write!(f, "{}", name)
    }
}

/// Where an operation came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file: String,
    pub row: usize,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.row)
    }
}

/// One ledger row: something happened to `change` units of `coin` on
/// `platform` at `utc_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub utc_time: DateTime<Utc>,
    pub platform: String,
    pub coin: String,
    pub change: Decimal,
    pub source: SourceRef,
}

/// Input root for the ledger JSON.
#[derive(Debug, Deserialize)]
struct LedgerInput {
    operations: Vec<OperationRecord>,
}

#[derive(Debug, Deserialize)]
struct OperationRecord {
    #[serde(rename = "type")]
    kind: OperationKind,
    utc_time: DateTime<Utc>,
    platform: String,
    coin: String,
    change: Decimal,
}

/// Read operations from JSON, validate and sort by time.
///
/// The sort is stable, so rows with identical timestamps keep their file
/// order. Replay relies on that tie-break.
pub fn read_ledger_json<R: Read>(reader: R, file: &str) -> Result<Vec<Operation>, LedgerError> {
    let input: LedgerInput = serde_json::from_reader(reader)?;
    let mut operations = Vec::with_capacity(input.operations.len());
    for (i, record) in input.operations.into_iter().enumerate() {
        let row = i + 1;
        if record.change <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveChange {
                file: file.to_string(),
                row,
                change: record.change,
            });
        }
        operations.push(Operation {
            kind: record.kind,
            utc_time: record.utc_time,
            platform: record.platform,
            coin: record.coin,
            change: record.change,
            source: SourceRef {
                file: file.to_string(),
                row,
            },
        });
    }
    operations.sort_by_key(|op| op.utc_time);
    log::debug!("read {} operations from {}", operations.len(), file);
    Ok(operations)
}

/// Group operations per coin, in deterministic coin order.
pub fn group_by_coin(operations: Vec<Operation>) -> BTreeMap<String, Vec<Operation>> {
    let mut by_coin: BTreeMap<String, Vec<Operation>> = BTreeMap::new();
    for op in operations {
        by_coin.entry(op.coin.clone()).or_default().push(op);
    }
    by_coin
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_and_sort_operations() {
        let json = r#"{
            "operations": [
                {"type": "Sell", "utc_time": "2024-06-15T12:00:00Z", "platform": "kraken", "coin": "BTC", "change": "0.5"},
                {"type": "Buy", "utc_time": "2024-01-15T09:30:00Z", "platform": "kraken", "coin": "BTC", "change": "1.0"}
            ]
        }"#;

        let ops = read_ledger_json(json.as_bytes(), "ledger.json").unwrap();
        assert_eq!(ops.len(), 2);
        // Sorted by time, not file order
        assert_eq!(ops[0].kind, OperationKind::Buy);
        assert_eq!(ops[0].change, dec!(1.0));
        assert_eq!(ops[1].kind, OperationKind::Sell);
        // Provenance keeps the original row numbers
        assert_eq!(ops[0].source.row, 2);
        assert_eq!(ops[1].source.row, 1);
    }

    #[test]
    fn identical_timestamps_keep_file_order() {
        let json = r#"{
            "operations": [
                {"type": "Buy", "utc_time": "2024-01-15T09:30:00Z", "platform": "kraken", "coin": "BTC", "change": "1"},
                {"type": "Buy", "utc_time": "2024-01-15T09:30:00Z", "platform": "kraken", "coin": "BTC", "change": "2"}
            ]
        }"#;

        let ops = read_ledger_json(json.as_bytes(), "ledger.json").unwrap();
        assert_eq!(ops[0].change, dec!(1));
        assert_eq!(ops[1].change, dec!(2));
    }

    #[test]
    fn non_positive_change_rejected() {
        let json = r#"{
            "operations": [
                {"type": "Buy", "utc_time": "2024-01-15T09:30:00Z", "platform": "kraken", "coin": "BTC", "change": "0"}
            ]
        }"#;

        let err = read_ledger_json(json.as_bytes(), "ledger.json").unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveChange { row: 1, .. }));
    }

    #[test]
    fn group_by_coin_is_deterministic() {
        let json = r#"{
            "operations": [
                {"type": "Buy", "utc_time": "2024-01-15T09:30:00Z", "platform": "kraken", "coin": "ETH", "change": "1"},
                {"type": "Buy", "utc_time": "2024-01-16T09:30:00Z", "platform": "kraken", "coin": "BTC", "change": "1"},
                {"type": "Sell", "utc_time": "2024-02-15T09:30:00Z", "platform": "kraken", "coin": "ETH", "change": "1"}
            ]
        }"#;

        let ops = read_ledger_json(json.as_bytes(), "ledger.json").unwrap();
        let by_coin = group_by_coin(ops);
        let coins: Vec<_> = by_coin.keys().cloned().collect();
        assert_eq!(coins, vec!["BTC".to_string(), "ETH".to_string()]);
        assert_eq!(by_coin["ETH"].len(), 2);
    }

    #[test]
    fn kind_classification_is_total() {
        use OperationKind::*;
        let all = [
            Buy,
            Sell,
            Deposit,
            Withdrawal,
            Fee,
            Airdrop,
            Commission,
            CoinLend,
            CoinLendEnd,
            CoinLendInterest,
            Staking,
            StakingEnd,
            StakingInterest,
        ];
        for kind in all {
            let classes = [kind.is_acquisition(), kind.is_disposal(), kind.is_marker()];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "{kind} must fall in exactly one class"
            );
        }
    }
}
