//! Ledger replay: drives one coin's operations against the balance queues.
//!
//! The walk is strictly chronological across all platforms of the coin, so a
//! matched deposit always sees the portions its withdrawal consumed earlier.
//! Withdrawn portions are kept under a stable (platform, time, amount) key
//! and looked up when the deposit leg arrives; no record is rewritten after
//! it has been appended.

use crate::ledger::{Operation, OperationKind, SourceRef};
use crate::queue::{Lot, LotQueue, Principle, SoldPortion};
use crate::transfer::TransferBook;
use crate::warnings::Warning;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

const POOLED_DEPOT: &str = "pooled";

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(
        "{source_ref}: not enough {coin} on {platform} to cover {kind} of {requested} at {time}: \
         missing {missing}"
    )]
    InsufficientLots {
        coin: String,
        platform: String,
        kind: OperationKind,
        time: DateTime<Utc>,
        requested: Decimal,
        missing: Decimal,
        source_ref: SourceRef,
    },
    #[error(
        "transfer match for deposit of {amount} {coin} to {platform} at {time} \
         resolves to no withdrawn lots"
    )]
    UnbalancedTransfer {
        coin: String,
        platform: String,
        time: DateTime<Utc>,
        amount: Decimal,
    },
}

/// One operation paired with the portions it consumed or re-acquired.
#[derive(Debug, Clone)]
pub struct BalancedOperation {
    pub op: Operation,
    /// For disposals: the consumed portions. For matched deposits: the
    /// re-acquired portions. `None` otherwise.
    pub portions: Option<Vec<SoldPortion>>,
    /// Whether this deposit/withdrawal is a leg of a known transfer match.
    pub transfer_matched: bool,
}

/// Replay result for one coin.
#[derive(Debug)]
pub struct Replay {
    pub operations: Vec<BalancedOperation>,
    pub warnings: Vec<Warning>,
    /// Lots still held per depot after the walk, for virtual-sell valuation.
    pub leftovers: Vec<(String, Vec<Lot>)>,
}

/// Walk `ops` (globally time-sorted, one coin) against per-depot lot queues.
pub fn replay_coin(
    coin: &str,
    ops: &[Operation],
    book: &TransferBook,
    principle: Principle,
    multi_depot: bool,
) -> Result<Replay, ReplayError> {
    let mut queues: BTreeMap<String, LotQueue> = BTreeMap::new();
    let mut withdrawn: HashMap<(String, DateTime<Utc>, Decimal), Vec<SoldPortion>> = HashMap::new();
    let mut operations = Vec::with_capacity(ops.len());

    for op in ops {
        let depot = if multi_depot {
            op.platform.as_str()
        } else {
            POOLED_DEPOT
        };
        let queue = queues
            .entry(depot.to_string())
            .or_insert_with(|| LotQueue::new(principle));

        let balanced = match op.kind {
            OperationKind::CoinLend
            | OperationKind::CoinLendEnd
            | OperationKind::Staking
            | OperationKind::StakingEnd => BalancedOperation {
                op: op.clone(),
                portions: None,
                transfer_matched: false,
            },
            OperationKind::Buy
            | OperationKind::Airdrop
            | OperationKind::Commission
            | OperationKind::CoinLendInterest
            | OperationKind::StakingInterest => {
                queue.acquire(op.clone(), op.change);
                BalancedOperation {
                    op: op.clone(),
                    portions: None,
                    transfer_matched: false,
                }
            }
            OperationKind::Deposit => match book.for_deposit(op) {
                Some(m) => {
                    let key = (m.source_platform.clone(), m.source_time, m.amount);
                    let portions = withdrawn.get(&key).filter(|p| !p.is_empty()).ok_or(
                        ReplayError::UnbalancedTransfer {
                            coin: coin.to_string(),
                            platform: op.platform.clone(),
                            time: op.utc_time,
                            amount: op.change,
                        },
                    )?;
                    let portions = portions.clone();
                    queue.reacquire(&portions);
                    log::debug!(
                        "deposit of {} {} to {} restored {} withdrawn lot portions",
                        op.change,
                        coin,
                        op.platform,
                        portions.len()
                    );
                    BalancedOperation {
                        op: op.clone(),
                        portions: Some(portions),
                        transfer_matched: true,
                    }
                }
                None => {
                    // Conservative default: treat as a fresh external
                    // acquisition dated at the deposit.
                    queue.acquire(op.clone(), op.change);
                    BalancedOperation {
                        op: op.clone(),
                        portions: None,
                        transfer_matched: false,
                    }
                }
            },
            OperationKind::Sell | OperationKind::Withdrawal => {
                let (portions, shortfall) = queue.consume(op.change);
                if shortfall > Decimal::ZERO {
                    log::error!(
                        "{}: not enough {} in queue to cover {} of {} on {}. This occurs when \
                         account statements have unmatched buy/sell positions or deposits from \
                         unknown sources; check that all statements of previous years are included.",
                        op.source,
                        coin,
                        op.kind,
                        op.change,
                        op.platform
                    );
                    return Err(ReplayError::InsufficientLots {
                        coin: coin.to_string(),
                        platform: op.platform.clone(),
                        kind: op.kind,
                        time: op.utc_time,
                        requested: op.change,
                        missing: shortfall,
                        source_ref: op.source.clone(),
                    });
                }
                let transfer_matched = op.kind == OperationKind::Withdrawal
                    && book.for_withdrawal(op).is_some();
                if op.kind == OperationKind::Withdrawal {
                    withdrawn.insert((op.platform.clone(), op.utc_time, op.change), portions.clone());
                }
                BalancedOperation {
                    op: op.clone(),
                    portions: Some(portions),
                    transfer_matched,
                }
            }
            OperationKind::Fee => {
                let portions = queue.consume_fee(op.change);
                BalancedOperation {
                    op: op.clone(),
                    portions: Some(portions),
                    transfer_matched: false,
                }
            }
        };
        operations.push(balanced);
    }

    let mut warnings = Vec::new();
    let mut leftovers = Vec::new();
    for (depot, queue) in &mut queues {
        if queue.fee_buffer() > Decimal::ZERO {
            warnings.push(Warning::OutstandingFee {
                platform: depot.clone(),
                coin: coin.to_string(),
                amount: queue.fee_buffer(),
            });
        }
        let lots = queue.drain_remaining();
        if !lots.is_empty() {
            leftovers.push((depot.clone(), lots));
        }
    }

    Ok(Replay {
        operations,
        warnings,
        leftovers,
    })
}
