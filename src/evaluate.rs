//! Evaluation pipeline: group, replay, classify, collect.

use crate::config::Config;
use crate::ledger::{group_by_coin, Operation, OperationKind, SourceRef};
use crate::prices::PriceOracle;
use crate::queue::{Lot, SoldPortion};
use crate::replay::{replay_coin, BalancedOperation, ReplayError};
use crate::tax::{TaxError, TaxEvent};
use crate::transfer::TransferBook;
use crate::warnings::Warning;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Tax(#[from] TaxError),
}

/// The full evaluation result over all coins.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Tax events in chronological order.
    pub events: Vec<TaxEvent>,
    /// Hypothetical disposal of everything still held, when enabled.
    pub virtual_events: Vec<TaxEvent>,
    pub warnings: Vec<Warning>,
}

/// Evaluate a full ledger. Coins are independent of each other and processed
/// in deterministic order.
pub fn evaluate(
    operations: Vec<Operation>,
    book: &TransferBook,
    oracle: &dyn PriceOracle,
    config: &Config,
) -> Result<Evaluation, EvaluateError> {
    let mut evaluation = Evaluation::default();

    for (coin, ops) in group_by_coin(operations) {
        log::info!("evaluating {} ({} operations)", coin, ops.len());
        if config.is_fiat(&coin) {
            // The reporting fiat has no cost basis to track. Classify its
            // operations directly without balance queues, so fiat disposals
            // never trip the insufficient-lots check.
            for op in &ops {
                let transfer_matched = match op.kind {
                    OperationKind::Deposit => book.for_deposit(op).is_some(),
                    OperationKind::Withdrawal => book.for_withdrawal(op).is_some(),
                    _ => false,
                };
                let balanced = BalancedOperation {
                    op: op.clone(),
                    portions: None,
                    transfer_matched,
                };
                let classified =
                    config
                        .jurisdiction
                        .classify(&coin, &balanced, oracle, config)?;
                evaluation.events.extend(classified.events);
                evaluation.warnings.extend(classified.warnings);
            }
            continue;
        }

        let replay = replay_coin(&coin, &ops, book, config.principle, config.multi_depot)?;
        evaluation.warnings.extend(replay.warnings);

        for balanced in &replay.operations {
            let classified = config
                .jurisdiction
                .classify(&coin, balanced, oracle, config)?;
            evaluation.events.extend(classified.events);
            evaluation.warnings.extend(classified.warnings);
        }

        if config.calculate_virtual_sell {
            for (depot, lots) in &replay.leftovers {
                let balanced = virtual_sell(&coin, depot, lots, config);
                let classified =
                    config
                        .jurisdiction
                        .classify(&coin, &balanced, oracle, config)?;
                evaluation.virtual_events.extend(classified.events);
                evaluation.warnings.extend(classified.warnings);
            }
        }
    }

    evaluation.events.sort_by_key(|event| event.op.utc_time);
    evaluation.virtual_events.sort_by_key(|event| event.op.utc_time);
    Ok(evaluation)
}

/// Synthesize the hypothetical sale of a depot's surviving lots at the
/// evaluation time.
fn virtual_sell(coin: &str, depot: &str, lots: &[Lot], config: &Config) -> BalancedOperation {
    let total: Decimal = lots.iter().map(|lot| lot.remaining).sum();
    let portions = lots
        .iter()
        .map(|lot| SoldPortion {
            origin: lot.origin.clone(),
            amount: lot.remaining,
        })
        .collect();
    BalancedOperation {
        op: Operation {
            kind: OperationKind::Sell,
            utc_time: config.evaluation_time(),
            platform: depot.to_string(),
            coin: coin.to_string(),
            change: total,
            source: SourceRef {
                file: "virtual".to_string(),
                row: 0,
            },
        },
        portions: Some(portions),
        transfer_matched: false,
    }
}
