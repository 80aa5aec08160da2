//! German rule set: private sale taxation (§23 EStG shape) with a twelve
//! month holding period, plus income taxation of interest and commissions.

use super::{Classified, TaxCategory, TaxError, TaxEvent};
use crate::config::Config;
use crate::ledger::{Operation, OperationKind};
use crate::prices::PriceOracle;
use crate::queue::SoldPortion;
use crate::replay::BalancedOperation;
use crate::warnings::Warning;
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;

/// Coins acquired through these operations sell tax-free, unless they were
/// received in the reporting fiat.
const NON_TAXABLE_ORIGINS: &[OperationKind] = &[
    OperationKind::Airdrop,
    OperationKind::CoinLendInterest,
    OperationKind::StakingInterest,
    OperationKind::Commission,
];

/// Gains are tax-free after holding for more than twelve calendar months.
/// A disposal exactly at the boundary is still short-term.
pub fn is_long_term(acquired: DateTime<Utc>, disposed: DateTime<Utc>) -> bool {
    match acquired.checked_add_months(Months::new(12)) {
        Some(boundary) => disposed > boundary,
        None => false,
    }
}

pub(super) fn classify(
    coin: &str,
    balanced: &BalancedOperation,
    oracle: &dyn PriceOracle,
    config: &Config,
) -> Result<Classified, TaxError> {
    let op = &balanced.op;
    let classified = match op.kind {
        OperationKind::Fee => {
            // Fees reduce the taxed gain in the period they occur in,
            // independent of the cost basis of the consumed lots.
            let is_taxable = config.in_tax_year(op.utc_time);
            let taxed_gain = -oracle.cost_of(op)?;
            let mut event = TaxEvent::non_taxable(TaxCategory::OtherIncome, op);
            event.taxed_gain = taxed_gain;
            event.is_taxable = is_taxable;
            if !is_taxable {
                event = event.with_remark("outside tax year");
            }
            Classified::event(event)
        }
        OperationKind::CoinLend => {
            Classified::event(TaxEvent::non_taxable(TaxCategory::LendingBegin, op))
        }
        OperationKind::CoinLendEnd => {
            Classified::event(TaxEvent::non_taxable(TaxCategory::LendingEnd, op))
        }
        OperationKind::Staking => {
            Classified::event(TaxEvent::non_taxable(TaxCategory::StakingBegin, op))
        }
        OperationKind::StakingEnd => {
            Classified::event(TaxEvent::non_taxable(TaxCategory::StakingEnd, op))
        }
        OperationKind::Buy => {
            if config.is_fiat(coin) {
                Classified::none()
            } else {
                let cost = oracle.cost_of(op)?;
                let price = oracle.unit_price(&op.platform, coin, op.utc_time)?;
                let remark = format!(
                    "cost {} {}, price {} {}/{}",
                    cost, config.fiat, price, coin, config.fiat
                );
                Classified::event(
                    TaxEvent::non_taxable(TaxCategory::Purchase, op).with_remark(remark),
                )
            }
        }
        OperationKind::Sell => {
            if config.is_fiat(coin) {
                Classified::none()
            } else {
                let portions = balanced.portions.as_deref().unwrap_or(&[]);
                Classified {
                    events: evaluate_sell(op, portions, oracle, config)?,
                    warnings: Vec::new(),
                }
            }
        }
        OperationKind::CoinLendInterest | OperationKind::StakingInterest => {
            let is_taxable = config.in_tax_year(op.utc_time);
            let category = if config.is_fiat(coin) {
                if op.kind == OperationKind::StakingInterest {
                    log::error!(
                        "{} at {}, {}: you can not stake fiat currencies",
                        coin,
                        op.platform,
                        op.utc_time
                    );
                    return Err(TaxError::FiatStaking {
                        coin: coin.to_string(),
                        platform: op.platform.clone(),
                        time: op.utc_time,
                    });
                }
                TaxCategory::CapitalIncome
            } else {
                TaxCategory::ServicesIncome
            };
            Classified::event(income_event(category, op, oracle, is_taxable)?)
        }
        OperationKind::Commission => {
            let is_taxable = config.in_tax_year(op.utc_time);
            Classified::event(income_event(
                TaxCategory::ServicesIncome,
                op,
                oracle,
                is_taxable,
            )?)
        }
        OperationKind::Airdrop => {
            let mut event = TaxEvent::non_taxable(TaxCategory::Airdrop, op);
            event.real_gain = oracle.cost_of(op)?;
            Classified::event(event)
        }
        OperationKind::Deposit => {
            if balanced.transfer_matched || config.is_fiat(coin) {
                Classified::none()
            } else {
                Classified::event(TaxEvent::non_taxable(TaxCategory::Deposit, op))
            }
        }
        OperationKind::Withdrawal => {
            if balanced.transfer_matched {
                Classified::none()
            } else if config.is_fiat(coin) {
                Classified::event(TaxEvent::non_taxable(TaxCategory::Withdrawal, op))
            } else {
                let event = TaxEvent::non_taxable(TaxCategory::Withdrawal, op)
                    .with_remark("no transfer match; evaluation may be incomplete");
                Classified {
                    events: vec![event],
                    warnings: vec![Warning::UnresolvedWithdrawal {
                        platform: op.platform.clone(),
                        coin: coin.to_string(),
                        amount: op.change,
                        time: op.utc_time,
                    }],
                }
            }
        }
    };
    Ok(classified)
}

/// Income at receipt time, valued at receipt.
fn income_event(
    category: TaxCategory,
    op: &Operation,
    oracle: &dyn PriceOracle,
    is_taxable: bool,
) -> Result<TaxEvent, TaxError> {
    let mut event = TaxEvent::non_taxable(category, op);
    event.taxed_gain = oracle.cost_of(op)?;
    event.is_taxable = is_taxable;
    if !is_taxable {
        event = event.with_remark("outside tax year");
    }
    Ok(event)
}

/// Evaluate a sale portion by portion.
///
/// A portion is taxable when it is still short-term and its origin is not in
/// the exempt set. Gains are only valued when needed, so missing historic
/// prices do not abort runs that never look at them.
fn evaluate_sell(
    op: &Operation,
    portions: &[SoldPortion],
    oracle: &dyn PriceOracle,
    config: &Config,
) -> Result<Vec<TaxEvent>, TaxError> {
    let sell_value = oracle.cost_of(op)?;
    let mut events = Vec::new();
    let mut remarks = Vec::new();
    let mut taxed_total = Decimal::ZERO;
    let mut real_total = Decimal::ZERO;
    let mut any_taxable = false;

    for portion in portions {
        let origin = &portion.origin;
        let exempt_origin =
            NON_TAXABLE_ORIGINS.contains(&origin.kind) && !config.is_fiat(&origin.coin);
        let is_taxable = !is_long_term(origin.utc_time, op.utc_time) && !exempt_origin;
        any_taxable |= is_taxable;

        // Multiply before dividing so proportional splits of round numbers
        // stay exact.
        let portion_value = portion.amount * sell_value / op.change;
        let mut taxed_gain = Decimal::ZERO;
        let mut real_gain = Decimal::ZERO;
        if is_taxable || config.calculate_virtual_sell {
            let cost_basis = oracle.cost_of_portion(portion)?;
            let gain = portion_value - cost_basis;
            if is_taxable {
                taxed_gain = gain;
                taxed_total += gain;
            }
            if config.calculate_virtual_sell {
                real_gain = gain;
                real_total += gain;
            }
        }

        let remark = format!(
            "{} from {} ({})",
            portion.amount,
            origin.utc_time.format("%Y-%m-%d %H:%M:%S"),
            origin.kind
        );
        if config.export_all_events {
            events.push(TaxEvent {
                category: TaxCategory::OtherIncome,
                taxed_gain,
                op: op.clone(),
                is_taxable,
                sell_value: portion_value,
                real_gain,
                remark,
            });
        } else {
            remarks.push(remark);
        }
    }

    if !config.export_all_events {
        events.push(TaxEvent {
            category: TaxCategory::OtherIncome,
            taxed_gain: taxed_total,
            op: op.clone(),
            is_taxable: any_taxable,
            sell_value,
            real_gain: real_total,
            remark: remarks.join(", "),
        });
    }
    Ok(events)
}
