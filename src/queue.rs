//! Balance queue: unsold acquisition lots for one (platform, coin) pair.

use crate::ledger::Operation;
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Cost-basis consumption order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Principle {
    /// Oldest acquisition is consumed first.
    #[default]
    Fifo,
    /// Newest acquisition is consumed first.
    Lifo,
}

/// An acquisition that has not been fully disposed of yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub origin: Operation,
    pub remaining: Decimal,
}

/// `amount` units consumed from the lot created by `origin`.
#[derive(Debug, Clone, PartialEq)]
pub struct SoldPortion {
    pub origin: Operation,
    pub amount: Decimal,
}

/// Ordered lot collection for one (platform, coin) pair.
///
/// Consumption always walks from the front. `acquire` places new lots so that
/// the front is the oldest lot under FIFO and the newest under LIFO, with
/// identical timestamps kept in ingestion order either way.
#[derive(Debug)]
pub struct LotQueue {
    principle: Principle,
    lots: VecDeque<Lot>,
    fee_buffer: Decimal,
}

impl LotQueue {
    pub fn new(principle: Principle) -> Self {
        LotQueue {
            principle,
            lots: VecDeque::new(),
            fee_buffer: Decimal::ZERO,
        }
    }

    /// Add a lot for a fresh acquisition.
    ///
    /// Any outstanding fee buffer is settled against the incoming amount
    /// before the rest becomes available for consumption.
    pub fn acquire(&mut self, origin: Operation, amount: Decimal) {
        let settled = self.fee_buffer.min(amount);
        if settled > Decimal::ZERO {
            self.fee_buffer -= settled;
            log::debug!(
                "{} {}: settled {} of buffered fees against acquisition at {}",
                origin.platform,
                origin.coin,
                settled,
                origin.utc_time
            );
        }
        let remaining = amount - settled;
        if remaining > Decimal::ZERO {
            self.insert(Lot { origin, remaining });
        }
    }

    /// Re-add previously consumed portions, keeping their original origins.
    ///
    /// Used when a matched transfer deposit restores the withdrawn lots on
    /// the destination queue: acquisition times survive the transfer.
    pub fn reacquire(&mut self, portions: &[SoldPortion]) {
        for portion in portions {
            self.acquire(portion.origin.clone(), portion.amount);
        }
    }

    fn insert(&mut self, lot: Lot) {
        let t = lot.origin.utc_time;
        // Keep the queue sorted in consumption order; a new lot goes after
        // every lot with the same timestamp (ingestion-order tie-break).
        let pos = match self.principle {
            Principle::Fifo => self
                .lots
                .iter()
                .position(|l| l.origin.utc_time > t)
                .unwrap_or(self.lots.len()),
            Principle::Lifo => self
                .lots
                .iter()
                .position(|l| l.origin.utc_time < t)
                .unwrap_or(self.lots.len()),
        };
        self.lots.insert(pos, lot);
    }

    /// Consume `amount` in queue order, splitting the last touched lot if it
    /// is larger than what is left to take. Fully drained lots are removed.
    ///
    /// Returns the portions taken and the unmet remainder (the shortfall),
    /// which is zero in a consistent ledger.
    pub fn consume(&mut self, amount: Decimal) -> (Vec<SoldPortion>, Decimal) {
        let mut left = amount;
        let mut portions = Vec::new();
        while left > Decimal::ZERO {
            let Some(front) = self.lots.front_mut() else {
                break;
            };
            let taken = front.remaining.min(left);
            portions.push(SoldPortion {
                origin: front.origin.clone(),
                amount: taken,
            });
            front.remaining -= taken;
            left -= taken;
            if front.remaining.is_zero() {
                self.lots.pop_front();
            }
        }
        (portions, left)
    }

    /// Consume a fee. Fees may exceed the current balance by a small amount
    /// that the next acquisition covers, so the shortfall is buffered
    /// instead of reported. A non-zero buffer at end of replay is an anomaly.
    pub fn consume_fee(&mut self, amount: Decimal) -> Vec<SoldPortion> {
        let (portions, shortfall) = self.consume(amount);
        if shortfall > Decimal::ZERO {
            log::debug!("buffering fee shortfall of {}", shortfall);
            self.fee_buffer += shortfall;
        }
        portions
    }

    pub fn fee_buffer(&self) -> Decimal {
        self.fee_buffer
    }

    pub fn total_remaining(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.remaining).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Remove and return every surviving lot, for virtual-sell evaluation.
    pub fn drain_remaining(&mut self) -> Vec<Lot> {
        self.lots.drain(..).collect()
    }
}
