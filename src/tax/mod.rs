//! Tax classification of replayed operations.

pub mod germany;

use crate::config::Config;
use crate::ledger::Operation;
use crate::prices::{PriceError, PriceOracle};
use crate::replay::BalancedOperation;
use crate::warnings::Warning;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum TaxError {
    #[error("staking interest on fiat {coin} at {platform}, {time}: fiat currencies cannot be staked")]
    FiatStaking {
        coin: String,
        platform: String,
        time: DateTime<Utc>,
    },
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// The closed set of supported rule tables. Each variant maps to a pure
/// classification function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
pub enum Jurisdiction {
    #[default]
    Germany,
}

impl Jurisdiction {
    /// Classify one replayed operation into zero or more tax events.
    pub fn classify(
        &self,
        coin: &str,
        balanced: &BalancedOperation,
        oracle: &dyn PriceOracle,
        config: &Config,
    ) -> Result<Classified, TaxError> {
        match self {
            Jurisdiction::Germany => germany::classify(coin, balanced, oracle, config),
        }
    }
}

/// Classification output for one operation.
#[derive(Debug, Default)]
pub struct Classified {
    pub events: Vec<TaxEvent>,
    pub warnings: Vec<Warning>,
}

impl Classified {
    pub(crate) fn event(event: TaxEvent) -> Self {
        Classified {
            events: vec![event],
            warnings: Vec::new(),
        }
    }

    /// An operation with no tax consequence at all (e.g. fiat buy, matched
    /// transfer leg).
    pub(crate) fn none() -> Self {
        Classified::default()
    }
}

/// Semantic category of a tax event. Display strings are what lands in the
/// report's "Taxation Type" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxCategory {
    /// Private sale gains and fee deductions.
    OtherIncome,
    /// Interest received in the reporting fiat.
    CapitalIncome,
    /// Crypto interest, commissions and similar receipts.
    ServicesIncome,
    Purchase,
    Airdrop,
    Deposit,
    Withdrawal,
    LendingBegin,
    LendingEnd,
    StakingBegin,
    StakingEnd,
}

impl fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaxCategory::OtherIncome => "Other income",
            TaxCategory::CapitalIncome => "Income from capital assets",
            TaxCategory::ServicesIncome => "Income from other services",
            TaxCategory::Purchase => "Purchase",
            TaxCategory::Airdrop => "Airdrop",
            TaxCategory::Deposit => "Deposit",
            TaxCategory::Withdrawal => "Withdrawal",
            TaxCategory::LendingBegin => "Lending begin",
            TaxCategory::LendingEnd => "Lending end",
            TaxCategory::StakingBegin => "Staking begin",
            TaxCategory::StakingEnd => "Staking end",
        };
        write!(f, "{}", label)
    }
}

/// The reportable tax consequence of one operation (or of one sold portion,
/// in detailed export mode). Immutable once created.
#[derive(Debug, Clone)]
pub struct TaxEvent {
    pub category: TaxCategory,
    pub taxed_gain: Decimal,
    pub op: Operation,
    pub is_taxable: bool,
    /// Disposal proceeds in the reporting fiat (zero for non-disposals).
    pub sell_value: Decimal,
    /// Informational gain over all portions, filled when virtual-sell
    /// accounting is enabled.
    pub real_gain: Decimal,
    pub remark: String,
}

impl TaxEvent {
    pub fn non_taxable(category: TaxCategory, op: &Operation) -> Self {
        TaxEvent {
            category,
            taxed_gain: Decimal::ZERO,
            op: op.clone(),
            is_taxable: false,
            sell_value: Decimal::ZERO,
            real_gain: Decimal::ZERO,
            remark: String::new(),
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }
}
