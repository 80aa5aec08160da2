//! Pricing oracle: value of a coin in the reporting fiat at a given time.

use crate::ledger::Operation;
use crate::queue::SoldPortion;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("no price for {coin} on {platform} at {date}")]
    Missing {
        coin: String,
        platform: String,
        date: NaiveDate,
    },
    #[error("invalid price csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Values operations in the reporting fiat. Lookup failures propagate; no
/// value is ever fabricated.
pub trait PriceOracle {
    fn unit_price(
        &self,
        platform: &str,
        coin: &str,
        at: DateTime<Utc>,
    ) -> Result<Decimal, PriceError>;

    /// Value of the full operation amount at the operation time.
    fn cost_of(&self, op: &Operation) -> Result<Decimal, PriceError> {
        let price = self.unit_price(&op.platform, &op.coin, op.utc_time)?;
        Ok(op.change * price)
    }

    /// Cost basis of a consumed portion, valued at its origin acquisition.
    fn cost_of_portion(&self, portion: &SoldPortion) -> Result<Decimal, PriceError> {
        let origin = &portion.origin;
        let price = self.unit_price(&origin.platform, &origin.coin, origin.utc_time)?;
        Ok(portion.amount * price)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PriceRecord {
    coin: String,
    date: NaiveDate,
    price: Decimal,
}

/// Daily prices keyed by (coin, date), loaded from CSV.
///
/// The reporting fiat always prices at 1. Prices are venue-independent;
/// the platform only appears in diagnostics.
#[derive(Debug)]
pub struct PriceTable {
    fiat: String,
    prices: HashMap<(String, NaiveDate), Decimal>,
}

impl PriceTable {
    pub fn new(fiat: &str) -> Self {
        PriceTable {
            fiat: fiat.to_string(),
            prices: HashMap::new(),
        }
    }

    pub fn read_csv<R: Read>(reader: R, fiat: &str) -> Result<Self, PriceError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut table = PriceTable::new(fiat);
        for record in rdr.deserialize::<PriceRecord>() {
            let record = record?;
            table.insert(&record.coin, record.date, record.price);
        }
        log::debug!("loaded {} daily prices", table.prices.len());
        Ok(table)
    }

    pub fn insert(&mut self, coin: &str, date: NaiveDate, price: Decimal) {
        self.prices.insert((coin.to_string(), date), price);
    }
}

impl PriceOracle for PriceTable {
    fn unit_price(
        &self,
        platform: &str,
        coin: &str,
        at: DateTime<Utc>,
    ) -> Result<Decimal, PriceError> {
        if coin.eq_ignore_ascii_case(&self.fiat) {
            return Ok(Decimal::ONE);
        }
        let date = at.date_naive();
        self.prices
            .get(&(coin.to_string(), date))
            .copied()
            .ok_or_else(|| PriceError::Missing {
                coin: coin.to_string(),
                platform: platform.to_string(),
                date,
            })
    }
}
