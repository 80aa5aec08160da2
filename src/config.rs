//! Evaluation configuration.

use crate::queue::Principle;
use crate::tax::Jurisdiction;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Settings that select jurisdiction, cost-basis principle and reporting
/// behavior. Loadable from JSON; CLI flags override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reporting fiat currency, e.g. "EUR".
    pub fiat: String,
    pub jurisdiction: Jurisdiction,
    pub principle: Principle,
    /// Keep one lot queue per platform. When off, all platforms pool into a
    /// single virtual depot.
    pub multi_depot: bool,
    /// Calendar year the report is for.
    pub tax_year: i32,
    /// Also evaluate the hypothetical sale of everything still held.
    pub calculate_virtual_sell: bool,
    /// Detailed export: one row per sold portion, and include non-taxable
    /// events in the CSV.
    pub export_all_events: bool,
    /// Append virtual-sell events to the CSV export.
    pub export_virtual_sell: bool,
    /// Timestamp used for the virtual sell. Defaults to now; pin it for
    /// reproducible runs.
    pub evaluation_time: Option<DateTime<Utc>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fiat: "EUR".to_string(),
            jurisdiction: Jurisdiction::Germany,
            principle: Principle::Fifo,
            multi_depot: true,
            tax_year: Utc::now().year(),
            calculate_virtual_sell: false,
            export_all_events: false,
            export_virtual_sell: false,
            evaluation_time: None,
        }
    }
}

impl Config {
    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    pub fn in_tax_year(&self, time: DateTime<Utc>) -> bool {
        time.year() == self.tax_year
    }

    pub fn is_fiat(&self, coin: &str) -> bool {
        coin.eq_ignore_ascii_case(&self.fiat)
    }

    pub fn evaluation_time(&self) -> DateTime<Utc> {
        self.evaluation_time.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let json = r#"{
            "fiat": "EUR",
            "tax_year": 2024,
            "principle": "lifo",
            "multi_depot": false
        }"#;
        let config = Config::read_json(json.as_bytes()).unwrap();
        assert_eq!(config.tax_year, 2024);
        assert_eq!(config.principle, Principle::Lifo);
        assert!(!config.multi_depot);
        // Unspecified fields fall back to defaults
        assert_eq!(config.jurisdiction, Jurisdiction::Germany);
        assert!(!config.calculate_virtual_sell);
    }

    #[test]
    fn tax_year_and_fiat_checks() {
        let config = Config {
            tax_year: 2024,
            ..Config::default()
        };
        use chrono::TimeZone;
        assert!(config.in_tax_year(Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap()));
        assert!(!config.in_tax_year(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(config.is_fiat("eur"));
        assert!(!config.is_fiat("BTC"));
    }
}
