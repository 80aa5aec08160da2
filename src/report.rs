//! Report output: CSV export and the console summary.

use crate::config::Config;
use crate::evaluate::Evaluation;
use crate::tax::{TaxCategory, TaxEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// One exported CSV row. Column names are part of the output format.
#[derive(Debug, Serialize)]
struct ReportRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Platform")]
    platform: String,
    #[serde(rename = "Taxation Type")]
    taxation_type: String,
    #[serde(rename = "Taxed Gain")]
    taxed_gain: Decimal,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Amount")]
    amount: Decimal,
    #[serde(rename = "Asset")]
    asset: String,
    #[serde(rename = "Sell Value")]
    sell_value: Decimal,
    #[serde(rename = "Remark")]
    remark: String,
}

impl ReportRow {
    fn from_event(event: &TaxEvent) -> Self {
        ReportRow {
            date: event.op.utc_time.to_rfc3339(),
            platform: event.op.platform.clone(),
            taxation_type: event.category.to_string(),
            taxed_gain: event.taxed_gain,
            action: event.op.kind.to_string(),
            amount: event.op.change,
            asset: event.op.coin.clone(),
            sell_value: event.sell_value,
            remark: event.remark.clone(),
        }
    }
}

fn exported(event: &TaxEvent, config: &Config) -> bool {
    config.export_all_events || (event.is_taxable && config.in_tax_year(event.op.utc_time))
}

/// Serialize the evaluation as CSV. Rows come out in event order, so two
/// exports of the same evaluation are byte-identical.
pub fn write_csv<W: Write>(
    evaluation: &Evaluation,
    config: &Config,
    writer: W,
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for event in &evaluation.events {
        if exported(event, config) {
            wtr.serialize(ReportRow::from_event(event))?;
        }
    }
    if config.export_virtual_sell {
        for event in &evaluation.virtual_events {
            wtr.serialize(ReportRow::from_event(event))?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// First unused revision of the export file name: `<year>.csv`, then
/// `<year>_2.csv` and so on. Existing exports are never overwritten.
pub fn next_export_path(dir: &Path, tax_year: i32) -> PathBuf {
    let mut revision = 1;
    loop {
        let name = if revision == 1 {
            format!("{}.csv", tax_year)
        } else {
            format!("{}_{}.csv", tax_year, revision)
        };
        let path = dir.join(name);
        if !path.exists() {
            return path;
        }
        revision += 1;
    }
}

pub fn export_csv(
    evaluation: &Evaluation,
    config: &Config,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let path = next_export_path(dir, config.tax_year);
    let file = File::create(&path)?;
    write_csv(evaluation, config, file)?;
    log::info!("exported evaluation to {}", path.display());
    Ok(path)
}

#[derive(Debug, Tabled)]
struct HoldingRow {
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Amount")]
    amount: Decimal,
    #[tabled(rename = "Value")]
    value: Decimal,
    #[tabled(rename = "Unrealized Gain")]
    gain: Decimal,
}

/// Print the per-category totals for the tax year, any warnings, and the
/// virtual-sell portfolio when enabled.
pub fn print_summary(evaluation: &Evaluation, config: &Config) {
    println!("Evaluation for tax year {} ({})", config.tax_year, config.fiat);
    println!();

    let mut totals: BTreeMap<TaxCategory, Decimal> = BTreeMap::new();
    for event in &evaluation.events {
        if event.is_taxable && config.in_tax_year(event.op.utc_time) {
            *totals.entry(event.category).or_default() += event.taxed_gain;
        }
    }
    if totals.is_empty() {
        println!("No taxable events in {}", config.tax_year);
    } else {
        let mut sum = Decimal::ZERO;
        for (category, total) in &totals {
            println!("{}: {} {}", category, total, config.fiat);
            sum += *total;
        }
        println!("Total taxed gain: {} {}", sum, config.fiat);
    }

    if !evaluation.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &evaluation.warnings {
            println!("  - {}", warning);
        }
    }

    if config.calculate_virtual_sell {
        println!();
        print_portfolio(evaluation, config);
    }
}

fn print_portfolio(evaluation: &Evaluation, config: &Config) {
    if evaluation.virtual_events.is_empty() {
        println!("No holdings left to value");
        return;
    }

    let rows: Vec<HoldingRow> = evaluation
        .virtual_events
        .iter()
        .map(|event| HoldingRow {
            platform: event.op.platform.clone(),
            asset: event.op.coin.clone(),
            amount: event.op.change,
            value: event.sell_value,
            gain: event.real_gain,
        })
        .collect();

    let realizable: Decimal = rows.iter().map(|row| row.value).sum();
    let unrealized: Decimal = rows.iter().map(|row| row.gain).sum();
    println!("Portfolio at {}:", config.evaluation_time());
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
    println!(
        "Invested: {} {}, realizable: {} {}, unrealized gain: {} {}",
        realizable - unrealized,
        config.fiat,
        realizable,
        config.fiat,
        unrealized,
        config.fiat
    );
}
