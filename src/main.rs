//! cryptax: calculate taxable gains from normalized crypto ledgers.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

mod config;
mod evaluate;
mod ledger;
mod prices;
mod queue;
mod replay;
mod report;
mod tax;
mod transfer;
mod warnings;

use config::Config;
use evaluate::Evaluation;
use prices::PriceTable;
use queue::Principle;
use transfer::TransferBook;

#[derive(Parser, Debug)]
#[command(name = "cryptax", version, about = "Calculate taxable gains from crypto ledgers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate the ledger, export the CSV report and print a summary
    Report(ReportCommand),
    /// Evaluate the ledger and print the summary only
    Summary(SummaryCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Report(cmd) => cmd.run(),
        Command::Summary(cmd) => cmd.run(),
    }
}

/// Inputs and overrides shared by both subcommands.
#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Normalized ledger JSON file
    #[arg(short, long)]
    ledger: PathBuf,

    /// Daily price CSV file (coin,date,price)
    #[arg(short, long)]
    prices: PathBuf,

    /// Known transfer matches JSON file
    #[arg(short, long)]
    transfers: Option<PathBuf>,

    /// Configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tax year to report
    #[arg(short, long)]
    year: Option<i32>,

    /// Cost-basis principle
    #[arg(long, value_enum)]
    principle: Option<Principle>,

    /// Pool all platforms into a single depot
    #[arg(long)]
    single_depot: bool,

    /// One row per sold portion, and include non-taxable events
    #[arg(long)]
    detailed: bool,

    /// Also evaluate the hypothetical sale of everything still held
    #[arg(long)]
    virtual_sell: bool,
}

impl EvaluateArgs {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("opening config {}", path.display()))?;
                Config::read_json(BufReader::new(file))?
            }
            None => Config::default(),
        };
        if let Some(year) = self.year {
            config.tax_year = year;
        }
        if let Some(principle) = self.principle {
            config.principle = principle;
        }
        if self.single_depot {
            config.multi_depot = false;
        }
        if self.detailed {
            config.export_all_events = true;
        }
        if self.virtual_sell {
            config.calculate_virtual_sell = true;
            config.export_virtual_sell = true;
        }
        Ok(config)
    }

    fn evaluate(&self) -> anyhow::Result<(Evaluation, Config)> {
        let config = self.config()?;

        let ledger_file = File::open(&self.ledger)
            .with_context(|| format!("opening ledger {}", self.ledger.display()))?;
        let ledger_name = self.ledger.display().to_string();
        let operations = ledger::read_ledger_json(BufReader::new(ledger_file), &ledger_name)?;

        let prices_file = File::open(&self.prices)
            .with_context(|| format!("opening prices {}", self.prices.display()))?;
        let table = PriceTable::read_csv(BufReader::new(prices_file), &config.fiat)?;

        let book = match &self.transfers {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("opening transfers {}", path.display()))?;
                TransferBook::read_json(BufReader::new(file))?
            }
            None => TransferBook::empty(),
        };

        let evaluation = evaluate::evaluate(operations, &book, &table, &config)?;
        Ok((evaluation, config))
    }
}

#[derive(Args, Debug)]
struct ReportCommand {
    #[command(flatten)]
    args: EvaluateArgs,

    /// Directory the CSV report is written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

impl ReportCommand {
    fn run(&self) -> anyhow::Result<()> {
        let (evaluation, config) = self.args.evaluate()?;
        let path = report::export_csv(&evaluation, &config, &self.output)?;
        report::print_summary(&evaluation, &config);
        println!();
        println!("Report written to {}", path.display());
        Ok(())
    }
}

#[derive(Args, Debug)]
struct SummaryCommand {
    #[command(flatten)]
    args: EvaluateArgs,
}

impl SummaryCommand {
    fn run(&self) -> anyhow::Result<()> {
        let (evaluation, config) = self.args.evaluate()?;
        report::print_summary(&evaluation, &config);
        Ok(())
    }
}
