//! E2E tests driving the binary over the fixture ledger.

use std::process::Command;

fn summary(extra: &[&str]) -> std::process::Output {
    let mut args = vec![
        "run",
        "--",
        "summary",
        "--ledger",
        "tests/data/ledger.json",
        "--prices",
        "tests/data/prices.csv",
        "--transfers",
        "tests/data/transfers.json",
        "--year",
        "2024",
    ];
    args.extend_from_slice(extra);
    Command::new("cargo")
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// FIFO evaluation of the fixture ledger: two taxable partial sales, one
/// long-term sale, one matched transfer and one staking reward.
#[test]
fn summary_fifo_totals() {
    let output = summary(&[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("Evaluation for tax year 2024"));
    assert!(stdout.contains("Other income: 36 EUR"));
    assert!(stdout.contains("Income from other services: 20 EUR"));
    assert!(stdout.contains("Total taxed gain: 56 EUR"));
    // Transfer is fully matched, so nothing to warn about
    assert!(!stdout.contains("Warnings"));
}

/// The same ledger under LIFO consumes the younger lots first.
#[test]
fn summary_lifo_totals() {
    let output = summary(&["--principle", "lifo"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("Other income: 30 EUR"));
    assert!(stdout.contains("Total taxed gain: 50 EUR"));
}

/// The report command writes a revision-numbered CSV next to the summary.
#[test]
fn report_writes_csv() {
    let dir = std::env::temp_dir().join(format!("cryptax-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let dir_arg = dir.display().to_string();

    let output = Command::new("cargo")
        .args([
            "run",
            "--",
            "report",
            "--ledger",
            "tests/data/ledger.json",
            "--prices",
            "tests/data/prices.csv",
            "--transfers",
            "tests/data/transfers.json",
            "--year",
            "2024",
            "--output",
            &dir_arg,
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);

    let csv = std::fs::read_to_string(dir.join("2024.csv")).unwrap();
    let mut lines = csv.lines();
    assert!(lines
        .next()
        .unwrap()
        .starts_with("Date,Platform,Taxation Type,Taxed Gain,Action,Amount,Asset,Sell Value"));
    // Only the taxable rows of 2024 by default
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("2024-01-21"));
    assert!(csv.contains("Other income"));
    assert!(csv.contains("Income from other services"));

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Unmatched withdrawals do not abort the run but are surfaced as warnings.
#[test]
fn summary_warns_without_transfer_book() {
    let output = Command::new("cargo")
        .args([
            "run",
            "--",
            "summary",
            "--ledger",
            "tests/data/ledger.json",
            "--prices",
            "tests/data/prices.csv",
            "--year",
            "2024",
        ])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("Warnings:"));
    assert!(stdout.contains("unresolved withdrawal of 1 X from kraken"));
}
