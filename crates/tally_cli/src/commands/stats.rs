//! Stats command implementation.

use super::open_store;
use crate::ledger::LocalLedger;
use chrono::{Local, NaiveDate};
use std::path::Path;
use tally_core::{summarize, DateRange, Summary};

/// Resolves the requested range. `--from`/`--to` override the range name.
pub fn resolve_range(
    range: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<DateRange, Box<dyn std::error::Error>> {
    match (from, to) {
        (Some(start), end) => Ok(DateRange::Custom {
            start,
            end: end.unwrap_or(today),
        }),
        (None, Some(_)) => Err("--to requires --from".into()),
        (None, None) => Ok(range.parse()?),
    }
}

/// Runs the stats command.
pub fn run(
    path: &Path,
    range: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    let range = resolve_range(range, from, to, today)?;

    let store = open_store(path)?;
    let records = LocalLedger::new(store).records()?;
    let summary = summarize(&records, range, today)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => print_text_output(&summary),
    }

    Ok(())
}

fn print_text_output(summary: &Summary) {
    match (summary.start, summary.end) {
        (Some(start), Some(end)) => println!("Period:   {start} to {end}"),
        _ => println!("Period:   all time"),
    }
    println!(
        "Sales:    {:.2} ({} transaction(s))",
        summary.sales_total, summary.sale_count
    );
    println!(
        "Expenses: {:.2} ({} transaction(s))",
        summary.expense_total, summary.expense_count
    );
    println!("Net:      {:.2}", summary.net);

    if !summary.by_category.is_empty() {
        println!();
        println!("By category:");
        for (category, totals) in &summary.by_category {
            println!(
                "  {:<16} sales={:.2} expenses={:.2} count={}",
                category, totals.sales, totals.expenses, totals.count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn named_range() {
        let range = resolve_range("week", None, None, day(2026, 10, 19)).unwrap();
        assert_eq!(range, DateRange::Week);
        assert!(resolve_range("decade", None, None, day(2026, 10, 19)).is_err());
    }

    #[test]
    fn custom_range_defaults_end_to_today() {
        let today = day(2026, 10, 19);
        let range = resolve_range("month", Some(day(2026, 10, 1)), None, today).unwrap();
        assert_eq!(
            range,
            DateRange::Custom {
                start: day(2026, 10, 1),
                end: today
            }
        );
    }

    #[test]
    fn to_without_from_rejected() {
        assert!(resolve_range("month", None, Some(day(2026, 1, 1)), day(2026, 1, 2)).is_err());
    }
}
