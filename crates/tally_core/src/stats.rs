//! Date-range statistics over transaction records.

use crate::error::{CoreError, CoreResult};
use crate::transaction::{TransactionKind, TransactionRecord};
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Category label for records without one.
pub const UNCATEGORIZED: &str = "uncategorized";

/// A reporting window, resolved against a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// The reference day only.
    Today,
    /// Monday through Sunday of the reference week.
    Week,
    /// The reference calendar month.
    Month,
    /// The reference calendar year.
    Year,
    /// No bounds; includes undated records.
    All,
    /// Inclusive custom bounds.
    Custom {
        /// First day included.
        start: NaiveDate,
        /// Last day included.
        end: NaiveDate,
    },
}

impl DateRange {
    /// Resolves the inclusive `(start, end)` bounds relative to `today`.
    ///
    /// Returns `None` for [`DateRange::All`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if a custom range ends before it starts.
    pub fn bounds(&self, today: NaiveDate) -> CoreResult<Option<(NaiveDate, NaiveDate)>> {
        let bounds = match *self {
            Self::Today => (today, today),
            Self::Week => {
                let from_monday = u64::from(today.weekday().num_days_from_monday());
                let start = today - Days::new(from_monday);
                (start, start + Days::new(6))
            }
            Self::Month => {
                let start = today.with_day(1).unwrap_or(today);
                let end = start
                    .checked_add_months(chrono::Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(today);
                (start, end)
            }
            Self::Year => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
            ),
            Self::All => return Ok(None),
            Self::Custom { start, end } => {
                if start > end {
                    return Err(CoreError::InvalidRange { start, end });
                }
                (start, end)
            }
        };
        Ok(Some(bounds))
    }
}

impl FromStr for DateRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(CoreError::UnknownRange(s.to_string())),
        }
    }
}

/// Totals for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// Sum of sale totals.
    pub sales: f64,
    /// Sum of expense totals.
    pub expenses: f64,
    /// Number of records.
    pub count: usize,
}

/// Aggregated figures for a date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// First day included, if bounded.
    pub start: Option<NaiveDate>,
    /// Last day included, if bounded.
    pub end: Option<NaiveDate>,
    /// Sum of sale totals.
    pub sales_total: f64,
    /// Sum of expense totals.
    pub expense_total: f64,
    /// `sales_total - expense_total`.
    pub net: f64,
    /// Number of sales.
    pub sale_count: usize,
    /// Number of expenses.
    pub expense_count: usize,
    /// Per-category breakdown.
    pub by_category: BTreeMap<String, CategoryTotal>,
}

/// Aggregates the records that fall inside `range`.
///
/// Undated records only count towards [`DateRange::All`].
///
/// # Errors
///
/// Returns `InvalidRange` if a custom range ends before it starts.
pub fn summarize<'a, I>(records: I, range: DateRange, today: NaiveDate) -> CoreResult<Summary>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let bounds = range.bounds(today)?;
    let mut summary = Summary {
        start: bounds.map(|(start, _)| start),
        end: bounds.map(|(_, end)| end),
        ..Summary::default()
    };

    for record in records {
        let included = match (bounds, record.date) {
            (None, _) => true,
            (Some((start, end)), Some(date)) => date >= start && date <= end,
            (Some(_), None) => false,
        };
        if !included {
            continue;
        }

        let category = record
            .category
            .clone()
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let entry = summary.by_category.entry(category).or_default();
        entry.count += 1;

        match record.kind {
            TransactionKind::Sale => {
                summary.sales_total += record.total;
                summary.sale_count += 1;
                entry.sales += record.total;
            }
            TransactionKind::Expense => {
                summary.expense_total += record.total;
                summary.expense_count += 1;
                entry.expenses += record.total;
            }
        }
    }

    summary.net = summary.sales_total - summary.expense_total;
    Ok(summary)
}
