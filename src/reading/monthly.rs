//! Monthly totals derived from the daily series.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

use super::DailyRow;

/// Precipitation summed over one calendar month for one province, dated at
/// the last day of the month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    #[serde(rename = "Province")]
    pub province: String,
    #[serde(rename = "DPA_PROVIN")]
    pub dpa_provin: String,
    pub monthly_total_precipitation: f64,
    pub date: NaiveDate,
}

/// Groups daily rows by (calendar month, province name, province code) and
/// sums the value column. Output is ordered by month, then province, so
/// re-runs over unchanged input are byte-identical.
pub fn aggregate_monthly(rows: &[DailyRow]) -> Result<Vec<MonthlyTotal>> {
    let mut groups: BTreeMap<(i32, u32, String, String), f64> = BTreeMap::new();

    for row in rows {
        let date = NaiveDate::parse_from_str(row.date.trim(), "%m/%d/%Y")
            .with_context(|| format!("unparseable date `{}`", row.date))?;
        let key = (
            date.year(),
            date.month(),
            row.province.clone(),
            row.dpa_provin.clone(),
        );
        *groups.entry(key).or_insert(0.0) += row.avg;
    }

    let totals = groups
        .into_iter()
        .map(|((year, month, province, dpa_provin), total)| MonthlyTotal {
            province,
            dpa_provin,
            monthly_total_precipitation: total,
            date: last_day_of_month(year, month),
        })
        .collect();

    Ok(totals)
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .checked_add_months(Months::new(1))
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

// -- Tests -------------------------------------------------------------------
