//! Display formatting for documents, logs and error reports.

use crate::record::{Value, YearMonth};
use crate::schema::FieldDef;
use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;

/// An error report, as written by `--error-file`.
#[derive(Serialize)]
pub struct OError {
    pub error: String,
}

/// Group the integer part in threes: `1234567.5` becomes `1,234,567.5`.
fn group_thousands(digits: &str) -> String {
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}

/// Money with `decimals` places, thousands separators and a currency suffix.
///
/// Rounds half to even, as the payroll sheets do.
pub fn format_money(amount: Decimal, decimals: u32, currency: &str) -> String {
    let rounded = amount.round_dp(decimals);
    let digits = format!("{:.*}", decimals as usize, rounded.abs());
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{}{currency}", group_thousands(&digits))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y年%m月%d日").to_string()
}

/// One field's value as printed in a document.
pub fn format_value(
    field: &FieldDef,
    value: Option<&Value>,
    currency: &str,
    placeholder: &str,
) -> String {
    match value {
        None => placeholder.to_owned(),
        Some(Value::Money(m)) => format_money(*m, field.decimals, currency),
        Some(Value::Count(c)) => c.to_string(),
        Some(Value::Date(d)) => format_date(*d),
        Some(Value::Text(s)) => s.clone(),
    }
}

pub fn pretty_period(p: &YearMonth) -> String {
    format!("{}年{}月", p.year, p.month)
}

pub fn pretty_periods(periods: &[YearMonth]) -> String {
    if periods.len() >= 5 {
        pretty_periods(&periods[0..2]) + ", ..., " + &periods[periods.len() - 1].to_string()
    } else {
        periods.iter().map(YearMonth::to_string).collect_vec().join(", ")
    }
}
