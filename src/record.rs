//! Parsed records and the values they hold.

use crate::errors::{self, Result};
use crate::schema::{FieldDef, FieldSchema};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A parsed cell value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Money(Decimal),
    Date(NaiveDate),
    Count(i64),
    Text(String),
}

impl Value {
    /// Numeric values as exact decimals.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Money(m) => Some(*m),
            Value::Count(c) => Some(Decimal::from(*c)),
            _ => None,
        }
    }
}

/// A calendar month, the period key of the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// `None` unless `1 <= month <= 12`.
    pub fn new(year: i32, month: u32) -> Option<YearMonth> {
        if (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> YearMonth {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Box<dyn std::error::Error>;

    /// Accepts `2025-04`, `2025/4` and `2025年4月`.
    fn from_str(s: &str) -> Result<YearMonth> {
        let bad = || errors::invalid_argument(format!("expected a month like 2025-04, got '{s}'"));
        let t = s.trim().trim_end_matches('月');
        let (y, m) = t
            .split_once(['-', '/', '年'])
            .ok_or_else(bad)?;
        let year: i32 = y.trim().parse().map_err(|_| bad())?;
        let month: u32 = m.trim().parse().map_err(|_| bad())?;
        YearMonth::new(year, month).ok_or_else(bad)
    }
}

/// One parsed row.
///
/// Values are stored in schema order; a `None` means the cell was missing or
/// did not satisfy the field's parsing rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    schema: Arc<FieldSchema>,
    values: Vec<Option<Value>>,
    row: usize,
}

impl Record {
    pub(crate) fn new(schema: Arc<FieldSchema>, values: Vec<Option<Value>>, row: usize) -> Record {
        debug_assert_eq!(schema.fields().len(), values.len());
        Record {
            schema,
            values,
            row,
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Row number in the source, counting from 1.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let i = self.schema.position(name)?;
        self.values[i].as_ref()
    }

    pub fn money(&self, name: &str) -> Option<Decimal> {
        match self.get(name) {
            Some(Value::Money(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn count(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Count(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.get(name) {
            Some(Value::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&str> {
        self.text(self.schema.identity())
    }

    pub fn period(&self) -> Option<YearMonth> {
        self.date(self.schema.period()).map(YearMonth::of)
    }

    /// Every field with its value, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDef, Option<&Value>)> {
        self.schema
            .fields()
            .iter()
            .zip(self.values.iter().map(Option::as_ref))
    }

    /// Number of fields that are absent.
    pub fn absent_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn year_month_parse() {
        let ym = YearMonth::new(2025, 4).unwrap();
        assert_eq!("2025-04".parse::<YearMonth>().unwrap(), ym);
        assert_eq!("2025/4".parse::<YearMonth>().unwrap(), ym);
        assert_eq!("2025年4月".parse::<YearMonth>().unwrap(), ym);
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("April".parse::<YearMonth>().is_err());
    }

    #[test]
    fn year_month_order_and_display() {
        let a = YearMonth::new(2024, 12).unwrap();
        let b = YearMonth::new(2025, 1).unwrap();
        assert!(a < b);
        assert_eq!(b.to_string(), "2025-01");
    }

    #[test]
    fn count_as_decimal() {
        assert_eq!(Value::Count(3).as_decimal(), Some(Decimal::from(3)));
        assert_eq!(Value::Text("3".to_owned()).as_decimal(), None);
    }
}
