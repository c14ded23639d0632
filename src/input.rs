//! Raw tabular input.
//!
//! Spreadsheet parsing is kept behind [TableSource]: the rest of the crate
//! only ever sees physical rows of [Cell] values, row 1 first, column 1 first.

use crate::errors::{self, Result};
use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use std::path::{Path, PathBuf};

/// One raw cell as delivered by the spreadsheet reader.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl Cell {
    /// Empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Cell {
        Cell::Text(s.to_owned())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Cell {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Cell {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Cell {
        Cell::Float(f)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Cell {
        Cell::DateTime(dt)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Cell {
        Cell::DateTime(d.and_time(chrono::NaiveTime::MIN))
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Cell {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) => match parse_iso(s) {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Text(s.clone()),
            },
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Error(format!("{e:?}")),
        }
    }
}

/// Anything that can hand over a table of raw cells.
pub trait TableSource {
    /// Human-readable name for log messages and errors.
    fn name(&self) -> String;

    /// All physical rows, including header rows and blank rows.
    ///
    /// Fails with [SourceUnavailable](errors::SourceUnavailable) if the
    /// source cannot be opened or read.
    fn read_rows(&self) -> Result<Vec<Vec<Cell>>>;
}

/// A worksheet in an Excel or OpenDocument file on disk.
pub struct Workbook {
    path: PathBuf,
    sheet: Option<String>,
}

impl Workbook {
    /// Read `sheet` from the file at `path`, or the first sheet if `None`.
    pub fn new(path: impl AsRef<Path>, sheet: Option<&str>) -> Workbook {
        Workbook {
            path: path.as_ref().to_owned(),
            sheet: sheet.map(str::to_owned),
        }
    }
}

impl TableSource for Workbook {
    fn name(&self) -> String {
        match &self.sheet {
            None => self.path.display().to_string(),
            Some(sheet) => format!("{} [{}]", self.path.display(), sheet),
        }
    }

    fn read_rows(&self) -> Result<Vec<Vec<Cell>>> {
        let unavailable = |e: &dyn std::fmt::Display| {
            errors::source_unavailable(format!("{}: {e}", self.name()))
        };
        let mut workbook = open_workbook_auto(&self.path).map_err(|e| unavailable(&e))?;
        let sheet = match &self.sheet {
            Some(sheet) => sheet.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| unavailable(&"workbook has no sheets"))?,
        };
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| unavailable(&e))?;
        debug!(
            target: "kyuyo",
            "{}: sheet '{}', {} rows",
            self.path.display(),
            sheet,
            range.height()
        );
        Ok(anchored_rows(&range))
    }
}

/// Calamine trims leading empty rows and columns off a range; put them back
/// so that positions are counted from cell A1.
fn anchored_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let Some((top, left)) = range.start() else {
        return Vec::new();
    };
    let mut rows = vec![Vec::new(); top as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; left as usize];
        cells.extend(row.iter().map(Cell::from));
        rows.push(cells);
    }
    rows
}

/// An in-memory table, for tests and for data that arrives by other means.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl MemoryTable {
    pub fn new(name: &str, rows: Vec<Vec<Cell>>) -> MemoryTable {
        MemoryTable {
            name: name.to_owned(),
            rows,
        }
    }
}

impl TableSource for MemoryTable {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_rows(&self) -> Result<Vec<Vec<Cell>>> {
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::from("  ").is_blank());
        assert!(!Cell::from("x").is_blank());
        assert!(!Cell::Int(0).is_blank());
    }

    #[test]
    fn anchored_range_keeps_positions() {
        let mut range: Range<Data> = Range::new((1, 2), (2, 3));
        range.set_value((1, 2), Data::String("a".to_owned()));
        range.set_value((2, 3), Data::Int(7));
        let rows = anchored_rows(&range);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1][2], Cell::from("a"));
        assert_eq!(rows[2][3], Cell::Int(7));
        assert_eq!(rows[2][0], Cell::Empty);
    }

    #[test]
    fn iso_datetime_cells() {
        let cell = Cell::from(&Data::DateTimeIso("2025-04-25".to_owned()));
        let expected = NaiveDate::from_ymd_opt(2025, 4, 25).unwrap();
        assert_eq!(cell, Cell::from(expected));
    }

    #[test]
    fn missing_workbook_is_unavailable() {
        let source = Workbook::new("/nonexistent/payroll.xlsx", None);
        let e = source.read_rows().unwrap_err();
        assert!(errors::is_source_unavailable(&*e));
    }
}
