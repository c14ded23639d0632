//! Field schemas: which column holds which field, and how to parse it.

use crate::errors::{self, Result};
use crate::input::Cell;
use crate::record::{Record, Value};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

/// How to turn a raw cell into a [Value].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseRule {
    Money,
    Date,
    Count,
    Text,
}

/// One field of a schema.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldDef {
    /// Stable field name, e.g. `total_pay`.
    pub name: String,
    /// Column position, counting from 1.
    pub column: usize,
    pub rule: ParseRule,
    /// Label printed in documents. Defaults to the name.
    #[serde(default)]
    pub label: String,
    /// Decimal places shown for money fields.
    #[serde(default)]
    pub decimals: u32,
}

impl FieldDef {
    pub fn new(name: &str, column: usize, rule: ParseRule, label: &str) -> FieldDef {
        FieldDef {
            name: name.to_owned(),
            column,
            rule,
            label: label.to_owned(),
            decimals: 0,
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> FieldDef {
        self.decimals = decimals;
        self
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.rule, ParseRule::Money | ParseRule::Count)
    }
}

fn default_version() -> String {
    "1".to_owned()
}

fn default_header_rows() -> usize {
    1
}

/// The serialized form of a [FieldSchema], before validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchemaDecl {
    #[serde(default = "default_version")]
    pub version: String,
    /// Worksheet to read; the first one if not given.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Leading rows that hold headings rather than data.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    /// Text field that identifies the person.
    pub identity: String,
    /// Date field whose calendar month is the period.
    pub period: String,
    /// Numeric field summed by
    /// [RecordRepository::aggregate](crate::repository::RecordRepository::aggregate).
    pub aggregate: String,
    pub fields: Vec<FieldDef>,
}

/// A validated field schema.
///
/// Field names are unique, column positions are unique, and the identity,
/// period and aggregate fields exist with suitable parsing rules.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "SchemaDecl", into = "SchemaDecl")]
pub struct FieldSchema {
    decl: SchemaDecl,
    positions: HashMap<String, usize>,
}

impl TryFrom<SchemaDecl> for FieldSchema {
    type Error = Box<dyn std::error::Error>;

    fn try_from(decl: SchemaDecl) -> Result<FieldSchema> {
        FieldSchema::new(decl)
    }
}

impl From<FieldSchema> for SchemaDecl {
    fn from(schema: FieldSchema) -> SchemaDecl {
        schema.decl
    }
}

impl FieldSchema {
    pub fn new(mut decl: SchemaDecl) -> Result<FieldSchema> {
        if decl.fields.is_empty() {
            return Err(errors::invalid_schema_ref("no fields"));
        }
        let mut positions = HashMap::new();
        let mut columns = HashSet::new();
        for (i, field) in decl.fields.iter_mut().enumerate() {
            if field.column == 0 {
                return Err(errors::invalid_schema(format!(
                    "field '{}': columns count from 1",
                    field.name
                )));
            }
            if !columns.insert(field.column) {
                return Err(errors::invalid_schema(format!(
                    "field '{}': column {} is already taken",
                    field.name, field.column
                )));
            }
            if positions.insert(field.name.clone(), i).is_some() {
                return Err(errors::invalid_schema(format!(
                    "field '{}' is declared twice",
                    field.name
                )));
            }
            if field.label.is_empty() {
                field.label = field.name.clone();
            }
        }
        let schema = FieldSchema { decl, positions };
        schema.check_role("identity", &schema.decl.identity, |r| r == ParseRule::Text)?;
        schema.check_role("period", &schema.decl.period, |r| r == ParseRule::Date)?;
        schema.check_role("aggregate", &schema.decl.aggregate, |r| {
            matches!(r, ParseRule::Money | ParseRule::Count)
        })?;
        Ok(schema)
    }

    fn check_role(&self, role: &str, name: &str, ok: impl Fn(ParseRule) -> bool) -> Result<()> {
        match self.field(name) {
            None => Err(errors::invalid_schema(format!(
                "{role} field '{name}' is not declared"
            ))),
            Some(f) if !ok(f.rule) => Err(errors::invalid_schema(format!(
                "{role} field '{name}' cannot be parsed as {:?}",
                f.rule
            ))),
            Some(_) => Ok(()),
        }
    }

    /// The built-in layout of the payroll workbook.
    pub fn payroll() -> FieldSchema {
        use ParseRule::*;
        let fields = vec![
            FieldDef::new("payment_date", 1, Date, "支給日"),
            FieldDef::new("employee_id", 2, Text, "社員番号"),
            FieldDef::new("employee_name", 3, Text, "氏名"),
            FieldDef::new("total_pay", 4, Money, "総支給額"),
            FieldDef::new("standard_remuneration", 5, Money, "標準報酬月額"),
            FieldDef::new("health_insurance", 6, Money, "健康保険"),
            FieldDef::new("pension", 7, Money, "厚生年金"),
            FieldDef::new("health_insurance_employee", 8, Money, "健康保険料(従業員)"),
            FieldDef::new("pension_employee", 9, Money, "厚生年金(従業員)"),
            FieldDef::new("social_insurance_deduction", 10, Money, "社会保険料控除額"),
            FieldDef::new("after_social_insurance", 11, Money, "社会保険料控除後"),
            FieldDef::new("dependents", 12, Count, "扶養親族等の数"),
            FieldDef::new("income_tax", 13, Money, "源泉所得税"),
            FieldDef::new("health_insurance_company", 17, Money, "健康保険料(会社負担)")
                .with_decimals(2),
            FieldDef::new("pension_company", 18, Money, "厚生年金(会社負担)").with_decimals(2),
            FieldDef::new("rent_deduction", 19, Money, "賃料控除"),
            FieldDef::new("parking_deduction", 20, Money, "駐車場控除"),
            FieldDef::new("transfer_amount", 21, Money, "振込金額"),
        ];
        let decl = SchemaDecl {
            version: "payroll-2025".to_owned(),
            sheet: None,
            header_rows: 1,
            identity: "employee_name".to_owned(),
            period: "payment_date".to_owned(),
            aggregate: "total_pay".to_owned(),
            fields,
        };
        FieldSchema::new(decl).expect("built-in payroll schema is valid")
    }

    pub fn version(&self) -> &str {
        &self.decl.version
    }

    pub fn sheet(&self) -> Option<&str> {
        self.decl.sheet.as_deref()
    }

    pub fn header_rows(&self) -> usize {
        self.decl.header_rows
    }

    pub fn identity(&self) -> &str {
        &self.decl.identity
    }

    pub fn period(&self) -> &str {
        &self.decl.period
    }

    pub fn aggregate(&self) -> &str {
        &self.decl.aggregate
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.decl.fields
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.position(name).map(|i| &self.decl.fields[i])
    }

    /// The rightmost column any field reads from.
    pub fn width(&self) -> usize {
        self.decl.fields.iter().map(|f| f.column).max().unwrap_or(0)
    }

    /// Parse one row of raw cells. `row` is the source row number, used for
    /// diagnostics only.
    ///
    /// Never fails: a cell that is missing, or that does not satisfy its
    /// field's rule, becomes an absent value.
    pub fn parse_row(self: &Arc<Self>, row: usize, raw: &[Cell]) -> Record {
        let values = self
            .decl
            .fields
            .iter()
            .map(|f| raw.get(f.column - 1).and_then(|c| parse_cell(f.rule, c)))
            .collect();
        let beyond = self
            .decl
            .fields
            .iter()
            .filter(|f| f.column > raw.len())
            .count();
        if beyond > 0 {
            debug!(
                target: "kyuyo",
                "row {row}: {beyond} of {} fields lie beyond the {} cells present",
                self.decl.fields.len(),
                raw.len()
            );
        }
        Record::new(Arc::clone(self), values, row)
    }
}

/// Apply `rule` to one raw cell.
pub fn parse_cell(rule: ParseRule, cell: &Cell) -> Option<Value> {
    match rule {
        ParseRule::Money => parse_money(cell).map(Value::Money),
        ParseRule::Date => parse_date(cell).map(Value::Date),
        ParseRule::Count => parse_count(cell).map(Value::Count),
        ParseRule::Text => parse_text(cell).map(Value::Text),
    }
}

const MONEY_NOISE: &[char] = &[',', '，', '¥', '￥', '円', '$'];

fn parse_money(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Int(i) => Some(Decimal::from(*i)),
        // The shortest round-trip representation is what the sheet displays.
        Cell::Float(f) => Decimal::from_str(&f.to_string()).ok(),
        Cell::Text(s) => {
            let clean: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && !MONEY_NOISE.contains(c))
                .collect();
            Decimal::from_str(&clean).ok()
        }
        _ => None,
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    DATETIME_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|dt| dt.date())
                })
        }
        _ => None,
    }
}

/// Floats beyond this are not exactly integral in an f64 anyway.
const MAX_EXACT_FLOAT: f64 = 9.0e15;

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_count(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(i) => Some(*i),
        Cell::Float(f) => integral(*f),
        Cell::Text(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn parse_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_owned())
            }
        }
        Cell::Int(i) => Some(i.to_string()),
        Cell::Float(f) => match integral(*f) {
            Some(i) => Some(i.to_string()),
            None => Some(f.to_string()),
        },
        Cell::Bool(b) => Some(b.to_string()),
        Cell::DateTime(dt) => Some(dt.date().to_string()),
        Cell::Empty | Cell::Error(_) => None,
    }
}
