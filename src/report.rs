//! Document layouts.
//!
//! This module decides what goes on the page; [render](crate::render) decides
//! how it is drawn.

use crate::config::ReportConfig;
use crate::errors::{self, Result};
use crate::output;
use crate::record::Record;
use crate::schema::{FieldSchema, ParseRule};
use itertools::Itertools;
use rust_decimal::Decimal;

/// One labelled value of a detail document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailLine {
    pub label: String,
    pub value: String,
}

/// A single-subject document, e.g. a payslip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailDocument {
    pub title: String,
    pub subtitle: String,
    /// One line per schema field, in schema order, absent ones included.
    pub lines: Vec<DetailLine>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub heading: String,
    pub align: Align,
    /// Width in millimetres.
    pub width: f32,
}

/// A multi-subject table with a totals row, e.g. a transfer list.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryTable {
    pub title: String,
    pub subtitle: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub totals: Vec<String>,
    pub footer: Option<String>,
}

/// Lay out one record.
pub fn detail(record: &Record, config: &ReportConfig) -> DetailDocument {
    let subtitle = match (record.identity(), record.period()) {
        (Some(who), Some(when)) => format!("{} {}分", who, output::pretty_period(&when)),
        (Some(who), None) => who.to_owned(),
        (None, Some(when)) => format!("{}分", output::pretty_period(&when)),
        (None, None) => config.placeholder.clone(),
    };
    let lines = record
        .fields()
        .map(|(field, value)| DetailLine {
            label: field.label.clone(),
            value: output::format_value(field, value, &config.currency, &config.placeholder),
        })
        .collect_vec();
    DetailDocument {
        title: config.payslip_title.clone(),
        subtitle,
        lines,
    }
}

const NUMBER_WIDTH: f32 = 40.0;
const TEXT_WIDTH: f32 = 50.0;
const INDEX_WIDTH: f32 = 15.0;

/// Lay out a table of records: a running number, the configured columns in
/// their configured order, and a totals row.
///
/// Absent numeric values print as the placeholder and add nothing to the
/// totals. With no records the table has just the totals row, all zeros. A
/// total beyond the range of [Decimal] is a
/// [RenderFailure](errors::RenderFailure).
pub fn summary(
    records: &[&Record],
    schema: &FieldSchema,
    config: &ReportConfig,
    subtitle: &str,
) -> Result<SummaryTable> {
    let fields = config.summary_fields(schema)?;
    let mut columns = vec![Column {
        heading: "No.".to_owned(),
        align: Align::Center,
        width: INDEX_WIDTH,
    }];
    columns.extend(fields.iter().map(|f| Column {
        heading: f.label.clone(),
        align: if f.is_numeric() {
            Align::Right
        } else {
            Align::Left
        },
        width: if f.is_numeric() {
            NUMBER_WIDTH
        } else {
            TEXT_WIDTH
        },
    }));

    let mut sums = vec![Decimal::ZERO; fields.len()];
    let mut rows = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let mut row = vec![(i + 1).to_string()];
        for (j, field) in fields.iter().enumerate() {
            let value = record.get(&field.name);
            if let Some(x) = value.and_then(|v| v.as_decimal()) {
                sums[j] = sums[j].checked_add(x).ok_or_else(|| {
                    errors::render_failure(format!("total of '{}' overflows", field.name))
                })?;
            }
            row.push(output::format_value(
                field,
                value,
                &config.currency,
                &config.placeholder,
            ));
        }
        rows.push(row);
    }

    let mut totals = vec![config.totals_label.clone()];
    for (j, field) in fields.iter().enumerate() {
        totals.push(match field.rule {
            ParseRule::Money => output::format_money(sums[j], field.decimals, &config.currency),
            ParseRule::Count => sums[j].to_string(),
            _ if field.name == schema.identity() => {
                format!("{}{}", records.len(), config.head_count_suffix)
            }
            _ => String::new(),
        });
    }

    Ok(SummaryTable {
        title: config.summary_title.clone(),
        subtitle: subtitle.to_owned(),
        columns,
        rows,
        totals,
        footer: None,
    })
}
