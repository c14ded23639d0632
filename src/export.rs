//! Exporting loaded records as JSON or as a clean XLSX sheet.

use crate::errors::{self, Result};
use crate::record::{Record, Value};
use crate::repository::RecordRepository;
use chrono::Datelike;
use log::info;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Write;
use std::path::Path;

/// One record as a JSON object, keys in schema order.
struct JsonRecord<'a>(&'a Record);

fn json_value(value: Option<&Value>) -> serde_json::Value {
    match value {
        None => serde_json::Value::Null,
        Some(Value::Money(m)) => serde_json::Value::String(m.to_string()),
        Some(Value::Date(d)) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        Some(Value::Count(c)) => serde_json::Value::from(*c),
        Some(Value::Text(s)) => serde_json::Value::String(s.clone()),
    }
}

impl Serialize for JsonRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.schema().fields().len()))?;
        for (field, value) in self.0.fields() {
            map.serialize_entry(&field.name, &json_value(value))?;
        }
        map.end()
    }
}

/// Every record, in load order, as a JSON array.
pub fn to_json(repo: &RecordRepository, writer: impl Write) -> Result<()> {
    let records: Vec<JsonRecord> = repo.records().iter().map(JsonRecord).collect();
    serde_json::to_writer_pretty(writer, &records)?;
    info!(target: "kyuyo", "exported {} records as JSON", records.len());
    Ok(())
}

/// Every record, in load order, as one worksheet with a header row of labels.
///
/// Money goes through `f64` here, as XLSX has no other number type.
pub fn to_xlsx(repo: &RecordRepository, path: &Path) -> Result<()> {
    let schema = repo.schema();
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let sheet = workbook.add_worksheet().set_name("records")?;
    for (col, field) in schema.fields().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, &field.label, &header)?;
    }
    for (i, record) in repo.records().iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, (field, value)) in record.fields().enumerate() {
            let col = col as u16;
            match value {
                None => {}
                Some(Value::Money(m)) => {
                    let x = m.to_f64().ok_or_else(|| {
                        let name = &field.name;
                        errors::invalid_argument(format!("{name}: {m} does not fit a number cell"))
                    })?;
                    sheet.write_number(row, col, x)?;
                }
                Some(Value::Count(c)) => {
                    sheet.write_number(row, col, *c as f64)?;
                }
                Some(Value::Date(d)) => {
                    let dt =
                        ExcelDateTime::from_ymd(d.year() as u16, d.month() as u8, d.day() as u8)?;
                    sheet.write_datetime_with_format(row, col, &dt, &date_format)?;
                }
                Some(Value::Text(s)) => {
                    sheet.write_string(row, col, s)?;
                }
            }
        }
    }
    workbook.save(path)?;
    info!(target: "kyuyo", "exported {} records to {}", repo.len(), path.display());
    Ok(())
}
