//! Configuration: the field schema plus document settings, read from an
//! optional JSON file. Anything left out takes the built-in payroll defaults.

use crate::errors::{self, Result};
use crate::fonts;
use crate::schema::{FieldDef, FieldSchema};
use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when a document would overwrite an existing file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Delete the old file first.
    Replace,
    /// Keep the old file and write `name_1.pdf`, `name_2.pdf`, ...
    Suffix,
}

/// Settings for the generated documents.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub payslip_title: String,
    pub summary_title: String,
    /// File name prefix of payslips.
    pub payslip_prefix: String,
    /// File name prefix of transfer lists.
    pub summary_prefix: String,
    /// Printed in place of absent values.
    pub placeholder: String,
    pub currency: String,
    pub totals_label: String,
    /// Appended to the head count in the totals row.
    pub head_count_suffix: String,
    /// Fields of the summary table, in order. An explicit empty list means the
    /// identity field followed by every numeric field.
    pub summary_columns: Vec<String>,
    pub collision: CollisionPolicy,
    /// Font files to try, in order.
    pub fonts: Vec<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> ReportConfig {
        ReportConfig {
            payslip_title: "給与明細書".to_owned(),
            summary_title: "振込金額一覧".to_owned(),
            payslip_prefix: "給与明細".to_owned(),
            summary_prefix: "振込金額一覧".to_owned(),
            placeholder: "N/A".to_owned(),
            currency: "円".to_owned(),
            totals_label: "合計".to_owned(),
            head_count_suffix: "名".to_owned(),
            summary_columns: [
                "employee_name",
                "transfer_amount",
                "health_insurance_company",
                "pension_company",
                "income_tax",
            ]
            .map(str::to_owned)
            .to_vec(),
            collision: CollisionPolicy::Replace,
            fonts: fonts::default_candidates(),
        }
    }
}

impl ReportConfig {
    /// The fields of the summary table.
    pub fn summary_fields<'a>(&self, schema: &'a FieldSchema) -> Result<Vec<&'a FieldDef>> {
        if self.summary_columns.is_empty() {
            let identity = schema.field(schema.identity()).into_iter();
            let numeric = schema.fields().iter().filter(|f| f.is_numeric());
            return Ok(identity.chain(numeric).collect());
        }
        self.summary_columns
            .iter()
            .map(|name| {
                schema.field(name).ok_or_else(|| {
                    errors::invalid_schema(format!("summary column '{name}' is not a field"))
                })
            })
            .collect()
    }
}

/// Everything a run needs to know besides the input file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "FieldSchema::payroll")]
    pub schema: FieldSchema,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            schema: FieldSchema::payroll(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Read a JSON configuration file, or the defaults if `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config = match path {
            None => Config::default(),
            Some(path) => {
                info!(target: "kyuyo", "config: {}", path.display());
                let data = fs::read_to_string(path)?;
                serde_json::from_str(&data)
                    .map_err(|e| errors::invalid_schema(format!("{}: {e}", path.display())))?
            }
        };
        config.report.summary_fields(&config.schema)?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    fn summary_names(config: &Config) -> Vec<&str> {
        config
            .report
            .summary_fields(&config.schema)
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect_vec()
    }

    #[test]
    fn default_summary_columns() {
        let config = Config::default();
        assert_eq!(
            summary_names(&config),
            [
                "employee_name",
                "transfer_amount",
                "health_insurance_company",
                "pension_company",
                "income_tax"
            ]
        );
    }

    #[test]
    fn derived_summary_columns() {
        let schema = FieldSchema::payroll();
        let report = ReportConfig {
            summary_columns: Vec::new(),
            ..ReportConfig::default()
        };
        let fields = report.summary_fields(&schema).unwrap();
        assert_eq!(fields[0].name, "employee_name");
        assert!(fields[1..].iter().all(|f| f.is_numeric()));
        assert_eq!(fields.len(), 1 + 15);
    }

    #[test]
    fn unknown_summary_column() {
        let report = ReportConfig {
            summary_columns: vec!["bonus".to_owned()],
            ..ReportConfig::default()
        };
        assert!(report.summary_fields(&FieldSchema::payroll()).is_err());
    }

    #[test]
    fn partial_json() {
        let json = r#"{"report": {"placeholder": "-", "collision": "suffix"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.schema, FieldSchema::payroll());
        assert_eq!(config.report.placeholder, "-");
        assert_eq!(config.report.collision, CollisionPolicy::Suffix);
        assert_eq!(config.report.currency, "円");
        assert_eq!(config.report.summary_columns.len(), 5);
    }

    #[test]
    fn json_defaults_match_builtin() {
        let defaults = Config::default();
        for json in ["{}", r#"{"report": {}}"#] {
            let config: Config = serde_json::from_str(json).unwrap();
            assert_eq!(config, defaults);
            assert_eq!(summary_names(&config), summary_names(&defaults));
        }
    }
}
