//! The in-memory record repository and its indexes.

use crate::errors::Result;
use crate::input::TableSource;
use crate::record::{Record, YearMonth};
use crate::schema::FieldSchema;
use itertools::Itertools;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// All records loaded through one schema, with lookups by person and month.
///
/// Loading needs `&mut self`; once loading is done the repository can be
/// shared read-only.
#[derive(Debug)]
pub struct RecordRepository {
    schema: Arc<FieldSchema>,
    records: Vec<Record>,
    by_identity: HashMap<String, Vec<usize>>,
    by_key: HashMap<(String, YearMonth), usize>,
}

impl RecordRepository {
    pub fn new(schema: FieldSchema) -> RecordRepository {
        RecordRepository {
            schema: Arc::new(schema),
            records: Vec::new(),
            by_identity: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Read every data row of `source` and append it.
    ///
    /// Header rows and blank rows are skipped. Rows with unparsable cells are
    /// kept, with those fields absent. Returns the number of records added.
    pub fn load(&mut self, source: &dyn TableSource) -> Result<usize> {
        info!(target: "kyuyo", "read: {}", source.name());
        let rows = source.read_rows()?;
        let before = self.records.len();
        let mut blank = 0;
        for (i, row) in rows.iter().enumerate().skip(self.schema.header_rows()) {
            if row.iter().all(|c| c.is_blank()) {
                blank += 1;
                continue;
            }
            let record = self.schema.parse_row(i + 1, row);
            self.insert(record);
        }
        let added = self.records.len() - before;
        let partial = self.records[before..]
            .iter()
            .filter(|r| r.absent_count() > 0)
            .count();
        info!(
            target: "kyuyo",
            "{}: {} records, {} with absent fields, {} blank rows skipped",
            source.name(),
            added,
            partial,
            blank
        );
        Ok(added)
    }

    fn insert(&mut self, record: Record) {
        let index = self.records.len();
        if let Some(identity) = record.identity() {
            self.by_identity
                .entry(identity.to_owned())
                .or_default()
                .push(index);
            match record.period() {
                Some(period) => match self.by_key.entry((identity.to_owned(), period)) {
                    Vacant(e) => {
                        e.insert(index);
                    }
                    Occupied(e) => {
                        warn!(
                            target: "kyuyo",
                            "row {}: duplicate record for {} {}, keeping row {}",
                            record.row(),
                            identity,
                            period,
                            self.records[*e.get()].row()
                        );
                    }
                },
                None => debug!(target: "kyuyo", "row {}: no period", record.row()),
            }
        } else {
            debug!(target: "kyuyo", "row {}: no identity", record.row());
        }
        self.records.push(record);
    }

    /// All records, in load order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_identity.clear();
        self.by_key.clear();
    }

    /// Records of one person, in load order.
    pub fn by_identity(&self, identity: &str) -> Vec<&Record> {
        match self.by_identity.get(identity) {
            None => Vec::new(),
            Some(indexes) => indexes.iter().map(|&i| &self.records[i]).collect_vec(),
        }
    }

    /// The record of one person for one month.
    ///
    /// If the source had several, this is the one loaded first.
    pub fn find(&self, identity: &str, period: YearMonth) -> Option<&Record> {
        self.by_key
            .get(&(identity.to_owned(), period))
            .map(|&i| &self.records[i])
    }

    /// Records of one month, in load order, including later duplicates.
    pub fn by_period(&self, period: YearMonth) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.period() == Some(period))
            .collect_vec()
    }

    pub fn identities(&self) -> BTreeSet<&str> {
        self.by_identity.keys().map(String::as_str).collect()
    }

    /// Distinct periods, ascending.
    pub fn periods(&self) -> Vec<YearMonth> {
        self.records
            .iter()
            .filter_map(Record::period)
            .sorted()
            .dedup()
            .collect_vec()
    }

    /// Distinct periods of one person, ascending.
    pub fn periods_of(&self, identity: &str) -> Vec<YearMonth> {
        self.by_identity(identity)
            .into_iter()
            .filter_map(Record::period)
            .sorted()
            .dedup()
            .collect_vec()
    }

    /// Sum of the schema's aggregate field over one person's records.
    ///
    /// `None` if no record of that person has the field, which is not the
    /// same as a sum of zero.
    pub fn aggregate(&self, identity: &str) -> Option<Decimal> {
        self.aggregate_field(identity, self.schema.aggregate())
    }

    /// Sum of any numeric field over one person's records. A sum beyond the
    /// range of [Decimal] is absent.
    pub fn aggregate_field(&self, identity: &str, field: &str) -> Option<Decimal> {
        let mut values = self
            .by_identity(identity)
            .into_iter()
            .filter_map(|r| r.get(field).and_then(|v| v.as_decimal()));
        let first = values.next()?;
        let total = values.try_fold(first, |a, b| a.checked_add(b));
        if total.is_none() {
            warn!(target: "kyuyo", "{identity}: total of '{field}' overflows");
        }
        total
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors;
    use crate::input::{Cell, MemoryTable, Workbook};
    use crate::schema::{FieldDef, ParseRule, SchemaDecl};
    use std::str::FromStr;

    fn t(s: &str) -> Cell {
        Cell::from(s)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ym(month: u32) -> YearMonth {
        YearMonth::new(2025, month).unwrap()
    }

    fn schema() -> FieldSchema {
        let mut fields = vec![
            FieldDef::new("name", 1, ParseRule::Text, ""),
            FieldDef::new("date", 2, ParseRule::Date, ""),
            FieldDef::new("pay", 3, ParseRule::Money, ""),
        ];
        for i in 4..=10 {
            fields.push(FieldDef::new(&format!("f{i}"), i, ParseRule::Money, ""));
        }
        FieldSchema::new(SchemaDecl {
            version: "test".to_owned(),
            sheet: None,
            header_rows: 1,
            identity: "name".to_owned(),
            period: "date".to_owned(),
            aggregate: "pay".to_owned(),
            fields,
        })
        .unwrap()
    }

    fn header() -> Vec<Cell> {
        vec![t("name"), t("date"), t("pay")]
    }

    fn row(name: &str, month: u32, pay: &str) -> Vec<Cell> {
        vec![t(name), t(&format!("2025-{month:02}-25")), t(pay)]
    }

    fn table(rows: Vec<Vec<Cell>>) -> MemoryTable {
        let mut all = vec![header()];
        all.extend(rows);
        MemoryTable::new("test", all)
    }

    fn alice() -> MemoryTable {
        table(vec![
            row("Alice", 1, "1000.00"),
            row("Alice", 2, "2000.00"),
            row("Alice", 3, "1500.00"),
        ])
    }

    #[test]
    fn aggregate_and_periods() {
        let mut repo = RecordRepository::new(schema());
        assert_eq!(repo.load(&alice()).unwrap(), 3);
        assert_eq!(repo.aggregate("Alice"), Some(d("4500.00")));
        assert_eq!(repo.periods(), vec![ym(1), ym(2), ym(3)]);
        assert_eq!(repo.identities().into_iter().collect_vec(), vec!["Alice"]);
    }

    #[test]
    fn aggregate_without_data_is_absent() {
        let mut repo = RecordRepository::new(schema());
        repo.load(&alice()).unwrap();
        assert_eq!(repo.aggregate("Nobody"), None);

        let mut repo = RecordRepository::new(schema());
        repo.load(&table(vec![row("Carol", 1, "n/a")])).unwrap();
        assert_eq!(repo.aggregate("Carol"), None);

        let mut repo = RecordRepository::new(schema());
        repo.load(&table(vec![row("Dave", 1, "0")])).unwrap();
        assert_eq!(repo.aggregate("Dave"), Some(Decimal::ZERO));
    }

    #[test]
    fn aggregate_overflow_is_absent() {
        let huge = "70000000000000000000000000000";
        let mut repo = RecordRepository::new(schema());
        repo.load(&table(vec![row("Eve", 1, huge), row("Eve", 2, huge)]))
            .unwrap();
        assert_eq!(repo.by_identity("Eve").len(), 2);
        assert_eq!(repo.aggregate("Eve"), None);
    }

    #[test]
    fn duplicates_first_wins() {
        let mut repo = RecordRepository::new(schema());
        repo.load(&table(vec![
            row("Bob", 4, "100"),
            row("Bob", 4, "200"),
            row("Bob", 5, "300"),
        ]))
        .unwrap();
        let found = repo.find("Bob", ym(4)).unwrap();
        assert_eq!(found.money("pay"), Some(d("100")));
        assert_eq!(found.row(), 2);
        let all = repo.by_identity("Bob");
        assert_eq!(all.len(), 3);
        assert_eq!(
            all.iter().map(|r| r.money("pay").unwrap()).collect_vec(),
            vec![d("100"), d("200"), d("300")]
        );
        assert_eq!(repo.periods_of("Bob"), vec![ym(4), ym(5)]);
        assert_eq!(repo.by_period(ym(4)).len(), 2);
    }

    #[test]
    fn find_missing_is_none() {
        let mut repo = RecordRepository::new(schema());
        repo.load(&alice()).unwrap();
        assert!(repo.find("Alice", ym(7)).is_none());
        assert!(repo.find("Bob", ym(1)).is_none());
        assert!(repo.by_identity("Bob").is_empty());
    }

    #[test]
    fn short_rows_still_count() {
        let mut repo = RecordRepository::new(schema());
        let short = vec![t("Eve"), t("2025-06-25"), t("10"), t("20"), t("30")];
        assert_eq!(repo.load(&table(vec![short])).unwrap(), 1);
        let record = repo.find("Eve", ym(6)).unwrap();
        assert_eq!(record.absent_count(), 5);
        assert_eq!(record.money("f5"), Some(d("30")));
    }

    #[test]
    fn blank_rows_and_header_are_skipped() {
        let mut repo = RecordRepository::new(schema());
        let source = table(vec![
            row("Alice", 1, "1"),
            vec![Cell::Empty, t("  "), Cell::Empty],
            vec![],
            row("Alice", 2, "2"),
        ]);
        assert_eq!(repo.load(&source).unwrap(), 2);
        assert_eq!(repo.records()[1].row(), 5);
    }

    #[test]
    fn loading_merges_batches() {
        let mut repo = RecordRepository::new(schema());
        repo.load(&alice()).unwrap();
        repo.load(&table(vec![row("Alice", 4, "500")])).unwrap();
        assert_eq!(repo.len(), 4);
        assert_eq!(repo.aggregate("Alice"), Some(d("5000.00")));
        repo.clear();
        assert!(repo.is_empty());
        assert!(repo.identities().is_empty());
        assert!(repo.find("Alice", ym(1)).is_none());
    }

    #[test]
    fn loading_is_idempotent() {
        let source = table(vec![
            row("Bob", 4, "100"),
            row("Alice", 1, "1000"),
            row("Bob", 4, "200"),
            row("Alice", 2, "oops"),
        ]);
        let mut a = RecordRepository::new(schema());
        let mut b = RecordRepository::new(schema());
        a.load(&source).unwrap();
        b.load(&source).unwrap();
        assert_eq!(a.records(), b.records());
        assert_eq!(a.identities(), b.identities());
        assert_eq!(a.periods(), b.periods());
        for name in ["Alice", "Bob"] {
            assert_eq!(a.by_identity(name), b.by_identity(name));
            assert_eq!(a.aggregate(name), b.aggregate(name));
        }
        assert_eq!(a.find("Bob", ym(4)), b.find("Bob", ym(4)));
    }

    #[test]
    fn unavailable_source_fails_load() {
        let mut repo = RecordRepository::new(schema());
        let e = repo
            .load(&Workbook::new("/nonexistent/kyuyo.xlsx", None))
            .unwrap_err();
        assert!(errors::is_source_unavailable(&*e));
        assert!(repo.is_empty());
    }
}
