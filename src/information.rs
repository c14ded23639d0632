use crate::output;
use crate::record::Record;
use crate::repository::RecordRepository;
use itertools::Itertools;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

/// Distribution of one numeric field over some records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Spread {
    /// Records where the field is present.
    pub count: usize,
    pub total: Decimal,
    pub average: Decimal,
    pub max: Decimal,
    pub min: Decimal,
}

/// `None` for no values, and for a total beyond the range of [Decimal].
fn spread(values: impl IntoIterator<Item = Decimal>) -> Option<Spread> {
    let values = values.into_iter().collect_vec();
    let max = values.iter().copied().max()?;
    let min = values.iter().copied().min()?;
    let Some(total) = values
        .iter()
        .try_fold(Decimal::ZERO, |a, &b| a.checked_add(b))
    else {
        warn!(target: "kyuyo", "total of {} values overflows", values.len());
        return None;
    };
    let average = total / Decimal::from(values.len());
    Some(Spread {
        count: values.len(),
        total,
        average,
        max,
        min,
    })
}

fn aggregate_spread<'a>(
    repo: &RecordRepository,
    records: impl IntoIterator<Item = &'a Record>,
) -> Option<Spread> {
    let field = repo.schema().aggregate();
    spread(
        records
            .into_iter()
            .filter_map(|r| r.get(field).and_then(|v| v.as_decimal())),
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub identities: usize,
    pub records: usize,
    pub periods: usize,
    /// Records with at least one absent field.
    pub partial: usize,
    /// Name of the aggregate field.
    pub field: String,
    pub spread: Option<Spread>,
}

/// One line of a per-month or per-employee breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Group {
    pub key: String,
    pub records: usize,
    pub spread: Option<Spread>,
}

fn explain(spread: &Option<Spread>) -> String {
    match spread {
        Some(s) => format!(
            "total {}, average {}, max {}, min {}",
            output::format_money(s.total, 0, ""),
            output::format_money(s.average, 0, ""),
            output::format_money(s.max, 0, ""),
            output::format_money(s.min, 0, "")
        ),
        None => "no values".to_owned(),
    }
}

/// Whole-dataset statistics of the aggregate field. Every loaded row
/// counts, duplicates included.
pub fn statistics(repo: &RecordRepository) -> Statistics {
    let stats = Statistics {
        identities: repo.identities().len(),
        records: repo.len(),
        periods: repo.periods().len(),
        partial: repo.records().iter().filter(|r| r.absent_count() > 0).count(),
        field: repo.schema().aggregate().to_owned(),
        spread: aggregate_spread(repo, repo.records()),
    };
    info!(target: "kyuyo", "employees: {}", stats.identities);
    info!(target: "kyuyo", "records: {} ({} partial)", stats.records, stats.partial);
    info!(target: "kyuyo", "periods: {}", output::pretty_periods(&repo.periods()));
    info!(target: "kyuyo", "{}: {}", stats.field, explain(&stats.spread));
    stats
}

/// The aggregate field month by month, ascending.
pub fn by_period(repo: &RecordRepository) -> Vec<Group> {
    repo.periods()
        .into_iter()
        .map(|p| {
            let records = repo.by_period(p);
            Group {
                key: p.to_string(),
                records: records.len(),
                spread: aggregate_spread(repo, records),
            }
        })
        .collect_vec()
}

/// The aggregate field employee by employee, sorted by name.
pub fn by_identity(repo: &RecordRepository) -> Vec<Group> {
    repo.identities()
        .into_iter()
        .map(|who| {
            let records = repo.by_identity(who);
            Group {
                key: who.to_owned(),
                records: records.len(),
                spread: aggregate_spread(repo, records),
            }
        })
        .collect_vec()
}

pub fn explain_group(g: &Group) -> String {
    format!("{}: {} records, {}", g.key, g.records, explain(&g.spread))
}
