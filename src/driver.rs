//! Main entry point for producing documents in batches.

use crate::config::ReportConfig;
use crate::errors::{self, Result};
use crate::output;
use crate::record::{Record, YearMonth};
use crate::render::{self, Renderer};
use crate::report;
use crate::repository::RecordRepository;
use chrono::Local;
use itertools::Itertools;
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything, or just one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Selection<T> {
    pub fn from_option(x: Option<T>) -> Selection<T> {
        match x {
            Some(x) => Selection::Only(x),
            None => Selection::All,
        }
    }
}

/// Which documents to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Documents {
    Payslips,
    Transfers,
    Both,
}

/// What to produce, and where.
#[derive(Clone, Debug)]
pub struct ReportRequest {
    /// Employee.
    pub identity: Selection<String>,
    /// Month.
    pub period: Selection<YearMonth>,
    /// Created if missing.
    pub out_dir: PathBuf,
}

/// Outcome of a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    /// Requested documents with no data behind them.
    pub missing: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.missing
    }

    /// No document failed. Missing data does not count as a failure.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn merge(&mut self, other: Tally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.missing += other.missing;
    }
}

/// Characters that cannot appear in file names on common filesystems.
fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// `給与明細_山田太郎_2025年4月.pdf`
pub fn payslip_file_name(config: &ReportConfig, identity: &str, period: YearMonth) -> String {
    format!(
        "{}_{}_{}.pdf",
        config.payslip_prefix,
        sanitize(identity),
        output::pretty_period(&period)
    )
}

/// `振込金額一覧_2025年4月.pdf`
pub fn transfer_list_file_name(config: &ReportConfig, period: YearMonth) -> String {
    format!(
        "{}_{}.pdf",
        config.summary_prefix,
        output::pretty_period(&period)
    )
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| errors::render_failure(format!("cannot create {}: {e}", dir.display())))
}

/// The (employee, month) pairs a request asks for.
fn payslip_targets(repo: &RecordRepository, request: &ReportRequest) -> Vec<(String, YearMonth)> {
    let identities = match &request.identity {
        Selection::All => repo.identities().into_iter().map(str::to_owned).collect_vec(),
        Selection::Only(x) => vec![x.clone()],
    };
    let mut targets = Vec::new();
    for identity in identities {
        match (&request.identity, request.period) {
            (Selection::All, Selection::Only(p)) => {
                if repo.find(&identity, p).is_some() {
                    targets.push((identity, p));
                }
            }
            (Selection::Only(_), Selection::Only(p)) => targets.push((identity, p)),
            (_, Selection::All) => {
                let periods = repo.periods_of(&identity);
                targets.extend(periods.into_iter().map(|p| (identity.clone(), p)));
            }
        }
    }
    targets
}

/// One payslip per selected employee and month.
///
/// A failed document is logged and counted and the batch goes on. The
/// error result is reserved for an output directory that cannot be created.
pub fn payslips(
    repo: &RecordRepository,
    request: &ReportRequest,
    renderer: &dyn Renderer,
    config: &ReportConfig,
) -> Result<Tally> {
    ensure_dir(&request.out_dir)?;
    let targets = payslip_targets(repo, request);
    let mut tally = Tally::default();
    if let Selection::Only(identity) = &request.identity {
        if targets.is_empty() {
            warn!(target: "kyuyo", "no records for {identity}");
            tally.missing += 1;
        }
    }
    let n = targets.len();
    for (i, (identity, period)) in targets.into_iter().enumerate() {
        let Some(record) = repo.find(&identity, period) else {
            warn!(target: "kyuyo", "[{}/{n}] no record for {identity} in {period}", i + 1);
            tally.missing += 1;
            continue;
        };
        let doc = report::detail(record, config);
        let dest = request
            .out_dir
            .join(payslip_file_name(config, &identity, period));
        match render::render_detail(renderer, &doc, &dest, config.collision) {
            Ok(path) => {
                info!(target: "kyuyo", "[{}/{n}] {}", i + 1, path.display());
                tally.succeeded += 1;
            }
            Err(e) => {
                error!(target: "kyuyo", "[{}/{n}] {identity} {period}: {e}", i + 1);
                tally.failed += 1;
            }
        }
    }
    info!(
        target: "kyuyo",
        "payslips: {} written, {} failed, {} missing",
        tally.succeeded, tally.failed, tally.missing
    );
    Ok(tally)
}

/// Records of one month as they go into the transfer list: load order, and
/// only the first of duplicate (employee, month) rows.
fn transfer_records(repo: &RecordRepository, period: YearMonth) -> Vec<&Record> {
    repo.by_period(period)
        .into_iter()
        .filter(|r| match r.identity() {
            Some(identity) => repo
                .find(identity, period)
                .is_some_and(|first| std::ptr::eq(first, *r)),
            None => true,
        })
        .collect_vec()
}

/// The transfer list of one month, written to `out_dir`.
pub fn transfer_list(
    repo: &RecordRepository,
    period: YearMonth,
    renderer: &dyn Renderer,
    config: &ReportConfig,
    out_dir: &Path,
) -> Result<PathBuf> {
    ensure_dir(out_dir)?;
    let records = transfer_records(repo, period);
    if records.is_empty() {
        warn!(target: "kyuyo", "no records in {period}, the transfer list will be empty");
    }
    let mut table = report::summary(
        &records,
        repo.schema(),
        config,
        &output::pretty_period(&period),
    )?;
    table.footer = Some(format!(
        "作成日時: {}",
        Local::now().format("%Y年%m月%d日 %H:%M")
    ));
    let dest = out_dir.join(transfer_list_file_name(config, period));
    let path = render::render_summary(renderer, &table, &dest, config.collision)?;
    info!(target: "kyuyo", "{} ({} rows)", path.display(), records.len());
    Ok(path)
}

/// Transfer lists for the selected months.
pub fn transfer_lists(
    repo: &RecordRepository,
    request: &ReportRequest,
    renderer: &dyn Renderer,
    config: &ReportConfig,
) -> Result<Tally> {
    let periods = match request.period {
        Selection::All => repo.periods(),
        Selection::Only(p) => vec![p],
    };
    let mut tally = Tally::default();
    for period in periods {
        if repo.by_period(period).is_empty() {
            warn!(target: "kyuyo", "no records in {period}");
            tally.missing += 1;
            continue;
        }
        match transfer_list(repo, period, renderer, config, &request.out_dir) {
            Ok(_) => tally.succeeded += 1,
            Err(e) => {
                error!(target: "kyuyo", "transfer list {period}: {e}");
                tally.failed += 1;
            }
        }
    }
    info!(
        target: "kyuyo",
        "transfer lists: {} written, {} failed, {} missing",
        tally.succeeded, tally.failed, tally.missing
    );
    Ok(tally)
}

/// Produce the requested documents.
pub fn run(
    repo: &RecordRepository,
    request: &ReportRequest,
    documents: Documents,
    renderer: &dyn Renderer,
    config: &ReportConfig,
) -> Result<Tally> {
    info!(target: "kyuyo", "periods in input data: {}", output::pretty_periods(&repo.periods()));
    let mut tally = Tally::default();
    if documents != Documents::Transfers {
        tally.merge(payslips(repo, request, renderer, config)?);
    }
    if documents != Documents::Payslips {
        tally.merge(transfer_lists(repo, request, renderer, config)?);
    }
    info!(
        target: "kyuyo",
        "done: {}/{} documents written, {} failed, {} missing",
        tally.succeeded,
        tally.total(),
        tally.failed,
        tally.missing
    );
    Ok(tally)
}
