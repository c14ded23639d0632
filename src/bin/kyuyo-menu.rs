use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cliclack::log;
use itertools::Itertools;
use kyuyo::config::Config;
use kyuyo::driver::{self, Documents, ReportRequest, Selection, Tally};
use kyuyo::fonts;
use kyuyo::input::Workbook;
use kyuyo::output;
use kyuyo::record::YearMonth;
use kyuyo::render::PdfRenderer;
use kyuyo::repository::RecordRepository;
use std::path::PathBuf;

/// Interactive payslip and transfer list generation
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Input file (XLSX, XLS, ODS)
    infile: PathBuf,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    Everything,
    Employee,
    Month,
    Transfers,
    MonthAndTransfers,
    Quit,
}

fn lift<T>(r: kyuyo::errors::Result<T>) -> Result<T> {
    r.map_err(|e| anyhow!("{e}"))
}

fn select_period(repo: &RecordRepository) -> Result<Option<YearMonth>> {
    let mut items = vec![(None, "Oops, go back".to_owned(), "".to_owned())];
    for p in repo.periods().into_iter().rev() {
        let n = repo.by_period(p).len();
        items.push((Some(p), output::pretty_period(&p), format!("{n} records")));
    }
    Ok(cliclack::select("Which month?").items(&items).interact()?)
}

fn select_employee(repo: &RecordRepository) -> Result<Option<String>> {
    let mut items = vec![(None, "Oops, go back".to_owned(), "".to_owned())];
    for who in repo.identities() {
        let periods = repo.periods_of(who);
        items.push((
            Some(who.to_owned()),
            who.to_owned(),
            format!("{} months", periods.len()),
        ));
    }
    Ok(cliclack::select("Which employee?").items(&items).interact()?)
}

fn report(tally: &Tally) -> Result<()> {
    let line = format!(
        "{}/{} documents written, {} failed, {} without data",
        tally.succeeded,
        tally.total(),
        tally.failed,
        tally.missing
    );
    if tally.is_clean() {
        log::success(line)?;
    } else {
        log::error(line)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    cliclack::intro("kyuyo-menu")?;
    let config = lift(Config::load(args.config.as_deref()))
        .with_context(|| "cannot read the configuration")?;
    log::info(format!("Reading {}...", args.infile.display()))?;
    let mut repo = RecordRepository::new(config.schema.clone());
    let n = lift(repo.load(&Workbook::new(&args.infile, config.schema.sheet())))
        .with_context(|| format!("cannot read {}", args.infile.display()))?;
    let people = repo.identities().len();
    let periods = repo.periods();
    let options = textwrap::Options::new(70).subsequent_indent(" ");
    cliclack::note(
        "Input",
        textwrap::fill(
            &format!(
                "{n} records, {people} employees, months: {}",
                periods.iter().map(output::pretty_period).join(", ")
            ),
            &options,
        ),
    )?;

    let font = fonts::select_font(&config.report.fonts);
    log::info(format!("Font: {}", font.describe()))?;
    let renderer = PdfRenderer::new(font);
    let out_dir: String = cliclack::input("Output directory")
        .default_input("output")
        .interact()?;

    loop {
        let items = [
            (Action::Everything, "Payslips for everyone, every month", ""),
            (Action::Employee, "Payslips for one employee", ""),
            (Action::Month, "Payslips for one month", ""),
            (Action::Transfers, "Transfer list for one month", ""),
            (
                Action::MonthAndTransfers,
                "Payslips and transfer list for one month",
                "",
            ),
            (Action::Quit, "Quit", ""),
        ];
        let choice = cliclack::select("Action?").items(&items).interact()?;
        let (identity, period, documents) = match choice {
            Action::Quit => break,
            Action::Everything => (Selection::All, Selection::All, Documents::Payslips),
            Action::Employee => match select_employee(&repo)? {
                None => continue,
                Some(who) => (Selection::Only(who), Selection::All, Documents::Payslips),
            },
            Action::Month | Action::Transfers | Action::MonthAndTransfers => {
                match select_period(&repo)? {
                    None => continue,
                    Some(p) => {
                        let documents = match choice {
                            Action::Month => Documents::Payslips,
                            Action::Transfers => Documents::Transfers,
                            _ => Documents::Both,
                        };
                        (Selection::All, Selection::Only(p), documents)
                    }
                }
            }
        };
        let request = ReportRequest {
            identity,
            period,
            out_dir: PathBuf::from(&out_dir),
        };
        let tally = lift(driver::run(
            &repo,
            &request,
            documents,
            &renderer,
            &config.report,
        ))?;
        report(&tally)?;
    }
    cliclack::outro("Bye!")?;
    Ok(())
}
