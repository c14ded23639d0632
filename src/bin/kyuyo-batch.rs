use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use kyuyo::config::{CollisionPolicy, Config};
use kyuyo::driver::{self, Documents, ReportRequest, Selection};
use kyuyo::errors::{self, Result};
use kyuyo::fonts;
use kyuyo::input::Workbook;
use kyuyo::output::OError;
use kyuyo::record::YearMonth;
use kyuyo::render::PdfRenderer;
use kyuyo::repository::RecordRepository;
use log::{error, info};
use std::path::PathBuf;
use std::{error, fs, io, process};

/// Payslips and transfer lists from a payroll workbook
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Input file (XLSX, XLS, ODS)
    infile: PathBuf,
    /// Only this employee
    #[arg(long)]
    employee: Option<String>,
    /// Only this month (2025-04, 2025/4 or 2025年4月)
    #[arg(long)]
    period: Option<String>,
    /// Output directory
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,
    /// What to do with existing files (overrides the configuration file)
    #[arg(long, value_enum)]
    collision: Option<CollisionPolicy>,
    /// Only payslips
    #[arg(long, conflicts_with = "transfers_only")]
    payslips_only: bool,
    /// Only transfer lists
    #[arg(long)]
    transfers_only: bool,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Font file to try before the configured ones
    #[arg(long)]
    font: Option<PathBuf>,
    /// Report errors as a JSON file
    #[arg(long)]
    error_file: Option<String>,
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn process(args: &Args) -> Result<()> {
    let period = match &args.period {
        Some(p) => Some(p.parse::<YearMonth>()?),
        None => None,
    };
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(collision) = args.collision {
        config.report.collision = collision;
    }
    if let Some(font) = &args.font {
        config.report.fonts.insert(0, font.clone());
    }

    let source = Workbook::new(&args.infile, config.schema.sheet());
    let mut repo = RecordRepository::new(config.schema.clone());
    let n = repo.load(&source)?;
    if n == 0 {
        return Err(errors::invalid_argument(format!(
            "no records in {}",
            args.infile.display()
        )));
    }

    let documents = if args.payslips_only {
        Documents::Payslips
    } else if args.transfers_only {
        Documents::Transfers
    } else {
        Documents::Both
    };
    let request = ReportRequest {
        identity: Selection::from_option(args.employee.clone()),
        period: Selection::from_option(period),
        out_dir: args.out_dir.clone(),
    };
    let renderer = PdfRenderer::new(fonts::select_font(&config.report.fonts));
    let tally = driver::run(&repo, &request, documents, &renderer, &config.report)?;
    println!(
        "{}/{} documents written to {}",
        tally.succeeded,
        tally.total(),
        args.out_dir.display()
    );
    if !tally.is_clean() {
        return Err(errors::render_failure(format!(
            "{} documents failed",
            tally.failed
        )));
    }
    Ok(())
}

fn store_error(error_file: &str, e: &dyn error::Error) -> Result<()> {
    let error = OError {
        error: format!("{e}"),
    };
    let file = fs::File::create(error_file)?;
    let writer = io::BufWriter::new(file);
    serde_json::to_writer(writer, &error)?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    pretty_env_logger::formatted_timed_builder()
        .filter_level(args.verbose.log_level_filter())
        .init();
    match process(&args) {
        Ok(()) => (),
        Err(e) => {
            match &args.error_file {
                Some(filename) => match store_error(filename, &*e) {
                    Ok(()) => {
                        info!(target: "kyuyo", "error reported: {e}");
                    }
                    Err(e2) => {
                        error!(target: "kyuyo", "{e}");
                        error!(target: "kyuyo", "{e2}");
                    }
                },
                None => error!(target: "kyuyo", "{e}"),
            }
            process::exit(1);
        }
    }
}
