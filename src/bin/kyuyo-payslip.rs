use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use kyuyo::config::{CollisionPolicy, Config};
use kyuyo::errors::{self, Result};
use kyuyo::fonts;
use kyuyo::input::Workbook;
use kyuyo::record::YearMonth;
use kyuyo::render::{self, PdfRenderer};
use kyuyo::report;
use kyuyo::repository::RecordRepository;
use log::{error, info};
use std::path::PathBuf;
use std::process;

/// One payslip
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Input file (XLSX, XLS, ODS)
    infile: PathBuf,
    /// Employee name
    employee: String,
    /// Month (2025-04, 2025/4 or 2025年4月)
    period: String,
    /// Output file (PDF)
    outfile: PathBuf,
    /// Keep an existing output file and write next to it
    #[arg(long)]
    keep: bool,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Font file to try before the configured ones
    #[arg(long)]
    font: Option<PathBuf>,
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn process(args: &Args) -> Result<()> {
    let period: YearMonth = args.period.parse()?;
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(font) = &args.font {
        config.report.fonts.insert(0, font.clone());
    }
    let mut repo = RecordRepository::new(config.schema.clone());
    repo.load(&Workbook::new(&args.infile, config.schema.sheet()))?;
    let record = repo.find(&args.employee, period).ok_or_else(|| {
        errors::invalid_argument(format!("no record for {} in {period}", args.employee))
    })?;
    let doc = report::detail(record, &config.report);
    let renderer = PdfRenderer::new(fonts::select_font(&config.report.fonts));
    let policy = if args.keep {
        CollisionPolicy::Suffix
    } else {
        CollisionPolicy::Replace
    };
    let path = render::render_detail(&renderer, &doc, &args.outfile, policy)?;
    info!(target: "kyuyo", "wrote {}", path.display());
    Ok(())
}

fn main() {
    let args = Args::parse();
    pretty_env_logger::formatted_timed_builder()
        .filter_level(args.verbose.log_level_filter())
        .init();
    if let Err(e) = process(&args) {
        error!(target: "kyuyo", "{e}");
        process::exit(1);
    }
}
