use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use kyuyo::config::Config;
use kyuyo::errors::Result;
use kyuyo::export;
use kyuyo::information::{self, Group, Statistics};
use kyuyo::input::Workbook;
use kyuyo::output;
use kyuyo::repository::RecordRepository;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::{fs, io, process};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Input file (XLSX, XLS, ODS)
    infile: PathBuf,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Export the records as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Export the records as a clean XLSX sheet
    #[arg(long)]
    xlsx: Option<PathBuf>,
    /// Write the statistics as JSON instead of printing them
    #[arg(long)]
    stats_json: Option<PathBuf>,
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Serialize)]
struct Report {
    overall: Statistics,
    periods: Vec<Group>,
    employees: Vec<Group>,
}

fn print(report: &Report) {
    let s = &report.overall;
    println!("employees: {}", s.identities);
    println!("records: {} ({} with absent fields)", s.records, s.partial);
    println!("periods: {}", s.periods);
    match &s.spread {
        Some(x) => {
            println!("{}:", s.field);
            println!("- total: {}", output::format_money(x.total, 0, ""));
            println!("- average: {}", output::format_money(x.average, 0, ""));
            println!("- max: {}", output::format_money(x.max, 0, ""));
            println!("- min: {}", output::format_money(x.min, 0, ""));
        }
        None => println!("{}: no values", s.field),
    }
    println!("by period:");
    for g in &report.periods {
        println!("- {}", information::explain_group(g));
    }
    println!("by employee:");
    for g in &report.employees {
        println!("- {}", information::explain_group(g));
    }
}

fn process(args: &Args) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let mut repo = RecordRepository::new(config.schema.clone());
    repo.load(&Workbook::new(&args.infile, config.schema.sheet()))?;
    let report = Report {
        overall: information::statistics(&repo),
        periods: information::by_period(&repo),
        employees: information::by_identity(&repo),
    };
    match &args.stats_json {
        Some(path) => {
            let writer = io::BufWriter::new(fs::File::create(path)?);
            serde_json::to_writer_pretty(writer, &report)?;
            info!(target: "kyuyo", "wrote {}", path.display());
        }
        None => print(&report),
    }
    if let Some(path) = &args.json {
        let writer = io::BufWriter::new(fs::File::create(path)?);
        export::to_json(&repo, writer)?;
    }
    if let Some(path) = &args.xlsx {
        export::to_xlsx(&repo, path)?;
    }
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
