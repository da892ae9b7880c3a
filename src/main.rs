//! epubq - EPUB repair and quality checks

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use epubq::batch::{ArchiveReport, Batch, Mode};
use epubq::{CommandProbe, EpubCheck, SfntProbe, ValidateOptions, Validator};

#[derive(Parser)]
#[command(name = "epubq")]
#[command(version, about = "Repair and check EPUB packages", long_about = None)]
#[command(after_help = "EXAMPLES:
    epubq books/              Check every book.epub below books/
    epubq --fix books/        Write repaired book_moh.epub copies
    epubq -m -q books/        Check repaired copies, then run epubcheck
    epubq -n books/           Rename books to 'author - title.epub'")]
struct Cli {
    /// Directory with EPUB files stored
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// Repair every book into a _moh.epub copy
    #[arg(long, conflicts_with = "rename")]
    fix: bool,

    /// Rename .epub files to 'author - title.epub'
    #[arg(short = 'n', long)]
    rename: bool,

    /// Check only _moh.epub files
    #[arg(short = 'm', long = "mod")]
    modified: bool,

    /// Validate files with epubcheck
    #[arg(short = 'q', long)]
    epubcheck: bool,

    /// Path of the epubcheck jar
    #[arg(long, value_name = "JAR", default_value = "epubcheck.jar")]
    epubcheck_jar: PathBuf,

    /// External program deciding whether a font is readable
    #[arg(long, value_name = "PROGRAM")]
    font_probe: Option<PathBuf>,

    /// Expected dc:language value
    #[arg(long, value_name = "CODE", default_value = "pl")]
    lang: String,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Log applied repairs and progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let mode = if cli.fix {
        Mode::Fix
    } else if cli.rename {
        Mode::Rename {
            modified: cli.modified,
        }
    } else {
        Mode::Validate {
            modified: cli.modified,
        }
    };

    let options = ValidateOptions {
        expected_language: cli.lang.clone(),
        ..Default::default()
    };
    let validator = match &cli.font_probe {
        Some(program) => Validator::new(options).with_font_probe(CommandProbe::new(program)),
        None => Validator::new(options).with_font_probe(SfntProbe),
    };

    let mut batch = Batch::new(mode);
    batch.validator = validator;
    if cli.epubcheck {
        batch.epubcheck = Some(EpubCheck::new(&cli.epubcheck_jar));
    }

    let reports = batch.run(&cli.directory).map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    Ok(())
}

fn print_report(report: &ArchiveReport) {
    let name = report.display_name();
    for fix in &report.fixes {
        println!("{name}: * {fix}");
    }
    for finding in &report.findings {
        println!("{name}: {}", finding.message);
    }
}
