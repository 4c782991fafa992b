use std::{path::PathBuf, process, sync::Arc};

use clap::{CommandFactory, Parser, error::ErrorKind};
use colored::Colorize;
use framesplit::{ProgressCallback, ProgressInfo, SplitOptions, SplitReport};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const ABOUT: &str = "Saves every subimage in <inputfile> as .pngs";

const CLI_AFTER_HELP: &str = "Examples:\n  framesplit scan.tif scan\n  framesplit animation.gif frames/anim --progress\n  framesplit scan.tif out/page --no-overwrite --json";

/// Exit status for a command line that cannot be parsed (`-1`).
const EXIT_USAGE: i32 = 255;
/// Exit status when the input cannot be opened or its frames counted.
const EXIT_FATAL: i32 = 1;

#[derive(Debug, Parser)]
#[command(name = "framesplit", version, about = ABOUT, after_help = CLI_AFTER_HELP)]
struct Cli {
    /// Multi-frame image to split (TIFF, GIF, APNG, WebP, ...).
    inputfile: PathBuf,

    /// Output prefix; frame N is written to <output_basename>-N.png.
    output_basename: PathBuf,

    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Keep existing output files instead of replacing them.
    #[arg(long)]
    no_overwrite: bool,

    /// Print the report as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

struct BarProgress(ProgressBar);

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.0.set_length(total);
        }
        self.0.set_position(info.current);
        if info.failed > 0 {
            self.0.set_message(format!("{} failed", info.failed));
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn progress_bar() -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(0);
    let style =
        ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
    bar.set_style(style.progress_chars("##-"));
    Ok(bar)
}

fn options_for(cli: &Cli, bar: Option<&ProgressBar>) -> SplitOptions {
    let mut options = SplitOptions::new().with_overwrite(!cli.no_overwrite);
    if let Some(bar) = bar {
        options = options.with_progress(Arc::new(BarProgress(bar.clone())));
    }
    options
}

fn print_json(cli: &Cli, report: &SplitReport) {
    let payload = json!({
        "input": cli.inputfile.display().to_string(),
        "basename": cli.output_basename.display().to_string(),
        "success": report.success,
        "frame_count": report.frame_count,
        "written": report
            .written
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>(),
        "diagnostics": report.diagnostics.messages(),
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => println!("{text}"),
        Err(error) => println!("ERROR: {error}"),
    }
}

fn print_text(report: &SplitReport) {
    if !report.diagnostics.is_empty() {
        println!("ERROR: {}", report.diagnostics);
    }
    if report.success {
        let summary = format!(
            "Wrote {} of {} frame(s)",
            report.written.len(),
            report.frame_count
        );
        if report.is_clean() {
            eprintln!("{} {}", "success:".green().bold(), summary.green());
        } else {
            eprintln!("{} {}", "warning:".yellow().bold(), summary.yellow());
        }
    }
}

fn parse() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = error.print();
            process::exit(0);
        }
        Err(error) => {
            let mut command = Cli::command();
            println!("ERROR: {}\n{ABOUT}", command.render_usage());
            log_parse_error(&error);
            process::exit(EXIT_USAGE);
        }
    }
}

fn log_parse_error(error: &clap::Error) {
    let rendered = error.render().to_string();
    if let Some(first_line) = rendered.lines().next() {
        eprintln!("{first_line}");
    }
}

fn main() {
    let cli = parse();
    init_logging(cli.verbose);

    if !cli.json {
        println!("input: {}", cli.inputfile.display());
        println!("basename: {}", cli.output_basename.display());
    }

    let bar = if cli.progress {
        match progress_bar() {
            Ok(bar) => Some(bar),
            Err(error) => {
                log::warn!("progress bar unavailable: {error}");
                None
            }
        }
    } else {
        None
    };

    let options = options_for(&cli, bar.as_ref());
    let report = framesplit::split_images_shared(&cli.inputfile, &cli.output_basename, &options);

    if let Some(bar) = bar {
        bar.finish_with_message("done");
    }

    if cli.json {
        print_json(&cli, &report);
    } else {
        print_text(&report);
    }

    if !report.success {
        process::exit(EXIT_FATAL);
    }
}
