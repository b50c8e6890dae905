// CLI binary — panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable, clippy::indexing_slicing)]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blockc::dsl::builtins::Catalog;
use blockc::dsl::error::Diagnostic;
use blockc::dsl::image::FileImageLoader;
use blockc::settings::{self, Settings};
use blockc::{compile, output, paths, AppError, Compilation};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "blockc", about = "Compile robot programs to block graphs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the blockc.json next to each source
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile source files and write their block graphs
    Build {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Define a macro, NAME or NAME=VALUE
        #[arg(short = 'D', long = "define")]
        defines: Vec<String>,
        /// Directory for the outputs (defaults to next to each source)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compile source files and report diagnostics without writing anything
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short = 'D', long = "define")]
        defines: Vec<String>,
    },
    /// Print the JSON schema of blockc.json
    Schema,
    /// List the builtin events, statements, functions and properties
    Catalog,
}

// ── Per-file work ────────────────────────────────────────────────

/// Outcome of one file, printed after every thread has finished.
struct Report {
    path: PathBuf,
    result: Result<Built, AppError>,
}

struct Built {
    compilation: Compilation,
    output: Option<PathBuf>,
}

fn settings_for(source: &Path, config: Option<&Path>) -> Result<Settings, AppError> {
    match config {
        Some(path) => settings::load_settings_file(path),
        None => settings::load_settings(paths::source_dir(source)),
    }
}

fn compile_file(
    source: &Path,
    config: Option<&Path>,
    defines: &[String],
    out_dir: Option<&Path>,
    write: bool,
) -> Result<Built, AppError> {
    let settings = settings_for(source, config)?.with_defines(defines);
    let file = File::open(source).map_err(|e| AppError::read(source, e))?;
    let images = FileImageLoader::new(settings.image_root_for(source));
    debug!(path = %source.display(), images = %images.root().display(), "compiling");

    let compilation = compile(
        BufReader::new(file),
        source,
        &Catalog::robot(),
        &images,
        &settings.compile_options(),
    )
    .map_err(|failure| AppError::Compile { path: source.to_path_buf(), failure })?;

    let output = if write {
        let path = paths::output_path(source, out_dir);
        output::write_target(&path, &compilation)?;
        Some(path)
    } else {
        None
    };
    Ok(Built { compilation, output })
}

fn run_files(
    files: &[PathBuf],
    config: Option<&Path>,
    defines: &[String],
    out_dir: Option<&Path>,
    write: bool,
) -> Vec<Report> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|path| {
                scope.spawn(move || Report {
                    path: path.clone(),
                    result: compile_file(path, config, defines, out_dir, write),
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("compile thread panicked")).collect()
    })
}

// ── Printing ─────────────────────────────────────────────────────

/// Full excerpts after `build`; one line per diagnostic after `check`.
fn print_diagnostics(path: &Path, diagnostics: &[Diagnostic], lines: &[String], short: bool) {
    for diagnostic in diagnostics {
        if short {
            eprintln!("{}: {}", path.display(), diagnostic.format_short());
        } else {
            eprintln!("{}", diagnostic.render(lines));
        }
    }
}

fn print_text(report: &Report, short: bool) {
    let path = report.path.as_path();
    match &report.result {
        Ok(built) => {
            print_diagnostics(path, &built.compilation.warnings, &built.compilation.lines, short);
            match &built.output {
                Some(out) => println!("{} -> {}", report.path.display(), out.display()),
                None => println!("{}: ok", report.path.display()),
            }
        }
        Err(AppError::Compile { failure, .. }) => {
            print_diagnostics(path, &failure.errors, &failure.lines, short);
            print_diagnostics(path, &failure.warnings, &failure.lines, short);
            eprintln!("{}: {failure}", report.path.display());
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn print_catalog(json: bool) {
    let entries = Catalog::robot().entries();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries).unwrap_or_default());
        return;
    }
    for entry in &entries {
        println!("{:<9} {:<28} {}", entry.category, entry.name, entry.description);
        for signature in &entry.signatures {
            println!("{:<9}   {signature}", "");
        }
    }
}

fn report_json(report: &Report) -> Value {
    match &report.result {
        Ok(built) => json!({
            "path": report.path,
            "ok": true,
            "output": built.output,
            "blocks": built.compilation.blocks.len(),
            "warnings": built.compilation.warnings,
        }),
        Err(AppError::Compile { failure, .. }) => json!({
            "path": report.path,
            "ok": false,
            "errors": failure.errors,
            "warnings": failure.warnings,
        }),
        Err(e) => json!({
            "path": report.path,
            "ok": false,
            "error": e.to_string(),
        }),
    }
}

// ── Main ─────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("BLOCKC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let reports = match &cli.command {
        Commands::Schema => {
            let schema = settings::settings_schema();
            println!("{}", serde_json::to_string_pretty(&schema).unwrap_or_default());
            return;
        }
        Commands::Catalog => {
            print_catalog(cli.json);
            return;
        }
        Commands::Build { files, defines, out } => run_files(files, config, defines, out.as_deref(), true),
        Commands::Check { files, defines } => run_files(files, config, defines, None, false),
    };

    let failed = reports.iter().filter(|r| r.result.is_err()).count();
    if cli.json {
        let all: Vec<Value> = reports.iter().map(report_json).collect();
        println!("{}", serde_json::to_string_pretty(&all).unwrap_or_default());
    } else {
        let short = matches!(cli.command, Commands::Check { .. });
        for report in &reports {
            print_text(report, short);
        }
    }

    if failed > 0 {
        warn!(failed, total = reports.len(), "some files failed");
        process::exit(1);
    }
}
