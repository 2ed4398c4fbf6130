use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use emerge_core::source::{discover_sources, read_source};
use emerge_core::{FrontendError, SourceGrammar, lex, parse_source};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Checks the syntax of emerge source files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(
        value_name = "PATH",
        required = true,
        help = "Source files, or directories searched recursively for .em files"
    )]
    paths: Vec<PathBuf>,

    #[arg(long, help = "Print the tokens of every file")]
    tokens: bool,

    #[arg(long, help = "Print the syntax tree of every file")]
    ast: bool,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Log more (-v debug, -vv trace); RUST_LOG overrides this"
    )]
    verbose: u8,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Number of files parsed in parallel (defaults to available parallelism)"
    )]
    jobs: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, Copy)]
struct Output {
    tokens: bool,
    ast: bool,
}

struct FileReport {
    output: String,
    error: Option<FrontendError>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let mut files = Vec::new();
    for path in &cli.paths {
        let found = discover_sources(path)
            .with_context(|| format!("failed to collect sources from {}", path.display()))?;
        if found.is_empty() {
            warn!(path = %path.display(), "no .em files found");
        }
        files.extend(found);
    }
    if files.is_empty() {
        bail!("no source files found");
    }

    let grammar = SourceGrammar::new().context("failed to build the source grammar")?;
    let jobs = cli
        .jobs
        .or_else(|| thread::available_parallelism().ok())
        .map_or(1, NonZeroUsize::get);
    info!(files = files.len(), jobs, "checking sources");

    let output = Output {
        tokens: cli.tokens,
        ast: cli.ast,
    };
    let reports = check_all(&grammar, &files, jobs, output);

    let mut failed = 0;
    for report in &reports {
        print!("{}", report.output);
        if let Some(error) = &report.error {
            failed += 1;
            eprintln!("{}", render(error));
        }
    }
    if failed > 0 {
        bail!("{failed} of {} files failed to parse", files.len());
    }
    println!("{} file(s) checked, no syntax errors", files.len());
    Ok(())
}

/// Parses `files` on up to `jobs` scoped threads. Reports come back in
/// the order of `files`.
fn check_all(
    grammar: &SourceGrammar,
    files: &[PathBuf],
    jobs: usize,
    output: Output,
) -> Vec<FileReport> {
    let chunk_size = files.len().div_ceil(jobs).max(1);
    thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|path| check_file(grammar, path, output))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

fn check_file(grammar: &SourceGrammar, path: &Path, output: Output) -> FileReport {
    let mut printed = String::new();
    let result = read_source(path).and_then(|text| {
        let name = path.display().to_string();
        if output.tokens {
            for token in lex(&name, &text)? {
                printed.push_str(&format!("{}: {token}\n", token.span));
            }
        }
        let file = parse_source(grammar, &name, &text)?;
        if output.ast {
            printed.push_str(&format!("{file:#?}\n"));
        }
        Ok(file)
    });

    match result {
        Ok(file) => {
            debug!(
                path = %path.display(),
                declarations = file.declarations.len(),
                "file parsed"
            );
            FileReport {
                output: printed,
                error: None,
            }
        }
        Err(error) => FileReport {
            output: printed,
            error: Some(error),
        },
    }
}

fn render(error: &FrontendError) -> String {
    match error {
        FrontendError::Mismatch(mismatch) => format!("{}: {mismatch}", mismatch.span),
        FrontendError::Lex(error) => format!("{}: {}", error.span, error.message),
        other => other.to_string(),
    }
}
