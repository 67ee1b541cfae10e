//! `shapediff`: command line front-end for the differentiation compiler.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use shapediff_core::display::dot;
use shapediff_core::{CompileOptions, DifferentiationEngine};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Derives gradient computing programs from lowered shape programs.
#[derive(Parser, Debug)]
#[command(name = "shapediff")]
#[command(about = "Symbolic reverse-mode differentiation for shape programs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a shape program into its gradient computing program
    Compile {
        /// Lowered shape program
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Destination file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// JSON file with compile options
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print a JSON compile report to stderr
        #[arg(long)]
        report: bool,
    },

    /// Parse a shape program and report the first error, if any
    Check {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the differentiation order, loss first
    Order {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the dependency graph in Graphviz DOT syntax
    Graph {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Compile { input, output, config, report } => {
            let options = match config {
                Some(path) => CompileOptions::load(&path)?,
                None => CompileOptions::default(),
            };
            let summary = match output {
                Some(path) => compile_to_file(&input, &path, options)?,
                None => {
                    let mut engine = DifferentiationEngine::with_options(io::stdout().lock(), options);
                    engine.compile(open(&input)?).map_err(|e| coded(e, &input))?
                }
            };
            if report {
                eprintln!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Commands::Check { input } => {
            let engine = parse_only(&input)?;
            println!(
                "{}: ok ({} variables, loss: {})",
                input.display(),
                engine.graph().num_nodes(),
                engine.graph().loss_node().map(|n| n.name()).unwrap_or("none")
            );
            Ok(())
        }
        Commands::Order { input } => {
            let engine = parse_only(&input)?;
            let graph = engine.graph();
            let mut stdout = io::stdout().lock();
            for id in graph.topological_order() {
                if let Some(node) = graph.node(id) {
                    writeln!(stdout, "{}", node.name())?;
                }
            }
            Ok(())
        }
        Commands::Graph { input } => {
            let engine = parse_only(&input)?;
            print!("{}", dot::render_dot(engine.graph()));
            Ok(())
        }
    }
}

/// Writes through a temporary file next to `output` and only moves it into
/// place once the whole program compiled.
fn compile_to_file(
    input: &Path,
    output: &Path,
    options: CompileOptions,
) -> Result<shapediff_core::CompileReport> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot create a temporary file in {}", dir.display()))?;

    let mut engine = DifferentiationEngine::with_options(tmp, options);
    let report = engine.compile(open(input)?).map_err(|e| coded(e, input))?;
    let tmp = engine.into_inner().context("compiler lost its destination")?;
    tmp.persist(output)
        .with_context(|| format!("cannot write {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(report)
}

fn parse_only(input: &Path) -> Result<DifferentiationEngine<io::Sink>> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let mut engine = DifferentiationEngine::detached();
    for (idx, line) in text.lines().enumerate() {
        engine
            .parse_line(line)
            .map_err(|e| coded(e.at_line(idx + 1), input))?;
    }
    Ok(engine)
}

fn open(input: &Path) -> Result<BufReader<File>> {
    let file = File::open(input).with_context(|| format!("cannot read {}", input.display()))?;
    Ok(BufReader::new(file))
}

fn coded(e: shapediff_core::CompileError, input: &Path) -> anyhow::Error {
    anyhow::anyhow!("{}: {} (code {})", input.display(), e, e.code())
}
