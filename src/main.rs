use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::Ast;
use rox::error::{Reporter, StderrReporter};
use rox::parser::Parser;
use rox::scanner::tokenize;
use rox::session::{Mode, Session, Status};

const LOG_FILE: &str = "rox.log";

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a file as a Lox program, or starts a REPL without one
    Run { filename: Option<PathBuf> },
}

/// Maps the file and decodes it as UTF‑8.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;
    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    // Zero‑length mappings are rejected on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the mapping is read once, immediately copied, and dropped.
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map file {:?}", filename))?;
    let source = std::str::from_utf8(&map)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source)
}

fn init_logger() -> Result<()> {
    let log_file = File::create(LOG_FILE).with_context(|| format!("Failed to create {}", LOG_FILE))?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} {:<5} [{}:{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to {}", LOG_FILE);
    Ok(())
}

fn tokenize_file(filename: &Path, json: bool) -> Result<Status> {
    let source = read_source(filename)?;
    let (tokens, errors) = tokenize(&source);

    let mut reporter = StderrReporter;
    for error in &errors {
        debug!("Tokenization debug: {}", error);
        reporter.report(error);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        serde_json::to_writer_pretty(&mut out, &tokens).context("Failed to write tokens")?;
        writeln!(out)?;
    } else {
        for token in &tokens {
            writeln!(out, "{}", token)?;
        }
    }

    Ok(if errors.is_empty() {
        Status::Ok
    } else {
        Status::StaticError
    })
}

fn parse_file(filename: &Path) -> Result<Status> {
    let source = read_source(filename)?;
    let (tokens, lex_errors) = tokenize(&source);

    let mut reporter = StderrReporter;
    for error in &lex_errors {
        reporter.report(error);
    }

    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression();

    for error in parser.errors() {
        debug!("Parse debug: {}", error);
        reporter.report(error);
    }

    match expr {
        Some(expr) if lex_errors.is_empty() && parser.errors().is_empty() => {
            let ast = Ast.print(&expr);
            debug!("AST: {}", ast);
            println!("{}", ast);
            Ok(Status::Ok)
        }
        _ => Ok(Status::StaticError),
    }
}

fn run_file(filename: &Path, mode: Mode) -> Result<Status> {
    let source = read_source(filename)?;
    let mut session = Session::default();

    Ok(session.run(&source, mode))
}

/// Read–eval–print loop.  Globals persist across lines; errors do not.
fn run_prompt() -> Result<Status> {
    info!("Starting REPL");

    let mut session = Session::default();
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line).context("Failed to read from stdin")? == 0 {
            println!();
            break;
        }

        let status = session.run(&line, Mode::Program);
        debug!("REPL line finished with {:?}", status);
    }

    Ok(Status::Ok)
}

fn main() -> Result<ExitCode> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .parse_env("RUST_LOG")
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let status = match args.commands {
        Commands::Tokenize { filename, json } => tokenize_file(&filename, json)?,
        Commands::Parse { filename } => parse_file(&filename)?,
        Commands::Evaluate { filename } => run_file(&filename, Mode::Expression)?,
        Commands::Run {
            filename: Some(filename),
        } => run_file(&filename, Mode::Program)?,
        Commands::Run { filename: None } => run_prompt()?,
    };

    info!("Exiting with {:?}", status);

    Ok(ExitCode::from(status.exit_code() as u8))
}
