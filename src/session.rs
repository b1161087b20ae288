//! Host entry point: one interpreter plus one reporter, fed source text.
//!
//! A session runs every phase in order and decides when to stop.  Lexical and
//! syntax errors are all reported, then gate resolution; resolution errors are
//! all reported, then gate execution; the first runtime error ends the run.
//! Global state survives between runs, which is what a REPL needs.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::{LoxError, Reporter, StderrReporter};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::tokenize;

/// What the source text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A sequence of declarations.
    Program,

    /// A single expression whose value is printed.
    Expression,
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,

    /// Lexical, syntax or resolution errors; nothing was executed.
    StaticError,

    RuntimeError,
}

impl Status {
    /// Conventional process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::StaticError => 65,
            Status::RuntimeError => 70,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

pub struct Session<W: Write = io::Stdout, R: Reporter = StderrReporter> {
    interpreter: Interpreter<W>,
    reporter: R,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(io::stdout(), StderrReporter)
    }
}

impl<W: Write, R: Reporter> Session<W, R> {
    pub fn new(out: W, reporter: R) -> Self {
        Session {
            interpreter: Interpreter::with_output(out),
            reporter,
        }
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// What the program has printed so far.
    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    /// Scan, parse, resolve and execute `source`.
    pub fn run(&mut self, source: &str, mode: Mode) -> Status {
        info!("Running {} byte(s) as {:?}", source.len(), mode);

        let (tokens, lex_errors) = tokenize(source);
        let mut failed = !lex_errors.is_empty();
        self.report_all(&lex_errors);

        let mut parser = Parser::new(tokens);

        let status = match mode {
            Mode::Program => {
                let statements = parser.parse();
                let parse_errors = parser.take_errors();
                failed |= !parse_errors.is_empty();
                self.report_all(&parse_errors);

                if failed {
                    return Status::StaticError;
                }

                let resolver = Resolver::new().with_globals(self.interpreter.global_names());
                match resolver.resolve(&statements) {
                    Ok(locals) => self.interpreter.resolve(locals),
                    Err(errors) => {
                        self.report_all(&errors);
                        return Status::StaticError;
                    }
                }

                match self.interpreter.interpret(&statements) {
                    Ok(()) => Status::Ok,
                    Err(error) => self.fail(error),
                }
            }

            Mode::Expression => {
                let expr = parser.parse_expression();
                let parse_errors = parser.take_errors();
                failed |= !parse_errors.is_empty();
                self.report_all(&parse_errors);

                let Some(expr) = expr.filter(|_| !failed) else {
                    return Status::StaticError;
                };

                let resolver = Resolver::new().with_globals(self.interpreter.global_names());
                match resolver.resolve_expression(&expr) {
                    Ok(locals) => self.interpreter.resolve(locals),
                    Err(errors) => {
                        self.report_all(&errors);
                        return Status::StaticError;
                    }
                }

                let printed = self
                    .interpreter
                    .interpret_expression(&expr)
                    .and_then(|value| {
                        let out = self.interpreter.output_mut();
                        writeln!(out, "{}", value)?;
                        out.flush()?;
                        Ok(())
                    });

                match printed {
                    Ok(()) => Status::Ok,
                    Err(error) => self.fail(error),
                }
            }
        };

        debug!("Run finished with {:?}", status);
        status
    }

    /// Runtime errors and output failures both end the run.
    fn fail(&mut self, error: LoxError) -> Status {
        debug!("Execution aborted (runtime: {})", error.is_runtime());

        self.reporter.report(&error);
        Status::RuntimeError
    }

    fn report_all(&mut self, errors: &[LoxError]) {
        for error in errors {
            self.reporter.report(error);
        }
    }
}
