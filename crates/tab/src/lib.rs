//! `tab` is a small, statically typed, pure functional expression
//! language for line-oriented text processing. The input stream is a
//! lazy sequence of lines bound to `@`; the value of the expression is
//! printed to standard output.
//!
//! The pipeline: the parser turns the source into a flat command
//! stream with nested closures, inference checks it and resolves every
//! function call against the registry, the evaluator walks the
//! annotated stream, and the printer renders the final value. With
//! `-t N` the threaded runner fans the work out to scatter workers and
//! gathers their outputs round-robin.

mod command;
mod error;
mod exec;
mod funcs;
pub mod help;
mod infer;
mod intern;
mod lexer;
mod parse;
mod printer;
mod registry;
mod seq;
mod threaded;
mod types;
mod value;

use std::io::{self, BufRead, Write};

pub use crate::error::{Error, RunResult};
use crate::{
    seq::{LineSeq, SeqHandle},
    types::Type,
    value::Value,
};

/// A compiled program: the annotated command stream and the type of its
/// top-level result.
pub(crate) struct Program {
    pub(crate) code: Vec<command::Command>,
    pub(crate) result: Type,
}

/// Runner options, mirroring the CLI flags.
#[derive(Debug, Clone)]
pub struct Options {
    /// Print map entries sorted by key.
    pub sorted: bool,
    /// Number of scatter threads; 0 or 1 means single-threaded.
    pub threads: usize,
    /// RNG seed.
    pub seed: u64,
    /// Debug level: 1 dumps the parsed stream, 2 also the typed stream.
    pub debug: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sorted: false,
            threads: 1,
            seed: 0,
            debug: 0,
        }
    }
}

/// Parses and type-checks an expression against the given input type.
pub(crate) fn compile(src: &str, input: &Type, debug: u8) -> RunResult<Program> {
    let mut code = parse::parse(src)?;
    if debug >= 1 {
        let _ = command::dump(&code, 0, &mut io::stderr());
    }
    let result = infer::infer_program(&mut code, input)?;
    if debug >= 2 {
        let _ = command::dump(&code, 0, &mut io::stderr());
    }
    Ok(Program { code, result })
}

/// Evaluates an expression over a line-oriented input stream, writing
/// the printed result to `out`.
pub fn run(
    src: &str,
    input: impl BufRead + Send + 'static,
    out: &mut dyn Write,
    opts: &Options,
) -> RunResult<()> {
    funcs::set_seed(opts.seed);
    let input = SeqHandle::new(LineSeq::new(input));

    if opts.threads > 1 {
        return threaded::run_threaded(src, input, out, opts);
    }

    let input_ty = Type::seq(Type::STR);
    if src.contains("-->") {
        // single-threaded scatter/gather: one worker, same semantics
        let (scatter_src, gather_src) = threaded::split_program(src);
        let program = compile(scatter_src, &input_ty, opts.debug)?;
        let result = exec::run_program(&program.code, Value::Seq(input))?;
        let (elem_ty, stream) = match (program.result, result) {
            (Type::Seq(e), Value::Seq(h)) => (*e, h),
            (t, v) => (t, SeqHandle::once(v)),
        };
        let gather = compile(gather_src, &Type::seq(elem_ty), opts.debug)?;
        let result = exec::run_program(&gather.code, Value::Seq(stream))?;
        return printer::print_value(result, out, opts.sorted);
    }

    let program = compile(src, &input_ty, opts.debug)?;
    let result = exec::run_program(&program.code, Value::Seq(input))?;
    printer::print_value(result, out, opts.sorted)
}

/// Convenience entry point for tests and embedding: evaluates `src`
/// over `input` and returns the printed output.
pub fn run_expression(src: &str, input: &str, opts: &Options) -> RunResult<String> {
    let mut out = Vec::new();
    run(
        src,
        io::Cursor::new(input.as_bytes().to_vec()),
        &mut out,
        opts,
    )?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
