//! The linear command stream the parser emits and the checker annotates.
//!
//! A command is an opcode, an optional literal, a static type filled in
//! by inference, and zero or more nested closures. Closures are detached
//! child streams: array/map bodies, comprehension sources, indexer
//! expressions and function argument lists. They form a tree, owned
//! parent to child.

use std::io::{self, Write};

use regex::bytes::Regex;
use smallvec::SmallVec;

use crate::{
    intern::{self, Sym},
    registry::ResolvedFunc,
    types::Type,
    value::MergePolicy,
};

/// Opcodes of the command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Op {
    /// Push a literal atom.
    Val,
    /// Push the value bound to a name.
    Var,
    /// Pop the stack and bind the value to a name.
    Vaw,
    /// Truthiness inversion, any atom to `UInt` 0/1.
    Not,
    /// Bitwise complement on integers.
    Neg,
    Exp,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    And,
    Or,
    Xor,
    /// Match the popped string against the attached pattern.
    Regex,
    /// Index the container on the stack with the closure's result.
    Idx,
    /// Sequence comprehension, closures: body, optional source.
    Arr,
    /// Map comprehension, closures: key, value, optional source.
    Map,
    /// Function call, closure: argument list.
    Fun,
    /// Recursive accumulator, closures: body, init, optional source.
    Rec,
}

/// A literal argument attached to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    None,
    Int(i64),
    UInt(u64),
    Real(f64),
    Str(Vec<u8>),
    /// An interned variable or function name.
    Name(Sym),
}

impl Lit {
    /// The static type of a value literal. `Name` and `None` carry no
    /// value and answer `Type::None`.
    #[must_use]
    pub fn type_of(&self) -> Type {
        match self {
            Self::Int(_) => Type::INT,
            Self::UInt(_) => Type::UINT,
            Self::Real(_) => Type::REAL,
            Self::Str(_) => Type::STR,
            Self::None | Self::Name(_) => Type::None,
        }
    }

    fn print(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Real(v) => v.to_string(),
            Self::Str(v) => String::from_utf8_lossy(v).into_owned(),
            Self::Name(sym) => intern::resolve(*sym),
        }
    }
}

/// A detached child command stream plus its inferred type stack.
#[derive(Debug, Clone, Default)]
pub struct Closure {
    pub code: Vec<Command>,
    /// The closure body's final type stack, filled in by inference.
    pub stack: Vec<Type>,
}

impl Closure {
    #[must_use]
    pub fn new(code: Vec<Command>) -> Self {
        Self { code, stack: Vec::new() }
    }
}

/// One instruction of the stream.
#[derive(Debug, Clone)]
pub struct Command {
    pub op: Op,
    pub lit: Lit,
    /// Result type, annotated by inference.
    pub ty: Type,
    pub closures: SmallVec<[Closure; 2]>,
    /// Resolved registry entry for `FUN`, annotated by inference.
    pub func: Option<ResolvedFunc>,
    /// Compiled pattern for `REGEX`, annotated by inference.
    pub pattern: Option<Regex>,
    /// Comprehension `try`: skip elements whose body raises a runtime
    /// error.
    pub try_elems: bool,
    /// Duplicate-key policy for `MAP`, annotated by inference.
    pub policy: MergePolicy,
}

impl Command {
    #[must_use]
    pub fn new(op: Op) -> Self {
        Self {
            op,
            lit: Lit::None,
            ty: Type::None,
            closures: SmallVec::new(),
            func: None,
            pattern: None,
            try_elems: false,
            policy: MergePolicy::Replace,
        }
    }

    #[must_use]
    pub fn with_lit(op: Op, lit: Lit) -> Self {
        let mut c = Self::new(op);
        c.lit = lit;
        c
    }
}

/// Writes the (possibly annotated) command stream, one command per line
/// with closures indented below their parent. Used by the `-d` flag.
pub fn dump(code: &[Command], level: usize, out: &mut dyn Write) -> io::Result<()> {
    for c in code {
        writeln!(
            out,
            " {}{} {} // {}",
            "  ".repeat(level),
            c.op,
            c.lit.print(),
            c.ty
        )?;
        for closure in &c.closures {
            write!(out, " {}=", "  ".repeat(level))?;
            for t in &closure.stack {
                write!(out, " {t}")?;
            }
            writeln!(out)?;
            dump(&closure.code, level + 1, out)?;
        }
    }
    Ok(())
}
