//! The function registry.
//!
//! Builtins come in two shapes. Monomorphic entries are keyed by
//! `(name, argument types)` and looked up by exact match, so overloads
//! under one name coexist freely. Polymorphic entries install a checker
//! that inspects the argument type tuple and, when it accepts, hands
//! back an implementation and the inferred return type; this covers
//! variable arity (`cat`, `zip`) and pattern-typed calls (`if`, `case`).
//!
//! The call convention is `impl(args, out)`: `args` is the evaluated
//! argument list, `out` a pre-allocated value of the return type. An
//! implementation may fill `out` in place or rebind it to one of its
//! inputs (`if`, `tuple`).
//!
//! The registry is populated once before any thread starts and is
//! read-only afterwards.

use std::{collections::HashMap, sync::LazyLock};

use crate::{
    error::{Error, RunResult},
    intern::{self, Sym},
    types::Type,
    value::Value,
};

/// Implementation signature every builtin satisfies.
pub type FuncImpl = fn(Vec<Value>, &mut Value) -> RunResult<()>;

/// A polymorphic checker: accepts an argument type tuple or declines.
pub type Checker = fn(&[Type]) -> Option<(FuncImpl, Type)>;

/// A resolved call site, annotated onto `FUN` commands by inference.
#[derive(Debug, Clone)]
pub struct ResolvedFunc {
    pub name: Sym,
    pub imp: FuncImpl,
    pub ret: Type,
}

/// Multimap from function name to overloads and checkers.
#[derive(Default)]
pub struct Registry {
    mono: HashMap<(Sym, Vec<Type>), (FuncImpl, Type), ahash::RandomState>,
    poly: HashMap<Sym, Vec<Checker>, ahash::RandomState>,
    names: Vec<&'static str>,
}

impl Registry {
    /// Registers a monomorphic overload.
    pub fn add(&mut self, name: &'static str, args: &[Type], ret: Type, imp: FuncImpl) {
        let sym = intern::intern_str(name);
        self.remember_name(name);
        self.mono.insert((sym, args.to_vec()), (imp, ret));
    }

    /// Registers a polymorphic checker. Checkers for one name are tried
    /// in registration order.
    pub fn add_poly(&mut self, name: &'static str, checker: Checker) {
        let sym = intern::intern_str(name);
        self.remember_name(name);
        self.poly.entry(sym).or_default().push(checker);
    }

    fn remember_name(&mut self, name: &'static str) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// Resolves a call: polymorphic checkers first, then the exact
    /// monomorphic match. Failure quotes the attempted signature.
    pub fn resolve(&self, name: Sym, args: &[Type]) -> RunResult<(FuncImpl, Type)> {
        if let Some(checkers) = self.poly.get(&name) {
            for checker in checkers {
                if let Some((imp, ret)) = checker(args) {
                    return Ok((imp, ret));
                }
            }
        }
        if let Some((imp, ret)) = self.mono.get(&(name, args.to_vec())) {
            return Ok((*imp, ret.clone()));
        }
        let sig = args
            .iter()
            .map(Type::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::ty(format!(
            "invalid function call: {}({sig})",
            intern::resolve(name)
        )))
    }

    /// Registered names in registration order, for the help listing.
    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}

/// The process-wide registry, populated on first use.
pub fn registry() -> &'static Registry {
    static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
        let mut r = Registry::default();
        crate::funcs::register_all(&mut r);
        r
    });
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(_args: Vec<Value>, _out: &mut Value) -> RunResult<()> {
        Ok(())
    }

    #[test]
    fn overloads_coexist_and_match_exactly() {
        let mut r = Registry::default();
        r.add("f", &[Type::INT], Type::INT, stub);
        r.add("f", &[Type::STR], Type::UINT, stub);
        let sym = intern::intern_str("f");
        assert_eq!(r.resolve(sym, &[Type::INT]).unwrap().1, Type::INT);
        assert_eq!(r.resolve(sym, &[Type::STR]).unwrap().1, Type::UINT);
        let err = r.resolve(sym, &[Type::REAL]).unwrap_err();
        assert!(err.to_string().contains("f(Real)"));
    }

    #[test]
    fn poly_checker_wins_over_mono() {
        fn checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
            (args.len() == 1).then_some((stub as FuncImpl, Type::REAL))
        }
        let mut r = Registry::default();
        r.add("g", &[Type::INT], Type::INT, stub);
        r.add_poly("g", checker);
        let sym = intern::intern_str("g");
        // exactly one entry is selected, and it is the checker's
        assert_eq!(r.resolve(sym, &[Type::INT]).unwrap().1, Type::REAL);
    }
}
