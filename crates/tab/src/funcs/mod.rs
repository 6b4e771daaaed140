//! The builtin function library.
//!
//! Each domain has its own submodule with a `register` function; the
//! registry calls [`register_all`] once, before any thread starts.
//! Implementations all satisfy the registry's `impl(args, out)`
//! contract and know nothing about the evaluator beyond the value
//! model.

mod aggr;
mod control;
mod hashing;
mod math;
mod maps;
mod random;
mod seqs;
mod strings;
mod time;

pub use random::set_seed;

use std::sync::{LazyLock, RwLock};

use regex::bytes::Regex;

use crate::{
    error::{Error, RunResult},
    registry::Registry,
    types::Type,
    value::Value,
};

/// Registers every builtin.
pub fn register_all(r: &mut Registry) {
    math::register(r);
    strings::register(r);
    aggr::register(r);
    seqs::register(r);
    maps::register(r);
    control::register(r);
    hashing::register(r);
    random::register(r);
    time::register(r);
}

// ---- argument plumbing -------------------------------------------------

pub(crate) fn arg1(args: Vec<Value>) -> RunResult<Value> {
    let mut it = args.into_iter();
    it.next().ok_or_else(|| Error::sanity("missing argument"))
}

pub(crate) fn arg2(args: Vec<Value>) -> RunResult<(Value, Value)> {
    let mut it = args.into_iter();
    let a = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    let b = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    Ok((a, b))
}

pub(crate) fn arg3(args: Vec<Value>) -> RunResult<(Value, Value, Value)> {
    let mut it = args.into_iter();
    let a = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    let b = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    let c = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    Ok((a, b, c))
}

// ---- type-pattern helpers for checkers ---------------------------------

pub(crate) fn seq_elem(t: &Type) -> Option<&Type> {
    match t {
        Type::Seq(e) => Some(e),
        _ => None,
    }
}

pub(crate) fn arr_elem(t: &Type) -> Option<&Type> {
    match t {
        Type::Arr(e) => Some(e),
        _ => None,
    }
}

/// Element type of any iterable: sequence/array element, map pair.
pub(crate) fn iter_elem(t: &Type) -> Option<Type> {
    match t {
        Type::Seq(e) | Type::Arr(e) => Some((**e).clone()),
        Type::Map(kv) => Some(Type::tup(vec![kv.0.clone(), kv.1.clone()])),
        _ => None,
    }
}

// ---- shared regex cache ------------------------------------------------

/// Compiled patterns for `grep`, `grepif`, `recut` and `replace`. The
/// cache is read from every worker thread; patterns are tiny compared
/// to compiling per call.
static REGEX_CACHE: LazyLock<RwLock<std::collections::HashMap<Vec<u8>, Regex, ahash::RandomState>>> =
    LazyLock::new(|| RwLock::new(std::collections::HashMap::default()));

pub(crate) fn cached_regex(pattern: &[u8]) -> RunResult<Regex> {
    {
        let cache = REGEX_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
    }
    let text = String::from_utf8_lossy(pattern);
    let re = Regex::new(&text)
        .map_err(|e| Error::runtime(format!("invalid regex \"{text}\": {e}")))?;
    let mut cache = REGEX_CACHE.write().unwrap_or_else(|e| e.into_inner());
    cache.insert(pattern.to_vec(), re.clone());
    Ok(re)
}
