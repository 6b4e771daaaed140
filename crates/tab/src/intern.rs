//! Process-wide interning of variable and function names.
//!
//! Every name that survives parsing is a [`Sym`], a dense `u32` id that
//! hashes and compares as an integer. Id 0 is reserved as "none". The
//! table is written while the expression is parsed and while the builtin
//! registry registers its names, both of which happen before any worker
//! thread starts; after that the table is only read, so a plain `RwLock`
//! is enough for concurrent lookups from scatter threads.

use std::{
    collections::HashMap,
    sync::{LazyLock, RwLock},
};

/// Index into the interner's storage. `u32` keeps commands small; four
/// billion distinct names is far more than any expression can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Sym(u32);

impl Sym {
    /// The reserved "no name" id.
    pub const NONE: Self = Self(0);

    #[inline]
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

struct Interner {
    to_id: HashMap<Vec<u8>, u32, ahash::RandomState>,
    to_name: Vec<Vec<u8>>,
}

impl Interner {
    fn new() -> Self {
        Self {
            to_id: HashMap::default(),
            // slot 0 is the reserved "none" entry
            to_name: vec![Vec::new()],
        }
    }
}

static INTERNER: LazyLock<RwLock<Interner>> = LazyLock::new(|| RwLock::new(Interner::new()));

/// Interns a byte string, returning its stable id.
pub fn intern(name: &[u8]) -> Sym {
    {
        let table = INTERNER.read().unwrap_or_else(|e| e.into_inner());
        if let Some(&id) = table.to_id.get(name) {
            return Sym(id);
        }
    }
    let mut table = INTERNER.write().unwrap_or_else(|e| e.into_inner());
    if let Some(&id) = table.to_id.get(name) {
        return Sym(id);
    }
    let id = u32::try_from(table.to_name.len()).unwrap_or_else(|_| panic!("interner overflow"));
    table.to_id.insert(name.to_vec(), id);
    table.to_name.push(name.to_vec());
    Sym(id)
}

/// Interns a `&str` name.
pub fn intern_str(name: &str) -> Sym {
    intern(name.as_bytes())
}

/// The reserved input variable `@` (also writable as `$`; the parser
/// normalises both spellings to this one id).
pub fn at_sym() -> Sym {
    static AT: LazyLock<Sym> = LazyLock::new(|| intern(b"@"));
    *AT
}

/// Returns the name behind an id, lossily decoded for error messages.
#[must_use]
pub fn resolve(sym: Sym) -> String {
    let table = INTERNER.read().unwrap_or_else(|e| e.into_inner());
    match table.to_name.get(sym.0 as usize) {
        Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        None => String::from("<uninterned>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable() {
        let a = intern(b"some_name");
        let b = intern(b"some_name");
        assert_eq!(a, b);
        assert_eq!(resolve(a), "some_name");
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let a = intern(b"left");
        let b = intern(b"right");
        assert_ne!(a, b);
        assert!(!a.is_none());
    }

    #[test]
    fn concurrent_interning_is_consistent() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    let name = format!("shared_{}", i % 2);
                    intern(name.as_bytes())
                })
            })
            .collect();
        let ids: Vec<Sym> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for chunk in ids.chunks(2) {
            // re-interning from any thread must agree
            for &id in chunk {
                assert_eq!(intern(resolve(id).as_bytes()), id);
            }
        }
    }
}
