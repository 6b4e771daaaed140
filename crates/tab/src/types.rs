//! Static types of the expression language.
//!
//! Types are small trees compared structurally. A one-element tuple is a
//! distinct type from its member; the collapse rule in the checker is the
//! only place that conflates them.

use std::fmt;

use crate::error::{Error, RunResult};

/// The four scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomTy {
    Int,
    UInt,
    Real,
    Str,
}

/// A static type: atom, tuple, array, map or lazy sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Type {
    /// Absence of a value; the type of an empty argument list.
    #[default]
    None,
    Atom(AtomTy),
    /// Fixed-arity heterogeneous tuple, n >= 1.
    Tup(Vec<Type>),
    /// Homogeneous growable array.
    Arr(Box<Type>),
    /// Hash map.
    Map(Box<(Type, Type)>),
    /// Lazy single-pass sequence.
    Seq(Box<Type>),
}

impl Type {
    pub const INT: Self = Self::Atom(AtomTy::Int);
    pub const UINT: Self = Self::Atom(AtomTy::UInt);
    pub const REAL: Self = Self::Atom(AtomTy::Real);
    pub const STR: Self = Self::Atom(AtomTy::Str);

    #[must_use]
    pub fn arr(elem: Self) -> Self {
        Self::Arr(Box::new(elem))
    }

    #[must_use]
    pub fn map(key: Self, val: Self) -> Self {
        Self::Map(Box::new((key, val)))
    }

    #[must_use]
    pub fn seq(elem: Self) -> Self {
        Self::Seq(Box::new(elem))
    }

    #[must_use]
    pub fn tup(members: Vec<Self>) -> Self {
        Self::Tup(members)
    }

    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Atom(AtomTy::Int | AtomTy::UInt))
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Atom(AtomTy::Int | AtomTy::UInt | AtomTy::Real))
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::Atom(AtomTy::Str))
    }

    /// The element type produced by iterating this type: arrays and
    /// sequences yield their element, maps yield key/value pairs.
    pub fn elem(&self) -> RunResult<Self> {
        match self {
            Self::Arr(e) | Self::Seq(e) => Ok((**e).clone()),
            Self::Map(kv) => Ok(Self::tup(vec![kv.0.clone(), kv.1.clone()])),
            other => Err(Error::ty(format!("cannot iterate a value of type {other}"))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Atom(AtomTy::Int) => write!(f, "Int"),
            Self::Atom(AtomTy::UInt) => write!(f, "UInt"),
            Self::Atom(AtomTy::Real) => write!(f, "Real"),
            Self::Atom(AtomTy::Str) => write!(f, "String"),
            Self::Tup(members) => {
                write!(f, "(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ")")
            }
            Self::Arr(e) => write!(f, "Arr[{e}]"),
            Self::Map(kv) => write!(f, "Map[{}, {}]", kv.0, kv.1),
            Self::Seq(e) => write!(f, "Seq[{e}]"),
        }
    }
}

/// Collapses a closure's final type stack to a single type: exactly one
/// entry stands for itself, several entries become a tuple, none is an
/// error (empty sequences are forbidden).
pub fn collapse(stack: &[Type]) -> RunResult<Type> {
    match stack {
        [] => Err(Error::ty("empty sequences are not allowed")),
        [one] => Ok(one.clone()),
        many => Ok(Type::tup(many.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        assert_eq!(Type::arr(Type::STR), Type::arr(Type::STR));
        assert_ne!(Type::arr(Type::STR), Type::seq(Type::STR));
        // a 1-tuple is not its member
        assert_ne!(Type::tup(vec![Type::INT]), Type::INT);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Type::map(Type::STR, Type::UINT).to_string(), "Map[String, UInt]");
        assert_eq!(
            Type::seq(Type::tup(vec![Type::UINT, Type::STR])).to_string(),
            "Seq[(UInt, String)]"
        );
    }

    #[test]
    fn collapse_rule() {
        assert_eq!(collapse(&[Type::INT]).unwrap(), Type::INT);
        assert_eq!(
            collapse(&[Type::INT, Type::STR]).unwrap(),
            Type::tup(vec![Type::INT, Type::STR])
        );
        assert!(collapse(&[]).is_err());
    }
}
