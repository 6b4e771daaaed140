//! Runtime values.
//!
//! Values mirror the static types: atoms, tuples, arrays, maps and lazy
//! sequences. Homogeneous atom arrays store their elements unboxed so
//! indexing and hashing never chase per-element allocations; anything
//! heterogeneous falls back to the boxed `Obj` storage.
//!
//! Equality is structural and strict: values of different kinds are
//! never equal. Hashes of composites combine member hashes by addition
//! for maps (order-independent) and by positional folding for arrays and
//! tuples.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::{
    error::{Error, RunResult},
    seq::SeqHandle,
    types::{AtomTy, Type},
};

/// What happens when a map comprehension stores a value under a key that
/// is already present. `Sum`/`Min`/`Max` are selected by the aggregation
/// marker functions in the value arm; `Concat` and `Merge` are selected
/// by the value type (arrays concatenate, maps merge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    Replace,
    Sum,
    Min,
    Max,
    Concat,
    Merge,
}

/// Unboxed storage for homogeneous arrays, boxed storage for the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Real(Vec<f64>),
    Str(Vec<Vec<u8>>),
    Obj(Vec<Value>),
}

/// An array value. `inline` selects `;`-separated printing (the
/// `[. .]` literal form).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub items: Array,
    pub inline: bool,
}

impl ArrayValue {
    /// An empty array with storage specialised to the element type.
    #[must_use]
    pub fn for_elem(elem: &Type) -> Self {
        let items = match elem {
            Type::Atom(AtomTy::Int) => Array::Int(Vec::new()),
            Type::Atom(AtomTy::UInt) => Array::UInt(Vec::new()),
            Type::Atom(AtomTy::Real) => Array::Real(Vec::new()),
            Type::Atom(AtomTy::Str) => Array::Str(Vec::new()),
            _ => Array::Obj(Vec::new()),
        };
        Self { items, inline: false }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.items {
            Array::Int(v) => v.len(),
            Array::UInt(v) => v.len(),
            Array::Real(v) => v.len(),
            Array::Str(v) => v.len(),
            Array::Obj(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match &mut self.items {
            Array::Int(v) => v.clear(),
            Array::UInt(v) => v.clear(),
            Array::Real(v) => v.clear(),
            Array::Str(v) => v.clear(),
            Array::Obj(v) => v.clear(),
        }
    }

    /// Appends a value, which must match the storage kind.
    pub fn push(&mut self, value: Value) -> RunResult<()> {
        match (&mut self.items, value) {
            (Array::Int(v), Value::Int(x)) => v.push(x),
            (Array::UInt(v), Value::UInt(x) | Value::HexUInt(x)) => v.push(x),
            (Array::Real(v), Value::Real(x)) => v.push(x),
            (Array::Str(v), Value::Str(x)) => v.push(x),
            (Array::Obj(v), x) => v.push(x),
            (_, other) => {
                return Err(Error::sanity(format!(
                    "array storage does not accept a {}",
                    other.kind_name()
                )))
            }
        }
        Ok(())
    }

    /// Returns element `i` by clone.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<Value> {
        match &self.items {
            Array::Int(v) => v.get(i).map(|x| Value::Int(*x)),
            Array::UInt(v) => v.get(i).map(|x| Value::UInt(*x)),
            Array::Real(v) => v.get(i).map(|x| Value::Real(*x)),
            Array::Str(v) => v.get(i).map(|x| Value::Str(x.clone())),
            Array::Obj(v) => v.get(i).cloned(),
        }
    }

    /// Drains the array into boxed values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        match self.items {
            Array::Int(v) => v.into_iter().map(Value::Int).collect(),
            Array::UInt(v) => v.into_iter().map(Value::UInt).collect(),
            Array::Real(v) => v.into_iter().map(Value::Real).collect(),
            Array::Str(v) => v.into_iter().map(Value::Str).collect(),
            Array::Obj(v) => v,
        }
    }

    /// Appends every element of `other`, which must share the storage
    /// kind.
    pub fn concat(&mut self, other: Self) -> RunResult<()> {
        for v in other.into_values() {
            self.push(v)?;
        }
        Ok(())
    }
}

/// A hash map value. Entries keep insertion order; the policy is the
/// duplicate-key rule the map was built with, and also governs how two
/// such maps merge.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    pub entries: IndexMap<Value, Value, ahash::RandomState>,
    pub policy: MergePolicy,
}

impl MapValue {
    #[must_use]
    pub fn with_policy(policy: MergePolicy) -> Self {
        Self { entries: IndexMap::default(), policy }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `value` under `key`, combining with an existing entry per
    /// the map's policy.
    pub fn insert(&mut self, key: Value, value: Value) -> RunResult<()> {
        match self.entries.get_mut(&key) {
            None => {
                self.entries.insert(key, value);
                Ok(())
            }
            Some(existing) => combine(existing, value, self.policy),
        }
    }
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, v)| other.entries.get(k).is_some_and(|w| v == w))
    }
}

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Int(i64),
    UInt(u64),
    /// A `UInt` marked by `hex` to print as `0x…`; behaves as a plain
    /// `UInt` everywhere else.
    HexUInt(u64),
    Real(f64),
    /// Byte string; no Unicode interpretation anywhere.
    Str(Vec<u8>),
    Tup(Vec<Value>),
    /// A tuple marked by `lines` to print one member per line; behaves
    /// as a plain tuple everywhere else.
    Lines(Vec<Value>),
    Arr(Box<ArrayValue>),
    Map(Box<MapValue>),
    Seq(SeqHandle),
}

// Print markers compare as their unmarked counterparts, so a hex UInt
// still finds its map slot and a lines tuple equals the tuple it wraps.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a) | Self::HexUInt(a), Self::UInt(b) | Self::HexUInt(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tup(a) | Self::Lines(a), Self::Tup(b) | Self::Lines(b)) => a == b,
            (Self::Arr(a), Self::Arr(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// A default value of the given static type, used to pre-allocate
    /// function call results.
    #[must_use]
    pub fn defaults(ty: &Type) -> Self {
        match ty {
            Type::None => Self::None,
            Type::Atom(AtomTy::Int) => Self::Int(0),
            Type::Atom(AtomTy::UInt) => Self::UInt(0),
            Type::Atom(AtomTy::Real) => Self::Real(0.0),
            Type::Atom(AtomTy::Str) => Self::Str(Vec::new()),
            Type::Tup(ts) => Self::Tup(ts.iter().map(Self::defaults).collect()),
            Type::Arr(e) => Self::Arr(Box::new(ArrayValue::for_elem(e))),
            Type::Map(_) => Self::Map(Box::<MapValue>::default()),
            Type::Seq(_) => Self::Seq(SeqHandle::empty()),
        }
    }

    /// Short kind name for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int(_) => "Int",
            Self::UInt(_) | Self::HexUInt(_) => "UInt",
            Self::Real(_) => "Real",
            Self::Str(_) => "String",
            Self::Tup(_) | Self::Lines(_) => "tuple",
            Self::Arr(_) => "array",
            Self::Map(_) => "map",
            Self::Seq(_) => "sequence",
        }
    }

    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) | Self::HexUInt(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Any numeric atom widened to `Real`.
    #[must_use]
    pub fn as_real_lossy(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) | Self::HexUInt(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer atoms as a signed value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) | Self::HexUInt(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn expect_str(self) -> RunResult<Vec<u8>> {
        match self {
            Self::Str(v) => Ok(v),
            other => Err(Error::sanity(format!("expected a string, got {}", other.kind_name()))),
        }
    }

    pub fn expect_seq(self) -> RunResult<SeqHandle> {
        match self {
            Self::Seq(h) => Ok(h),
            other => Err(Error::sanity(format!("expected a sequence, got {}", other.kind_name()))),
        }
    }

    pub fn expect_arr(self) -> RunResult<ArrayValue> {
        match self {
            Self::Arr(a) => Ok(*a),
            other => Err(Error::sanity(format!("expected an array, got {}", other.kind_name()))),
        }
    }

    pub fn expect_map(self) -> RunResult<MapValue> {
        match self {
            Self::Map(m) => Ok(*m),
            other => Err(Error::sanity(format!("expected a map, got {}", other.kind_name()))),
        }
    }

    /// Truthiness: zero numerics and empty strings/containers are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Int(v) => *v != 0,
            Self::UInt(v) | Self::HexUInt(v) => *v != 0,
            Self::Real(v) => *v != 0.0,
            Self::Str(v) => !v.is_empty(),
            Self::Tup(_) | Self::Lines(_) | Self::Seq(_) => true,
            Self::Arr(a) => !a.is_empty(),
            Self::Map(m) => !m.is_empty(),
        }
    }

    /// Container indexing for the `IDX` command and the `index`/`get`
    /// builtins. Arrays accept any numeric key: `UInt` exact, `Int`
    /// counts from the end when negative, `Real` in [0, 1] scales by
    /// length. Maps look the key up; a missing key is an error.
    pub fn index(&self, key: &Self) -> RunResult<Self> {
        match self {
            Self::Arr(arr) => {
                let i = array_index(arr.len(), key)?;
                arr.get(i)
                    .ok_or_else(|| Error::runtime("array index out of bounds"))
            }
            Self::Map(map) => map
                .entries
                .get(key)
                .cloned()
                .ok_or_else(|| Error::runtime("key is not in map")),
            other => Err(Error::sanity(format!("indexing a {}", other.kind_name()))),
        }
    }

    /// A process-stable structural hash; the basis of map keying and the
    /// `hash` builtin.
    #[must_use]
    pub fn hash64(&self) -> u64 {
        // fixed keys keep hashes stable across runs and threads
        const FOLD: u64 = 0x9e37_79b9_7f4a_7c15;
        fn bytes_hash(kind: u64, bytes: &[u8]) -> u64 {
            use std::hash::BuildHasher;
            let state = ahash::RandomState::with_seeds(0x243f, 0x6a88, 0x85a3, 0x08d3);
            state.hash_one((kind, bytes))
        }
        match self {
            Self::None => 0,
            Self::Int(v) => bytes_hash(1, &v.to_le_bytes()),
            Self::UInt(v) | Self::HexUInt(v) => bytes_hash(2, &v.to_le_bytes()),
            Self::Real(v) => bytes_hash(3, &v.to_bits().to_le_bytes()),
            Self::Str(v) => bytes_hash(4, v),
            Self::Tup(vs) | Self::Lines(vs) => vs
                .iter()
                .fold(5u64, |h, v| h.wrapping_mul(FOLD).wrapping_add(v.hash64())),
            Self::Arr(arr) => {
                let mut h: u64 = 6;
                for i in 0..arr.len() {
                    if let Some(v) = arr.get(i) {
                        h = h.wrapping_mul(FOLD).wrapping_add(v.hash64());
                    }
                }
                h
            }
            Self::Map(map) => map.entries.iter().fold(7u64, |h, (k, v)| {
                h.wrapping_add(k.hash64()).wrapping_add(v.hash64())
            }),
            Self::Seq(h) => h.addr() as u64,
        }
    }

    /// Total order used by `sort` and sorted printing: kind rank first,
    /// then value. `Real` NaN sorts last via `f64::total_cmp`.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        fn rank(v: &Value) -> u8 {
            match v {
                Value::None => 0,
                Value::Int(_) => 1,
                Value::UInt(_) | Value::HexUInt(_) => 2,
                Value::Real(_) => 3,
                Value::Str(_) => 4,
                Value::Tup(_) | Value::Lines(_) => 5,
                Value::Arr(_) => 6,
                Value::Map(_) => 7,
                Value::Seq(_) => 8,
            }
        }
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::UInt(a) | Self::HexUInt(a), Self::UInt(b) | Self::HexUInt(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Tup(a) | Self::Lines(a), Self::Tup(b) | Self::Lines(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.total_cmp(y) {
                        Ordering::Equal => {}
                        o => return o,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Arr(a), Self::Arr(b)) => {
                for i in 0..a.len().min(b.len()) {
                    match (a.get(i), b.get(i)) {
                        (Some(x), Some(y)) => match x.total_cmp(&y) {
                            Ordering::Equal => {}
                            o => return o,
                        },
                        _ => break,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Map(a), Self::Map(b)) => a.len().cmp(&b.len()),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash64());
    }
}

/// Resolves an array index per the numeric-key rules.
fn array_index(len: usize, key: &Value) -> RunResult<usize> {
    let i: usize = match key {
        Value::UInt(z) | Value::HexUInt(z) => *z as usize,
        Value::Int(z) => {
            if *z < 0 {
                (len as i64 + z).max(-1) as usize
            } else {
                *z as usize
            }
        }
        Value::Real(z) => {
            if (0.0..=1.0).contains(z) {
                (len as f64 * z) as usize
            } else {
                return Err(Error::runtime("array index out of bounds"));
            }
        }
        other => {
            return Err(Error::sanity(format!(
                "array indexed with a {}",
                other.kind_name()
            )))
        }
    };
    if i >= len {
        return Err(Error::runtime("array index out of bounds"));
    }
    Ok(i)
}

/// Combines an incoming value into an existing map slot.
pub fn combine(existing: &mut Value, incoming: Value, policy: MergePolicy) -> RunResult<()> {
    match policy {
        MergePolicy::Replace => {
            *existing = incoming;
            Ok(())
        }
        MergePolicy::Sum => match (existing, incoming) {
            (Value::Int(a), Value::Int(b)) => {
                *a = a.wrapping_add(b);
                Ok(())
            }
            (Value::UInt(a), Value::UInt(b) | Value::HexUInt(b)) => {
                *a = a.wrapping_add(b);
                Ok(())
            }
            (Value::HexUInt(a), Value::UInt(b) | Value::HexUInt(b)) => {
                *a = a.wrapping_add(b);
                Ok(())
            }
            (Value::Real(a), Value::Real(b)) => {
                *a += b;
                Ok(())
            }
            (a, b) => Err(Error::sanity(format!(
                "sum-merging {} with {}",
                a.kind_name(),
                b.kind_name()
            ))),
        },
        MergePolicy::Min => {
            if incoming.total_cmp(existing) == std::cmp::Ordering::Less {
                *existing = incoming;
            }
            Ok(())
        }
        MergePolicy::Max => {
            if incoming.total_cmp(existing) == std::cmp::Ordering::Greater {
                *existing = incoming;
            }
            Ok(())
        }
        MergePolicy::Concat => match (existing, incoming) {
            (Value::Arr(a), Value::Arr(b)) => a.concat(*b),
            (a, b) => Err(Error::sanity(format!(
                "concat-merging {} with {}",
                a.kind_name(),
                b.kind_name()
            ))),
        },
        MergePolicy::Merge => match (existing, incoming) {
            (Value::Map(a), Value::Map(b)) => {
                let policy = a.policy;
                for (k, v) in b.entries {
                    match a.entries.get_mut(&k) {
                        None => {
                            a.entries.insert(k, v);
                        }
                        Some(slot) => combine(slot, v, policy)?,
                    }
                }
                Ok(())
            }
            (a, b) => Err(Error::sanity(format!(
                "map-merging {} with {}",
                a.kind_name(),
                b.kind_name()
            ))),
        },
    }
}

/// Merges two values of the same shape, the way maps used as map values
/// merge: maps recurse, arrays concatenate, numerics add, anything else
/// is replaced by the newcomer.
pub fn merge_values(existing: &mut Value, incoming: Value) -> RunResult<()> {
    let policy = match (&*existing, &incoming) {
        (Value::Map(_), Value::Map(_)) => MergePolicy::Merge,
        (Value::Arr(_), Value::Arr(_)) => MergePolicy::Concat,
        (Value::Int(_), Value::Int(_))
        | (Value::UInt(_) | Value::HexUInt(_), Value::UInt(_) | Value::HexUInt(_))
        | (Value::Real(_), Value::Real(_)) => MergePolicy::Sum,
        _ => MergePolicy::Replace,
    };
    combine(existing, incoming, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr_uint(items: &[u64]) -> Value {
        Value::Arr(Box::new(ArrayValue {
            items: Array::UInt(items.to_vec()),
            inline: false,
        }))
    }

    #[test]
    fn strict_equality_across_kinds() {
        assert_ne!(Value::Int(1), Value::UInt(1));
        assert_eq!(Value::UInt(5), Value::HexUInt(5));
        assert_eq!(Value::Str(b"ab".to_vec()), Value::Str(b"ab".to_vec()));
        // print markers compare and hash as their unmarked counterparts
        let pair = vec![Value::UInt(1), Value::Str(b"x".to_vec())];
        assert_eq!(Value::Lines(pair.clone()), Value::Tup(pair.clone()));
        assert_eq!(
            Value::Lines(pair.clone()).hash64(),
            Value::Tup(pair).hash64()
        );
        assert_eq!(Value::HexUInt(5).hash64(), Value::UInt(5).hash64());
    }

    #[test]
    fn array_indexing_rules() {
        let a = arr_uint(&[10, 20, 30, 40]);
        assert_eq!(a.index(&Value::UInt(1)).unwrap(), Value::UInt(20));
        assert_eq!(a.index(&Value::Int(-1)).unwrap(), Value::UInt(40));
        assert_eq!(a.index(&Value::Real(0.5)).unwrap(), Value::UInt(30));
        assert!(a.index(&Value::UInt(4)).is_err());
        assert!(a.index(&Value::Real(1.0)).is_err());
        assert!(a.index(&Value::Real(1.5)).is_err());
        assert!(a.index(&Value::Int(-5)).is_err());
    }

    #[test]
    fn map_missing_key_is_an_error() {
        let mut m = MapValue::default();
        m.insert(Value::Str(b"k".to_vec()), Value::UInt(1)).unwrap();
        let v = Value::Map(Box::new(m));
        assert_eq!(v.index(&Value::Str(b"k".to_vec())).unwrap(), Value::UInt(1));
        assert!(v.index(&Value::Str(b"absent".to_vec())).is_err());
    }

    #[test]
    fn sum_policy_accumulates() {
        let mut m = MapValue::with_policy(MergePolicy::Sum);
        m.insert(Value::Str(b"a".to_vec()), Value::UInt(1)).unwrap();
        m.insert(Value::Str(b"a".to_vec()), Value::UInt(1)).unwrap();
        m.insert(Value::Str(b"b".to_vec()), Value::UInt(1)).unwrap();
        assert_eq!(
            m.entries.get(&Value::Str(b"a".to_vec())),
            Some(&Value::UInt(2))
        );
        assert_eq!(
            m.entries.get(&Value::Str(b"b".to_vec())),
            Some(&Value::UInt(1))
        );
    }

    #[test]
    fn map_hash_is_order_independent() {
        let mut m1 = MapValue::default();
        m1.insert(Value::UInt(1), Value::UInt(10)).unwrap();
        m1.insert(Value::UInt(2), Value::UInt(20)).unwrap();
        let mut m2 = MapValue::default();
        m2.insert(Value::UInt(2), Value::UInt(20)).unwrap();
        m2.insert(Value::UInt(1), Value::UInt(10)).unwrap();
        let v1 = Value::Map(Box::new(m1));
        let v2 = Value::Map(Box::new(m2));
        assert_eq!(v1.hash64(), v2.hash64());
        assert_eq!(v1, v2);
    }

    #[test]
    fn tuple_hash_is_order_sensitive() {
        let a = Value::Tup(vec![Value::UInt(1), Value::UInt(2)]);
        let b = Value::Tup(vec![Value::UInt(2), Value::UInt(1)]);
        assert_ne!(a.hash64(), b.hash64());
    }

    #[test]
    fn merge_values_by_shape() {
        let mut a = Value::UInt(3);
        merge_values(&mut a, Value::UInt(4)).unwrap();
        assert_eq!(a, Value::UInt(7));

        let mut arr = arr_uint(&[1]);
        merge_values(&mut arr, arr_uint(&[2, 3])).unwrap();
        assert_eq!(arr, arr_uint(&[1, 2, 3]));

        let mut s = Value::Str(b"old".to_vec());
        merge_values(&mut s, Value::Str(b"new".to_vec())).unwrap();
        assert_eq!(s, Value::Str(b"new".to_vec()));
    }
}
