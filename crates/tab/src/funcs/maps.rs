//! Container builtins: map construction and lookup, materialisation,
//! flipping and merging.

use crate::{
    error::{Error, RunResult},
    funcs::{arg1, arg2, arg3, iter_elem, seq_elem},
    registry::{FuncImpl, Registry},
    seq::{collect_array, value_to_seq, SeqHandle, SeqStream},
    types::Type,
    value::{merge_values, MapValue, Value},
};

pub fn register(r: &mut Registry) {
    r.add_poly("get", get_checker);
    r.add_poly("has", has_checker);
    r.add_poly("index", index_checker);
    r.add_poly("array", array_checker);
    r.add_poly("iarray", iarray_checker);
    r.add_poly("map", map_checker);
    r.add_poly("flip", flip_checker);
    r.add_poly("merge", merge_checker);
}

fn get_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [Type::Map(kv), key, dflt] if *key == kv.0 && *dflt == kv.1 => {
            Some((get_map as FuncImpl, kv.1.clone()))
        }
        [Type::Arr(e), idx, dflt] if idx.is_numeric() && *dflt == **e => {
            Some((get_arr as FuncImpl, (**e).clone()))
        }
        _ => None,
    }
}

fn get_map(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (map, key, dflt) = arg3(args)?;
    let map = map.expect_map()?;
    *out = map.entries.get(&key).cloned().unwrap_or(dflt);
    Ok(())
}

fn get_arr(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (arr, idx, dflt) = arg3(args)?;
    *out = arr.index(&idx).unwrap_or(dflt);
    Ok(())
}

fn has_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [Type::Map(kv), key] if *key == kv.0 => Some((has_fn as FuncImpl, Type::UINT)),
        _ => None,
    }
}

fn has_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (map, key) = arg2(args)?;
    let map = map.expect_map()?;
    *out = Value::UInt(u64::from(map.entries.contains_key(&key)));
    Ok(())
}

/// The function form of the `[ ]` indexer, plus the substring and slice
/// variants.
fn index_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [Type::Arr(e), idx] if idx.is_numeric() => Some((index_one as FuncImpl, (**e).clone())),
        [Type::Map(kv), key] if *key == kv.0 => Some((index_one as FuncImpl, kv.1.clone())),
        [t, a, b] if t.is_string() && a.is_integer() && b.is_integer() => {
            Some((substr_fn as FuncImpl, Type::STR))
        }
        [t @ Type::Arr(_), a, b] if a.is_integer() && b.is_integer() => {
            Some((slice_fn as FuncImpl, t.clone()))
        }
        _ => None,
    }
}

fn index_one(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (container, key) = arg2(args)?;
    *out = container.index(&key)?;
    Ok(())
}

/// Inclusive index pair; negative positions count from the end.
fn span(len: usize, a: i64, b: i64) -> RunResult<(usize, usize)> {
    let fix = |i: i64| -> i64 {
        if i < 0 {
            len as i64 + i
        } else {
            i
        }
    };
    let (a, b) = (fix(a), fix(b));
    if a < 0 || b < a || b >= len as i64 {
        return Err(Error::runtime("index range out of bounds"));
    }
    Ok((a as usize, b as usize))
}

fn substr_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, a, b) = arg3(args)?;
    let s = s.expect_str()?;
    let a = a.as_integer().ok_or_else(|| Error::sanity("integer index expected"))?;
    let b = b.as_integer().ok_or_else(|| Error::sanity("integer index expected"))?;
    let (a, b) = span(s.len(), a, b)?;
    *out = Value::Str(s[a..=b].to_vec());
    Ok(())
}

fn slice_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (arr, a, b) = arg3(args)?;
    let arr = arr.expect_arr()?;
    let a = a.as_integer().ok_or_else(|| Error::sanity("integer index expected"))?;
    let b = b.as_integer().ok_or_else(|| Error::sanity("integer index expected"))?;
    let (a, b) = span(arr.len(), a, b)?;
    let inline = arr.inline;
    let values: Vec<Value> = arr
        .into_values()
        .into_iter()
        .skip(a)
        .take(b - a + 1)
        .collect();
    *out = Value::Arr(Box::new(collect_array(values, inline)));
    Ok(())
}

fn array_ret(args: &[Type]) -> Option<Type> {
    match args {
        [t] => Some(Type::arr(iter_elem(t).unwrap_or_else(|| t.clone()))),
        _ => None,
    }
}

fn array_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    array_ret(args).map(|t| (array_fn as FuncImpl, t))
}

fn iarray_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    array_ret(args).map(|t| (iarray_fn as FuncImpl, t))
}

fn materialise(args: Vec<Value>, out: &mut Value, inline: bool) -> RunResult<()> {
    let values = value_to_seq(arg1(args)?).collect()?;
    *out = Value::Arr(Box::new(collect_array(values, inline)));
    Ok(())
}

fn array_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    materialise(args, out, false)
}

fn iarray_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    materialise(args, out, true)
}

fn map_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let pair = |t: &Type| -> Option<(Type, Type)> {
        match t {
            Type::Tup(members) if members.len() == 2 => {
                Some((members[0].clone(), members[1].clone()))
            }
            _ => None,
        }
    };
    match args {
        [t @ Type::Tup(_)] => pair(t).map(|(k, v)| (map_fn as FuncImpl, Type::map(k, v))),
        [t] => {
            let (k, v) = pair(&seq_elem(t)?.clone())?;
            Some((map_fn as FuncImpl, Type::map(k, v)))
        }
        _ => None,
    }
}

fn map_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let mut map = MapValue::default();
    while let Some(v) = source.next()? {
        let (Value::Tup(mut members) | Value::Lines(mut members)) = v else {
            return Err(Error::sanity("map element is not a pair"));
        };
        if members.len() != 2 {
            return Err(Error::sanity("map element is not a pair"));
        }
        let value = members.pop().unwrap_or(Value::None);
        let key = members.pop().unwrap_or(Value::None);
        map.insert(key, value)?;
    }
    *out = Value::Map(Box::new(map));
    Ok(())
}

struct FlipSeq {
    inner: SeqHandle,
}

impl SeqStream for FlipSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        match self.inner.next()? {
            Some(Value::Tup(mut members) | Value::Lines(mut members)) if members.len() == 2 => {
                members.swap(0, 1);
                Ok(Some(Value::Tup(members)))
            }
            Some(_) => Err(Error::sanity("flip element is not a pair")),
            None => Ok(None),
        }
    }
}

fn flip_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [Type::Map(kv)] => Some((
            flip_fn as FuncImpl,
            Type::seq(Type::tup(vec![kv.1.clone(), kv.0.clone()])),
        )),
        [t] => match seq_elem(t)? {
            Type::Tup(members) if members.len() == 2 => Some((
                flip_fn as FuncImpl,
                Type::seq(Type::tup(vec![members[1].clone(), members[0].clone()])),
            )),
            _ => None,
        },
        _ => None,
    }
}

fn flip_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let inner = value_to_seq(arg1(args)?);
    *out = Value::Seq(SeqHandle::new(FlipSeq { inner }));
    Ok(())
}

fn merge_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => seq_elem(t).map(|e| (merge_fn as FuncImpl, e.clone())),
        _ => None,
    }
}

/// Folds a sequence with the map-value merge rules: maps union (their
/// own policies applied to collisions), arrays concatenate, numerics
/// add.
fn merge_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = arg1(args)?.expect_seq()?;
    let Some(mut acc) = source.next()? else {
        return Err(Error::runtime("merge of an empty sequence"));
    };
    while let Some(v) = source.next()? {
        merge_values(&mut acc, v)?;
    }
    *out = acc;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{seq::VecSeq, value::MergePolicy};

    fn str_val(s: &[u8]) -> Value {
        Value::Str(s.to_vec())
    }

    #[test]
    fn get_returns_the_default_on_misses() {
        let mut m = MapValue::default();
        m.insert(str_val(b"k"), Value::UInt(1)).unwrap();
        let map = Value::Map(Box::new(m));
        let mut out = Value::None;
        get_map(vec![map.clone(), str_val(b"k"), Value::UInt(0)], &mut out).unwrap();
        assert_eq!(out, Value::UInt(1));
        get_map(vec![map, str_val(b"nope"), Value::UInt(0)], &mut out).unwrap();
        assert_eq!(out, Value::UInt(0));
    }

    #[test]
    fn substring_span() {
        let mut out = Value::None;
        substr_fn(
            vec![str_val(b"hello"), Value::Int(1), Value::Int(-2)],
            &mut out,
        )
        .unwrap();
        assert_eq!(out, str_val(b"ell"));
        assert!(substr_fn(
            vec![str_val(b"hi"), Value::Int(0), Value::Int(5)],
            &mut Value::None
        )
        .is_err());
    }

    #[test]
    fn map_from_pairs() {
        let pairs = Value::Seq(SeqHandle::new(VecSeq::new(vec![
            Value::Tup(vec![str_val(b"a"), Value::UInt(1)]),
            Value::Tup(vec![str_val(b"b"), Value::UInt(2)]),
        ])));
        let mut out = Value::None;
        map_fn(vec![pairs], &mut out).unwrap();
        let m = out.expect_map().unwrap();
        assert_eq!(m.entries.get(&str_val(b"b")), Some(&Value::UInt(2)));
    }

    #[test]
    fn merge_sums_count_maps() {
        let mut m1 = MapValue::with_policy(MergePolicy::Sum);
        m1.insert(str_val(b"a"), Value::UInt(2)).unwrap();
        let mut m2 = MapValue::with_policy(MergePolicy::Sum);
        m2.insert(str_val(b"a"), Value::UInt(3)).unwrap();
        m2.insert(str_val(b"b"), Value::UInt(1)).unwrap();
        let seq = Value::Seq(SeqHandle::new(VecSeq::new(vec![
            Value::Map(Box::new(m1)),
            Value::Map(Box::new(m2)),
        ])));
        let mut out = Value::None;
        merge_fn(vec![seq], &mut out).unwrap();
        let m = out.expect_map().unwrap();
        assert_eq!(m.entries.get(&str_val(b"a")), Some(&Value::UInt(5)));
        assert_eq!(m.entries.get(&str_val(b"b")), Some(&Value::UInt(1)));
    }
}
