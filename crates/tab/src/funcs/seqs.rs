//! Lazy sequence builtins. Almost everything here returns a new stream
//! wrapped around its argument; only `take`, `peek`, `sort`, `reverse`
//! and `uniques` actually pull elements.

use ahash::AHashSet;

use crate::{
    error::{Error, RunResult},
    funcs::{arg1, arg2, iter_elem, seq_elem},
    registry::{FuncImpl, Registry},
    seq::{
        collect_array, value_to_seq, ChainSeq, FilterSeq, FlattenSeq, HeadSeq, SeqHandle,
        SeqStream, SkipSeq, StripeSeq, WindowSeq, ZipSeq,
    },
    types::{collapse, Type},
    value::Value,
};

pub fn register(r: &mut Registry) {
    r.add_poly("head", head_checker);
    r.add_poly("skip", skip_checker);
    r.add_poly("stripe", stripe_checker);
    r.add_poly("take", take_checker);
    r.add_poly("peek", peek_checker);
    r.add_poly("filter", filter_checker);
    r.add_poly("while", while_checker);
    r.add_poly("zip", zip_checker);
    r.add_poly("pairs", pairs_checker);
    r.add_poly("triplets", triplets_checker);
    r.add_poly("ngrams", ngrams_checker);
    r.add_poly("flatten", flatten_checker);
    r.add_poly("glue", glue_checker);
    for name in ["seq", "tabulate"] {
        r.add_poly(name, seq_checker);
    }
    r.add_poly("first", first_checker);
    r.add_poly("second", second_checker);
    r.add_poly("reverse", reverse_checker);
    r.add_poly("sort", sort_checker);
    r.add_poly("uniques", uniques_checker);
}

/// `Seq[a], UInt` or `Arr[a], UInt` → the element type.
fn windowed(args: &[Type]) -> Option<Type> {
    match args {
        [t, n] if *n == Type::UINT => iterable_elem(t),
        _ => None,
    }
}

fn iterable_elem(t: &Type) -> Option<Type> {
    match t {
        Type::Seq(e) | Type::Arr(e) => Some((**e).clone()),
        _ => None,
    }
}

fn head_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    windowed(args).map(|e| (head_fn as FuncImpl, Type::seq(e)))
}

fn head_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (v, n) = arg2(args)?;
    let n = uint_arg(&n)?;
    *out = Value::Seq(SeqHandle::new(HeadSeq::new(value_to_seq(v), n)));
    Ok(())
}

fn skip_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    windowed(args).map(|e| (skip_fn as FuncImpl, Type::seq(e)))
}

fn skip_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (v, n) = arg2(args)?;
    let n = uint_arg(&n)?;
    *out = Value::Seq(SeqHandle::new(SkipSeq::new(value_to_seq(v), n)));
    Ok(())
}

fn stripe_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    windowed(args).map(|e| (stripe_fn as FuncImpl, Type::seq(e)))
}

fn stripe_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (v, n) = arg2(args)?;
    let n = uint_arg(&n)?;
    *out = Value::Seq(SeqHandle::new(StripeSeq::new(value_to_seq(v), n)));
    Ok(())
}

fn take_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => seq_elem(t).map(|e| (take_fn as FuncImpl, e.clone())),
        [t, dflt] => {
            let e = seq_elem(t)?;
            (*e == *dflt).then(|| (take_fn as FuncImpl, e.clone()))
        }
        _ => None,
    }
}

fn take_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let mut it = args.into_iter();
    let seq = it
        .next()
        .ok_or_else(|| Error::sanity("missing argument"))?
        .expect_seq()?;
    match seq.next()? {
        Some(v) => *out = v,
        None => match it.next() {
            Some(dflt) => *out = dflt,
            None => return Err(Error::runtime("take of an empty sequence")),
        },
    }
    Ok(())
}

fn peek_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => {
            let e = seq_elem(t)?;
            Some((
                peek_fn as FuncImpl,
                Type::tup(vec![e.clone(), Type::seq(e.clone())]),
            ))
        }
        _ => None,
    }
}

fn peek_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let seq = arg1(args)?.expect_seq()?;
    let Some(v) = seq.next()? else {
        return Err(Error::runtime("peek of an empty sequence"));
    };
    let rest = Value::Seq(SeqHandle::new(ChainSeq::new(v.clone(), seq)));
    *out = Value::Tup(vec![v, rest]);
    Ok(())
}

/// `Seq[(Integer, a…)]` → `Seq[collapsed a…]` for `filter` and `while`.
fn flagged(args: &[Type]) -> Option<Type> {
    match args {
        [t] => {
            let Type::Tup(members) = seq_elem(t)? else {
                return None;
            };
            let (flag, rest) = members.split_first()?;
            if !flag.is_integer() || rest.is_empty() {
                return None;
            }
            collapse(rest).ok().map(Type::seq)
        }
        _ => None,
    }
}

fn filter_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    flagged(args).map(|t| (filter_fn as FuncImpl, t))
}

fn filter_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let seq = arg1(args)?.expect_seq()?;
    *out = Value::Seq(SeqHandle::new(FilterSeq::new(seq, false)));
    Ok(())
}

fn while_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    flagged(args).map(|t| (while_fn as FuncImpl, t))
}

fn while_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let seq = arg1(args)?.expect_seq()?;
    *out = Value::Seq(SeqHandle::new(FilterSeq::new(seq, true)));
    Ok(())
}

fn zip_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    if args.len() < 2 {
        return None;
    }
    let elems: Option<Vec<Type>> = args.iter().map(iterable_elem).collect();
    elems.map(|es| (zip_fn as FuncImpl, Type::seq(Type::tup(es))))
}

fn zip_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let inners: Vec<SeqHandle> = args.into_iter().map(value_to_seq).collect();
    *out = Value::Seq(SeqHandle::new(ZipSeq::new(inners)));
    Ok(())
}

fn pairs_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => {
            let e = iterable_elem(t)?;
            Some((pairs_fn as FuncImpl, Type::seq(Type::tup(vec![e.clone(), e]))))
        }
        _ => None,
    }
}

fn pairs_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let seq = value_to_seq(arg1(args)?);
    *out = Value::Seq(SeqHandle::new(WindowSeq::new(seq, 2, true)));
    Ok(())
}

fn triplets_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => {
            let e = iterable_elem(t)?;
            Some((
                triplets_fn as FuncImpl,
                Type::seq(Type::tup(vec![e.clone(), e.clone(), e])),
            ))
        }
        _ => None,
    }
}

fn triplets_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let seq = value_to_seq(arg1(args)?);
    *out = Value::Seq(SeqHandle::new(WindowSeq::new(seq, 3, true)));
    Ok(())
}

fn ngrams_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    windowed(args).map(|e| (ngrams_fn as FuncImpl, Type::seq(Type::arr(e))))
}

fn ngrams_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (v, n) = arg2(args)?;
    let n = uint_arg(&n)?;
    *out = Value::Seq(SeqHandle::new(WindowSeq::new(
        value_to_seq(v),
        n as usize,
        false,
    )));
    Ok(())
}

fn flatten_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => {
            let outer = iter_elem(t)?;
            // one level only; a sequence of atoms passes through
            let elem = iter_elem(&outer).unwrap_or(outer);
            Some((flatten_fn as FuncImpl, Type::seq(elem)))
        }
        _ => None,
    }
}

fn flatten_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let seq = value_to_seq(arg1(args)?);
    *out = Value::Seq(SeqHandle::new(FlattenSeq::new(seq)));
    Ok(())
}

fn glue_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [head, t] => {
            let e = seq_elem(t)?;
            (*e == *head).then(|| (glue_fn as FuncImpl, Type::seq(e.clone())))
        }
        _ => None,
    }
}

fn glue_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (head, seq) = arg2(args)?;
    *out = Value::Seq(SeqHandle::new(ChainSeq::new(head, seq.expect_seq()?)));
    Ok(())
}

fn seq_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => {
            let elem = iter_elem(t).unwrap_or_else(|| t.clone());
            Some((seq_fn as FuncImpl, Type::seq(elem)))
        }
        _ => None,
    }
}

fn seq_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Seq(value_to_seq(arg1(args)?));
    Ok(())
}

/// Projection of pair streams (`first`/`second`): `Seq[(a,b)]` or
/// `Map[a,b]` → `Seq[a]`/`Seq[b]`; a bare pair projects directly.
fn projection(args: &[Type], index: usize) -> Option<(bool, Type)> {
    match args {
        [Type::Tup(members)] if members.len() == 2 => Some((true, members[index].clone())),
        [t] => match iter_elem(t)? {
            Type::Tup(members) if members.len() == 2 => Some((false, members[index].clone())),
            _ => None,
        },
        _ => None,
    }
}

struct ProjSeq {
    inner: SeqHandle,
    index: usize,
}

impl SeqStream for ProjSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        match self.inner.next()? {
            Some(Value::Tup(mut members) | Value::Lines(mut members))
                if members.len() > self.index =>
            {
                Ok(Some(members.swap_remove(self.index)))
            }
            Some(_) => Err(Error::sanity("projection element is not a pair")),
            None => Ok(None),
        }
    }
}

fn first_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match projection(args, 0)? {
        (true, t) => Some((project0_tuple as FuncImpl, t)),
        (false, t) => Some((project0_seq as FuncImpl, Type::seq(t))),
    }
}

fn second_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match projection(args, 1)? {
        (true, t) => Some((project1_tuple as FuncImpl, t)),
        (false, t) => Some((project1_seq as FuncImpl, Type::seq(t))),
    }
}

fn project_tuple(args: Vec<Value>, out: &mut Value, index: usize) -> RunResult<()> {
    match arg1(args)? {
        (Value::Tup(mut members) | Value::Lines(mut members)) if members.len() > index => {
            *out = members.swap_remove(index);
            Ok(())
        }
        other => Err(Error::sanity(format!(
            "projection of a {}",
            other.kind_name()
        ))),
    }
}

fn project0_tuple(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    project_tuple(args, out, 0)
}

fn project1_tuple(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    project_tuple(args, out, 1)
}

fn project0_seq(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let inner = value_to_seq(arg1(args)?);
    *out = Value::Seq(SeqHandle::new(ProjSeq { inner, index: 0 }));
    Ok(())
}

fn project1_seq(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let inner = value_to_seq(arg1(args)?);
    *out = Value::Seq(SeqHandle::new(ProjSeq { inner, index: 1 }));
    Ok(())
}

fn reverse_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t @ Type::Arr(_)] => Some((reverse_fn as FuncImpl, t.clone())),
        _ => None,
    }
}

fn reverse_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let arr = arg1(args)?.expect_arr()?;
    let inline = arr.inline;
    let mut values = arr.into_values();
    values.reverse();
    *out = Value::Arr(Box::new(collect_array(values, inline)));
    Ok(())
}

fn sort_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [t] => {
            let elem = iter_elem(t).unwrap_or_else(|| t.clone());
            Some((sort_fn as FuncImpl, Type::arr(elem)))
        }
        _ => None,
    }
}

fn sort_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let mut values = value_to_seq(arg1(args)?).collect()?;
    values.sort_by(Value::total_cmp);
    *out = Value::Arr(Box::new(collect_array(values, false)));
    Ok(())
}

fn uniques_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [Type::Seq(_) | Type::Arr(_) | Type::Map(_)] => Some((uniques_fn as FuncImpl, Type::UINT)),
        _ => None,
    }
}

fn uniques_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let mut seen: AHashSet<Value> = AHashSet::new();
    while let Some(v) = source.next()? {
        seen.insert(v);
    }
    *out = Value::UInt(seen.len() as u64);
    Ok(())
}

fn uint_arg(v: &Value) -> RunResult<u64> {
    v.as_uint()
        .ok_or_else(|| Error::sanity("UInt argument expected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::VecSeq;

    fn uints(items: &[u64]) -> Value {
        Value::Seq(SeqHandle::new(VecSeq::new(
            items.iter().map(|&v| Value::UInt(v)).collect(),
        )))
    }

    fn call(f: FuncImpl, args: Vec<Value>) -> Value {
        let mut out = Value::None;
        f(args, &mut out).unwrap();
        out
    }

    #[test]
    fn filter_keeps_flagged_elements() {
        let pairs = Value::Seq(SeqHandle::new(VecSeq::new(vec![
            Value::Tup(vec![Value::UInt(1), Value::Str(b"keep".to_vec())]),
            Value::Tup(vec![Value::UInt(0), Value::Str(b"drop".to_vec())]),
            Value::Tup(vec![Value::UInt(2), Value::Str(b"keep2".to_vec())]),
        ])));
        let out = call(filter_fn, vec![pairs]).expect_seq().unwrap();
        assert_eq!(
            out.collect().unwrap(),
            vec![Value::Str(b"keep".to_vec()), Value::Str(b"keep2".to_vec())]
        );
    }

    #[test]
    fn while_stops_at_first_zero() {
        let pairs = Value::Seq(SeqHandle::new(VecSeq::new(vec![
            Value::Tup(vec![Value::UInt(1), Value::UInt(10)]),
            Value::Tup(vec![Value::UInt(0), Value::UInt(20)]),
            Value::Tup(vec![Value::UInt(1), Value::UInt(30)]),
        ])));
        let out = call(while_fn, vec![pairs]).expect_seq().unwrap();
        assert_eq!(out.collect().unwrap(), vec![Value::UInt(10)]);
    }

    #[test]
    fn take_with_default() {
        assert_eq!(
            call(take_fn, vec![uints(&[]), Value::UInt(9)]),
            Value::UInt(9)
        );
        assert_eq!(call(take_fn, vec![uints(&[4, 5])]), Value::UInt(4));
    }

    #[test]
    fn peek_does_not_lose_the_first_element() {
        let Value::Tup(parts) = call(peek_fn, vec![uints(&[7, 8])]) else {
            panic!("peek must return a pair");
        };
        assert_eq!(parts[0], Value::UInt(7));
        let rest = parts[1].clone().expect_seq().unwrap();
        assert_eq!(rest.collect().unwrap(), vec![Value::UInt(7), Value::UInt(8)]);
    }

    #[test]
    fn sort_materialises_and_orders() {
        let out = call(sort_fn, vec![uints(&[3, 1, 2])]);
        let arr = out.expect_arr().unwrap();
        assert_eq!(
            arr.into_values(),
            vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]
        );
    }

    #[test]
    fn uniques_counts_distinct() {
        assert_eq!(
            call(uniques_fn, vec![uints(&[1, 2, 1, 3, 2])]),
            Value::UInt(3)
        );
    }

    #[test]
    fn flagged_shape_checking() {
        let good = Type::seq(Type::tup(vec![Type::UINT, Type::STR]));
        assert!(flagged(&[good]).is_some());
        let bad = Type::seq(Type::tup(vec![Type::REAL, Type::STR]));
        assert!(flagged(&[bad]).is_none());
    }
}
