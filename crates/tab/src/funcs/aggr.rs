//! Aggregation builtins: counting, sums, moments and extrema.
//!
//! The single-number forms (`sum(x)`, `min(x)`, …) are identity
//! functions whose presence in a map's value arm marks the entry for
//! aggregation on key collision; the checker in the inference pass picks
//! the marker up from the call site.

use crate::{
    error::{Error, RunResult},
    funcs::{arg1, arr_elem, seq_elem},
    registry::{FuncImpl, Registry},
    seq::{value_to_seq, CounterSeq, SeqHandle},
    types::Type,
    value::Value,
};

pub fn register(r: &mut Registry) {
    r.add("count", &[], Type::seq(Type::UINT), count_from_one);
    r.add("count", &[Type::UINT], Type::seq(Type::UINT), count_up_to);
    r.add_poly("count", count_checker);

    r.add_poly("sum", sum_checker);
    for name in ["mean", "avg"] {
        r.add_poly(name, mean_checker);
    }
    for name in ["var", "variance"] {
        r.add_poly(name, var_checker);
    }
    for name in ["stdev", "stddev"] {
        r.add_poly(name, stdev_checker);
    }
    r.add_poly("min", min_checker);
    r.add_poly("max", max_checker);
}

fn count_from_one(_args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Seq(SeqHandle::new(CounterSeq::new(1, None)));
    Ok(())
}

fn count_up_to(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let n = arg1(args)?
        .as_uint()
        .ok_or_else(|| Error::sanity("UInt bound expected"))?;
    *out = Value::Seq(SeqHandle::new(CounterSeq::new(1, Some(n))));
    Ok(())
}

fn count_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [Type::Seq(_) | Type::Arr(_) | Type::Map(_)] => Some((count_container as FuncImpl, Type::UINT)),
        [t] if t.is_string() => Some((count_container as FuncImpl, Type::UINT)),
        _ => None,
    }
}

fn count_container(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let n = match arg1(args)? {
        Value::Str(s) => s.len() as u64,
        Value::Arr(a) => a.len() as u64,
        Value::Map(m) => m.len() as u64,
        Value::Seq(h) => {
            let mut n = 0u64;
            while h.next()?.is_some() {
                n += 1;
            }
            n
        }
        other => {
            return Err(Error::sanity(format!(
                "count of a {}",
                other.kind_name()
            )))
        }
    };
    *out = Value::UInt(n);
    Ok(())
}

/// Accepts `Seq[k]`/`Arr[k]` for numeric `k` and returns the element
/// type; accepts a bare numeric as the aggregation marker.
fn numeric_agg(args: &[Type]) -> Option<(Type, bool)> {
    match args {
        [t] if t.is_numeric() => Some((t.clone(), true)),
        [t] => {
            let elem = seq_elem(t).or_else(|| arr_elem(t))?;
            elem.is_numeric().then(|| (elem.clone(), false))
        }
        _ => None,
    }
}

fn sum_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let (elem, marker) = numeric_agg(args)?;
    if marker {
        Some((identity as FuncImpl, elem))
    } else {
        Some((sum_fn as FuncImpl, elem))
    }
}

fn mean_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let (_, marker) = numeric_agg(args)?;
    if marker {
        Some((to_real as FuncImpl, Type::REAL))
    } else {
        Some((mean_fn as FuncImpl, Type::REAL))
    }
}

fn var_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let (_, marker) = numeric_agg(args)?;
    if marker {
        Some((to_real as FuncImpl, Type::REAL))
    } else {
        Some((var_fn as FuncImpl, Type::REAL))
    }
}

fn stdev_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let (_, marker) = numeric_agg(args)?;
    if marker {
        Some((to_real as FuncImpl, Type::REAL))
    } else {
        Some((stdev_fn as FuncImpl, Type::REAL))
    }
}

fn extremum(args: &[Type]) -> Option<Type> {
    match args {
        [t] if t.is_numeric() => Some(t.clone()),
        [t] => seq_elem(t).or_else(|| arr_elem(t)).cloned(),
        _ => None,
    }
}

fn min_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let ret = extremum(args)?;
    if args[0].is_numeric() {
        Some((identity as FuncImpl, ret))
    } else {
        Some((min_fn as FuncImpl, ret))
    }
}

fn max_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let ret = extremum(args)?;
    if args[0].is_numeric() {
        Some((identity as FuncImpl, ret))
    } else {
        Some((max_fn as FuncImpl, ret))
    }
}

fn identity(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = arg1(args)?;
    Ok(())
}

fn to_real(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = arg1(args)?
        .as_real_lossy()
        .ok_or_else(|| Error::sanity("numeric argument expected"))?;
    *out = Value::Real(x);
    Ok(())
}

fn sum_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let mut acc: Option<Value> = None;
    while let Some(v) = source.next()? {
        acc = Some(match (acc, v) {
            (None, v) => v,
            (Some(Value::Int(a)), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
            (Some(Value::UInt(a)), Value::UInt(b) | Value::HexUInt(b)) => {
                Value::UInt(a.wrapping_add(b))
            }
            (Some(Value::Real(a)), Value::Real(b)) => Value::Real(a + b),
            (Some(a), b) => {
                return Err(Error::sanity(format!(
                    "sum of {} and {}",
                    a.kind_name(),
                    b.kind_name()
                )))
            }
        });
    }
    // the sum of an empty sequence is zero of the element type, which
    // the pre-allocated out already is
    if let Some(v) = acc {
        *out = v;
    }
    Ok(())
}

/// Running count/mean/M2; both moments come from the same recurrence.
fn moments(source: &SeqHandle) -> RunResult<(f64, f64, f64)> {
    let (mut n, mut mean, mut m2) = (0.0f64, 0.0f64, 0.0f64);
    while let Some(v) = source.next()? {
        let x = v
            .as_real_lossy()
            .ok_or_else(|| Error::sanity("numeric element expected"))?;
        n += 1.0;
        let d = x - mean;
        mean += d / n;
        m2 += d * (x - mean);
    }
    Ok((n, mean, m2))
}

fn mean_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let (n, mean, _) = moments(&source)?;
    if n == 0.0 {
        return Err(Error::runtime("mean of an empty sequence"));
    }
    *out = Value::Real(mean);
    Ok(())
}

fn var_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let (n, _, m2) = moments(&source)?;
    if n == 0.0 {
        return Err(Error::runtime("variance of an empty sequence"));
    }
    *out = Value::Real(m2 / n);
    Ok(())
}

fn stdev_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let (n, _, m2) = moments(&source)?;
    if n == 0.0 {
        return Err(Error::runtime("stdev of an empty sequence"));
    }
    *out = Value::Real((m2 / n).sqrt());
    Ok(())
}

fn min_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    fold_extremum(args, out, std::cmp::Ordering::Less, "min")
}

fn max_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    fold_extremum(args, out, std::cmp::Ordering::Greater, "max")
}

fn fold_extremum(
    args: Vec<Value>,
    out: &mut Value,
    keep: std::cmp::Ordering,
    name: &str,
) -> RunResult<()> {
    let source = value_to_seq(arg1(args)?);
    let mut best: Option<Value> = None;
    while let Some(v) = source.next()? {
        best = Some(match best {
            None => v,
            Some(b) => {
                if v.total_cmp(&b) == keep {
                    v
                } else {
                    b
                }
            }
        });
    }
    match best {
        Some(v) => {
            *out = v;
            Ok(())
        }
        None => Err(Error::runtime(format!("{name} of an empty sequence"))),
    }
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

    #[test]
    fn count_drains_a_sequence() {
        let mut out = Value::None;
        count_container(vec![uints(&[1, 2, 3])], &mut out).unwrap();
        assert_eq!(out, Value::UInt(3));
    }

    #[test]
    fn sum_keeps_the_element_kind() {
        let mut out = Value::UInt(0);
        sum_fn(vec![uints(&[1, 2, 3])], &mut out).unwrap();
        assert_eq!(out, Value::UInt(6));
    }

    #[test]
    fn welford_moments() {
        let mut out = Value::None;
        mean_fn(vec![uints(&[1, 2, 3, 4])], &mut out).unwrap();
        assert_eq!(out, Value::Real(2.5));
        let mut out = Value::None;
        var_fn(vec![uints(&[2, 4, 4, 4, 5, 5, 7, 9])], &mut out).unwrap();
        assert_eq!(out, Value::Real(4.0));
    }

    #[test]
    fn extrema_error_on_empty() {
        assert!(min_fn(vec![uints(&[])], &mut Value::None).is_err());
        let mut out = Value::None;
        max_fn(vec![uints(&[3, 9, 2])], &mut out).unwrap();
        assert_eq!(out, Value::UInt(9));
    }

    #[test]
    fn marker_forms_resolve_to_identity() {
        let (imp, ret) = sum_checker(&[Type::UINT]).unwrap();
        assert_eq!(ret, Type::UINT);
        let mut out = Value::None;
        imp(vec![Value::UInt(1)], &mut out).unwrap();
        assert_eq!(out, Value::UInt(1));
    }
}
