//! Branch-flavoured builtins. All of these are polymorphic checkers:
//! their signatures are patterns over the argument tuple, and most of
//! them return one of their inputs unchanged.

use crate::{
    error::{Error, RunResult},
    funcs::arg1,
    registry::{FuncImpl, Registry},
    types::Type,
    value::Value,
};

pub fn register(r: &mut Registry) {
    r.add_poly("if", if_checker);
    r.add_poly("case", case_checker);
    r.add_poly("tuple", tuple_checker);
    r.add_poly("lines", lines_checker);
    r.add_poly("eq", eq_checker);
    r.add_poly("and", and_checker);
    r.add_poly("or", or_checker);
}

/// `if(Integer, a, a) -> a`
fn if_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [cond, yes, no] if cond.is_integer() && yes == no => {
            Some((if_fn as FuncImpl, yes.clone()))
        }
        _ => None,
    }
}

fn if_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let mut it = args.into_iter();
    let cond = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    let yes = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    let no = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    *out = if cond.is_truthy() { yes } else { no };
    Ok(())
}

/// `case(a, a, b, …, a, b, b) -> b`: the subject, check/result pairs,
/// and a trailing default.
fn case_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return None;
    }
    let subject = &args[0];
    let result = &args[2];
    let dflt = args.last()?;
    if dflt != result {
        return None;
    }
    let mut i = 1;
    while i + 1 < args.len() {
        if args[i] != *subject || args[i + 1] != *result {
            return None;
        }
        i += 2;
    }
    Some((case_fn as FuncImpl, result.clone()))
}

fn case_fn(mut args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    if args.len() < 2 {
        return Err(Error::sanity("degenerate case call"));
    }
    let dflt = args.pop().unwrap_or(Value::None);
    let mut it = args.into_iter();
    let subject = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    while let (Some(check), Some(result)) = (it.next(), it.next()) {
        if check == subject {
            *out = result;
            return Ok(());
        }
    }
    *out = dflt;
    Ok(())
}

/// `tuple(a, b, …) -> (a, b, …)`: the identity on the argument tuple.
fn tuple_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    if args.is_empty() {
        return None;
    }
    Some((tuple_fn as FuncImpl, Type::tup(args.to_vec())))
}

fn tuple_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Tup(args);
    Ok(())
}

/// `lines(a, b, …) -> (a, b, …)`: the identity on its arguments, marked
/// to print one member per line instead of tab-separated. A single
/// tuple argument is marked in place.
fn lines_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [] => None,
        [t @ Type::Tup(_)] => Some((lines_one as FuncImpl, t.clone())),
        _ => Some((lines_many as FuncImpl, Type::tup(args.to_vec()))),
    }
}

fn lines_one(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    match arg1(args)? {
        Value::Tup(members) | Value::Lines(members) => {
            *out = Value::Lines(members);
            Ok(())
        }
        other => Err(Error::sanity(format!("lines() of a {}", other.kind_name()))),
    }
}

fn lines_many(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Lines(args);
    Ok(())
}

/// `eq(a, a, …) -> UInt`: 1 when every argument equals the first.
fn eq_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    let (first, rest) = args.split_first()?;
    if rest.is_empty() || rest.iter().any(|t| t != first) {
        return None;
    }
    Some((eq_fn as FuncImpl, Type::UINT))
}

fn eq_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let mut it = args.into_iter();
    let first = it.next().ok_or_else(|| Error::sanity("missing argument"))?;
    *out = Value::UInt(u64::from(it.all(|v| v == first)));
    Ok(())
}

fn logical(args: &[Type]) -> bool {
    !args.is_empty() && args.iter().all(Type::is_integer)
}

fn and_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    logical(args).then_some((and_fn as FuncImpl, Type::UINT))
}

fn and_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::UInt(u64::from(args.iter().all(Value::is_truthy)));
    Ok(())
}

fn or_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    logical(args).then_some((or_fn as FuncImpl, Type::UINT))
}

fn or_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::UInt(u64::from(args.iter().any(Value::is_truthy)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_picks_by_truthiness() {
        let mut out = Value::None;
        if_fn(
            vec![Value::UInt(1), Value::Str(b"yes".to_vec()), Value::Str(b"no".to_vec())],
            &mut out,
        )
        .unwrap();
        assert_eq!(out, Value::Str(b"yes".to_vec()));
        if_fn(
            vec![Value::UInt(0), Value::Str(b"yes".to_vec()), Value::Str(b"no".to_vec())],
            &mut out,
        )
        .unwrap();
        assert_eq!(out, Value::Str(b"no".to_vec()));
    }

    #[test]
    fn case_matches_pairs_and_defaults() {
        let args = |subject: u64| {
            vec![
                Value::UInt(subject),
                Value::UInt(1),
                Value::Str(b"one".to_vec()),
                Value::UInt(2),
                Value::Str(b"two".to_vec()),
                Value::Str(b"other".to_vec()),
            ]
        };
        let mut out = Value::None;
        case_fn(args(2), &mut out).unwrap();
        assert_eq!(out, Value::Str(b"two".to_vec()));
        case_fn(args(9), &mut out).unwrap();
        assert_eq!(out, Value::Str(b"other".to_vec()));
    }

    #[test]
    fn case_checker_rejects_odd_shapes() {
        assert!(case_checker(&[Type::UINT, Type::UINT, Type::STR, Type::STR]).is_some());
        assert!(case_checker(&[Type::UINT, Type::UINT, Type::STR]).is_none());
        assert!(case_checker(&[Type::UINT, Type::STR, Type::STR, Type::STR]).is_none());
    }

    #[test]
    fn tuple_is_the_identity_on_arguments() {
        let (_, ret) = tuple_checker(&[Type::UINT, Type::STR]).unwrap();
        assert_eq!(ret, Type::tup(vec![Type::UINT, Type::STR]));
    }

    #[test]
    fn lines_marks_without_changing_the_tuple() {
        let mut out = Value::None;
        lines_many(vec![Value::UInt(1), Value::Str(b"x".to_vec())], &mut out).unwrap();
        assert_eq!(
            out,
            Value::Lines(vec![Value::UInt(1), Value::Str(b"x".to_vec())])
        );
        // the marked value still equals the plain tuple
        assert_eq!(out, Value::Tup(vec![Value::UInt(1), Value::Str(b"x".to_vec())]));

        // a single tuple argument keeps its type
        let pair = Type::tup(vec![Type::UINT, Type::STR]);
        let (imp, ret) = lines_checker(&[pair.clone()]).unwrap();
        assert_eq!(ret, pair);
        let mut out = Value::None;
        imp(
            vec![Value::Tup(vec![Value::UInt(2), Value::Str(b"y".to_vec())])],
            &mut out,
        )
        .unwrap();
        assert_eq!(
            out,
            Value::Lines(vec![Value::UInt(2), Value::Str(b"y".to_vec())])
        );
    }

    #[test]
    fn eq_compares_against_the_first() {
        let mut out = Value::None;
        eq_fn(vec![Value::UInt(3), Value::UInt(3), Value::UInt(3)], &mut out).unwrap();
        assert_eq!(out, Value::UInt(1));
        eq_fn(vec![Value::UInt(3), Value::UInt(4)], &mut out).unwrap();
        assert_eq!(out, Value::UInt(0));
    }
}
