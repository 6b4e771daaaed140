//! Numeric builtins: transcendentals, rounding, shifts and the atom
//! conversions.

use std::str::FromStr;

use crate::{
    error::{Error, RunResult},
    funcs::{arg1, arg2},
    registry::{FuncImpl, Registry},
    types::Type,
    value::Value,
};

pub fn register(r: &mut Registry) {
    let numeric = [Type::INT, Type::UINT, Type::REAL];

    let unary: [(&str, FuncImpl); 6] = [
        ("sin", sin_fn),
        ("cos", cos_fn),
        ("tan", tan_fn),
        ("sqrt", sqrt_fn),
        ("exp", exp_fn),
        ("log", log_fn),
    ];
    for (name, f) in unary {
        for t in &numeric {
            r.add(name, &[t.clone()], Type::REAL, f);
        }
    }

    r.add("floor", &[Type::REAL], Type::REAL, floor_fn);
    r.add("ceil", &[Type::REAL], Type::REAL, ceil_fn);
    r.add("round", &[Type::REAL], Type::REAL, round_fn);
    r.add("abs", &[Type::INT], Type::INT, abs_int);
    r.add("abs", &[Type::REAL], Type::REAL, abs_real);
    r.add("pi", &[], Type::REAL, pi_fn);
    r.add("e", &[], Type::REAL, e_fn);

    for amount in [Type::INT, Type::UINT] {
        r.add("lsh", &[Type::INT, amount.clone()], Type::INT, lsh_int);
        r.add("lsh", &[Type::UINT, amount.clone()], Type::UINT, lsh_uint);
        r.add("rsh", &[Type::INT, amount.clone()], Type::INT, rsh_int);
        r.add("rsh", &[Type::UINT, amount.clone()], Type::UINT, rsh_uint);
    }

    r.add("int", &[Type::STR], Type::INT, int_of_str);
    r.add("int", &[Type::STR, Type::INT], Type::INT, int_of_str_dflt);
    r.add("int", &[Type::STR, Type::UINT], Type::INT, int_of_str_dflt);
    r.add("int", &[Type::REAL], Type::INT, int_of_real);
    r.add("int", &[Type::UINT], Type::INT, int_of_uint);
    r.add("uint", &[Type::STR], Type::UINT, uint_of_str);
    r.add("uint", &[Type::STR, Type::UINT], Type::UINT, uint_of_str_dflt);
    r.add("uint", &[Type::STR, Type::INT], Type::UINT, uint_of_str_dflt);
    r.add("uint", &[Type::REAL], Type::UINT, uint_of_real);
    r.add("uint", &[Type::INT], Type::UINT, uint_of_int);
    r.add("real", &[Type::STR], Type::REAL, real_of_str);
    r.add("real", &[Type::STR, Type::REAL], Type::REAL, real_of_str_dflt);
    r.add("real", &[Type::INT], Type::REAL, real_of_num);
    r.add("real", &[Type::UINT], Type::REAL, real_of_num);
    r.add("hex", &[Type::UINT], Type::UINT, hex_fn);
}

fn real_arg(v: Value) -> RunResult<f64> {
    v.as_real_lossy()
        .ok_or_else(|| Error::sanity("numeric argument expected"))
}

macro_rules! real_unary {
    ($name:ident, $f:expr) => {
        fn $name(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
            let x = real_arg(arg1(args)?)?;
            *out = Value::Real($f(x));
            Ok(())
        }
    };
}

real_unary!(sin_fn, f64::sin);
real_unary!(cos_fn, f64::cos);
real_unary!(tan_fn, f64::tan);
real_unary!(sqrt_fn, f64::sqrt);
real_unary!(exp_fn, f64::exp);
real_unary!(log_fn, f64::ln);
real_unary!(floor_fn, f64::floor);
real_unary!(ceil_fn, f64::ceil);
real_unary!(round_fn, f64::round);
real_unary!(abs_real, f64::abs);

fn abs_int(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = arg1(args)?
        .as_int()
        .ok_or_else(|| Error::sanity("Int argument expected"))?;
    *out = Value::Int(x.wrapping_abs());
    Ok(())
}

fn pi_fn(_args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Real(std::f64::consts::PI);
    Ok(())
}

fn e_fn(_args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Real(std::f64::consts::E);
    Ok(())
}

// A negative shift amount reverses the direction; oversized shifts
// yield zero (or the sign fill for arithmetic right shifts).
fn shift_u(x: u64, amount: i64, left: bool) -> u64 {
    let (left, n) = if amount < 0 {
        (!left, amount.unsigned_abs())
    } else {
        (left, amount.unsigned_abs())
    };
    if n >= 64 {
        return 0;
    }
    if left {
        x << n
    } else {
        x >> n
    }
}

fn shift_i(x: i64, amount: i64, left: bool) -> i64 {
    let (left, n) = if amount < 0 {
        (!left, amount.unsigned_abs())
    } else {
        (left, amount.unsigned_abs())
    };
    if left {
        if n >= 64 {
            0
        } else {
            x.wrapping_shl(n as u32)
        }
    } else if n >= 64 {
        if x < 0 {
            -1
        } else {
            0
        }
    } else {
        x >> n
    }
}

macro_rules! shift_fn {
    ($name:ident, $shift:ident, $variant:ident, $get:ident, $left:expr) => {
        fn $name(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
            let (a, b) = arg2(args)?;
            let x = a.$get().ok_or_else(|| Error::sanity("integer argument expected"))?;
            let n = b
                .as_integer()
                .ok_or_else(|| Error::sanity("integer shift amount expected"))?;
            *out = Value::$variant($shift(x, n, $left));
            Ok(())
        }
    };
}

shift_fn!(lsh_uint, shift_u, UInt, as_uint, true);
shift_fn!(rsh_uint, shift_u, UInt, as_uint, false);
shift_fn!(lsh_int, shift_i, Int, as_int, true);
shift_fn!(rsh_int, shift_i, Int, as_int, false);

fn parse_bytes<T: FromStr>(s: &[u8]) -> Option<T> {
    std::str::from_utf8(s).ok()?.trim().parse().ok()
}

fn int_of_str(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let s = arg1(args)?.expect_str()?;
    match parse_bytes::<i64>(&s) {
        Some(v) => {
            *out = Value::Int(v);
            Ok(())
        }
        None => Err(Error::runtime(format!(
            "could not convert \"{}\" to Int",
            String::from_utf8_lossy(&s)
        ))),
    }
}

fn int_of_str_dflt(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (a, dflt) = arg2(args)?;
    let s = a.expect_str()?;
    *out = match parse_bytes::<i64>(&s) {
        Some(v) => Value::Int(v),
        None => Value::Int(
            dflt.as_integer()
                .ok_or_else(|| Error::sanity("integer default expected"))?,
        ),
    };
    Ok(())
}

fn int_of_real(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = real_arg(arg1(args)?)?;
    *out = Value::Int(x as i64);
    Ok(())
}

fn int_of_uint(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = arg1(args)?
        .as_uint()
        .ok_or_else(|| Error::sanity("UInt argument expected"))?;
    *out = Value::Int(x as i64);
    Ok(())
}

fn uint_of_str(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let s = arg1(args)?.expect_str()?;
    match parse_bytes::<u64>(&s) {
        Some(v) => {
            *out = Value::UInt(v);
            Ok(())
        }
        None => Err(Error::runtime(format!(
            "could not convert \"{}\" to UInt",
            String::from_utf8_lossy(&s)
        ))),
    }
}

fn uint_of_str_dflt(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (a, dflt) = arg2(args)?;
    let s = a.expect_str()?;
    *out = match parse_bytes::<u64>(&s) {
        Some(v) => Value::UInt(v),
        None => Value::UInt(
            dflt.as_integer()
                .ok_or_else(|| Error::sanity("integer default expected"))? as u64,
        ),
    };
    Ok(())
}

fn uint_of_real(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = real_arg(arg1(args)?)?;
    *out = Value::UInt(x as u64);
    Ok(())
}

fn uint_of_int(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = arg1(args)?
        .as_int()
        .ok_or_else(|| Error::sanity("Int argument expected"))?;
    *out = Value::UInt(x as u64);
    Ok(())
}

fn real_of_str(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let s = arg1(args)?.expect_str()?;
    match parse_bytes::<f64>(&s) {
        Some(v) => {
            *out = Value::Real(v);
            Ok(())
        }
        None => Err(Error::runtime(format!(
            "could not convert \"{}\" to Real",
            String::from_utf8_lossy(&s)
        ))),
    }
}

fn real_of_str_dflt(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (a, dflt) = arg2(args)?;
    let s = a.expect_str()?;
    *out = match parse_bytes::<f64>(&s) {
        Some(v) => Value::Real(v),
        None => Value::Real(real_arg(dflt)?),
    };
    Ok(())
}

fn real_of_num(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = real_arg(arg1(args)?)?;
    *out = Value::Real(x);
    Ok(())
}

fn hex_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let x = arg1(args)?
        .as_uint()
        .ok_or_else(|| Error::sanity("UInt argument expected"))?;
    *out = Value::HexUInt(x);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: FuncImpl, args: Vec<Value>) -> RunResult<Value> {
        let mut out = Value::None;
        f(args, &mut out)?;
        Ok(out)
    }

    #[test]
    fn conversions() {
        assert_eq!(
            call(int_of_str, vec![Value::Str(b"-42".to_vec())]).unwrap(),
            Value::Int(-42)
        );
        assert!(call(int_of_str, vec![Value::Str(b"x".to_vec())]).is_err());
        assert_eq!(
            call(int_of_str_dflt, vec![Value::Str(b"x".to_vec()), Value::Int(7)]).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            call(real_of_str, vec![Value::Str(b" 2.5 ".to_vec())]).unwrap(),
            Value::Real(2.5)
        );
    }

    #[test]
    fn shifts_reverse_on_negative_amounts() {
        assert_eq!(
            call(lsh_uint, vec![Value::UInt(1), Value::Int(3)]).unwrap(),
            Value::UInt(8)
        );
        assert_eq!(
            call(lsh_uint, vec![Value::UInt(8), Value::Int(-3)]).unwrap(),
            Value::UInt(1)
        );
        assert_eq!(
            call(rsh_int, vec![Value::Int(-8), Value::Int(1)]).unwrap(),
            Value::Int(-4)
        );
    }

    #[test]
    fn hex_marks_the_value() {
        assert_eq!(call(hex_fn, vec![Value::UInt(255)]).unwrap(), Value::HexUInt(255));
    }
}
