//! Date and time builtins, all UTC.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::{
    error::{Error, RunResult},
    funcs::arg1,
    registry::Registry,
    types::Type,
    value::Value,
};

pub fn register(r: &mut Registry) {
    r.add("now", &[], Type::INT, now_fn);
    r.add("date", &[Type::INT], Type::STR, date_fn);
    r.add("time", &[Type::INT], Type::STR, time_fn);
    r.add("datetime", &[Type::INT], Type::STR, datetime_fn);
    r.add(
        "gmtime",
        &[Type::INT],
        Type::tup(vec![Type::INT, Type::INT, Type::INT, Type::INT, Type::INT, Type::INT]),
        gmtime_fn,
    );
}

fn timestamp(v: Value) -> RunResult<DateTime<Utc>> {
    let secs = v
        .as_int()
        .ok_or_else(|| Error::sanity("Int timestamp expected"))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| Error::runtime(format!("timestamp out of range: {secs}")))
}

fn now_fn(_args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Int(Utc::now().timestamp());
    Ok(())
}

fn date_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let t = timestamp(arg1(args)?)?;
    *out = Value::Str(t.format("%Y-%m-%d").to_string().into_bytes());
    Ok(())
}

fn time_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let t = timestamp(arg1(args)?)?;
    *out = Value::Str(t.format("%H:%M:%S").to_string().into_bytes());
    Ok(())
}

fn datetime_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let t = timestamp(arg1(args)?)?;
    *out = Value::Str(t.format("%Y-%m-%d %H:%M:%S").to_string().into_bytes());
    Ok(())
}

fn gmtime_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let t = timestamp(arg1(args)?)?;
    *out = Value::Tup(vec![
        Value::Int(i64::from(t.year())),
        Value::Int(i64::from(t.month())),
        Value::Int(i64::from(t.day())),
        Value::Int(i64::from(t.hour())),
        Value::Int(i64::from(t.minute())),
        Value::Int(i64::from(t.second())),
    ]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_timestamps() {
        let mut out = Value::None;
        datetime_fn(vec![Value::Int(0)], &mut out).unwrap();
        assert_eq!(out, Value::Str(b"1970-01-01 00:00:00".to_vec()));
        date_fn(vec![Value::Int(86_400)], &mut out).unwrap();
        assert_eq!(out, Value::Str(b"1970-01-02".to_vec()));
        time_fn(vec![Value::Int(3_661)], &mut out).unwrap();
        assert_eq!(out, Value::Str(b"01:01:01".to_vec()));
    }

    #[test]
    fn gmtime_fields() {
        let mut out = Value::None;
        gmtime_fn(vec![Value::Int(0)], &mut out).unwrap();
        assert_eq!(
            out,
            Value::Tup(vec![
                Value::Int(1970),
                Value::Int(1),
                Value::Int(1),
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
            ])
        );
    }
}
