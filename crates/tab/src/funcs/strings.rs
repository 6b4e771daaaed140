//! String builtins: splitting, regex matching, case mapping and the
//! byte/string conversions.

use crate::{
    error::{Error, RunResult},
    funcs::{arg1, arg2, arg3, cached_regex},
    registry::{FuncImpl, Registry},
    seq::{collect_array, SeqHandle, SeqStream},
    types::Type,
    value::{Array, ArrayValue, Value},
};

pub fn register(r: &mut Registry) {
    r.add(
        "cut",
        &[Type::STR, Type::STR],
        Type::arr(Type::STR),
        cut_fields,
    );
    r.add(
        "cut",
        &[Type::STR, Type::STR, Type::UINT],
        Type::STR,
        cut_nth,
    );
    r.add(
        "cut",
        &[Type::seq(Type::STR), Type::STR],
        Type::seq(Type::arr(Type::STR)),
        cut_seq,
    );
    r.add(
        "recut",
        &[Type::STR, Type::STR],
        Type::arr(Type::STR),
        recut_fields,
    );
    r.add(
        "recut",
        &[Type::STR, Type::STR, Type::UINT],
        Type::STR,
        recut_nth,
    );
    r.add(
        "grep",
        &[Type::STR, Type::STR],
        Type::arr(Type::STR),
        grep_fn,
    );
    r.add("grepif", &[Type::STR, Type::STR], Type::UINT, grepif_str);
    r.add(
        "grepif",
        &[Type::seq(Type::STR), Type::STR],
        Type::seq(Type::STR),
        grepif_seq,
    );
    r.add(
        "replace",
        &[Type::STR, Type::STR, Type::STR],
        Type::STR,
        replace_fn,
    );
    r.add("tolower", &[Type::STR], Type::STR, tolower_fn);
    r.add("toupper", &[Type::STR], Type::STR, toupper_fn);
    r.add_poly("cat", cat_checker);
    r.add("join", &[Type::arr(Type::STR), Type::STR], Type::STR, join_fn);
    r.add("join", &[Type::seq(Type::STR), Type::STR], Type::STR, join_fn);
    r.add("bytes", &[Type::STR], Type::arr(Type::UINT), bytes_fn);
    r.add("string", &[Type::arr(Type::UINT)], Type::STR, string_of_bytes);
    r.add("string", &[Type::INT], Type::STR, string_of_atom);
    r.add("string", &[Type::UINT], Type::STR, string_of_atom);
    r.add("string", &[Type::REAL], Type::STR, string_of_atom);
}

/// Splits `s` on every occurrence of `delim`. An empty delimiter yields
/// the whole string as one field.
fn split_bytes(s: &[u8], delim: &[u8]) -> Vec<Vec<u8>> {
    if delim.is_empty() {
        return vec![s.to_vec()];
    }
    let mut fields = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + delim.len() <= s.len() {
        if &s[i..i + delim.len()] == delim {
            fields.push(s[start..i].to_vec());
            i += delim.len();
            start = i;
        } else {
            i += 1;
        }
    }
    fields.push(s[start..].to_vec());
    fields
}

fn str_array(fields: Vec<Vec<u8>>) -> Value {
    Value::Arr(Box::new(ArrayValue {
        items: Array::Str(fields),
        inline: false,
    }))
}

fn cut_fields(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, d) = arg2(args)?;
    *out = str_array(split_bytes(&s.expect_str()?, &d.expect_str()?));
    Ok(())
}

fn cut_nth(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, d, n) = arg3(args)?;
    let n = n.as_uint().ok_or_else(|| Error::sanity("UInt field index expected"))? as usize;
    let fields = split_bytes(&s.expect_str()?, &d.expect_str()?);
    match fields.into_iter().nth(n) {
        Some(f) => {
            *out = Value::Str(f);
            Ok(())
        }
        None => Err(Error::runtime("cut field index out of bounds")),
    }
}

struct CutSeq {
    inner: SeqHandle,
    delim: Vec<u8>,
}

impl SeqStream for CutSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        match self.inner.next()? {
            Some(v) => Ok(Some(str_array(split_bytes(&v.expect_str()?, &self.delim)))),
            None => Ok(None),
        }
    }
}

fn cut_seq(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, d) = arg2(args)?;
    *out = Value::Seq(SeqHandle::new(CutSeq {
        inner: s.expect_seq()?,
        delim: d.expect_str()?,
    }));
    Ok(())
}

fn recut_fields(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, pat) = arg2(args)?;
    let re = cached_regex(&pat.expect_str()?)?;
    let s = s.expect_str()?;
    let fields: Vec<Vec<u8>> = re.split(&s).map(<[u8]>::to_vec).collect();
    *out = str_array(fields);
    Ok(())
}

fn recut_nth(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, pat, n) = arg3(args)?;
    let re = cached_regex(&pat.expect_str()?)?;
    let n = n.as_uint().ok_or_else(|| Error::sanity("UInt field index expected"))? as usize;
    let s = s.expect_str()?;
    let result = re.split(&s).nth(n).map(<[u8]>::to_vec);
    match result {
        Some(f) => {
            *out = Value::Str(f);
            Ok(())
        }
        None => Err(Error::runtime("recut field index out of bounds")),
    }
}

fn grep_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, pat) = arg2(args)?;
    let re = cached_regex(&pat.expect_str()?)?;
    let s = s.expect_str()?;
    let matches: Vec<Value> = re
        .find_iter(&s)
        .map(|m| Value::Str(m.as_bytes().to_vec()))
        .collect();
    *out = Value::Arr(Box::new(collect_array(matches, false)));
    Ok(())
}

fn grepif_str(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, pat) = arg2(args)?;
    let re = cached_regex(&pat.expect_str()?)?;
    *out = Value::UInt(u64::from(re.is_match(&s.expect_str()?)));
    Ok(())
}

struct GrepIfSeq {
    inner: SeqHandle,
    re: regex::bytes::Regex,
}

impl SeqStream for GrepIfSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        while let Some(v) = self.inner.next()? {
            let Value::Str(s) = &v else {
                return Err(Error::sanity("grepif element is not a string"));
            };
            if self.re.is_match(s) {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}

fn grepif_seq(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, pat) = arg2(args)?;
    let re = cached_regex(&pat.expect_str()?)?;
    *out = Value::Seq(SeqHandle::new(GrepIfSeq {
        inner: s.expect_seq()?,
        re,
    }));
    Ok(())
}

fn replace_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (s, pat, rep) = arg3(args)?;
    let re = cached_regex(&pat.expect_str()?)?;
    let s = s.expect_str()?;
    let rep = rep.expect_str()?;
    *out = Value::Str(re.replace_all(&s, rep.as_slice()).into_owned());
    Ok(())
}

fn tolower_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Str(arg1(args)?.expect_str()?.to_ascii_lowercase());
    Ok(())
}

fn toupper_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Str(arg1(args)?.expect_str()?.to_ascii_uppercase());
    Ok(())
}

fn cat_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    if args.is_empty() || !args.iter().all(Type::is_string) {
        return None;
    }
    Some((cat_fn as FuncImpl, Type::STR))
}

fn cat_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let mut joined = Vec::new();
    for v in args {
        joined.extend_from_slice(&v.expect_str()?);
    }
    *out = Value::Str(joined);
    Ok(())
}

fn join_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (v, sep) = arg2(args)?;
    let sep = sep.expect_str()?;
    let parts: Vec<Value> = match v {
        Value::Seq(h) => h.collect()?,
        Value::Arr(a) => a.into_values(),
        other => return Err(Error::sanity(format!("join over a {}", other.kind_name()))),
    };
    let mut joined = Vec::new();
    for (i, p) in parts.into_iter().enumerate() {
        if i > 0 {
            joined.extend_from_slice(&sep);
        }
        joined.extend_from_slice(&p.expect_str()?);
    }
    *out = Value::Str(joined);
    Ok(())
}

fn bytes_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let s = arg1(args)?.expect_str()?;
    *out = Value::Arr(Box::new(ArrayValue {
        items: Array::UInt(s.into_iter().map(u64::from).collect()),
        inline: false,
    }));
    Ok(())
}

fn string_of_bytes(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let arr = arg1(args)?.expect_arr()?;
    let Array::UInt(codes) = arr.items else {
        return Err(Error::sanity("byte array expected"));
    };
    let mut s = Vec::with_capacity(codes.len());
    for c in codes {
        if c >= 256 {
            return Err(Error::runtime(
                "array-to-string only accepts byte (0-255) values",
            ));
        }
        s.push(c as u8);
    }
    *out = Value::Str(s);
    Ok(())
}

fn string_of_atom(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let text = match arg1(args)? {
        Value::Int(v) => v.to_string(),
        Value::UInt(v) | Value::HexUInt(v) => v.to_string(),
        Value::Real(v) => {
            let mut buf = ryu::Buffer::new();
            buf.format(v).to_string()
        }
        other => return Err(Error::sanity(format!("string() of a {}", other.kind_name()))),
    };
    *out = Value::Str(text.into_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_fields() {
        assert_eq!(
            split_bytes(b"a,b,,c", b","),
            vec![b"a".to_vec(), b"b".to_vec(), b"".to_vec(), b"c".to_vec()]
        );
        assert_eq!(split_bytes(b"abc", b","), vec![b"abc".to_vec()]);
        assert_eq!(split_bytes(b"", b","), vec![b"".to_vec()]);
    }

    #[test]
    fn grep_collects_matches() {
        let mut out = Value::None;
        grep_fn(
            vec![Value::Str(b"a12 b3".to_vec()), Value::Str(b"[0-9]+".to_vec())],
            &mut out,
        )
        .unwrap();
        assert_eq!(
            out,
            Value::Arr(Box::new(ArrayValue {
                items: Array::Str(vec![b"12".to_vec(), b"3".to_vec()]),
                inline: false,
            }))
        );
    }

    #[test]
    fn string_of_bytes_rejects_wide_values() {
        let arr = Value::Arr(Box::new(ArrayValue {
            items: Array::UInt(vec![104, 105]),
            inline: false,
        }));
        let mut out = Value::None;
        string_of_bytes(vec![arr], &mut out).unwrap();
        assert_eq!(out, Value::Str(b"hi".to_vec()));

        let arr = Value::Arr(Box::new(ArrayValue {
            items: Array::UInt(vec![300]),
            inline: false,
        }));
        assert!(string_of_bytes(vec![arr], &mut Value::None).is_err());
    }

    #[test]
    fn replace_expands_groups() {
        let mut out = Value::None;
        replace_fn(
            vec![
                Value::Str(b"a1b2".to_vec()),
                Value::Str(b"([0-9])".to_vec()),
                Value::Str(b"<$1>".to_vec()),
            ],
            &mut out,
        )
        .unwrap();
        assert_eq!(out, Value::Str(b"a<1>b<2>".to_vec()));
    }
}
