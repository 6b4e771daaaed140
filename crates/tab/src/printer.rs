//! Rendering of the top-level value.
//!
//! Atoms print bare, tuples join their members with tabs, and container
//! values print one element per line with a trailing newline after the
//! final element. Maps print `key<TAB>value` lines; with sorted output
//! requested, entries are ordered by key. Inline arrays (the `[. .]`
//! literal and `iarray`) separate elements with `;` instead of
//! newlines. Containers nested inside a line join with tabs.

use std::io::Write;

use crate::{
    error::RunResult,
    value::{MapValue, Value},
};

/// Prints the final value of a program, consuming it (sequences are
/// drained).
pub fn print_value(value: Value, out: &mut dyn Write, sorted: bool) -> RunResult<()> {
    match value {
        Value::Seq(seq) => {
            while let Some(v) = seq.next()? {
                write_line(&v, out, sorted)?;
            }
        }
        Value::Arr(arr) if !arr.inline => {
            for v in arr.into_values() {
                write_line(&v, out, sorted)?;
            }
        }
        Value::Arr(arr) => {
            // inline array: ';' separators, one line in total
            let mut first = true;
            for v in arr.into_values() {
                if !first {
                    out.write_all(b";")?;
                }
                first = false;
                write_nested(&v, out, sorted)?;
            }
            out.write_all(b"\n")?;
        }
        Value::Map(map) => {
            for (k, v) in map_entries(*map, sorted) {
                write_nested(&k, out, sorted)?;
                out.write_all(b"\t")?;
                write_nested(&v, out, sorted)?;
                out.write_all(b"\n")?;
            }
        }
        Value::Lines(members) => {
            for m in members {
                write_line(&m, out, sorted)?;
            }
        }
        other => write_line(&other, out, sorted)?,
    }
    Ok(())
}

/// One element of a top-level container: its own line.
fn write_line(value: &Value, out: &mut dyn Write, sorted: bool) -> RunResult<()> {
    write_nested(value, out, sorted)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// A value embedded in a line: atoms bare, tuples and containers joined
/// with tabs, inline arrays with semicolons.
fn write_nested(value: &Value, out: &mut dyn Write, sorted: bool) -> RunResult<()> {
    match value {
        Value::None => {}
        Value::Int(v) => write!(out, "{v}")?,
        Value::UInt(v) => write!(out, "{v}")?,
        Value::HexUInt(v) => write!(out, "0x{v:x}")?,
        Value::Real(v) => {
            let mut buf = ryu::Buffer::new();
            out.write_all(buf.format(*v).as_bytes())?;
        }
        Value::Str(bytes) => out.write_all(bytes)?,
        Value::Tup(members) => {
            for (i, m) in members.iter().enumerate() {
                if i > 0 {
                    out.write_all(b"\t")?;
                }
                write_nested(m, out, sorted)?;
            }
        }
        Value::Lines(members) => {
            for (i, m) in members.iter().enumerate() {
                if i > 0 {
                    out.write_all(b"\n")?;
                }
                write_nested(m, out, sorted)?;
            }
        }
        Value::Arr(arr) => {
            let sep: &[u8] = if arr.inline { b";" } else { b"\t" };
            for i in 0..arr.len() {
                if i > 0 {
                    out.write_all(sep)?;
                }
                if let Some(v) = arr.get(i) {
                    write_nested(&v, out, sorted)?;
                }
            }
        }
        Value::Map(map) => {
            for (i, (k, v)) in map_entries((**map).clone(), sorted).into_iter().enumerate() {
                if i > 0 {
                    out.write_all(b"\t")?;
                }
                write_nested(&k, out, sorted)?;
                out.write_all(b"\t")?;
                write_nested(&v, out, sorted)?;
            }
        }
        Value::Seq(seq) => {
            let mut first = true;
            while let Some(v) = seq.next()? {
                if !first {
                    out.write_all(b"\t")?;
                }
                first = false;
                write_nested(&v, out, sorted)?;
            }
        }
    }
    Ok(())
}

fn map_entries(map: MapValue, sorted: bool) -> Vec<(Value, Value)> {
    let mut entries: Vec<(Value, Value)> = map.entries.into_iter().collect();
    if sorted {
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, ArrayValue, MergePolicy};

    fn render(value: Value, sorted: bool) -> String {
        let mut out = Vec::new();
        print_value(value, &mut out, sorted).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn atoms() {
        assert_eq!(render(Value::UInt(3), false), "3\n");
        assert_eq!(render(Value::Int(-3), false), "-3\n");
        assert_eq!(render(Value::HexUInt(255), false), "0xff\n");
        assert_eq!(render(Value::Str(b"ab".to_vec()), false), "ab\n");
        assert_eq!(render(Value::Real(2.5), false), "2.5\n");
    }

    #[test]
    fn tuples_join_with_tabs() {
        let v = Value::Tup(vec![Value::UInt(1), Value::Str(b"x".to_vec())]);
        assert_eq!(render(v, false), "1\tx\n");
    }

    #[test]
    fn line_marked_tuples_split_their_members() {
        let v = Value::Lines(vec![Value::UInt(1), Value::Str(b"x".to_vec())]);
        assert_eq!(render(v, false), "1\nx\n");
    }

    #[test]
    fn arrays_print_one_element_per_line() {
        let v = Value::Arr(Box::new(ArrayValue {
            items: Array::Str(vec![b"12".to_vec(), b"3".to_vec()]),
            inline: false,
        }));
        assert_eq!(render(v, false), "12\n3\n");
    }

    #[test]
    fn inline_arrays_use_semicolons() {
        let v = Value::Arr(Box::new(ArrayValue {
            items: Array::UInt(vec![1, 2, 3]),
            inline: true,
        }));
        assert_eq!(render(v, false), "1;2;3\n");
    }

    #[test]
    fn sorted_map_lines() {
        let mut m = MapValue::with_policy(MergePolicy::Sum);
        m.insert(Value::Str(b"b".to_vec()), Value::UInt(1)).unwrap();
        m.insert(Value::Str(b"a".to_vec()), Value::UInt(2)).unwrap();
        assert_eq!(render(Value::Map(Box::new(m)), true), "a\t2\nb\t1\n");
    }
}
