//! Lazy sequences.
//!
//! A sequence is an opaque single-pass producer with one operation:
//! `next()` yields the next element or the end. Handles share the
//! underlying stream; cloning a handle never restarts it. The stream
//! sits behind a mutex so a handle can also serve as the shared input of
//! the scatter workers, which is exactly how the threaded runner uses
//! the line reader.

use std::{
    collections::VecDeque,
    fmt,
    io::BufRead,
    sync::{Arc, Mutex},
};

use crate::{
    command::Command,
    error::RunResult,
    exec::{self, Vars},
    value::{Array, ArrayValue, Value},
};

/// The one-operation producer behind every sequence value.
pub trait SeqStream: Send {
    /// Advances the stream, yielding the next element or `None` at the
    /// end. A stream that has ended stays ended.
    fn next(&mut self) -> RunResult<Option<Value>>;
}

/// A shared handle on a stream. Clones observe the same single pass.
#[derive(Clone)]
pub struct SeqHandle(Arc<Mutex<dyn SeqStream>>);

impl SeqHandle {
    pub fn new(stream: impl SeqStream + 'static) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }

    /// A stream that is already at its end.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(VecSeq::new(Vec::new()))
    }

    /// A one-element stream.
    #[must_use]
    pub fn once(value: Value) -> Self {
        Self::new(VecSeq::new(vec![value]))
    }

    pub fn next(&self) -> RunResult<Option<Value>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).next()
    }

    /// Stable address of the shared stream, for identity hashing.
    #[must_use]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// Drains the stream into a vector.
    pub fn collect(&self) -> RunResult<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(v) = self.next()? {
            out.push(v);
        }
        Ok(out)
    }
}

impl fmt::Debug for SeqHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq@{:x}", self.addr())
    }
}

impl PartialEq for SeqHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Converts a container value into a stream over its elements: sequences
/// pass through, arrays yield their elements, maps yield key/value
/// pairs, anything else becomes a one-element stream.
pub fn value_to_seq(value: Value) -> SeqHandle {
    match value {
        Value::Seq(h) => h,
        Value::Arr(a) => SeqHandle::new(VecSeq::new(a.into_values())),
        Value::Map(m) => SeqHandle::new(VecSeq::new(
            m.entries
                .into_iter()
                .map(|(k, v)| Value::Tup(vec![k, v]))
                .collect(),
        )),
        other => SeqHandle::once(other),
    }
}

/// Collects values into an array, specialising the storage when every
/// element is the same atomic kind.
#[must_use]
pub fn collect_array(values: Vec<Value>, inline: bool) -> ArrayValue {
    let items = if values.iter().all(|v| matches!(v, Value::Int(_))) && !values.is_empty() {
        Array::Int(values.into_iter().filter_map(|v| v.as_int()).collect())
    } else if values.iter().all(|v| matches!(v, Value::UInt(_) | Value::HexUInt(_)))
        && !values.is_empty()
    {
        Array::UInt(values.into_iter().filter_map(|v| v.as_uint()).collect())
    } else if values.iter().all(|v| matches!(v, Value::Real(_))) && !values.is_empty() {
        Array::Real(values.into_iter().filter_map(|v| v.as_real_lossy()).collect())
    } else if values.iter().all(|v| matches!(v, Value::Str(_))) && !values.is_empty() {
        Array::Str(
            values
                .into_iter()
                .filter_map(|v| v.expect_str().ok())
                .collect(),
        )
    } else {
        Array::Obj(values)
    };
    ArrayValue { items, inline }
}

/// A stream over an owned vector of values.
pub struct VecSeq {
    iter: std::vec::IntoIter<Value>,
}

impl VecSeq {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { iter: values.into_iter() }
    }
}

impl SeqStream for VecSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        Ok(self.iter.next())
    }
}

/// The line-oriented input stream: splits on `\n`, strips the trailing
/// newline, no further interpretation. Behind a handle's mutex this is
/// also the shared input of the scatter workers.
pub struct LineSeq<R: BufRead + Send> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead + Send> LineSeq<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new() }
    }
}

impl<R: BufRead + Send> SeqStream for LineSeq<R> {
    fn next(&mut self) -> RunResult<Option<Value>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        Ok(Some(Value::Str(self.buf.clone())))
    }
}

/// The counting sequence behind `count()` (unbounded) and `count(n)`
/// (1 through n).
pub struct CounterSeq {
    next: u64,
    last: Option<u64>,
}

impl CounterSeq {
    #[must_use]
    pub fn new(start: u64, last: Option<u64>) -> Self {
        Self { next: start, last }
    }
}

impl SeqStream for CounterSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        if self.last.is_some_and(|last| self.next > last) {
            return Ok(None);
        }
        let v = self.next;
        self.next += 1;
        Ok(Some(Value::UInt(v)))
    }
}

/// The first `n` elements of a stream.
pub struct HeadSeq {
    inner: SeqHandle,
    left: u64,
}

impl HeadSeq {
    #[must_use]
    pub fn new(inner: SeqHandle, n: u64) -> Self {
        Self { inner, left: n }
    }
}

impl SeqStream for HeadSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        if self.left == 0 {
            return Ok(None);
        }
        self.left -= 1;
        self.inner.next()
    }
}

/// Everything after the first `n` elements.
pub struct SkipSeq {
    inner: SeqHandle,
    to_skip: u64,
}

impl SkipSeq {
    #[must_use]
    pub fn new(inner: SeqHandle, n: u64) -> Self {
        Self { inner, to_skip: n }
    }
}

impl SeqStream for SkipSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        while self.to_skip > 0 {
            self.to_skip -= 1;
            if self.inner.next()?.is_none() {
                return Ok(None);
            }
        }
        self.inner.next()
    }
}

/// Every `n`-th element, starting with the first.
pub struct StripeSeq {
    inner: SeqHandle,
    step: u64,
    started: bool,
}

impl StripeSeq {
    #[must_use]
    pub fn new(inner: SeqHandle, step: u64) -> Self {
        Self {
            inner,
            step: step.max(1),
            started: false,
        }
    }
}

impl SeqStream for StripeSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        if self.started {
            for _ in 1..self.step {
                if self.inner.next()?.is_none() {
                    return Ok(None);
                }
            }
        }
        self.started = true;
        self.inner.next()
    }
}

/// `filter` and `while` over a stream of flag-carrying tuples: the first
/// member is the integer flag, the remainder is what gets yielded.
/// `filter` skips flagged-off elements, `while` ends the stream at the
/// first one.
pub struct FilterSeq {
    inner: SeqHandle,
    stop_on_zero: bool,
    done: bool,
}

impl FilterSeq {
    #[must_use]
    pub fn new(inner: SeqHandle, stop_on_zero: bool) -> Self {
        Self {
            inner,
            stop_on_zero,
            done: false,
        }
    }
}

impl SeqStream for FilterSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        if self.done {
            return Ok(None);
        }
        while let Some(v) = self.inner.next()? {
            let (Value::Tup(mut members) | Value::Lines(mut members)) = v else {
                return Err(crate::error::Error::sanity("filter element is not a tuple"));
            };
            let flag = members.remove(0);
            if flag.is_truthy() {
                return Ok(Some(exec::collapse_values(members)));
            }
            if self.stop_on_zero {
                self.done = true;
                return Ok(None);
            }
        }
        Ok(None)
    }
}

/// Lockstep iteration over several streams; ends with the shortest.
pub struct ZipSeq {
    inners: Vec<SeqHandle>,
}

impl ZipSeq {
    #[must_use]
    pub fn new(inners: Vec<SeqHandle>) -> Self {
        Self { inners }
    }
}

impl SeqStream for ZipSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        let mut members = Vec::with_capacity(self.inners.len());
        for h in &self.inners {
            match h.next()? {
                Some(v) => members.push(v),
                None => return Ok(None),
            }
        }
        Ok(Some(Value::Tup(members)))
    }
}

/// Sliding windows of `n` consecutive elements. `as_tuple` yields
/// fixed-arity tuples (`pairs`, `triplets`); otherwise windows come out
/// as arrays (`ngrams`).
pub struct WindowSeq {
    inner: SeqHandle,
    n: usize,
    window: VecDeque<Value>,
    as_tuple: bool,
}

impl WindowSeq {
    #[must_use]
    pub fn new(inner: SeqHandle, n: usize, as_tuple: bool) -> Self {
        Self {
            inner,
            n: n.max(1),
            window: VecDeque::new(),
            as_tuple,
        }
    }
}

impl SeqStream for WindowSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        while self.window.len() < self.n {
            match self.inner.next()? {
                Some(v) => self.window.push_back(v),
                None => return Ok(None),
            }
        }
        let members: Vec<Value> = self.window.iter().cloned().collect();
        self.window.pop_front();
        if self.as_tuple {
            Ok(Some(Value::Tup(members)))
        } else {
            Ok(Some(Value::Arr(Box::new(collect_array(members, false)))))
        }
    }
}

/// Flattens a stream of containers into a stream of their elements.
pub struct FlattenSeq {
    inner: SeqHandle,
    current: Option<SeqHandle>,
}

impl FlattenSeq {
    #[must_use]
    pub fn new(inner: SeqHandle) -> Self {
        Self { inner, current: None }
    }
}

impl SeqStream for FlattenSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        loop {
            if let Some(cur) = &self.current {
                if let Some(v) = cur.next()? {
                    return Ok(Some(v));
                }
                self.current = None;
            }
            match self.inner.next()? {
                Some(v) => self.current = Some(value_to_seq(v)),
                None => return Ok(None),
            }
        }
    }
}

/// One element glued in front of a stream (`glue`, and the rest-half of
/// `peek`).
pub struct ChainSeq {
    first: Option<Value>,
    rest: SeqHandle,
}

impl ChainSeq {
    #[must_use]
    pub fn new(first: Value, rest: SeqHandle) -> Self {
        Self { first: Some(first), rest }
    }
}

impl SeqStream for ChainSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        if let Some(v) = self.first.take() {
            return Ok(Some(v));
        }
        self.rest.next()
    }
}

/// The lazy body of an `[ … : source ]` comprehension: for each source
/// element, runs the body closure in a child environment with `@` bound
/// to the element and yields the collapsed result stack.
pub struct GeneratorSeq {
    source: SeqHandle,
    body: Vec<Command>,
    captured: Vars,
    try_elems: bool,
}

impl GeneratorSeq {
    #[must_use]
    pub fn new(source: SeqHandle, body: Vec<Command>, captured: Vars, try_elems: bool) -> Self {
        Self {
            source,
            body,
            captured,
            try_elems,
        }
    }
}

impl SeqStream for GeneratorSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        loop {
            let Some(elem) = self.source.next()? else {
                return Ok(None);
            };
            match exec::run_closure(&self.body, &self.captured, elem) {
                Ok(values) => return Ok(Some(exec::collapse_values(values))),
                Err(e) if self.try_elems && e.is_recoverable() => {}
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uints(items: &[u64]) -> SeqHandle {
        SeqHandle::new(VecSeq::new(items.iter().map(|&v| Value::UInt(v)).collect()))
    }

    #[test]
    fn lines_strip_trailing_newline() {
        let seq = SeqHandle::new(LineSeq::new(&b"ab\ncd\n"[..]));
        assert_eq!(seq.next().unwrap(), Some(Value::Str(b"ab".to_vec())));
        assert_eq!(seq.next().unwrap(), Some(Value::Str(b"cd".to_vec())));
        assert_eq!(seq.next().unwrap(), None);
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let seq = SeqHandle::new(LineSeq::new(&b"ab\ncd"[..]));
        assert_eq!(seq.next().unwrap(), Some(Value::Str(b"ab".to_vec())));
        assert_eq!(seq.next().unwrap(), Some(Value::Str(b"cd".to_vec())));
        assert_eq!(seq.next().unwrap(), None);
    }

    #[test]
    fn head_stops_pulling_the_source() {
        struct Counting {
            pulls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        }
        impl SeqStream for Counting {
            fn next(&mut self) -> RunResult<Option<Value>> {
                self.pulls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Some(Value::UInt(1)))
            }
        }
        let pulls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let head = SeqHandle::new(HeadSeq::new(
            SeqHandle::new(Counting { pulls: pulls.clone() }),
            2,
        ));
        assert_eq!(head.collect().unwrap().len(), 2);
        // an infinite source was touched at most twice
        assert_eq!(pulls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn stripe_takes_every_nth() {
        let s = SeqHandle::new(StripeSeq::new(uints(&[1, 2, 3, 4, 5]), 2));
        assert_eq!(
            s.collect().unwrap(),
            vec![Value::UInt(1), Value::UInt(3), Value::UInt(5)]
        );
    }

    #[test]
    fn zip_ends_with_shortest() {
        let z = SeqHandle::new(ZipSeq::new(vec![uints(&[1, 2, 3]), uints(&[10, 20])]));
        assert_eq!(
            z.collect().unwrap(),
            vec![
                Value::Tup(vec![Value::UInt(1), Value::UInt(10)]),
                Value::Tup(vec![Value::UInt(2), Value::UInt(20)]),
            ]
        );
    }

    #[test]
    fn windows_slide() {
        let p = SeqHandle::new(WindowSeq::new(uints(&[1, 2, 3]), 2, true));
        assert_eq!(
            p.collect().unwrap(),
            vec![
                Value::Tup(vec![Value::UInt(1), Value::UInt(2)]),
                Value::Tup(vec![Value::UInt(2), Value::UInt(3)]),
            ]
        );
    }

    #[test]
    fn handles_share_one_pass() {
        let a = uints(&[1, 2, 3]);
        let b = a.clone();
        assert_eq!(a.next().unwrap(), Some(Value::UInt(1)));
        assert_eq!(b.next().unwrap(), Some(Value::UInt(2)));
    }
}
