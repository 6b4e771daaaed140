//! Threaded scatter/gather execution.
//!
//! A program containing `-->` splits into a scatter half, compiled once
//! per worker, and a gather half compiled against the workers' output
//! type. Workers share the mutex-guarded input line sequence, drive
//! their own pipeline, and hand each produced element to a per-worker
//! rendezvous slot (one mutex, two condition variables, single producer
//! and single consumer). The gatherer multiplexes the slots in strict
//! round-robin order; a finished worker leaves the rotation, and when
//! the rotation is empty the group sequence ends.

use std::{
    io::Write,
    sync::{Arc, Condvar, Mutex},
    thread,
};

use crate::{
    compile,
    error::RunResult,
    exec, printer,
    seq::{SeqHandle, SeqStream},
    types::Type,
    value::Value,
    Options, Program,
};

/// Splits the source on the `-->` marker; without one the whole program
/// is the scatter half and the gather defaults to `@`.
#[must_use]
pub fn split_program(src: &str) -> (&str, &str) {
    match src.find("-->") {
        Some(i) => (&src[..i], &src[i + 3..]),
        None => (src, "@"),
    }
}

struct SlotState {
    result: Option<RunResult<Value>>,
    finished: bool,
    /// Set when the consumer goes away early; the producer stops.
    abandoned: bool,
}

/// Single-producer single-consumer hand-off slot.
struct Slot {
    state: Mutex<SlotState>,
    can_produce: Condvar,
    can_consume: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                result: None,
                finished: false,
                abandoned: false,
            }),
            can_produce: Condvar::new(),
            can_consume: Condvar::new(),
        }
    }

    /// Blocks until the slot is free, then stores one item. Returns
    /// false when the consumer has abandoned the slot.
    fn produce(&self, item: RunResult<Value>) -> bool {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while st.result.is_some() && !st.abandoned {
            st = self.can_produce.wait(st).unwrap_or_else(|e| e.into_inner());
        }
        if st.abandoned {
            return false;
        }
        st.result = Some(item);
        drop(st);
        self.can_consume.notify_one();
        true
    }

    fn finish(&self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        st.finished = true;
        drop(st);
        self.can_consume.notify_one();
    }

    fn abandon(&self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        st.abandoned = true;
        st.result = None;
        drop(st);
        self.can_produce.notify_one();
    }
}

/// The gatherer's view of the worker pool: a sequence of worker output
/// elements in strict round-robin slot order.
struct ThreadGroupSeq {
    rotation: Vec<Arc<Slot>>,
    all: Vec<Arc<Slot>>,
    workers: Vec<thread::JoinHandle<()>>,
    cursor: usize,
}

impl SeqStream for ThreadGroupSeq {
    fn next(&mut self) -> RunResult<Option<Value>> {
        while !self.rotation.is_empty() {
            let n = self.cursor % self.rotation.len();
            let slot = self.rotation[n].clone();
            let mut st = slot.state.lock().unwrap_or_else(|e| e.into_inner());
            while st.result.is_none() && !st.finished {
                st = slot.can_consume.wait(st).unwrap_or_else(|e| e.into_inner());
            }
            if let Some(item) = st.result.take() {
                drop(st);
                slot.can_produce.notify_one();
                self.cursor = (n + 1) % self.rotation.len();
                return item.map(Some);
            }
            drop(st);
            self.rotation.remove(n);
            if !self.rotation.is_empty() {
                self.cursor = n % self.rotation.len();
            }
        }
        Ok(None)
    }
}

impl Drop for ThreadGroupSeq {
    fn drop(&mut self) {
        for slot in &self.all {
            slot.abandon();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// One worker: run the compiled scatter pipeline against the shared
/// input and feed every produced element to the slot. A non-sequence
/// result is delivered as a single element.
fn worker(program: Program, input: SeqHandle, slot: Arc<Slot>) {
    match exec::run_program(&program.code, Value::Seq(input)) {
        Ok(Value::Seq(seq)) => loop {
            match seq.next() {
                Ok(Some(v)) => {
                    if !slot.produce(Ok(v)) {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    slot.produce(Err(e));
                    break;
                }
            }
        },
        Ok(v) => {
            slot.produce(Ok(v));
        }
        Err(e) => {
            slot.produce(Err(e));
        }
    }
    slot.finish();
}

/// Compiles and runs `scatter --> gather` with `nthreads` workers,
/// printing the gather result.
pub fn run_threaded(
    src: &str,
    input: SeqHandle,
    out: &mut dyn Write,
    opts: &Options,
) -> RunResult<()> {
    let (scatter_src, gather_src) = split_program(src);
    let input_ty = Type::seq(Type::STR);
    let nthreads = opts.threads.max(1);

    let mut programs = Vec::with_capacity(nthreads);
    for n in 0..nthreads {
        programs.push(compile(
            scatter_src,
            &input_ty,
            if n == 0 { opts.debug } else { 0 },
        )?);
    }

    // workers all have the same output type by construction
    let elem_ty = match &programs[0].result {
        Type::Seq(e) => (**e).clone(),
        other => other.clone(),
    };
    let gather = compile(gather_src, &Type::seq(elem_ty), opts.debug)?;

    let mut slots = Vec::with_capacity(nthreads);
    let mut workers = Vec::with_capacity(nthreads);
    for program in programs {
        let slot = Arc::new(Slot::new());
        slots.push(slot.clone());
        let input = input.clone();
        workers.push(thread::spawn(move || worker(program, input, slot)));
    }

    let group = ThreadGroupSeq {
        rotation: slots.clone(),
        all: slots,
        workers,
        cursor: 0,
    };
    let result = exec::run_program(&gather.code, Value::Seq(SeqHandle::new(group)))?;
    printer::print_value(result, out, opts.sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_the_marker() {
        assert_eq!(split_program("a --> b"), ("a ", " b"));
        assert_eq!(split_program("a"), ("a", "@"));
    }

    #[test]
    fn round_robin_multiplexing() {
        // two hand-built producers, no compilation involved
        let slots: Vec<Arc<Slot>> = (0..2).map(|_| Arc::new(Slot::new())).collect();
        let mut workers = Vec::new();
        for (i, slot) in slots.iter().enumerate() {
            let slot = slot.clone();
            workers.push(thread::spawn(move || {
                for k in 0..3u64 {
                    if !slot.produce(Ok(Value::UInt(10 * (i as u64 + 1) + k))) {
                        return;
                    }
                }
                slot.finish();
            }));
        }
        let group = ThreadGroupSeq {
            rotation: slots.clone(),
            all: slots,
            workers,
            cursor: 0,
        };
        let seq = SeqHandle::new(group);
        let got = seq.collect().unwrap();
        assert_eq!(
            got,
            [10, 20, 11, 21, 12, 22]
                .iter()
                .map(|&v| Value::UInt(v))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn abandoning_early_unblocks_producers() {
        let slot = Arc::new(Slot::new());
        let producer = {
            let slot = slot.clone();
            thread::spawn(move || {
                let mut n = 0u64;
                while slot.produce(Ok(Value::UInt(n))) {
                    n += 1;
                }
                n
            })
        };
        // consume one element, then walk away
        {
            let mut st = slot.state.lock().unwrap();
            while st.result.is_none() {
                st = slot.can_consume.wait(st).unwrap();
            }
            st.result = None;
        }
        slot.can_produce.notify_one();
        slot.abandon();
        let produced = producer.join().unwrap();
        assert!(produced >= 1);
    }

    #[test]
    fn worker_errors_surface_at_the_gather() {
        let slot = Arc::new(Slot::new());
        let workers = vec![{
            let slot = slot.clone();
            thread::spawn(move || {
                slot.produce(Err(crate::error::Error::runtime("boom")));
                slot.finish();
            })
        }];
        let group = ThreadGroupSeq {
            rotation: vec![slot.clone()],
            all: vec![slot],
            workers,
            cursor: 0,
        };
        let seq = SeqHandle::new(group);
        assert!(seq.next().is_err());
    }

    #[test]
    fn non_sequence_results_become_one_element() {
        let slots = vec![Arc::new(Slot::new())];
        let slot = slots[0].clone();
        let workers = vec![thread::spawn(move || {
            // mimic a worker whose top level is an atom
            slot.produce(Ok(Value::UInt(7)));
            slot.finish();
        })];
        let group = ThreadGroupSeq {
            rotation: slots.clone(),
            all: slots,
            workers,
            cursor: 0,
        };
        let seq = SeqHandle::new(group);
        assert_eq!(seq.collect().unwrap(), vec![Value::UInt(7)]);
    }
}
