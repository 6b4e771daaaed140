//! Random builtins, backed by per-thread ChaCha generators.
//!
//! The process seed is set once at startup (the CLI's `-r` flag); each
//! thread derives its own generator from the seed and a thread counter,
//! so output is deterministic for a fixed (seed, thread count, input)
//! and threads never contend on shared generator state.

use std::{
    cell::RefCell,
    sync::atomic::{AtomicU64, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    error::{Error, RunResult},
    funcs::{arg2, seq_elem},
    registry::{FuncImpl, Registry},
    seq::collect_array,
    types::Type,
    value::Value,
};

static SEED: AtomicU64 = AtomicU64::new(0);
static GENERATION: AtomicU64 = AtomicU64::new(0);
static THREAD_COUNTER: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static RNG: RefCell<Option<(u64, ChaCha8Rng)>> = const { RefCell::new(None) };
}

/// Sets the process seed and invalidates every derived generator, so a
/// fresh run in the same process starts the same streams over.
pub fn set_seed(seed: u64) {
    SEED.store(seed, Ordering::SeqCst);
    THREAD_COUNTER.store(0, Ordering::SeqCst);
    GENERATION.fetch_add(1, Ordering::SeqCst);
}

fn with_rng<T>(f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
    RNG.with(|cell| {
        let mut slot = cell.borrow_mut();
        let generation = GENERATION.load(Ordering::SeqCst);
        if slot.as_ref().is_none_or(|(g, _)| *g != generation) {
            let lane = THREAD_COUNTER.fetch_add(1, Ordering::SeqCst);
            let mut rng = ChaCha8Rng::seed_from_u64(SEED.load(Ordering::SeqCst));
            rng.set_stream(lane);
            *slot = Some((generation, rng));
        }
        let (_, rng) = slot
            .as_mut()
            .expect("generator initialised just above");
        f(rng)
    })
}

pub fn register(r: &mut Registry) {
    r.add("rand", &[], Type::REAL, rand_unit);
    r.add("rand", &[Type::REAL, Type::REAL], Type::REAL, rand_real);
    r.add("rand", &[Type::UINT, Type::UINT], Type::UINT, rand_uint);
    r.add("rand", &[Type::INT, Type::INT], Type::INT, rand_int);
    r.add("normal", &[], Type::REAL, normal_unit);
    r.add("normal", &[Type::REAL, Type::REAL], Type::REAL, normal_scaled);
    r.add_poly("sample", sample_checker);
}

fn rand_unit(_args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Real(with_rng(|rng| rng.gen::<f64>()));
    Ok(())
}

fn rand_real(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (a, b) = arg2(args)?;
    let (a, b) = (
        a.as_real_lossy().ok_or_else(|| Error::sanity("Real bound expected"))?,
        b.as_real_lossy().ok_or_else(|| Error::sanity("Real bound expected"))?,
    );
    if a >= b {
        return Err(Error::runtime("rand: empty range"));
    }
    *out = Value::Real(with_rng(|rng| rng.gen_range(a..b)));
    Ok(())
}

fn rand_uint(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (a, b) = arg2(args)?;
    let (a, b) = (
        a.as_uint().ok_or_else(|| Error::sanity("UInt bound expected"))?,
        b.as_uint().ok_or_else(|| Error::sanity("UInt bound expected"))?,
    );
    if a >= b {
        return Err(Error::runtime("rand: empty range"));
    }
    *out = Value::UInt(with_rng(|rng| rng.gen_range(a..b)));
    Ok(())
}

fn rand_int(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (a, b) = arg2(args)?;
    let (a, b) = (
        a.as_int().ok_or_else(|| Error::sanity("Int bound expected"))?,
        b.as_int().ok_or_else(|| Error::sanity("Int bound expected"))?,
    );
    if a >= b {
        return Err(Error::runtime("rand: empty range"));
    }
    *out = Value::Int(with_rng(|rng| rng.gen_range(a..b)));
    Ok(())
}

/// Box-Muller; one draw per call is plenty for an expression language.
fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn normal_unit(_args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::Real(with_rng(gaussian));
    Ok(())
}

fn normal_scaled(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (mean, dev) = arg2(args)?;
    let (mean, dev) = (
        mean.as_real_lossy().ok_or_else(|| Error::sanity("Real mean expected"))?,
        dev.as_real_lossy().ok_or_else(|| Error::sanity("Real deviation expected"))?,
    );
    *out = Value::Real(mean + dev * with_rng(gaussian));
    Ok(())
}

/// `sample(UInt, Seq[k]) -> Arr[k]`: reservoir sampling.
fn sample_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        [n, t] if *n == Type::UINT => {
            let e = seq_elem(t)?;
            if !e.is_numeric() && !e.is_string() {
                return None;
            }
            Some((sample_fn as FuncImpl, Type::arr(e.clone())))
        }
        _ => None,
    }
}

fn sample_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    let (n, seq) = arg2(args)?;
    let n = n
        .as_uint()
        .ok_or_else(|| Error::sanity("UInt sample size expected"))? as usize;
    let seq = seq.expect_seq()?;
    let mut reservoir: Vec<Value> = Vec::with_capacity(n);
    let mut seen: u64 = 0;
    while let Some(v) = seq.next()? {
        seen += 1;
        if reservoir.len() < n {
            reservoir.push(v);
        } else {
            let j = with_rng(|rng| rng.gen_range(0..seen));
            if (j as usize) < n {
                reservoir[j as usize] = v;
            }
        }
    }
    *out = Value::Arr(Box::new(collect_array(reservoir, false)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::{SeqHandle, VecSeq};

    #[test]
    fn rand_respects_bounds() {
        set_seed(42);
        let mut out = Value::None;
        for _ in 0..64 {
            rand_uint(vec![Value::UInt(10), Value::UInt(20)], &mut out).unwrap();
            let Value::UInt(v) = out else { panic!("UInt expected") };
            assert!((10..20).contains(&v));
        }
        assert!(rand_uint(vec![Value::UInt(5), Value::UInt(5)], &mut out).is_err());
    }

    #[test]
    fn sample_is_bounded_by_the_request() {
        set_seed(7);
        let seq = Value::Seq(SeqHandle::new(VecSeq::new(
            (0..100).map(Value::UInt).collect(),
        )));
        let mut out = Value::None;
        sample_fn(vec![Value::UInt(5), seq], &mut out).unwrap();
        assert_eq!(out.expect_arr().unwrap().len(), 5);
    }
}
