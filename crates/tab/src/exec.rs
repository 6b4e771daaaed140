//! The tree-walking evaluator.
//!
//! Executes an annotated command stream against a runtime of variable
//! bindings and a value stack. Closures evaluate in child runtimes that
//! snapshot the parent's bindings, which is sound because bindings are
//! immutable once made in any given scope. Sequence-producing commands
//! stay lazy: an `ARR` comprehension pushes a generator stream, only a
//! `MAP` (or an eager builtin) actually drains its source.

use std::collections::HashMap;

use crate::{
    command::{Command, Lit, Op},
    error::{Error, RunResult},
    intern::{self, Sym},
    seq::{value_to_seq, GeneratorSeq, SeqHandle},
    value::{MapValue, Value},
};

/// Variable bindings of one runtime scope.
pub type Vars = HashMap<Sym, Value, ahash::RandomState>;

/// Evaluation state: bindings plus the value stack.
#[derive(Default)]
pub struct Runtime {
    pub vars: Vars,
    pub stack: Vec<Value>,
}

impl Runtime {
    #[must_use]
    pub fn with_input(input: Value) -> Self {
        let mut rt = Self::default();
        rt.vars.insert(intern::at_sym(), input);
        rt
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::sanity("value stack underflow"))
    }
}

/// Collapses a closure's result stack to a single value: one value
/// stands for itself, several become a tuple.
#[must_use]
pub fn collapse_values(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.pop().unwrap_or(Value::None)
    } else {
        Value::Tup(values)
    }
}

/// Runs a closure in a child runtime that snapshots `vars` unchanged.
pub fn eval_closure(code: &[Command], vars: &Vars) -> RunResult<Vec<Value>> {
    let mut rt = Runtime {
        vars: vars.clone(),
        stack: Vec::new(),
    };
    execute(code, &mut rt)?;
    Ok(rt.stack)
}

/// Runs a closure with `@` rebound to `elem` (comprehension bodies,
/// accumulator bodies).
pub fn run_closure(code: &[Command], vars: &Vars, elem: Value) -> RunResult<Vec<Value>> {
    let mut rt = Runtime {
        vars: vars.clone(),
        stack: Vec::new(),
    };
    rt.vars.insert(intern::at_sym(), elem);
    execute(code, &mut rt)?;
    Ok(rt.stack)
}

/// Runs a full program against an input value bound to `@`, returning
/// the collapsed top-level result.
pub fn run_program(code: &[Command], input: Value) -> RunResult<Value> {
    let mut rt = Runtime::with_input(input);
    execute(code, &mut rt)?;
    Ok(collapse_values(rt.stack))
}

/// Executes one command stream against a runtime.
pub fn execute(code: &[Command], rt: &mut Runtime) -> RunResult<()> {
    for c in code {
        match c.op {
            Op::Val => rt.stack.push(literal_value(&c.lit)?),
            Op::Var => {
                let Lit::Name(sym) = &c.lit else {
                    return Err(Error::sanity("VAR without a name"));
                };
                let v = rt
                    .vars
                    .get(sym)
                    .cloned()
                    .ok_or_else(|| Error::sanity(format!("unbound variable {}", intern::resolve(*sym))))?;
                rt.stack.push(v);
            }
            Op::Vaw => {
                let Lit::Name(sym) = &c.lit else {
                    return Err(Error::sanity("VAW without a name"));
                };
                let v = rt.pop()?;
                rt.vars.insert(*sym, v);
            }
            Op::Not => {
                let v = rt.pop()?;
                rt.stack.push(Value::Int(i64::from(!v.is_truthy())));
            }
            Op::Neg => {
                let v = rt.pop()?;
                let r = match v {
                    Value::Int(x) => Value::Int(!x),
                    Value::UInt(x) | Value::HexUInt(x) => Value::UInt(!x),
                    other => {
                        return Err(Error::sanity(format!(
                            "bitwise complement of a {}",
                            other.kind_name()
                        )))
                    }
                };
                rt.stack.push(r);
            }
            Op::Exp | Op::Mul | Op::Div | Op::Mod | Op::Add | Op::Sub | Op::And | Op::Or | Op::Xor => {
                let b = rt.pop()?;
                let a = rt.pop()?;
                rt.stack.push(arith(c.op, &a, &b)?);
            }
            Op::Regex => {
                let s = rt.pop()?.expect_str()?;
                let pattern = c
                    .pattern
                    .as_ref()
                    .ok_or_else(|| Error::sanity("REGEX without a compiled pattern"))?;
                let matches: Vec<Value> = pattern
                    .find_iter(&s)
                    .map(|m| Value::Str(m.as_bytes().to_vec()))
                    .collect();
                rt.stack
                    .push(Value::Arr(Box::new(crate::seq::collect_array(matches, false))));
            }
            Op::Idx => {
                let key = collapse_values(eval_closure(&c.closures[0].code, &rt.vars)?);
                let container = rt.pop()?;
                rt.stack.push(container.index(&key)?);
            }
            Op::Arr => {
                let source = comprehension_source(c, 1, rt)?;
                let stream = GeneratorSeq::new(
                    source,
                    c.closures[0].code.clone(),
                    rt.vars.clone(),
                    c.try_elems,
                );
                rt.stack.push(Value::Seq(SeqHandle::new(stream)));
            }
            Op::Map => {
                let source = comprehension_source(c, 2, rt)?;
                let mut map = MapValue::with_policy(c.policy);
                while let Some(elem) = source.next()? {
                    let entry = (|| -> RunResult<(Value, Value)> {
                        let key =
                            collapse_values(run_closure(&c.closures[0].code, &rt.vars, elem.clone())?);
                        let val = collapse_values(run_closure(&c.closures[1].code, &rt.vars, elem)?);
                        Ok((key, val))
                    })();
                    match entry {
                        Ok((key, val)) => map.insert(key, val)?,
                        Err(e) if c.try_elems && e.is_recoverable() => {}
                        Err(e) => return Err(e),
                    }
                }
                rt.stack.push(Value::Map(Box::new(map)));
            }
            Op::Fun => {
                let rf = c
                    .func
                    .as_ref()
                    .ok_or_else(|| Error::sanity("unresolved function call"))?;
                let args = eval_closure(&c.closures[0].code, &rt.vars)?;
                let mut out = Value::defaults(&rf.ret);
                (rf.imp)(args, &mut out)?;
                rt.stack.push(out);
            }
            Op::Rec => {
                let mut acc = collapse_values(eval_closure(&c.closures[1].code, &rt.vars)?);
                let source = comprehension_source(c, 2, rt)?;
                while let Some(elem) = source.next()? {
                    let step = run_closure(
                        &c.closures[0].code,
                        &rt.vars,
                        Value::Tup(vec![acc.clone(), elem]),
                    );
                    match step {
                        Ok(values) => acc = collapse_values(values),
                        Err(e) if c.try_elems && e.is_recoverable() => {}
                        Err(e) => return Err(e),
                    }
                }
                rt.stack.push(acc);
            }
        }
    }
    Ok(())
}

/// The source stream of a comprehension: the closure at `index` when
/// present, otherwise whatever `@` is currently bound to.
fn comprehension_source(c: &Command, index: usize, rt: &Runtime) -> RunResult<SeqHandle> {
    if let Some(closure) = c.closures.get(index) {
        let v = collapse_values(eval_closure(&closure.code, &rt.vars)?);
        Ok(value_to_seq(v))
    } else {
        let at = rt
            .vars
            .get(&intern::at_sym())
            .cloned()
            .ok_or_else(|| Error::sanity("comprehension without a bound @"))?;
        Ok(value_to_seq(at))
    }
}

fn literal_value(lit: &Lit) -> RunResult<Value> {
    match lit {
        Lit::Int(v) => Ok(Value::Int(*v)),
        Lit::UInt(v) => Ok(Value::UInt(*v)),
        Lit::Real(v) => Ok(Value::Real(*v)),
        Lit::Str(v) => Ok(Value::Str(v.clone())),
        Lit::None | Lit::Name(_) => Err(Error::sanity("VAL without a literal")),
    }
}

/// Binary arithmetic with the numeric-promotion rules: `Real` dominates,
/// `UInt, UInt` stays unsigned except under `SUB`, the bitwise family
/// requires integers. Integer division and modulo by zero are runtime
/// errors; `Real` division follows IEEE-754.
fn arith(op: Op, a: &Value, b: &Value) -> RunResult<Value> {
    let sanity = || {
        Error::sanity(format!(
            "operator {op} on {} and {}",
            a.kind_name(),
            b.kind_name()
        ))
    };
    let either_real = matches!(a, Value::Real(_)) || matches!(b, Value::Real(_));
    let both_uint = a.as_uint().is_some() && b.as_uint().is_some();

    match op {
        Op::Exp => {
            let (x, y) = (
                a.as_real_lossy().ok_or_else(sanity)?,
                b.as_real_lossy().ok_or_else(sanity)?,
            );
            Ok(Value::Real(x.powf(y)))
        }
        Op::Mul | Op::Div | Op::Add | Op::Sub => {
            if either_real {
                let (x, y) = (
                    a.as_real_lossy().ok_or_else(sanity)?,
                    b.as_real_lossy().ok_or_else(sanity)?,
                );
                let r = match op {
                    Op::Mul => x * y,
                    Op::Div => x / y,
                    Op::Add => x + y,
                    _ => x - y,
                };
                Ok(Value::Real(r))
            } else if both_uint && op != Op::Sub {
                let (x, y) = (a.as_uint().ok_or_else(sanity)?, b.as_uint().ok_or_else(sanity)?);
                let r = match op {
                    Op::Mul => x.wrapping_mul(y),
                    Op::Div => {
                        if y == 0 {
                            return Err(Error::runtime("division by zero"));
                        }
                        x / y
                    }
                    _ => x.wrapping_add(y),
                };
                Ok(Value::UInt(r))
            } else {
                let (x, y) = (
                    a.as_integer().ok_or_else(sanity)?,
                    b.as_integer().ok_or_else(sanity)?,
                );
                let r = match op {
                    Op::Mul => x.wrapping_mul(y),
                    Op::Div => {
                        if y == 0 {
                            return Err(Error::runtime("division by zero"));
                        }
                        x.wrapping_div(y)
                    }
                    Op::Add => x.wrapping_add(y),
                    _ => x.wrapping_sub(y),
                };
                Ok(Value::Int(r))
            }
        }
        Op::Mod | Op::And | Op::Or | Op::Xor => {
            if both_uint {
                let (x, y) = (a.as_uint().ok_or_else(sanity)?, b.as_uint().ok_or_else(sanity)?);
                let r = match op {
                    Op::Mod => {
                        if y == 0 {
                            return Err(Error::runtime("modulo by zero"));
                        }
                        x % y
                    }
                    Op::And => x & y,
                    Op::Or => x | y,
                    _ => x ^ y,
                };
                Ok(Value::UInt(r))
            } else {
                let (x, y) = (
                    a.as_integer().ok_or_else(sanity)?,
                    b.as_integer().ok_or_else(sanity)?,
                );
                let r = match op {
                    Op::Mod => {
                        if y == 0 {
                            return Err(Error::runtime("modulo by zero"));
                        }
                        x.wrapping_rem(y)
                    }
                    Op::And => x & y,
                    Op::Or => x | y,
                    _ => x ^ y,
                };
                Ok(Value::Int(r))
            }
        }
        _ => Err(sanity()),
    }
}
