//! Type inference over the command stream.
//!
//! A sequential abstract interpretation: each scope runs with a type
//! stack and a variable map, every command pushes and pops types the way
//! the evaluator will push and pop values, and every command is
//! annotated with its result type so the evaluator can pre-allocate
//! result buffers. Function calls are resolved against the registry
//! here; execution never looks a name up again.

use std::collections::HashMap;

use regex::bytes::Regex;

use crate::{
    command::{Command, Lit, Op},
    error::{Error, RunResult},
    intern::{self, Sym},
    registry::{registry, ResolvedFunc},
    types::{collapse, Type},
    value::MergePolicy,
};

/// Variable types of one checking scope.
pub type TypeVars = HashMap<Sym, Type, ahash::RandomState>;

/// Infers a whole program against the type of the input bound to `@`.
/// Returns the collapsed type of the final stack.
pub fn infer_program(code: &mut [Command], input: &Type) -> RunResult<Type> {
    let vars = TypeVars::default();
    let stack = infer_scope(code, input, &vars)?;
    collapse(&stack)
}

/// Infers one scope: `@` is bound to `at`, other bindings come in from
/// the enclosing scope and assignments extend a local copy.
fn infer_scope(code: &mut [Command], at: &Type, outer: &TypeVars) -> RunResult<Vec<Type>> {
    let mut vars = outer.clone();
    vars.insert(intern::at_sym(), at.clone());
    let mut stack: Vec<Type> = Vec::new();

    for c in code {
        match c.op {
            Op::Val => stack.push(c.lit.type_of()),
            Op::Vaw => {
                let Lit::Name(sym) = &c.lit else {
                    return Err(Error::sanity("VAW without a name"));
                };
                let t = pop(&mut stack)?;
                vars.insert(*sym, t);
            }
            Op::Var => {
                let Lit::Name(sym) = &c.lit else {
                    return Err(Error::sanity("VAR without a name"));
                };
                let t = vars.get(sym).ok_or_else(|| {
                    Error::ty(format!("use of undefined variable: {}", intern::resolve(*sym)))
                })?;
                stack.push(t.clone());
            }
            Op::Not => {
                pop(&mut stack)?;
                stack.push(Type::INT);
            }
            Op::Neg => {
                let t = peek(&stack)?;
                if !t.is_integer() {
                    return Err(Error::ty(
                        "use of '~' numeric operator on something other than integer or unsigned integer",
                    ));
                }
            }
            Op::Exp => real_operator(&mut stack, "**")?,
            Op::Mul => poly_operator(&mut stack, "*", false)?,
            Op::Div => poly_operator(&mut stack, "/", false)?,
            Op::Mod => int_operator(&mut stack, "%")?,
            Op::Add => poly_operator(&mut stack, "+", false)?,
            Op::Sub => poly_operator(&mut stack, "-", true)?,
            Op::And => int_operator(&mut stack, "&")?,
            Op::Or => int_operator(&mut stack, "|")?,
            Op::Xor => int_operator(&mut stack, "^")?,
            Op::Regex => {
                let t = pop(&mut stack)?;
                if !t.is_string() {
                    return Err(Error::ty(
                        "use of '~' regex operator on something other than string",
                    ));
                }
                let Lit::Str(pat) = &c.lit else {
                    return Err(Error::sanity("REGEX without a pattern literal"));
                };
                let pat = String::from_utf8_lossy(pat);
                c.pattern = Some(
                    Regex::new(&pat)
                        .map_err(|e| Error::runtime(format!("invalid regex \"{pat}\": {e}")))?,
                );
                stack.push(Type::arr(Type::STR));
            }
            Op::Idx => {
                expect_closures(c, 1, 1, "structure index")?;
                let container = pop(&mut stack)?;
                let key = infer_closure(&mut c.closures[0], at, &vars)?;
                match &container {
                    Type::Arr(elem) => {
                        if !key.is_numeric() {
                            return Err(Error::ty("arrays must be accessed with a numeric index"));
                        }
                        stack.push((**elem).clone());
                    }
                    Type::Map(kv) => {
                        if key != kv.0 {
                            return Err(Error::ty(format!(
                                "invalid key type when accessing map: key is {}, accessing with {}",
                                kv.0, key
                            )));
                        }
                        stack.push(kv.1.clone());
                    }
                    _ => return Err(Error::ty("cannot index a scalar value")),
                }
            }
            Op::Arr => {
                expect_closures(c, 1, 2, "generator")?;
                let elem_in = source_elem(c, 1, at, &vars)?;
                let body = infer_closure(&mut c.closures[0], &elem_in, &vars)?;
                stack.push(Type::seq(body));
            }
            Op::Map => {
                expect_closures(c, 2, 3, "map generator")?;
                let elem_in = source_elem(c, 2, at, &vars)?;
                let key = infer_closure(&mut c.closures[0], &elem_in, &vars)?;
                let val = infer_closure(&mut c.closures[1], &elem_in, &vars)?;
                c.policy = map_policy(&c.closures[1].code, &val);
                stack.push(Type::map(key, val));
            }
            Op::Fun => {
                expect_closures(c, 1, 1, "function call")?;
                let Lit::Name(sym) = &c.lit else {
                    return Err(Error::sanity("FUN without a name"));
                };
                infer_closure_stack(&mut c.closures[0], at, &vars)?;
                let args = c.closures[0].stack.clone();
                let (imp, ret) = registry().resolve(*sym, &args)?;
                c.func = Some(ResolvedFunc {
                    name: *sym,
                    imp,
                    ret: ret.clone(),
                });
                stack.push(ret);
            }
            Op::Rec => {
                expect_closures(c, 2, 3, "accumulator")?;
                let acc = {
                    // init sees the scope unchanged
                    infer_closure(&mut c.closures[1], at, &vars)?
                };
                let elem_in = source_elem(c, 2, at, &vars)?;
                let body_at = Type::tup(vec![acc.clone(), elem_in]);
                let body = infer_closure(&mut c.closures[0], &body_at, &vars)?;
                if body != acc {
                    return Err(Error::ty(format!(
                        "accumulator body yields {body} but the accumulator is {acc}"
                    )));
                }
                stack.push(acc);
            }
        }
        if c.op != Op::Vaw {
            c.ty = stack
                .last()
                .cloned()
                .ok_or_else(|| Error::sanity("no result type to annotate"))?;
        }
    }
    Ok(stack)
}

/// Infers a closure and returns its collapsed result type, also filling
/// in the closure's annotated type stack.
fn infer_closure(closure: &mut crate::command::Closure, at: &Type, vars: &TypeVars) -> RunResult<Type> {
    infer_closure_stack(closure, at, vars)?;
    collapse(&closure.stack)
}

fn infer_closure_stack(
    closure: &mut crate::command::Closure,
    at: &Type,
    vars: &TypeVars,
) -> RunResult<()> {
    closure.stack = infer_scope(&mut closure.code, at, vars)?;
    Ok(())
}

/// The element type a comprehension body's `@` is bound to: the source
/// closure's element when present, otherwise the element of the current
/// `@`.
fn source_elem(c: &mut Command, index: usize, at: &Type, vars: &TypeVars) -> RunResult<Type> {
    if c.closures.len() > index {
        let source = infer_closure(&mut c.closures[index], at, vars)?;
        source.elem()
    } else {
        at.elem()
    }
}

/// The duplicate-key policy of a map comprehension. The aggregation
/// markers `sum`/`min`/`max` in tail position of the value arm select an
/// aggregating policy; otherwise the value type decides (arrays
/// concatenate, maps merge, the rest replace).
fn map_policy(value_code: &[Command], value_ty: &Type) -> MergePolicy {
    if let Some(last) = value_code.last() {
        if last.op == Op::Fun && value_ty.is_numeric() {
            if let Lit::Name(sym) = last.lit {
                let name = intern::resolve(sym);
                match name.as_str() {
                    "sum" => return MergePolicy::Sum,
                    "min" => return MergePolicy::Min,
                    "max" => return MergePolicy::Max,
                    _ => {}
                }
            }
        }
    }
    match value_ty {
        Type::Arr(_) => MergePolicy::Concat,
        Type::Map(_) => MergePolicy::Merge,
        _ => MergePolicy::Replace,
    }
}

fn expect_closures(c: &Command, min: usize, max: usize, what: &str) -> RunResult<()> {
    if c.closures.len() < min || c.closures.len() > max {
        return Err(Error::sanity(format!("{what} is not a closure")));
    }
    Ok(())
}

fn pop(stack: &mut Vec<Type>) -> RunResult<Type> {
    stack
        .pop()
        .ok_or_else(|| Error::ty("operator applied to an empty expression"))
}

fn peek(stack: &[Type]) -> RunResult<&Type> {
    stack
        .last()
        .ok_or_else(|| Error::ty("operator applied to an empty expression"))
}

fn real_operator(stack: &mut Vec<Type>, name: &str) -> RunResult<()> {
    let t1 = pop(stack)?;
    let t2 = pop(stack)?;
    if !t1.is_numeric() || !t2.is_numeric() {
        return Err(Error::ty(format!(
            "use of '{name}' operator on non-numeric value"
        )));
    }
    stack.push(Type::REAL);
    Ok(())
}

fn int_operator(stack: &mut Vec<Type>, name: &str) -> RunResult<()> {
    let t1 = pop(stack)?;
    let t2 = pop(stack)?;
    if !t1.is_integer() || !t2.is_integer() {
        return Err(Error::ty(format!(
            "use of '{name}' operator on non-integer value"
        )));
    }
    if t1 == Type::UINT && t2 == Type::UINT {
        stack.push(Type::UINT);
    } else {
        stack.push(Type::INT);
    }
    Ok(())
}

fn poly_operator(stack: &mut Vec<Type>, name: &str, always_signed: bool) -> RunResult<()> {
    let t1 = pop(stack)?;
    let t2 = pop(stack)?;
    if !t1.is_numeric() || !t2.is_numeric() {
        return Err(Error::ty(format!(
            "use of '{name}' operator on non-numeric value"
        )));
    }
    if t1 == Type::REAL || t2 == Type::REAL {
        stack.push(Type::REAL);
    } else if !always_signed && t1 == Type::UINT && t2 == Type::UINT {
        stack.push(Type::UINT);
    } else {
        stack.push(Type::INT);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Closure;

    fn val(lit: Lit) -> Command {
        Command::with_lit(Op::Val, lit)
    }

    #[test]
    fn annotates_every_command() {
        let mut code = vec![val(Lit::UInt(1)), val(Lit::UInt(2)), Command::new(Op::Add)];
        let t = infer_program(&mut code, &Type::seq(Type::STR)).unwrap();
        assert_eq!(t, Type::UINT);
        assert_eq!(code[0].ty, Type::UINT);
        assert_eq!(code[2].ty, Type::UINT);
    }

    #[test]
    fn sub_is_always_signed() {
        let mut code = vec![val(Lit::UInt(1)), val(Lit::UInt(2)), Command::new(Op::Sub)];
        let t = infer_program(&mut code, &Type::seq(Type::STR)).unwrap();
        assert_eq!(t, Type::INT);
    }

    #[test]
    fn unbound_variable_is_a_type_error() {
        let mut code = vec![Command::with_lit(Op::Var, Lit::Name(intern::intern_str("nope")))];
        let err = infer_program(&mut code, &Type::seq(Type::STR)).unwrap_err();
        assert!(err.to_string().contains("undefined variable"));
    }

    #[test]
    fn assignment_binds_for_later_commands() {
        let x = intern::intern_str("x");
        let mut code = vec![
            val(Lit::UInt(5)),
            Command::with_lit(Op::Vaw, Lit::Name(x)),
            Command::with_lit(Op::Var, Lit::Name(x)),
        ];
        let t = infer_program(&mut code, &Type::seq(Type::STR)).unwrap();
        assert_eq!(t, Type::UINT);
    }

    #[test]
    fn map_indexing_checks_the_key_type() {
        // container: a Map[String, UInt] variable; index with a UInt key
        let m = intern::intern_str("m");
        let mut idx = Command::new(Op::Idx);
        idx.closures.push(Closure::new(vec![val(Lit::UInt(0))]));
        let mut code = vec![Command::with_lit(Op::Var, Lit::Name(m)), idx];

        let mut vars = TypeVars::default();
        vars.insert(m, Type::map(Type::STR, Type::UINT));
        let err = infer_scope(&mut code, &Type::seq(Type::STR), &vars).unwrap_err();
        assert!(err.to_string().contains("invalid key type"));
    }

    #[test]
    fn empty_closure_stack_is_rejected() {
        let mut arr = Command::new(Op::Arr);
        arr.closures.push(Closure::new(vec![]));
        let mut code = vec![arr];
        let err = infer_program(&mut code, &Type::seq(Type::STR)).unwrap_err();
        assert!(err.to_string().contains("empty sequences"));
    }
}
