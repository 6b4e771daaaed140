//! The `hash` builtin: a process-stable structural hash of any value.

use crate::{
    error::RunResult,
    funcs::arg1,
    registry::{FuncImpl, Registry},
    types::Type,
    value::Value,
};

pub fn register(r: &mut Registry) {
    r.add_poly("hash", hash_checker);
}

fn hash_checker(args: &[Type]) -> Option<(FuncImpl, Type)> {
    match args {
        // sequences are single-pass and hash by identity, which is
        // never what a caller wants; reject them at check time
        [Type::Seq(_)] => None,
        [_] => Some((hash_fn as FuncImpl, Type::UINT)),
        _ => None,
    }
}

fn hash_fn(args: Vec<Value>, out: &mut Value) -> RunResult<()> {
    *out = Value::UInt(arg1(args)?.hash64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_structural() {
        let mut a = Value::None;
        let mut b = Value::None;
        hash_fn(vec![Value::Str(b"abc".to_vec())], &mut a).unwrap();
        hash_fn(vec![Value::Str(b"abc".to_vec())], &mut b).unwrap();
        assert_eq!(a, b);
        hash_fn(vec![Value::Str(b"abd".to_vec())], &mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sequences_are_rejected() {
        assert!(hash_checker(&[Type::seq(Type::STR)]).is_none());
        assert!(hash_checker(&[Type::arr(Type::STR)]).is_some());
    }
}
