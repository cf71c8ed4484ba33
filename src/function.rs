//! The function registry.
//!
//! The source runtime distinguishes "simple" functions (arguments
//! pre-evaluated by the caller), "generic" functions (which drive their own
//! argument evaluation because they need an lvalue rather than a value --
//! `move()`, `unset()`, `isset()`), and "generator" functions (which
//! produce a sequence rather than a single value). Generic functions are
//! modeled directly as their own expression node kinds in
//! [`crate::expr::call`] since the set is small and closed and each has a
//! distinct lvalue-shaped signature; this registry covers simple and
//! generator functions, both of which share the "pre-evaluate args, then
//! call" shape -- a generator function simply returns a `list` value here,
//! since nothing downstream in this crate consumes a generator lazily.

use std::collections::HashMap;

use crate::error::{ErrorKind, FilterxError};
use crate::value::{FxResult, Value};

pub type SimpleFn = fn(&[Value]) -> FxResult<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn matches(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::Range(lo, hi) => n >= lo && n <= hi,
            Arity::AtLeast(lo) => n >= lo,
        }
    }
}

#[derive(Clone, Copy)]
pub struct FunctionDef {
    pub name: &'static str,
    pub arity: Arity,
    /// Names this function accepts for its leading parameters, in
    /// positional order, so a named argument can be slotted into the right
    /// position (`flatten(dict, separator: "/")`). Empty means the function
    /// only ever accepts positional arguments.
    pub param_names: &'static [&'static str],
    pub call: SimpleFn,
}

pub struct FunctionRegistry {
    by_name: HashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry { by_name: HashMap::new() }
    }

    pub fn register(&mut self, def: FunctionDef) {
        self.by_name.insert(def.name, def);
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionDef> {
        self.by_name.get(name)
    }

    pub fn builtin() -> Self {
        let mut reg = FunctionRegistry::new();
        for def in crate::builtins::all() {
            reg.register(def);
        }
        reg
    }

    /// Implements the `args_check` contract: positionals slot in by
    /// encounter order, named arguments slot in by looking up their
    /// position in `def.param_names`; duplicate and unknown names, and any
    /// gap left once every argument has been placed, are rejected here
    /// rather than surfacing as a confusing downstream type error.
    fn resolve_args(def: &FunctionDef, args: Vec<(Option<String>, Value)>) -> FxResult<Vec<Value>> {
        let mut slots: Vec<Option<Value>> = Vec::new();
        let mut next_positional = 0usize;

        for (name, value) in args {
            let index = match name {
                None => {
                    let i = next_positional;
                    next_positional += 1;
                    i
                }
                Some(name) => def
                    .param_names
                    .iter()
                    .position(|p| *p == name)
                    .ok_or_else(|| {
                        FilterxError::new(ErrorKind::Argument, "Unknown named argument")
                            .with_info(format!("{}({})", def.name, name))
                    })?,
            };
            if index >= slots.len() {
                slots.resize(index + 1, None);
            }
            if slots[index].is_some() {
                return Err(FilterxError::new(ErrorKind::Argument, "Duplicate argument")
                    .with_info(format!("{}: argument {} given twice", def.name, index)));
            }
            slots[index] = Some(value);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    FilterxError::new(ErrorKind::Argument, "Missing argument").with_info(format!("{}: argument {} not set", def.name, i))
                })
            })
            .collect()
    }

    pub fn call(&self, name: &str, args: Vec<(Option<String>, Value)>) -> FxResult<Value> {
        let def = self
            .lookup(name)
            .ok_or_else(|| FilterxError::new(ErrorKind::Lookup, "No such function").with_info(name.to_string()))?;
        let resolved = Self::resolve_args(def, args)?;
        if !def.arity.matches(resolved.len()) {
            return Err(FilterxError::new(ErrorKind::Argument, "Invalid number of arguments").with_info(name.to_string()));
        }
        (def.call)(&resolved)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        FunctionRegistry::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_with(entries: Vec<(&str, Value)>) -> Value {
        let mut map = crate::container::DictMap::default();
        for (k, v) in entries {
            map.insert(std::rc::Rc::from(k), v);
        }
        Value::dict(map)
    }

    #[test]
    fn named_argument_fills_the_matching_position() {
        let registry = FunctionRegistry::builtin();
        let nested = dict_with(vec![("c", Value::Int(1))]);
        let top = dict_with(vec![("b", nested)]);

        registry
            .call("flatten", vec![(None, top.clone()), (Some("separator".to_string()), Value::string("/"))])
            .unwrap();
        assert!(matches!(top.get_subscript_str("b/c").unwrap(), Some(Value::Int(1))));
    }

    #[test]
    fn unknown_named_argument_is_rejected() {
        let registry = FunctionRegistry::builtin();
        let err = registry.call("flatten", vec![(Some("nope".to_string()), Value::empty_dict())]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Argument);
    }

    #[test]
    fn duplicate_argument_is_rejected() {
        let registry = FunctionRegistry::builtin();
        let err = registry
            .call("flatten", vec![(None, Value::empty_dict()), (Some("dict".to_string()), Value::empty_dict())])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Argument);
    }

    #[test]
    fn gap_left_by_a_skipped_position_is_a_missing_argument_error() {
        let registry = FunctionRegistry::builtin();
        let err = registry.call("flatten", vec![(Some("separator".to_string()), Value::string("/"))]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Argument);
    }
}
