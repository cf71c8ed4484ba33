//! Read-only attribute/subscript access: `base.attr`, `base[key]`.
//!
//! Writing through a path goes through [`crate::expr::dpath`] instead,
//! which threads copy-on-write "touch" semantics the plain reads here don't
//! need.

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

#[derive(Debug)]
pub struct GetAttr {
    pub base: Box<dyn Expr>,
    pub attr: String,
}

impl Expr for GetAttr {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let base = self.base.eval(ctx)?;
        base.getattr(&self.attr)?
            .ok_or_else(|| FilterxError::new(ErrorKind::Lookup, "No such attribute").with_info(self.attr.clone()))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.base);
        None
    }
}

#[derive(Debug)]
pub struct GetSubscript {
    pub base: Box<dyn Expr>,
    pub key: Box<dyn Expr>,
}

impl Expr for GetSubscript {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let base = self.base.eval(ctx)?;
        let key = self.key.eval(ctx)?;
        let result = match &key {
            Value::Str(s) => base.get_subscript_str(s)?,
            Value::Int(i) => base.get_subscript_index(*i)?,
            _ => return Err(FilterxError::new(ErrorKind::Type, "Subscript key must be a string or an int")),
        };
        result.ok_or_else(|| FilterxError::new(ErrorKind::Lookup, "No such element").with_object(key))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.base);
        optimize_child(&mut self.key);
        None
    }
}

/// `object[key] = value` / `object.attr = value` as an assignment target: a
/// single-level write against an already-evaluated object, auto-vivifying
/// nothing. Distinct from [`crate::expr::dpath::DPathLValue`], which walks
/// (and creates) a whole chain of intermediate dicts; this node is the leaf
/// write the source's `expr-set-subscript.c` models on its own. `key` absent
/// mirrors the source's keyless `set_subscript` call (used there for list
/// append); this crate's dict/list value model has no such operation, so a
/// keyless write is an `Argument` error.
#[derive(Debug)]
pub struct SetSubscript {
    pub object: Box<dyn Expr>,
    pub key: Option<Box<dyn Expr>>,
}

impl SetSubscript {
    fn eval_object_and_key(&self, ctx: &mut EvalContext) -> FxResult<(Value, Value)> {
        let object = self.object.eval(ctx)?;
        let key = match &self.key {
            Some(k) => k.eval(ctx)?,
            None => return Err(FilterxError::new(ErrorKind::Argument, "set_subscript() requires a key")),
        };
        Ok((object, key))
    }

    pub fn assign(&self, ctx: &mut EvalContext, value: Value) -> FxResult<()> {
        let (object, key) = self.eval_object_and_key(ctx)?;
        match &key {
            Value::Str(s) => object.set_subscript_str(s, value),
            Value::Int(i) => object.set_subscript_index(*i, value),
            _ => Err(FilterxError::new(ErrorKind::Type, "Subscript key must be a string or an int")),
        }
    }

    pub fn plus_assign(&self, ctx: &mut EvalContext, addend: Value) -> FxResult<Value> {
        let (object, key) = self.eval_object_and_key(ctx)?;
        let current = match &key {
            Value::Str(s) => object.get_subscript_str(s)?,
            Value::Int(i) => object.get_subscript_index(*i)?,
            _ => return Err(FilterxError::new(ErrorKind::Type, "Subscript key must be a string or an int")),
        }
        .ok_or_else(|| FilterxError::new(ErrorKind::Lookup, "No such element").with_object(key.clone()))?;
        let combined = current.combine_for_plus_assign(&addend)?;
        match &key {
            Value::Str(s) => object.set_subscript_str(s, combined.clone())?,
            Value::Int(i) => object.set_subscript_index(*i, combined.clone())?,
            _ => unreachable!(),
        }
        Ok(combined)
    }

    pub fn optimize_children(&mut self) {
        optimize_child(&mut self.object);
        if let Some(key) = &mut self.key {
            optimize_child(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::DictMap;
    use crate::expr::literal::Literal;
    use crate::message::{HandleTable, Message};
    use std::rc::Rc;

    fn ctx() -> EvalContext {
        EvalContext::begin_context(Message::new(), HandleTable::new())
    }

    fn lit(v: Value) -> Box<dyn Expr> {
        Box::new(Literal::new(v))
    }

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        let mut map = DictMap::default();
        for (k, v) in entries {
            map.insert(Rc::from(k), v);
        }
        Value::dict(map)
    }

    #[test]
    fn assign_writes_through_a_string_key() {
        let mut c = ctx();
        let obj = dict(vec![("a", Value::Int(1))]);
        let target = SetSubscript { object: lit(obj.clone()), key: Some(lit(Value::string("a"))) };
        target.assign(&mut c, Value::Int(2)).unwrap();
        assert!(matches!(obj.get_subscript_str("a").unwrap(), Some(Value::Int(2))));
    }

    #[test]
    fn assign_without_a_key_is_an_argument_error() {
        let mut c = ctx();
        let obj = dict(vec![]);
        let target = SetSubscript { object: lit(obj), key: None };
        let err = target.assign(&mut c, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Argument);
    }

    #[test]
    fn plus_assign_adds_into_the_existing_element() {
        let mut c = ctx();
        let obj = dict(vec![("count", Value::Int(1))]);
        let target = SetSubscript { object: lit(obj.clone()), key: Some(lit(Value::string("count"))) };
        let result = target.plus_assign(&mut c, Value::Int(41)).unwrap();
        assert!(matches!(result, Value::Int(42)));
        assert!(matches!(obj.get_subscript_str("count").unwrap(), Some(Value::Int(42))));
    }

    #[test]
    fn plus_assign_on_a_missing_key_is_a_lookup_error() {
        let mut c = ctx();
        let obj = dict(vec![]);
        let target = SetSubscript { object: lit(obj), key: Some(lit(Value::string("missing"))) };
        let err = target.plus_assign(&mut c, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lookup);
    }
}
