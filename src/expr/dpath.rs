//! Deep-path assignment target: `a.b[c].d = value`, `a.b[c].d += {..}`.
//!
//! Grounded on `filterx-dpath.c`. A path is a non-empty sequence of
//! elements, each either a literal key (an attribute access, or a subscript
//! whose key folded to a constant at optimize time) or an expression whose
//! value is evaluated fresh on every assignment. Walking the path creates
//! any missing intermediate dict automatically; the terminal element is
//! where the actual write happens. This node can only ever appear as an
//! assignment target -- evaluating it directly as an r-value is a
//! programming error, matching `_prohibit_eval`.

use smallvec::SmallVec;

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

#[derive(Debug)]
pub enum PathElement {
    /// A constant key: `.b`, or a subscript whose key folded to a literal.
    Literal(Value),
    /// A subscript whose key must be evaluated fresh every time.
    Expr(Box<dyn Expr>),
}

#[derive(Debug)]
pub struct DPathLValue {
    pub variable: Box<dyn Expr>,
    pub elements: SmallVec<[PathElement; 4]>,
}

impl DPathLValue {
    pub fn new(variable: Box<dyn Expr>, elements: Vec<PathElement>) -> FxResult<Self> {
        if elements.is_empty() {
            return Err(FilterxError::new(ErrorKind::Argument, "There must be at least one element in the path"));
        }
        Ok(DPathLValue { variable, elements: elements.into() })
    }

    fn elem_key(elem: &PathElement, ctx: &mut EvalContext) -> FxResult<Value> {
        match elem {
            PathElement::Literal(v) => Ok(v.clone()),
            PathElement::Expr(e) => e.eval(ctx),
        }
    }

    fn elem_get(container: &Value, elem: &PathElement, ctx: &mut EvalContext) -> FxResult<Option<Value>> {
        let key = Self::elem_key(elem, ctx)?;
        match &key {
            Value::Str(s) => container.get_subscript_str(s),
            Value::Int(i) => container.get_subscript_index(*i),
            _ => Err(FilterxError::new(ErrorKind::Type, "dpath key must be a string or an int")),
        }
    }

    fn elem_set(container: &Value, elem: &PathElement, value: Value, ctx: &mut EvalContext) -> FxResult<()> {
        let key = Self::elem_key(elem, ctx)?;
        match &key {
            Value::Str(s) => container.set_subscript_str(s, value),
            Value::Int(i) => container.set_subscript_index(*i, value),
            _ => Err(FilterxError::new(ErrorKind::Type, "dpath key must be a string or an int")),
        }
    }

    /// Walks every element except the last, creating an empty dict at any
    /// element whose key is missing, and returns the container the terminal
    /// read/write should apply to.
    fn touch(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let mut dict = self.variable.eval(ctx)?;
        if !matches!(dict, Value::Dict(_)) {
            return Err(FilterxError::new(ErrorKind::Type, "dpath argument has non-dict element in path"));
        }

        let last = self.elements.len() - 1;
        for (i, elem) in self.elements.iter().enumerate() {
            if i == last {
                break;
            }
            let value = match Self::elem_get(&dict, elem, ctx)? {
                Some(v) => v,
                None => {
                    let created = Value::empty_dict();
                    Self::elem_set(&dict, elem, created.clone(), ctx)?;
                    created
                }
            };
            dict = value;
            if !matches!(dict, Value::Dict(_)) {
                return Err(FilterxError::new(ErrorKind::Type, "dpath argument has non-dict element in path"));
            }
        }
        Ok(dict)
    }

    pub fn assign(&self, ctx: &mut EvalContext, new_value: Value) -> FxResult<()> {
        let last_container = self.touch(ctx)?;
        let last_elem = self.elements.last().expect("non-empty path");
        Self::elem_set(&last_container, last_elem, new_value, ctx)
    }

    /// `a.b[c].d += rhs`: reads the terminal element (a missing one is a
    /// lookup error, matching `filterx_expr_plus_assign`'s dedicated
    /// per-lvalue dispatch in the source rather than a generic eval), merges
    /// or adds `rhs` in, and stores the result back into the same element.
    pub fn plus_assign(&self, ctx: &mut EvalContext, addend: Value) -> FxResult<Value> {
        let last_container = self.touch(ctx)?;
        let last_elem = self.elements.last().expect("non-empty path");
        let current = Self::elem_get(&last_container, last_elem, ctx)?
            .ok_or_else(|| FilterxError::new(ErrorKind::Lookup, "No such element to add to"))?;
        let combined = current.combine_for_plus_assign(&addend)?;
        Self::elem_set(&last_container, last_elem, combined.clone(), ctx)?;
        Ok(combined)
    }
}

impl Expr for DPathLValue {
    fn eval(&self, _ctx: &mut EvalContext) -> FxResult<Value> {
        unreachable!("dpath lvalues must never be evaluated as an r-value")
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.variable);
        for elem in &mut self.elements {
            if let PathElement::Expr(e) = elem {
                optimize_child(e);
                if let Some(literal) = e.as_literal_value() {
                    *elem = PathElement::Literal(literal.clone());
                }
            }
        }
        None
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
    fn plus_assign_adds_into_the_terminal_element_of_a_deep_path() {
        let mut c = ctx();
        let inner = dict(vec![("count", Value::Int(1))]);
        let root = dict(vec![("a", inner)]);
        let path = DPathLValue::new(lit(root.clone()), vec![PathElement::Literal(Value::string("a")), PathElement::Literal(Value::string("count"))]).unwrap();

        let result = path.plus_assign(&mut c, Value::Int(41)).unwrap();
        assert!(matches!(result, Value::Int(42)));
        let inner_now = root.get_subscript_str("a").unwrap().unwrap();
        assert!(matches!(inner_now.get_subscript_str("count").unwrap(), Some(Value::Int(42))));
    }

    #[test]
    fn plus_assign_merges_dicts_at_the_terminal_element() {
        let mut c = ctx();
        let inner = dict(vec![("d", dict(vec![("x", Value::Int(1))]))]);
        let root = dict(vec![("a", inner)]);
        let path = DPathLValue::new(lit(root.clone()), vec![PathElement::Literal(Value::string("a")), PathElement::Literal(Value::string("d"))]).unwrap();

        let addend = dict(vec![("y", Value::Int(2))]);
        path.plus_assign(&mut c, addend).unwrap();

        let inner_now = root.get_subscript_str("a").unwrap().unwrap();
        let d_now = inner_now.get_subscript_str("d").unwrap().unwrap();
        assert!(matches!(d_now.get_subscript_str("x").unwrap(), Some(Value::Int(1))));
        assert!(matches!(d_now.get_subscript_str("y").unwrap(), Some(Value::Int(2))));
    }

    #[test]
    fn plus_assign_on_a_missing_terminal_element_is_a_lookup_error() {
        let mut c = ctx();
        let root = dict(vec![("a", dict(vec![]))]);
        let path = DPathLValue::new(lit(root), vec![PathElement::Literal(Value::string("a")), PathElement::Literal(Value::string("missing"))]).unwrap();

        let err = path.plus_assign(&mut c, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lookup);
    }
}
