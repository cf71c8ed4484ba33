//! Function calls.
//!
//! "Simple" and generator functions (arguments pre-evaluated, looked up by
//! name in the registry) are a single [`FunctionCall`] node. The three
//! "generic" functions that need an lvalue rather than a value -- `isset()`,
//! `unset()`, `move()` -- get their own node kinds instead, since each wants
//! [`LValue`] access the registry's `fn(&[Value]) -> FxResult<Value>` shape
//! can't express. Grounded on `expr-function-call.c` and `expr-generic.c`.

use smallvec::SmallVec;

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr, LValue};
use crate::value::{FxResult, Value};

/// A single `(name?, expr)` argument slot, per §4.12's `function_args`
/// descriptor shape: a positional argument carries no name, a named one
/// does.
pub type Arg = (Option<String>, Box<dyn Expr>);

/// Most calls in practice pass a handful of arguments; `SmallVec` avoids a
/// heap allocation for the common case the same way the teacher's own
/// small fixed-size argument/tuple buffers do.
pub type ArgList = SmallVec<[Arg; 4]>;

#[derive(Debug)]
pub struct FunctionCall {
    pub name: String,
    pub args: ArgList,
}

impl Expr for FunctionCall {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let mut values = Vec::with_capacity(self.args.len());
        let mut seen_named = false;
        for (name, expr) in &self.args {
            if name.is_some() {
                seen_named = true;
            } else if seen_named {
                return Err(FilterxError::new(ErrorKind::Argument, "Positional argument after named argument")
                    .with_info(self.name.clone())
                    .with_expr_tag("call"));
            }
            values.push((name.clone(), expr.eval(ctx)?));
        }
        let registry = ctx.functions.clone();
        registry.call(&self.name, values).map_err(|e| e.with_expr_tag("call"))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        for (_, arg) in &mut self.args {
            optimize_child(arg);
        }
        None
    }
}

/// `isset(x)` -- true if `x` names a set variable or dict/list element,
/// without evaluating (and thus without erroring on) an unset one.
#[derive(Debug)]
pub struct IssetCall(pub LValue);

impl Expr for IssetCall {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        Ok(Value::Bool(self.0.is_set(ctx)?))
    }
}

/// `unset(x)` -- clears `x`, always succeeding even if it was already unset.
#[derive(Debug)]
pub struct UnsetCall(pub LValue);

impl Expr for UnsetCall {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        self.0.unset(ctx)?;
        Ok(Value::Bool(true))
    }

    fn ignore_falsy_result(&self) -> bool {
        true
    }
}

/// `move(src, dst)` -- moves a value from one dict key to another, failing
/// if `src` doesn't name a dict element (moving out of a plain variable or
/// a list makes no sense for this operation, which mirrors `filterx_generic_func_move`).
#[derive(Debug)]
pub struct MoveCall {
    pub src_base: Box<dyn Expr>,
    pub src_key: String,
    pub dst: LValue,
}

impl Expr for MoveCall {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let base = self.src_base.eval(ctx)?;
        let moved = base
            .move_key_str(&self.src_key)
            .map_err(|e| e.with_info(self.src_key.clone()))?
            .ok_or_else(|| FilterxError::new(ErrorKind::Lookup, "No such element to move").with_info(self.src_key.clone()))?;
        self.dst.assign(ctx, moved)?;
        Ok(Value::Bool(true))
    }

    fn ignore_falsy_result(&self) -> bool {
        true
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.src_base);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::literal::Literal;
    use crate::message::{HandleTable, Message};

    fn ctx() -> EvalContext {
        EvalContext::begin_context(Message::new(), HandleTable::new())
    }

    fn lit(v: Value) -> Box<dyn Expr> {
        Box::new(Literal::new(v))
    }

    #[test]
    fn named_argument_reaches_the_registry() {
        let mut c = ctx();
        let call = FunctionCall {
            name: "flatten".to_string(),
            args: ArgList::from_vec(vec![
                (None, lit(Value::empty_dict())),
                (Some("separator".to_string()), lit(Value::string("/"))),
            ]),
        };
        assert!(matches!(call.eval(&mut c).unwrap(), Value::Bool(true)));
    }

    #[test]
    fn positional_after_named_is_rejected() {
        let mut c = ctx();
        let call = FunctionCall {
            name: "flatten".to_string(),
            args: ArgList::from_vec(vec![
                (Some("separator".to_string()), lit(Value::string("/"))),
                (None, lit(Value::empty_dict())),
            ]),
        };
        let err = call.eval(&mut c).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Argument);
    }
}
