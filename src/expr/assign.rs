//! `lhs = rhs`, `lhs ??= rhs`, `lhs += rhs`.
//!
//! Grounded on `expr-assign.c`/`expr-plus-assign.c`. Every assignment forks
//! the right-hand value for store (see [`Value::clone_for_store`]) before
//! handing it to the lvalue, so a later mutation of whatever the RHS
//! expression referred to can never retroactively change what was stored.
//! All three statement kinds are marked `ignore_falsy_result`: a successful
//! assignment of a falsy value (e.g. `x = 0`) must not abort the enclosing
//! compound block.

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr, LValue};
use crate::value::{FxResult, Value};

fn store(lvalue: &LValue, ctx: &mut EvalContext, value: Value) -> FxResult<Value> {
    let cloned = value.clone_for_store();
    lvalue.assign(ctx, cloned.clone())?;
    Ok(cloned)
}

#[derive(Debug)]
pub struct Assign {
    pub lhs: LValue,
    pub rhs: Box<dyn Expr>,
}

impl Expr for Assign {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let value = self.rhs.eval(ctx).map_err(|_| {
            FilterxError::new(ErrorKind::Evaluation, "Failed to assign value").with_info("Failed to evaluate right hand side")
        })?;
        store(&self.lhs, ctx, value)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to assign value").with_info("assign() method failed"))
    }

    fn ignore_falsy_result(&self) -> bool {
        true
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.rhs);
        None
    }
}

/// `lhs ??= rhs`: only assigns (and evaluates `rhs`) when `rhs` evaluates to
/// something other than `null`; a failed `rhs` evaluation suppresses the
/// error and yields `null` without touching `lhs`.
#[derive(Debug)]
pub struct NullVAssign {
    pub lhs: LValue,
    pub rhs: Box<dyn Expr>,
}

impl Expr for NullVAssign {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        match self.rhs.eval(ctx) {
            Err(_) => {
                ctx.clear_errors();
                Ok(Value::Null)
            }
            Ok(Value::Null) => Ok(Value::Null),
            Ok(value) => store(&self.lhs, ctx, value),
        }
    }

    fn ignore_falsy_result(&self) -> bool {
        true
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.rhs);
        None
    }
}

/// `lhs += rhs`: numeric/string/list `+`, or dict merge when both sides are
/// dicts.
#[derive(Debug)]
pub struct PlusAssign {
    pub lhs: LValue,
    pub rhs: Box<dyn Expr>,
}

impl Expr for PlusAssign {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let addend = self.rhs.eval(ctx)?.clone_for_store();
        self.lhs.plus_assign(ctx, addend)
    }

    fn ignore_falsy_result(&self) -> bool {
        true
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.rhs);
        None
    }
}
