//! A sequence of statements evaluated in order, short-circuiting on a falsy
//! or failed step, and observing `break`/`done`/`drop` control modifiers.
//!
//! Grounded on `expr-compound.c`. A step failing (its own `eval` returning
//! `Err`) always aborts the whole compound with that error. A step
//! succeeding but evaluating falsy also aborts, *unless* the step is marked
//! `ignore_falsy_result` (assignments are), in which case a "bailing out due
//! to a falsy expr" error is still pushed but is tagged `falsy` so it's not
//! treated as a hard failure by `isset`-style recovery logic upstream.

use tracing::trace;

use crate::error::{ErrorKind, FilterxError};
use crate::eval::{ControlModifier, EvalContext};
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

#[derive(Debug)]
pub struct Compound {
    pub exprs: Vec<Box<dyn Expr>>,
    /// Whether the compound evaluates to the last statement's value
    /// (`true`), or unconditionally to `true` (`false`, used by top-level
    /// filter blocks where only the control-flow outcome matters).
    pub return_value_of_last_expr: bool,
}

impl Compound {
    pub fn new(exprs: Vec<Box<dyn Expr>>, return_value_of_last_expr: bool) -> Self {
        Compound { exprs, return_value_of_last_expr }
    }

    /// Evaluates starting at `start_index`, the entry point `switch` uses to
    /// jump straight into the matched case's statements and fall through.
    pub fn eval_from(&self, ctx: &mut EvalContext, start_index: usize) -> FxResult<Value> {
        let mut result = Value::Bool(true);
        let mut any = false;
        for expr in &self.exprs[start_index..] {
            any = true;
            result = self.eval_step(ctx, expr.as_ref())?;
            if ctx.control_modifier != ControlModifier::Unset {
                if ctx.control_modifier == ControlModifier::Break {
                    ctx.control_modifier = ControlModifier::Unset;
                }
                return Ok(Value::Bool(true));
            }
        }
        if !any || !self.return_value_of_last_expr {
            return Ok(Value::Bool(true));
        }
        Ok(result)
    }

    fn eval_step(&self, ctx: &mut EvalContext, expr: &dyn Expr) -> FxResult<Value> {
        let result = expr.eval(ctx)?;
        let success = expr.ignore_falsy_result() || result.truthy();
        trace!(truthy = result.truthy(), "FILTERX ESTEP");
        if !success {
            ctx.push_error(FilterxError::falsy(ErrorKind::Falsy, "bailing out due to a falsy expr"));
            return Err(FilterxError::falsy(ErrorKind::Falsy, "bailing out due to a falsy expr"));
        }
        Ok(result)
    }
}

impl Expr for Compound {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        self.eval_from(ctx, 0)
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        for expr in &mut self.exprs {
            optimize_child(expr);
        }
        None
    }
}
