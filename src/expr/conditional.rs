use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

/// `if (cond) { then } else { otherwise }`, `else` defaulting to a no-op
/// success when absent. `then` is itself optional: a ternary written without
/// a true-branch (`cond ? : otherwise`) yields the condition's own value
/// when it's truthy, per `_eval_with_condition` in the source.
#[derive(Debug)]
pub struct Conditional {
    pub condition: Box<dyn Expr>,
    pub then_branch: Option<Box<dyn Expr>>,
    pub else_branch: Option<Box<dyn Expr>>,
}

impl Expr for Conditional {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let cond = self.condition.eval(ctx).map_err(|_| {
            FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate conditional expression")
        })?;
        if cond.truthy() {
            match &self.then_branch {
                Some(then_branch) => then_branch.eval(ctx),
                None => Ok(cond),
            }
        } else if let Some(else_branch) = &self.else_branch {
            else_branch.eval(ctx)
        } else {
            Ok(Value::Bool(true))
        }
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.condition);
        if let Some(then_branch) = &mut self.then_branch {
            optimize_child(then_branch);
        }
        if let Some(else_branch) = &mut self.else_branch {
            optimize_child(else_branch);
        }
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
    fn ternary_without_a_true_branch_yields_the_condition_value() {
        let mut c = ctx();
        let expr = Conditional {
            condition: lit(Value::Int(42)),
            then_branch: None,
            else_branch: Some(lit(Value::Int(0))),
        };
        assert!(matches!(expr.eval(&mut c).unwrap(), Value::Int(42)));
    }

    #[test]
    fn falsy_condition_with_no_then_branch_still_takes_the_else_branch() {
        let mut c = ctx();
        let expr = Conditional {
            condition: lit(Value::Bool(false)),
            then_branch: None,
            else_branch: Some(lit(Value::Int(7))),
        };
        assert!(matches!(expr.eval(&mut c).unwrap(), Value::Int(7)));
    }
}
