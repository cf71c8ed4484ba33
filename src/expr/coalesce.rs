//! Null-coalesce `lhs ?? rhs`: evaluates `rhs` only when `lhs` failed or
//! evaluated to `null`, discarding (and clearing) any error `lhs` raised.
//! Grounded on `expr-null-coalesce.c`.

use tracing::debug;

use crate::eval::EvalContext;
use crate::expr::literal::Literal;
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

#[derive(Debug)]
pub struct NullCoalesce {
    pub lhs: Box<dyn Expr>,
    pub rhs: Box<dyn Expr>,
}

impl Expr for NullCoalesce {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        match self.lhs.eval(ctx) {
            Ok(v) if !matches!(v, Value::Null) => Ok(v),
            Ok(_null) => self.rhs.eval(ctx),
            Err(_) => {
                debug!("FILTERX null coalesce suppressing error");
                ctx.clear_errors();
                self.rhs.eval(ctx)
            }
        }
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.lhs);
        optimize_child(&mut self.rhs);
        match self.lhs.as_literal_value() {
            Some(Value::Null) => Some(std::mem::replace(&mut self.rhs, Box::new(Literal::new(Value::Null)))),
            Some(v) => Some(Box::new(Literal::new(v.clone()))),
            None => None,
        }
    }
}
