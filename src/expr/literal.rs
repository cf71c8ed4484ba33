use crate::eval::EvalContext;
use crate::expr::Expr;
use crate::value::{FxResult, Value};

/// A constant value baked in at parse/optimize time.
#[derive(Debug, Clone)]
pub struct Literal(pub Value);

impl Literal {
    pub fn new(value: Value) -> Self {
        Literal(value)
    }
}

impl Expr for Literal {
    fn eval(&self, _ctx: &mut EvalContext) -> FxResult<Value> {
        Ok(self.0.clone())
    }

    fn as_literal_value(&self) -> Option<&Value> {
        Some(&self.0)
    }
}
