//! `not`, `and`, `or`, with short-circuit evaluation and constant folding
//! grounded on `expr-boolalg.c`.

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::literal::Literal;
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

#[derive(Debug)]
pub struct Not(pub Box<dyn Expr>);

impl Expr for Not {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let v = self
            .0
            .eval(ctx)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to negate expression"))?;
        Ok(Value::Bool(!v.truthy()))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.0);
        self.0
            .as_literal_value()
            .map(|v| Box::new(Literal::new(Value::Bool(!v.truthy()))) as Box<dyn Expr>)
    }
}

#[derive(Debug)]
pub struct And {
    pub lhs: Option<Box<dyn Expr>>,
    pub rhs: Box<dyn Expr>,
}

impl Expr for And {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        if let Some(lhs) = &self.lhs {
            let v = lhs
                .eval(ctx)
                .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate logical AND operation"))?;
            if !v.truthy() {
                return Ok(Value::Bool(false));
            }
        }
        let v = self
            .rhs
            .eval(ctx)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate logical AND operation"))?;
        Ok(Value::Bool(v.truthy()))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        if let Some(lhs) = &mut self.lhs {
            optimize_child(lhs);
        }
        optimize_child(&mut self.rhs);
        let Some(lhs) = &self.lhs else { return None };
        let Some(lhs_value) = lhs.as_literal_value() else { return None };
        if !lhs_value.truthy() {
            return Some(Box::new(Literal::new(Value::Bool(false))));
        }
        if let Some(rhs_value) = self.rhs.as_literal_value() {
            return Some(Box::new(Literal::new(Value::Bool(rhs_value.truthy()))));
        }
        self.lhs = None;
        None
    }
}

#[derive(Debug)]
pub struct Or {
    pub lhs: Option<Box<dyn Expr>>,
    pub rhs: Box<dyn Expr>,
}

impl Expr for Or {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        if let Some(lhs) = &self.lhs {
            let v = lhs
                .eval(ctx)
                .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate logical OR operation"))?;
            if v.truthy() {
                return Ok(Value::Bool(true));
            }
        }
        let v = self
            .rhs
            .eval(ctx)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate logical OR operation"))?;
        Ok(Value::Bool(v.truthy()))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        if let Some(lhs) = &mut self.lhs {
            optimize_child(lhs);
        }
        optimize_child(&mut self.rhs);
        let Some(lhs) = &self.lhs else { return None };
        let Some(lhs_value) = lhs.as_literal_value() else { return None };
        if lhs_value.truthy() {
            return Some(Box::new(Literal::new(Value::Bool(true))));
        }
        if let Some(rhs_value) = self.rhs.as_literal_value() {
            return Some(Box::new(Literal::new(Value::Bool(rhs_value.truthy()))));
        }
        self.lhs = None;
        None
    }
}
