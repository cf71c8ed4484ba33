//! Arithmetic (`- * / %`, unary `-`) and comparison (`== != < <= > >=`)
//! operators. `+` lives on [`Value::add`] instead, since it is also how
//! string/bytes/list concatenation and (via `+=`) dict merge are expressed,
//! not a dedicated node kind.
//!
//! Grounded on `expr-arithmetic-operators.c`: subtraction, multiplication,
//! division and unary minus all extract a "generic number" from each
//! operand (int or double) and short-circuit to `null` if *either* operand
//! is a double holding `NaN` -- this is a distinct, narrower rule than
//! truthiness (a `NaN` value is still truthy, see [`Value::truthy`]; it is
//! only arithmetic that treats it as a null-producing poison value). Integer
//! operands stay integer through these three ops; mixing with a double
//! promotes the result to double. Modulo diverges further: both operands
//! must be integers (not merely numeric) or evaluation fails outright, with
//! no float fallback.
//!
//! The constructor for division carries the literal name `"subs"` in the
//! source instead of a distinct division tag -- a copy-paste artifact in the
//! original, preserved here as the `expr_tag` used on a division failure
//! rather than corrected to something clearer.

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr};
use crate::value::{values_equal, FxResult, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug)]
pub struct Arithmetic {
    pub op: ArithOp,
    pub lhs: Box<dyn Expr>,
    pub rhs: Box<dyn Expr>,
}

fn is_nan(v: &Value) -> bool {
    matches!(v, Value::Double(d) if d.is_nan())
}

fn as_f64(v: &Value, side: &'static str) -> FxResult<f64> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Double(d) => Ok(*d),
        _ => Err(FilterxError::new(ErrorKind::Type, "Operand must be a double or integer")
            .with_info(format!("{side} hand side is a {}", v.type_name()))),
    }
}

fn as_int(v: &Value, side: &'static str) -> FxResult<i64> {
    match v {
        Value::Int(i) => Ok(*i),
        _ => Err(FilterxError::new(ErrorKind::Type, "Operand must be an integer")
            .with_info(format!("{side} hand side is a {}", v.type_name()))),
    }
}

impl Expr for Arithmetic {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let lhs = self
            .lhs
            .eval(ctx)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate arithmetic operator")
                .with_info("Failed to evaluate left hand side"))?;
        let rhs = self
            .rhs
            .eval(ctx)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate arithmetic operator")
                .with_info("Failed to evaluate right hand side"))?;

        if self.op == ArithOp::Mod {
            let a = as_int(&lhs, "Left")?;
            let b = as_int(&rhs, "Right")?;
            if b == 0 {
                return Err(FilterxError::new(ErrorKind::Range, "Modulo by zero").with_expr_tag("mod"));
            }
            return Ok(Value::Int(a.wrapping_rem(b)));
        }

        if is_nan(&lhs) || is_nan(&rhs) {
            return Ok(Value::Null);
        }

        let tag = match self.op {
            ArithOp::Sub => "subs",
            ArithOp::Mul => "mult",
            ArithOp::Div => "subs",
            ArithOp::Mod => unreachable!(),
        };

        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => match self.op {
                ArithOp::Sub => Ok(Value::Int(a.wrapping_sub(*b))),
                ArithOp::Mul => Ok(Value::Int(a.wrapping_mul(*b))),
                ArithOp::Div => {
                    if *b == 0 {
                        return Err(FilterxError::new(ErrorKind::Range, "Division by zero").with_expr_tag(tag));
                    }
                    Ok(Value::Int(a.wrapping_div(*b)))
                }
                ArithOp::Mod => unreachable!(),
            },
            _ => {
                let a = as_f64(&lhs, "Left").map_err(|e| e.with_expr_tag(tag))?;
                let b = as_f64(&rhs, "Right").map_err(|e| e.with_expr_tag(tag))?;
                let result = match self.op {
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => unreachable!(),
                };
                Ok(Value::Double(result))
            }
        }
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.lhs);
        optimize_child(&mut self.rhs);
        None
    }
}

#[cfg(test)]
mod arithmetic_tests {
    use super::*;
    use crate::eval::EvalContext;
    use crate::expr::literal::Literal;
    use crate::message::{HandleTable, Message};

    fn ctx() -> EvalContext {
        EvalContext::begin_context(Message::new(), HandleTable::new())
    }

    fn lit(v: Value) -> Box<dyn Expr> {
        Box::new(Literal::new(v))
    }

    fn arith(op: ArithOp, lhs: Value, rhs: Value) -> Arithmetic {
        Arithmetic { op, lhs: lit(lhs), rhs: lit(rhs) }
    }

    #[test]
    fn int_division_truncates_instead_of_promoting() {
        let mut c = ctx();
        let result = arith(ArithOp::Div, Value::Int(7), Value::Int(2)).eval(&mut c).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn mixed_division_promotes_to_double() {
        let mut c = ctx();
        let result = arith(ArithOp::Div, Value::Int(7), Value::Double(2.0)).eval(&mut c).unwrap();
        assert!(matches!(result, Value::Double(d) if (d - 3.5).abs() < f64::EPSILON));
    }

    #[test]
    fn division_by_zero_is_a_range_error_not_a_panic() {
        let mut c = ctx();
        let err = arith(ArithOp::Div, Value::Int(1), Value::Int(0)).eval(&mut c).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Range);
        assert_eq!(err.expr_tag, Some("subs"));
    }

    #[test]
    fn nan_operand_nulls_out_sub_mul_div_but_not_add() {
        let mut c = ctx();
        for op in [ArithOp::Sub, ArithOp::Mul, ArithOp::Div] {
            let result = arith(op, Value::Double(f64::NAN), Value::Int(1)).eval(&mut c).unwrap();
            assert!(matches!(result, Value::Null), "{op:?} with a NaN operand must null out");
        }
        let added = Value::Double(f64::NAN).add(&Value::Int(1)).unwrap();
        assert!(matches!(added, Value::Double(d) if d.is_nan()), "addition has no NaN short-circuit");
    }

    #[test]
    fn modulo_requires_strict_integers() {
        let mut c = ctx();
        assert!(arith(ArithOp::Mod, Value::Double(1.0), Value::Int(2)).eval(&mut c).is_err());
        let result = arith(ArithOp::Mod, Value::Int(7), Value::Int(3)).eval(&mut c).unwrap();
        assert!(matches!(result, Value::Int(1)));
    }

    #[test]
    fn unary_minus_preserves_int_vs_double_and_nulls_on_nan() {
        let mut c = ctx();
        assert!(matches!(UnaryMinus(lit(Value::Int(5))).eval(&mut c).unwrap(), Value::Int(-5)));
        assert!(matches!(UnaryMinus(lit(Value::Double(f64::NAN))).eval(&mut c).unwrap(), Value::Null));
    }
}

/// Unary `-`. Grounded on `_eval_uminus`: same NaN-to-null rule as the
/// binary operators above.
#[derive(Debug)]
pub struct UnaryMinus(pub Box<dyn Expr>);

impl Expr for UnaryMinus {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let v = self
            .0
            .eval(ctx)
            .map_err(|_| FilterxError::new(ErrorKind::Evaluation, "Failed to evaluate arithmetic operator")
                .with_info("Failed to evaluate operand"))?;
        if is_nan(&v) {
            return Ok(Value::Null);
        }
        match v {
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Double(d) => Ok(Value::Double(-d)),
            other => Err(FilterxError::new(ErrorKind::Type, "Operand must be a double or integer")
                .with_info(format!("got: {}", other.type_name()))),
        }
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.0);
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
pub struct Compare {
    pub op: CompareOp,
    pub lhs: Box<dyn Expr>,
    pub rhs: Box<dyn Expr>,
}

impl Expr for Compare {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let lhs = self.lhs.eval(ctx)?;
        let rhs = self.rhs.eval(ctx)?;
        if self.op == CompareOp::Eq {
            return Ok(Value::Bool(values_equal(&lhs, &rhs)));
        }
        if self.op == CompareOp::Ne {
            return Ok(Value::Bool(!values_equal(&lhs, &rhs)));
        }
        let a = as_f64(&lhs, "Left")?;
        let b = as_f64(&rhs, "Right")?;
        let result = match self.op {
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Eq | CompareOp::Ne => unreachable!(),
        };
        Ok(Value::Bool(result))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.lhs);
        optimize_child(&mut self.rhs);
        None
    }
}
