//! The expression tree: every node kind a program compiles down to, sharing
//! one evaluation contract.
//!
//! The source runtime resolves `eval`/`optimize`/`init`/`deinit`/`free`
//! through a per-node virtual method table and a separate `walk_children`
//! callback taking a pre-order/post-order flag. Here that collapses to one
//! object-safe trait: `init`/`deinit`/`free` have no counterpart (there is
//! no config-time resource binding or manual memory management to
//! mirror), and child traversal is whatever each node's own `optimize`
//! needs rather than a generic walk, since nothing in this crate's surface
//! (there is no external pass that needs to visit arbitrary node kinds
//! uniformly) requires the visitor to be generic over node kind.

use std::fmt::Debug;

use crate::eval::EvalContext;
use crate::value::{FxResult, Value};

pub mod arith;
pub mod assign;
pub mod boolalg;
pub mod call;
pub mod coalesce;
pub mod compound;
pub mod conditional;
pub mod ctrl;
pub mod dpath;
pub mod literal;
pub mod subscript;
pub mod switch;
pub mod template;
pub mod variable;

/// Common contract every expression node answers to.
pub trait Expr: Debug {
    /// Evaluates this node, producing a value or a recorded failure.
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value>;

    /// Whether evaluation failing here should abort an enclosing compound
    /// block (the default) or be tolerated (used by statements explicitly
    /// marked to ignore a falsy/failed result, such as assignment).
    fn ignore_falsy_result(&self) -> bool {
        false
    }

    /// Constant-folds this node if possible, returning a literal
    /// replacement. Nodes that hold children are responsible for optimizing
    /// those children themselves before deciding whether they, in turn,
    /// fold to a constant.
    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        None
    }

    /// Non-`None` only for literal nodes; lets boolean-algebra and
    /// null-coalesce optimizations recognize constant operands without a
    /// downcast.
    fn as_literal_value(&self) -> Option<&Value> {
        None
    }

    fn is_literal(&self) -> bool {
        self.as_literal_value().is_some()
    }
}

/// Runs `optimize` on a boxed child, replacing it if a fold was produced.
pub fn optimize_child(child: &mut Box<dyn Expr>) {
    if let Some(replacement) = child.optimize() {
        *child = replacement;
    }
}

/// Assignment targets: the closed set of expression shapes that can appear
/// on the left of `=`/`+=`/`??=`, or be the operand of `unset()`/`isset()`.
///
/// Modeled as an enum rather than a second object-safe trait because the
/// set of lvalue-capable node kinds is small and closed (a plain variable,
/// or a deep attribute/subscript path rooted at one), and an enum lets
/// `assign`/`unset`/`is_set` be implemented without a downcast from
/// `&dyn Expr`.
#[derive(Debug)]
pub enum LValue {
    Variable(variable::VariableRef),
    DPath(dpath::DPathLValue),
    SetSubscript(subscript::SetSubscript),
}

impl LValue {
    pub fn assign(&self, ctx: &mut EvalContext, value: Value) -> FxResult<()> {
        match self {
            LValue::Variable(v) => v.assign(ctx, value),
            LValue::DPath(d) => d.assign(ctx, value),
            LValue::SetSubscript(s) => s.assign(ctx, value),
        }
    }

    pub fn unset(&self, ctx: &mut EvalContext) -> FxResult<()> {
        match self {
            LValue::Variable(v) => v.unset(ctx),
            LValue::DPath(_) => Err(crate::error::FilterxError::new(
                crate::error::ErrorKind::Type,
                "unset() of a deep path is not supported",
            )),
            LValue::SetSubscript(_) => Err(crate::error::FilterxError::new(
                crate::error::ErrorKind::Type,
                "unset() of a subscript target is not supported",
            )),
        }
    }

    pub fn is_set(&self, ctx: &mut EvalContext) -> FxResult<bool> {
        match self {
            LValue::Variable(v) => v.is_set(ctx),
            LValue::DPath(_) => Err(crate::error::FilterxError::new(
                crate::error::ErrorKind::Type,
                "isset() of a deep path is not supported",
            )),
            LValue::SetSubscript(_) => Err(crate::error::FilterxError::new(
                crate::error::ErrorKind::Type,
                "isset() of a subscript target is not supported",
            )),
        }
    }

    pub fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        match self {
            LValue::Variable(v) => v.eval(ctx),
            LValue::DPath(_) => unreachable!("dpath lvalues must never be evaluated as an r-value"),
            LValue::SetSubscript(_) => unreachable!("set-subscript lvalues must never be evaluated as an r-value"),
        }
    }

    /// `lhs += rhs`: dispatched per lvalue kind rather than a generic
    /// read-eval-then-combine, matching the source's dedicated
    /// `filterx_expr_plus_assign` virtual method.
    pub fn plus_assign(&self, ctx: &mut EvalContext, addend: Value) -> FxResult<Value> {
        match self {
            LValue::Variable(v) => {
                let current = v.eval(ctx)?;
                let combined = current.combine_for_plus_assign(&addend)?;
                v.assign(ctx, combined.clone())?;
                Ok(combined)
            }
            LValue::DPath(d) => d.plus_assign(ctx, addend),
            LValue::SetSubscript(s) => s.plus_assign(ctx, addend),
        }
    }
}
