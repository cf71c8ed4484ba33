//! `switch (selector) { case a: ...; case b: ...; default: ... }`.
//!
//! Grounded on `expr-switch.c`: cases are flattened into one compound body
//! plus a table of `(case-value-expr, start-index-into-body)`; all cases
//! are checked (not just until the first match), so the *last* matching
//! case wins. Execution then jumps into the body at the winning target and
//! falls through subsequent statements exactly like a C `switch`, relying
//! on `break` to stop early.

use crate::eval::EvalContext;
use crate::expr::compound::Compound;
use crate::expr::{optimize_child, Expr};
use crate::value::{values_equal, FxResult, Value};

#[derive(Debug)]
pub struct SwitchCase {
    /// `None` marks the `default:` case.
    pub value: Option<Box<dyn Expr>>,
    pub target: usize,
}

#[derive(Debug)]
pub struct Switch {
    pub selector: Box<dyn Expr>,
    pub cases: Vec<SwitchCase>,
    pub default_target: Option<usize>,
    pub body: Compound,
}

impl Switch {
    /// Builds the flattened body and case table from a raw list of
    /// statements/case-markers, exactly as `_build_switch_table` does.
    pub fn build(selector: Box<dyn Expr>, raw_body: Vec<SwitchBodyItem>) -> Switch {
        let mut body_exprs: Vec<Box<dyn Expr>> = Vec::new();
        let mut cases = Vec::new();
        let mut default_target = None;
        for item in raw_body {
            match item {
                SwitchBodyItem::Case(value) => {
                    cases.push(SwitchCase { value: Some(value), target: body_exprs.len() });
                }
                SwitchBodyItem::Default => {
                    default_target = Some(body_exprs.len());
                }
                SwitchBodyItem::Stmt(expr) => body_exprs.push(expr),
            }
        }
        Switch { selector, cases, default_target, body: Compound::new(body_exprs, false) }
    }
}

pub enum SwitchBodyItem {
    Case(Box<dyn Expr>),
    Default,
    Stmt(Box<dyn Expr>),
}

impl Expr for Switch {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let selector = self.selector.eval(ctx)?;
        let mut target = None;
        for case in &self.cases {
            let case_value = case.value.as_ref().expect("non-default case").eval(ctx)?;
            if values_equal(&selector, &case_value) {
                target = Some(case.target);
            }
        }
        let target = target.or(self.default_target);
        match target {
            None => Ok(Value::Bool(true)),
            Some(t) => self.body.eval_from(ctx, t),
        }
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        optimize_child(&mut self.selector);
        self.body.optimize();
        for case in &mut self.cases {
            if let Some(value) = &mut case.value {
                optimize_child(value);
            }
        }
        None
    }
}
