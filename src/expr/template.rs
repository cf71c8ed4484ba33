//! String interpolation: a sequence of literal fragments and embedded
//! expressions, stringified (via [`Value::str_repr`]) and concatenated.
//! Grounded on `expr-template.c`.

use crate::eval::EvalContext;
use crate::expr::{optimize_child, Expr};
use crate::value::{FxResult, Value};

#[derive(Debug)]
pub enum TemplatePart {
    Literal(String),
    Expr(Box<dyn Expr>),
}

#[derive(Debug)]
pub struct Template(pub Vec<TemplatePart>);

impl Expr for Template {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let mut out = String::new();
        for part in &self.0 {
            match part {
                TemplatePart::Literal(s) => out.push_str(s),
                TemplatePart::Expr(e) => out.push_str(&e.eval(ctx)?.str_repr()),
            }
        }
        Ok(Value::string(out))
    }

    fn optimize(&mut self) -> Option<Box<dyn Expr>> {
        for part in &mut self.0 {
            if let TemplatePart::Expr(e) = part {
                optimize_child(e);
            }
        }
        None
    }
}
