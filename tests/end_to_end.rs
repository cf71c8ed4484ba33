//! End-to-end evaluation scenarios, each expression tree built directly
//! (there is no parser in this crate's scope -- see `SPEC_FULL.md` §1).

use filterx::error::ErrorKind;
use filterx::eval::{ControlModifier, EvalContext, ERROR_STACK_DEPTH};
use filterx::expr::arith::{Arithmetic, ArithOp};
use filterx::expr::assign::Assign;
use filterx::expr::coalesce::NullCoalesce;
use filterx::expr::compound::Compound;
use filterx::expr::ctrl::Break;
use filterx::expr::dpath::{DPathLValue, PathElement};
use filterx::expr::literal::Literal;
use filterx::expr::switch::{Switch, SwitchBodyItem};
use filterx::expr::variable::VariableRef;
use filterx::expr::{Expr, LValue};
use filterx::message::{HandleTable, Message};
use filterx::value::Value;

fn fresh_ctx() -> EvalContext {
    EvalContext::begin_context(Message::new(), HandleTable::new())
}

fn floating_var(ctx: &mut EvalContext, name: &str) -> VariableRef {
    let handle = ctx.names.intern(name);
    VariableRef::new(handle, name.to_string())
}

fn lit(v: Value) -> Box<dyn Expr> {
    Box::new(Literal::new(v))
}

#[test]
fn cow_stores_are_independent_of_later_mutation_of_the_source() {
    let mut ctx = fresh_ctx();
    let a = floating_var(&mut ctx, "a");
    let b = floating_var(&mut ctx, "b");

    // a = [1]
    Assign { lhs: LValue::Variable(a.clone()), rhs: lit(Value::list(vec![Value::Int(1)])) }
        .eval(&mut ctx)
        .unwrap();
    // b = a
    Assign { lhs: LValue::Variable(b.clone()), rhs: Box::new(a.clone()) }.eval(&mut ctx).unwrap();

    // mutate b in place: b[1] = 2 (append)
    let b_value = b.eval(&mut ctx).unwrap();
    b_value.set_subscript_index(1, Value::Int(2)).unwrap();

    let a_value = a.eval(&mut ctx).unwrap();
    assert_eq!(a_value.len().unwrap(), 1, "b = a must fork for store, not alias a's container");
    assert_eq!(b_value.len().unwrap(), 2);
}

#[test]
fn arithmetic_coercion_and_nan_short_circuit() {
    let mut ctx = fresh_ctx();

    let mixed = Arithmetic { op: ArithOp::Mul, lhs: lit(Value::Int(3)), rhs: lit(Value::Double(2.0)) }
        .eval(&mut ctx)
        .unwrap();
    assert!(matches!(mixed, Value::Double(d) if (d - 6.0).abs() < f64::EPSILON));

    let nan_poisoned = Arithmetic { op: ArithOp::Sub, lhs: lit(Value::Double(f64::NAN)), rhs: lit(Value::Int(1)) }
        .eval(&mut ctx)
        .unwrap();
    assert!(matches!(nan_poisoned, Value::Null));

    // NaN is still truthy -- a distinct rule from the arithmetic null-out above.
    assert!(Value::Double(f64::NAN).truthy());
}

#[test]
fn null_coalesce_recovers_from_a_failed_or_null_left_side() {
    let mut ctx = fresh_ctx();
    let missing = floating_var(&mut ctx, "missing");

    let recovered = NullCoalesce { lhs: Box::new(missing), rhs: lit(Value::Int(42)) }.eval(&mut ctx).unwrap();
    assert!(matches!(recovered, Value::Int(42)));
    assert!(ctx.error_stack.frames().is_empty(), "null-coalesce must clear the error it suppressed");

    let recovered_from_null = NullCoalesce { lhs: lit(Value::Null), rhs: lit(Value::Int(7)) }.eval(&mut ctx).unwrap();
    assert!(matches!(recovered_from_null, Value::Int(7)));
}

#[test]
fn error_stack_is_bounded_and_records_a_single_overflow_marker() {
    let mut ctx = fresh_ctx();
    for i in 0..ERROR_STACK_DEPTH + 5 {
        ctx.push_error(filterx::error::FilterxError::new(ErrorKind::Evaluation, "synthetic").with_info(i.to_string()));
    }
    assert_eq!(ctx.error_stack.frames().len(), ERROR_STACK_DEPTH);
    assert!(ctx.error_stack.overflowed());
}

#[test]
fn switch_falls_through_to_default_and_stops_at_break() {
    let mut ctx = fresh_ctx();
    let out = floating_var(&mut ctx, "out");

    let switch = Switch::build(
        lit(Value::Int(99)),
        vec![
            SwitchBodyItem::Case(lit(Value::Int(1))),
            SwitchBodyItem::Stmt(Box::new(Assign { lhs: LValue::Variable(out.clone()), rhs: lit(Value::string("one")) })),
            SwitchBodyItem::Stmt(Box::new(Break)),
            SwitchBodyItem::Default,
            SwitchBodyItem::Stmt(Box::new(Assign { lhs: LValue::Variable(out.clone()), rhs: lit(Value::string("default")) })),
            SwitchBodyItem::Stmt(Box::new(Break)),
        ],
    );
    switch.eval(&mut ctx).unwrap();

    let result = out.eval(&mut ctx).unwrap();
    assert!(matches!(result, Value::Str(s) if s.as_ref() == "default"));
    assert_eq!(ctx.control_modifier, ControlModifier::Unset, "break must clear the modifier once consumed");
}

#[test]
fn deep_path_assignment_creates_missing_intermediate_dicts() {
    let mut ctx = fresh_ctx();
    let root = floating_var(&mut ctx, "root");
    Assign { lhs: LValue::Variable(root.clone()), rhs: lit(Value::empty_dict()) }.eval(&mut ctx).unwrap();

    let path = DPathLValue::new(
        Box::new(root.clone()),
        vec![PathElement::Literal(Value::string("a")), PathElement::Literal(Value::string("b"))],
    )
    .unwrap();
    path.assign(&mut ctx, Value::Int(5)).unwrap();

    let root_value = root.eval(&mut ctx).unwrap();
    let a = root_value.get_subscript_str("a").unwrap().expect("intermediate dict must be created");
    assert!(matches!(a, Value::Dict(_)));
    let b = a.get_subscript_str("b").unwrap().expect("terminal element must be written");
    assert!(matches!(b, Value::Int(5)));
}

#[test]
fn compound_short_circuits_on_a_falsy_non_assignment_step() {
    let mut ctx = fresh_ctx();
    let touched = floating_var(&mut ctx, "touched");

    let compound = Compound::new(
        vec![
            lit(Value::Bool(false)),
            Box::new(Assign { lhs: LValue::Variable(touched.clone()), rhs: lit(Value::Bool(true)) }),
        ],
        false,
    );
    assert!(compound.eval(&mut ctx).is_err());
    assert!(touched.is_set(&mut ctx).unwrap() == false, "a step after a falsy bail must never run");
}
