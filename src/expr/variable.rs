//! A reference to a named variable, message-tied or floating.
//!
//! Grounded on `expr-variable.c`: a read first consults the scope, falling
//! back to pulling the raw field off the message (and caching the
//! unmarshalled result back into the scope) for message-tied names; a write
//! registers the slot if missing and stores through it; `unset` on a
//! message-tied variable that has never been read into scope still has to
//! record a deferred "whiteout" so sync later clears it from the message.

use crate::error::{ErrorKind, FilterxError};
use crate::eval::EvalContext;
use crate::expr::Expr;
use crate::message::{VariableHandle, VariableKind};
use crate::value::{FxResult, Value};

#[derive(Debug, Clone)]
pub struct VariableRef {
    pub handle: VariableHandle,
    pub name: String,
    /// A handle computed purely from derived message metadata (e.g. a
    /// read-only macro like a timestamp field) rather than a stored field;
    /// such variables reject assignment/unset outright.
    pub is_macro: bool,
}

impl VariableRef {
    pub fn new(handle: VariableHandle, name: String) -> Self {
        VariableRef { handle, name, is_macro: false }
    }

    fn pull_from_message(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        let Some(field) = ctx.message.get_value_if_set(self.handle) else {
            return Err(FilterxError::new(ErrorKind::Lookup, "No such name-value pair in the log message")
                .with_info(self.name.clone()));
        };
        crate::json::value_from_raw_field(field)
    }

    pub fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        if let Some(var) = ctx.scope.lookup_variable(self.handle) {
            return match var.value() {
                Some(v) => Ok(v.clone()),
                None => Err(FilterxError::new(ErrorKind::Lookup, "Variable is unset").with_info(self.name.clone())),
            };
        }
        if !self.handle.is_floating() {
            let value = self.pull_from_message(ctx)?;
            ctx.scope.register_variable(self.handle, Some(value.clone()));
            return Ok(value);
        }
        Err(FilterxError::new(ErrorKind::Lookup, "No such variable").with_info(self.name.clone()))
    }

    pub fn assign(&self, ctx: &mut EvalContext, new_value: Value) -> FxResult<()> {
        if self.is_macro {
            return Err(FilterxError::new(ErrorKind::Readonly, "Macro based variable cannot be changed")
                .with_info(self.name.clone()));
        }
        if ctx.scope.lookup_variable(self.handle).is_none() {
            ctx.scope.register_variable(self.handle, None);
        }
        let var = ctx.scope.lookup_variable_mut(self.handle).expect("just registered");
        var.set_value(Some(new_value), true);
        Ok(())
    }

    pub fn is_set(&self, ctx: &mut EvalContext) -> FxResult<bool> {
        if let Some(var) = ctx.scope.lookup_variable(self.handle) {
            return Ok(var.value().is_some());
        }
        Ok(!self.handle.is_floating() && ctx.message.is_value_set(self.handle))
    }

    pub fn unset(&self, ctx: &mut EvalContext) -> FxResult<()> {
        if self.is_macro {
            return Err(FilterxError::new(ErrorKind::Readonly, "Macro based variable cannot be changed")
                .with_info(self.name.clone()));
        }
        if let Some(var) = ctx.scope.lookup_variable_mut(self.handle) {
            var.unset();
            return Ok(());
        }
        if !self.handle.is_floating() && ctx.message.is_value_set(self.handle) {
            ctx.scope.register_variable(self.handle, None);
            if let Some(var) = ctx.scope.lookup_variable_mut(self.handle) {
                var.unassign();
                var.set_value(None, true);
            }
        }
        Ok(())
    }

    /// Caches a freshly-unmarshalled typed value back into the scope slot
    /// without marking it assigned, the `_update_repr` hook a typed read
    /// uses so re-reading the same message field twice doesn't re-parse it.
    pub fn update_repr(&self, ctx: &mut EvalContext, typed: Value) {
        if let Some(var) = ctx.scope.lookup_variable_mut(self.handle) {
            var.set_value(Some(typed), false);
        }
    }

    /// Promotes a floating variable reference to "declared" (the `let x`
    /// form), exempting it from generation-based invalidation.
    pub fn declare(&mut self, names: &mut crate::message::HandleTable) {
        debug_assert_eq!(names.kind_of(self.handle), VariableKind::Floating);
        names.declare(self.handle);
    }
}

impl Expr for VariableRef {
    fn eval(&self, ctx: &mut EvalContext) -> FxResult<Value> {
        VariableRef::eval(self, ctx)
    }
}
