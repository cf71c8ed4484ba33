//! The evaluation context: the bundle of state threaded through every
//! expression's `eval`, namely the active message, the variable scope, the
//! bounded error stack, and the control-flow modifier `break`/`done`/`drop`
//! set.
//!
//! The context is an explicit value passed around by callers rather than a
//! thread-local the way the source runtime keeps it, since this runtime has
//! no equivalent of multiple worker threads sharing one call stack; a single
//! evaluation simply owns its [`EvalContext`] for its duration.

use std::rc::Rc;

use tracing::debug;

use crate::error::FilterxError;
use crate::function::FunctionRegistry;
use crate::message::{HandleTable, Message};
use crate::scope::Scope;
use crate::value::Value;

/// Bound on the number of frames the error stack holds before further
/// pushes are refused with a single "reached maximum error stack size"
/// diagnostic, rather than growing unboundedly across a pathological chain
/// of nested failures.
pub const ERROR_STACK_DEPTH: usize = 8;

/// A bounded LIFO stack of recorded failures for a single `exec` call.
///
/// Once [`ERROR_STACK_DEPTH`] frames are recorded, additional pushes are
/// dropped and replaced by a single synthetic overflow entry, so a runaway
/// chain of nested expression failures can't grow this without bound.
#[derive(Debug, Default)]
pub struct ErrorStack {
    frames: Vec<FilterxError>,
    overflowed: bool,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FilterxError) {
        if self.frames.len() >= ERROR_STACK_DEPTH {
            self.overflowed = true;
            return;
        }
        let idx = self.frames.len();
        debug!(err_idx = format!("[{idx}/{ERROR_STACK_DEPTH}]"), message = %error.format(), "FILTERX ERROR");
        self.frames.push(error);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.overflowed = false;
    }

    pub fn last(&self) -> Option<&FilterxError> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[FilterxError] {
        &self.frames
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn overflow_message(&self) -> &'static str {
        "FilterX error stack reached maximum error stack size"
    }
}

/// The outcome of a `break`/`done`/`drop` control-flow statement, propagated
/// up through compound blocks until something consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlModifier {
    #[default]
    Unset,
    Break,
    Done,
    Drop,
}

/// The final disposition of a top-level `exec` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    Success,
    Drop,
    Failure,
}

impl EvalOutcome {
    /// Matches `filterx_format_eval_result`; note `Done` has no
    /// representation here, the same way the source format function's
    /// switch never covers it -- `Done` is observed purely through
    /// [`ControlModifier`] and handled by whatever drives the pipeline.
    pub fn describe(self) -> &'static str {
        match self {
            EvalOutcome::Success => "matched",
            EvalOutcome::Drop => "explicitly dropped",
            EvalOutcome::Failure => "unmatched",
        }
    }
}

/// One collected diagnostic entry, gathered across a run when failure-info
/// collection has been turned on (see [`EvalContext::enable_failure_info`]).
#[derive(Debug, Clone)]
pub struct FailureInfoEntry {
    pub message: String,
    pub falsy: bool,
}

pub struct EvalContext {
    pub message: Message,
    pub scope: Scope,
    pub names: HandleTable,
    pub error_stack: ErrorStack,
    pub control_modifier: ControlModifier,
    pub functions: Rc<FunctionRegistry>,
    failure_info: Option<Vec<FailureInfoEntry>>,
    failure_info_collect_falsy: bool,
}

impl EvalContext {
    /// Starts a fresh root evaluation context bound to `message`, with the
    /// builtin function registry available for any function-call node.
    pub fn begin_context(message: Message, names: HandleTable) -> Self {
        Self::begin_context_with_functions(message, names, Rc::new(FunctionRegistry::builtin()))
    }

    /// As [`Self::begin_context`], but with a caller-supplied registry --
    /// useful for tests that register their own functions alongside the
    /// builtins.
    pub fn begin_context_with_functions(message: Message, names: HandleTable, functions: Rc<FunctionRegistry>) -> Self {
        EvalContext {
            message,
            scope: Scope::new(),
            names,
            error_stack: ErrorStack::new(),
            control_modifier: ControlModifier::Unset,
            functions,
            failure_info: None,
            failure_info_collect_falsy: false,
        }
    }

    /// Ends the context, syncing the scope back to the message. Returns the
    /// message so the caller can inspect the result.
    pub fn end_context(mut self) -> Message {
        self.scope.sync(&mut self.message, &self.names);
        self.message
    }

    pub fn push_error(&mut self, error: FilterxError) {
        self.error_stack.push(error);
    }

    pub fn clear_errors(&mut self) {
        self.error_stack.clear();
    }

    pub fn last_error(&self) -> Option<&FilterxError> {
        self.error_stack.last()
    }

    pub fn enable_failure_info(&mut self, collect_falsy: bool) {
        self.failure_info.get_or_insert_with(|| Vec::with_capacity(16));
        self.failure_info_collect_falsy = collect_falsy;
    }

    pub fn failure_info(&self) -> Option<&[FailureInfoEntry]> {
        self.failure_info.as_deref()
    }

    fn fill_failure_info(&mut self) {
        let Some(list) = self.failure_info.as_mut() else {
            return;
        };
        match self.error_stack.last() {
            Some(err) if err.falsy && !self.failure_info_collect_falsy => {}
            Some(err) => list.push(FailureInfoEntry {
                message: err.format(),
                falsy: err.falsy,
            }),
            None if self.failure_info_collect_falsy => list.push(FailureInfoEntry {
                message: "Falsy expression".to_string(),
                falsy: true,
            }),
            None => {}
        }
    }

    /// Runs one top-level expression to completion: evaluates it, maps the
    /// result (or failure) to an [`EvalOutcome`], unconditionally marks the
    /// scope dirty (even on success, matching the source runtime), and
    /// clears the error stack before returning.
    pub fn exec(&mut self, expr: &dyn crate::expr::Expr) -> EvalOutcome {
        self.control_modifier = ControlModifier::Unset;
        let result = expr.eval(self);
        let outcome = match result {
            Err(_) => {
                self.fill_failure_info();
                EvalOutcome::Failure
            }
            Ok(value) => {
                if self.control_modifier == ControlModifier::Drop {
                    EvalOutcome::Drop
                } else if value.truthy() {
                    EvalOutcome::Success
                } else {
                    self.fill_failure_info();
                    EvalOutcome::Failure
                }
            }
        };
        self.clear_errors();
        self.scope.set_dirty();
        outcome
    }
}
