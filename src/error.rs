use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Coarse classification of a runtime failure, used for diagnostics and by
/// callers that want to branch on failure shape without string matching.
///
/// --- evaluation failures ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ErrorKind {
    /// A sub-expression could not be evaluated at all (its own `eval` returned no value).
    Evaluation,
    /// An operation was applied to a value of the wrong type.
    Type,
    /// A name, key, attribute or index did not resolve to anything.
    Lookup,
    /// A write was attempted against a value or variable marked read-only.
    Readonly,
    /// A value was outside the domain an operation requires (division by zero, bad radix, ...).
    Range,
    /// A function or operator was called with the wrong number or shape of arguments.
    Argument,
    /// A compound statement step evaluated to a falsy value and the step was not marked
    /// `ignore_falsy_result`; this aborts the enclosing block without being a hard failure.
    Falsy,
}

/// A single recorded failure: what went wrong, where, and (optionally) the
/// object that was involved.
///
/// This mirrors the single current-error slot of the evaluator this runtime
/// is modeled on, but is pushed onto a bounded stack (see [`crate::eval::ErrorStack`])
/// instead of being clobbered by the next push.
#[derive(Debug, Clone)]
pub struct FilterxError {
    pub kind: ErrorKind,
    pub message: &'static str,
    /// Extra, situation-specific detail (e.g. "Failed to evaluate right hand side").
    pub info: Option<String>,
    /// The expression's human-readable type/name tag, for log correlation.
    pub expr_tag: Option<&'static str>,
    /// The object associated with the failure, if any (used to enrich `info`
    /// with the object's repr when `info` itself is absent).
    pub object: Option<Value>,
    /// Set when this error represents "a step evaluated falsy", as opposed to
    /// a genuine evaluation failure.
    pub falsy: bool,
}

impl FilterxError {
    pub fn new(kind: ErrorKind, message: &'static str) -> Self {
        FilterxError {
            kind,
            message,
            info: None,
            expr_tag: None,
            object: None,
            falsy: false,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn with_expr_tag(mut self, tag: &'static str) -> Self {
        self.expr_tag = Some(tag);
        self
    }

    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    pub fn falsy(kind: ErrorKind, message: &'static str) -> Self {
        let mut e = Self::new(kind, message);
        e.falsy = true;
        e
    }

    /// Renders `message[: info_or_repr]`, matching the wire format used in
    /// `FILTERX ERROR` trace lines and failure-info entries.
    pub fn format(&self) -> String {
        match &self.info {
            Some(info) => format!("{}: {}", self.message, info),
            None => match &self.object {
                Some(obj) => format!("{}: {}", self.message, obj.repr()),
                None => self.message.to_string(),
            },
        }
    }
}

impl fmt::Display for FilterxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

pub type FxResult<T> = Result<T, FilterxError>;
