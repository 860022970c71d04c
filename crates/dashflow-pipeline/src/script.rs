//! Script engine seam
//!
//! Script items and script merges go through [`ScriptEngine`] so a host can
//! plug in a different evaluator. The default, [`ExpressionEngine`], runs the
//! restricted expression language from [`crate::expr`].

use crate::error::ExprError;
use crate::expr::{Expression, Scope};
use std::fmt::Debug;

/// Evaluates script source against a scope
pub trait ScriptEngine: Send + Sync + Debug {
    /// Run `source` and return its value
    ///
    /// # Errors
    /// Returns [`ExprError`] if the script cannot be parsed or evaluated
    fn run(&self, source: &str, scope: &Scope) -> Result<serde_json::Value, ExprError>;
}

/// Default engine backed by the restricted expression language
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEngine;

impl ScriptEngine for ExpressionEngine {
    fn run(&self, source: &str, scope: &Scope) -> Result<serde_json::Value, ExprError> {
        Expression::parse(source)?.evaluate(scope)
    }
}
