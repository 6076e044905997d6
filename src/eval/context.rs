//! Variable scopes
//!
//! Scopes live in an arena and point at their parent by index. A scope is
//! entered for every `scope` block, loop iteration and layer block, and the
//! arena is truncated back when it ends, so lifetimes nest strictly.

use std::collections::HashMap;
use std::fmt;

use crate::errors::EvalError;

/// Handle to a scope in an [`EvalContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// A bound variable
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    /// Loop items that are not numbers, like `red` or `A`
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Render a number the way it reads back: `2`, `0.5`, `-1.25`.
pub fn format_number(n: f64) -> String {
    let text = format!("{n:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[derive(Debug, Default)]
struct Frame {
    parent: Option<ScopeId>,
    vars: HashMap<String, Value>,
}

/// Arena of nested variable scopes
#[derive(Debug)]
pub struct EvalContext {
    frames: Vec<Frame>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document-level scope
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Open a child scope of `parent`.
    pub fn enter(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(Frame {
            parent: Some(parent),
            vars: HashMap::new(),
        });
        ScopeId(self.frames.len() - 1)
    }

    /// Release `scope` and everything opened after it. The root is never released.
    pub fn leave(&mut self, scope: ScopeId) {
        if scope.0 > 0 {
            self.frames.truncate(scope.0);
        }
    }

    /// Bind `name` in `scope`, shadowing any outer binding.
    pub fn set(&mut self, scope: ScopeId, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.get_mut(scope.0) {
            frame.vars.insert(name.into(), value);
        }
    }

    /// Find `name` in `scope` or its ancestors.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.frames.get(id.0)?;
            if let Some(value) = frame.vars.get(name) {
                return Some(value);
            }
            current = frame.parent;
        }
        None
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Result<&Value, EvalError> {
        self.get(scope, name)
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Number of live scopes, the root included
    pub fn live_scopes(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_bindings() {
        let mut ctx = EvalContext::new();
        let root = ctx.root();
        ctx.set(root, "x", Value::Number(1.0));
        let child = ctx.enter(root);
        assert_eq!(ctx.lookup(child, "x").unwrap(), &Value::Number(1.0));
    }

    #[test]
    fn shadowing_does_not_leak_upward() {
        let mut ctx = EvalContext::new();
        let root = ctx.root();
        ctx.set(root, "x", Value::Number(1.0));
        let child = ctx.enter(root);
        ctx.set(child, "x", Value::Number(5.0));
        assert_eq!(ctx.get(child, "x"), Some(&Value::Number(5.0)));
        ctx.leave(child);
        assert_eq!(ctx.get(root, "x"), Some(&Value::Number(1.0)));
        assert_eq!(ctx.live_scopes(), 1);
    }

    #[test]
    fn siblings_are_independent() {
        let mut ctx = EvalContext::new();
        let root = ctx.root();
        let first = ctx.enter(root);
        ctx.set(first, "i", Value::Number(0.0));
        ctx.leave(first);
        let second = ctx.enter(root);
        assert!(matches!(
            ctx.lookup(second, "i"),
            Err(EvalError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn leaving_releases_descendants() {
        let mut ctx = EvalContext::new();
        let outer = ctx.enter(ctx.root());
        let inner = ctx.enter(outer);
        ctx.set(inner, "y", Value::Text("red".into()));
        ctx.leave(outer);
        assert_eq!(ctx.live_scopes(), 1);
        ctx.leave(ctx.root());
        assert_eq!(ctx.live_scopes(), 1);
    }

    #[test]
    fn numbers_format_compactly() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-1.25), "-1.25");
        assert_eq!(format_number(-0.0000001), "0");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
    }
}
