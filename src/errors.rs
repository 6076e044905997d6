//! Error types with rich diagnostics using miette
//!
//! Each pipeline stage has its own enum. Public entry points fold them into a
//! `miette::Report`.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::types::NumericError;

/// Source context for error reporting
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Name of the source (filename or "<input>")
    pub name: String,
    /// The full source text
    pub source: String,
}

impl SourceContext {
    /// Create a new source context
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create a NamedSource for miette
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.clone())
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

/// Errors that occur while parsing picture source
#[derive(Error, Diagnostic, Debug)]
pub enum ParseError {
    #[error("syntax error: {message}")]
    #[diagnostic(code(tikzsvg::parse::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },
}

// ============================================================================
// Macro Expansion Errors
// ============================================================================

/// Errors raised by the textual macro expander
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ExpandError {
    #[error("macro expansion too deep in \\{name} (max depth {max})")]
    #[diagnostic(
        code(tikzsvg::expand::too_deep),
        help("check for macros that invoke themselves or each other")
    )]
    ExpansionTooDeep { name: String, max: usize },

    #[error("\\{name} expects {expected} argument(s), found {found}")]
    #[diagnostic(code(tikzsvg::expand::missing_argument))]
    MissingArgument {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("unbalanced braces starting at byte {offset}")]
    #[diagnostic(code(tikzsvg::expand::unbalanced))]
    UnbalancedGroup { offset: usize },

    #[error("malformed \\{command} definition")]
    #[diagnostic(code(tikzsvg::expand::malformed_definition))]
    MalformedDefinition { command: String },
}

// ============================================================================
// Evaluation Errors
// ============================================================================

/// Errors that occur during expression evaluation
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot parse expression `{expression}`: {message}")]
    #[diagnostic(code(tikzsvg::eval::syntax))]
    Syntax { expression: String, message: String },

    #[error("undefined variable: \\{name}")]
    #[diagnostic(code(tikzsvg::eval::undefined_variable))]
    UndefinedVariable { name: String },

    #[error("unknown function: {name}")]
    #[diagnostic(code(tikzsvg::eval::unknown_function))]
    UnknownFunction { name: String },

    #[error("{name} takes {expected} argument(s), got {found}")]
    #[diagnostic(code(tikzsvg::eval::wrong_arity))]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("\\{name} holds `{value}`, which is not a number")]
    #[diagnostic(code(tikzsvg::eval::not_a_number))]
    NotANumber { name: String, value: String },

    #[error("`{expression}` does not evaluate to a finite number")]
    #[diagnostic(code(tikzsvg::eval::non_finite))]
    NonFinite { expression: String },
}

// ============================================================================
// Loop Errors
// ============================================================================

/// Errors raised while expanding `\foreach`
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum LoopError {
    #[error("loop item `{item}` has {found} part(s) but {expected} variable(s) are bound")]
    #[diagnostic(
        code("tikzsvg::loop::arity_mismatch"),
        help("every `/`-separated tuple must have one entry per loop variable")
    )]
    ArityMismatch {
        expected: usize,
        found: usize,
        item: String,
    },

    #[error("loop range `{range}` has a zero step")]
    #[diagnostic(code("tikzsvg::loop::zero_step"))]
    ZeroStep { range: String },

    #[error("`...` needs a start value and an end value")]
    #[diagnostic(code("tikzsvg::loop::malformed_range"))]
    MalformedRange,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

// ============================================================================
// Path Errors
// ============================================================================

/// Errors raised while resolving coordinates and building path data
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("relative coordinate {coordinate} has no current position to start from")]
    #[diagnostic(
        code(tikzsvg::path::no_current_position),
        help("start the path with an absolute coordinate")
    )]
    NoCurrentPosition { coordinate: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Loop(#[from] LoopError),
}

impl From<EvalError> for PathError {
    fn from(err: EvalError) -> Self {
        PathError::Loop(LoopError::Eval(err))
    }
}

// ============================================================================
// Render Errors
// ============================================================================

/// Errors that occur while setting up or finishing the output document
#[derive(Error, Diagnostic, Debug)]
pub enum RenderError {
    #[error("invalid canvas {field}: {source}")]
    #[diagnostic(code(tikzsvg::render::invalid_canvas))]
    InvalidCanvas {
        field: &'static str,
        #[source]
        source: NumericError,
    },
}
