//! AST types for TikZ pictures
//!
//! Numeric components are kept as source text. They are evaluated lazily,
//! against whatever loop or scope bindings are live when the renderer
//! reaches them.

/// A complete picture
#[derive(Debug, Clone, Default)]
pub struct Picture {
    /// Options from `\begin{tikzpicture}[...]`
    pub options: Options,
    pub statements: Vec<Statement>,
}

/// A top-level or nested statement
#[derive(Debug, Clone)]
pub enum Statement {
    /// `\draw`, `\fill`, `\filldraw`, `\clip`, `\path`
    Draw(DrawStatement),
    /// `\node[...] (name) at (pos) {text};`
    Node(Node),
    /// `\coordinate (name) at (pos);`
    Coordinate(CoordinateDefinition),
    /// `\begin{scope}[...] ... \end{scope}`
    Scope(Scope),
    /// `\foreach \x in {...} body`
    Foreach(ForeachLoop),
    /// `\pgfdeclarelayer{name}`
    LayerDeclaration(String),
    /// `\pgfsetlayers{a,main,b}`
    LayerOrder(Vec<String>),
    /// `\begin{pgfonlayer}{name} ... \end{pgfonlayer}`
    LayerBlock(LayerBlock),
    /// `name/.style={...}` inside `\tikzset`
    StyleDefinition(StyleDefinition),
    /// `\pgfmathsetmacro{\x}{expr}`
    Variable(VariableDefinition),
}

/// Drawing command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Draw,
    Fill,
    FillDraw,
    Clip,
    /// `\path`: paints only when `draw`/`fill` options ask for it
    Path,
}

#[derive(Debug, Clone)]
pub struct DrawStatement {
    pub command: Command,
    pub options: Options,
    pub path: Path,
}

/// Ordered path operations
#[derive(Debug, Clone, Default)]
pub struct Path {
    pub items: Vec<PathItem>,
}

/// One path operation
#[derive(Debug, Clone)]
pub enum PathItem {
    /// A bare coordinate: starts a new subpath
    MoveTo(Coordinate),
    /// `--` and `to`
    LineTo(Target),
    /// `-|`: horizontal, then vertical
    HorizontalVertical(Target),
    /// `|-`: vertical, then horizontal
    VerticalHorizontal(Target),
    /// `.. controls a (and b) ..`
    CurveTo { controls: Vec<Coordinate>, to: Target },
    Arc(ArcSpec),
    /// `circle (r)` or `circle[radius=r]`
    Circle { options: Options, radius: Option<String> },
    /// `ellipse (a and b)`
    Ellipse {
        options: Options,
        radii: Option<(String, String)>,
    },
    /// `rectangle (corner)`
    Rectangle(Coordinate),
    /// `grid[step=s] (corner)`
    Grid { options: Options, corner: Coordinate },
    /// `node[...] {text}` placed at the current point
    Node(Node),
    /// `coordinate (name)` at the current point
    Coordinate(String),
    /// `foreach \i in {...} { path items }`
    Foreach {
        header: ForeachHeader,
        items: Vec<PathItem>,
    },
}

/// Destination of a connector
#[derive(Debug, Clone)]
pub enum Target {
    Point(Coordinate),
    /// `cycle`: back to the subpath start, then close
    Cycle,
}

/// `arc (s:e:r)` or `arc[start angle=.., end angle=.., radius=..]`
#[derive(Debug, Clone)]
pub struct ArcSpec {
    pub options: Options,
    /// start angle, end angle, radius
    pub angles: Option<(String, String, String)>,
}

/// A position in the picture
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinate {
    /// `(x, y)` where each component is an expression, possibly with units
    Cartesian { x: String, y: String },
    /// `(angle:radius)`
    Polar { angle: String, radius: String },
    /// `(name)` or `(name.anchor)`
    Named { name: String, anchor: Option<String> },
    /// `+(...)` or `++(...)`
    Relative {
        delta: Box<Coordinate>,
        /// `++` moves the base point for later relative coordinates
        persistent: bool,
    },
}

impl Coordinate {
    /// Whether resolving this coordinate moves the relative base point.
    pub fn updates_base(&self) -> bool {
        !matches!(
            self,
            Coordinate::Relative {
                persistent: false,
                ..
            }
        )
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Coordinate::Cartesian { x, y } => write!(f, "({x},{y})"),
            Coordinate::Polar { angle, radius } => write!(f, "({angle}:{radius})"),
            Coordinate::Named {
                name,
                anchor: Some(anchor),
            } => write!(f, "({name}.{anchor})"),
            Coordinate::Named { name, anchor: None } => write!(f, "({name})"),
            Coordinate::Relative { delta, persistent } => {
                write!(f, "{}{delta}", if *persistent { "++" } else { "+" })
            }
        }
    }
}

/// A text node
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    pub position: Option<Coordinate>,
    pub options: Options,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CoordinateDefinition {
    pub name: String,
    pub position: Coordinate,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub options: Options,
    pub body: Vec<Statement>,
}

/// Loop variables, iterable and clauses shared by statement and path loops
#[derive(Debug, Clone, Default)]
pub struct ForeachHeader {
    /// Variable names without the backslash
    pub variables: Vec<String>,
    /// Raw list items, including `...` markers
    pub items: Vec<String>,
    pub evaluate: Vec<EvaluateClause>,
    pub count: Option<CountClause>,
}

/// `evaluate=\i as \j using expr`
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateClause {
    pub source: String,
    pub target: String,
    pub expression: String,
}

/// `count=\n from start`
#[derive(Debug, Clone, PartialEq)]
pub struct CountClause {
    pub variable: String,
    pub start: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ForeachLoop {
    pub header: ForeachHeader,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct LayerBlock {
    pub name: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct StyleDefinition {
    pub name: String,
    pub options: Options,
}

#[derive(Debug, Clone)]
pub struct VariableDefinition {
    pub name: String,
    pub expression: String,
    /// `\pgfmathtruncatemacro`
    pub truncate: bool,
}

/// Raw `[key=value, flag]` list, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(pub Vec<RawOption>);

impl Options {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawOption> {
        self.0.iter()
    }

    /// The value of the last occurrence of `key`, if it has one.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|o| o.key == key)
            .and_then(|o| o.value.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawOption {
    pub key: String,
    pub value: Option<String>,
}

impl RawOption {
    pub fn flag(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// `\name`, stored without the backslash
    Variable(String),
    /// `pi`, `e`
    Constant(f64),
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Call(String, Vec<Expr>),
    /// `2cm`, `\r pt`: value converted to centimetres
    WithUnit(Box<Expr>, crate::types::Unit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Expr {
    /// Whether any part of the expression carries an explicit unit.
    pub fn has_unit(&self) -> bool {
        match self {
            Expr::WithUnit(..) => true,
            Expr::Neg(e) => e.has_unit(),
            Expr::Binary(l, _, r) => l.has_unit() || r.has_unit(),
            Expr::Call(_, args) => args.iter().any(Expr::has_unit),
            Expr::Number(_) | Expr::Variable(_) | Expr::Constant(_) => false,
        }
    }
}
