//! Path construction: pen tracking and SVG path data
//!
//! A [`PathRenderer`] walks the items of one path, resolving coordinates
//! against the pen and emitting [`Primitive`]s. Output-space points are
//! pixels with y pointing down.

use std::fmt;

use enum_dispatch::enum_dispatch;
use glam::{DVec2, dvec2};

use crate::ast::{ArcSpec, Coordinate, Node, Options, Path, PathItem, Target};
use crate::errors::PathError;
use crate::eval::{EvalContext, Evaluator, ScopeId};
use crate::log::{trace, warn};
use crate::loops::{bind_iteration, iterations};
use crate::types::Canvas;

use super::coords::{Anchored, CoordinateResolver, NamedCoordinates};
use super::style::{OptionMap, OptionProcessor, StyleTable};

/// Two decimals, with `-0.00` folded into `0.00`.
pub fn fmt_coord(value: f64) -> String {
    let text = format!("{value:.2}");
    if text == "-0.00" { "0.00".to_string() } else { text }
}

fn push_point(out: &mut String, p: DVec2) {
    out.push_str(&fmt_coord(p.x));
    out.push(' ');
    out.push_str(&fmt_coord(p.y));
}

/// One SVG path command
#[enum_dispatch]
pub trait PathCommand {
    fn write_to(&self, out: &mut String);

    /// Where the SVG cursor ends up, if the command moves it.
    fn end_point(&self) -> Option<DVec2>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveTo(pub DVec2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTo(pub DVec2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadTo {
    pub control: DVec2,
    pub to: DVec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicTo {
    pub first: DVec2,
    pub second: DVec2,
    pub to: DVec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcTo {
    pub radii: DVec2,
    pub large: bool,
    pub sweep: bool,
    pub to: DVec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePath;

impl PathCommand for MoveTo {
    fn write_to(&self, out: &mut String) {
        out.push_str("M ");
        push_point(out, self.0);
    }

    fn end_point(&self) -> Option<DVec2> {
        Some(self.0)
    }
}

impl PathCommand for LineTo {
    fn write_to(&self, out: &mut String) {
        out.push_str("L ");
        push_point(out, self.0);
    }

    fn end_point(&self) -> Option<DVec2> {
        Some(self.0)
    }
}

impl PathCommand for QuadTo {
    fn write_to(&self, out: &mut String) {
        out.push_str("Q ");
        push_point(out, self.control);
        out.push(' ');
        push_point(out, self.to);
    }

    fn end_point(&self) -> Option<DVec2> {
        Some(self.to)
    }
}

impl PathCommand for CubicTo {
    fn write_to(&self, out: &mut String) {
        out.push_str("C ");
        push_point(out, self.first);
        out.push(' ');
        push_point(out, self.second);
        out.push(' ');
        push_point(out, self.to);
    }

    fn end_point(&self) -> Option<DVec2> {
        Some(self.to)
    }
}

impl PathCommand for ArcTo {
    fn write_to(&self, out: &mut String) {
        out.push_str("A ");
        push_point(out, self.radii);
        out.push_str(if self.large { " 0 1 " } else { " 0 0 " });
        out.push_str(if self.sweep { "1 " } else { "0 " });
        push_point(out, self.to);
    }

    fn end_point(&self) -> Option<DVec2> {
        Some(self.to)
    }
}

impl PathCommand for ClosePath {
    fn write_to(&self, out: &mut String) {
        out.push('Z');
    }

    fn end_point(&self) -> Option<DVec2> {
        None
    }
}

#[enum_dispatch(PathCommand)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    MoveTo,
    LineTo,
    QuadTo,
    CubicTo,
    ArcTo,
    ClosePath,
}

/// Ordered primitives of one `d` attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData {
    primitives: Vec<Primitive>,
}

impl PathData {
    pub fn push(&mut self, primitive: impl Into<Primitive>) {
        self.primitives.push(primitive.into());
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter()
    }

    /// Whether anything beyond bare moves was drawn.
    pub fn has_segments(&self) -> bool {
        self.primitives
            .iter()
            .any(|p| !matches!(p, Primitive::MoveTo(_)))
    }
}

impl fmt::Display for PathData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for (i, primitive) in self.primitives.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            primitive.write_to(&mut out);
        }
        f.write_str(&out)
    }
}

/// A node attached to a path, positioned but not yet laid out
#[derive(Debug, Clone)]
pub struct PendingNode {
    /// Text and name have loop variables substituted
    pub node: Node,
    /// Output pixels
    pub at: DVec2,
    /// The node's own options, already evaluated
    pub options: OptionMap,
}

/// The result of walking one path
#[derive(Debug, Default)]
pub struct TracedPath {
    pub data: PathData,
    pub nodes: Vec<PendingNode>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Pen {
    /// The logical current point
    current: Option<DVec2>,
    /// Where relative coordinates are measured from
    base: Option<DVec2>,
    /// Start of the current subpath, for `cycle`
    start: Option<DVec2>,
    /// Where the SVG cursor actually is
    cursor: Option<DVec2>,
    /// Current point before the last segment, for `midway`
    previous: Option<DVec2>,
}

/// Walks path items and emits path data.
pub struct PathRenderer<'a> {
    canvas: &'a Canvas,
    ctx: &'a mut EvalContext,
    registry: &'a mut NamedCoordinates,
    styles: &'a StyleTable,
    /// Options of the enclosing command, consulted for `step`
    command_options: Option<&'a Options>,
    scope: ScopeId,
    pen: Pen,
    traced: TracedPath,
}

impl<'a> PathRenderer<'a> {
    pub fn new(
        canvas: &'a Canvas,
        ctx: &'a mut EvalContext,
        registry: &'a mut NamedCoordinates,
        styles: &'a StyleTable,
        scope: ScopeId,
    ) -> Self {
        Self {
            canvas,
            ctx,
            registry,
            styles,
            command_options: None,
            scope,
            pen: Pen::default(),
            traced: TracedPath::default(),
        }
    }

    pub fn with_command_options(mut self, options: &'a Options) -> Self {
        self.command_options = Some(options);
        self
    }

    pub fn trace(mut self, path: &Path) -> Result<TracedPath, PathError> {
        for item in &path.items {
            self.item(item)?;
        }
        trace!(primitives = self.traced.data.len(), "traced path");
        Ok(self.traced)
    }

    fn resolver(&self) -> CoordinateResolver<'_> {
        CoordinateResolver::new(
            self.canvas,
            &*self.registry,
            Evaluator::new(&*self.ctx, self.scope),
        )
    }

    fn resolve(&self, coord: &Coordinate) -> Result<DVec2, PathError> {
        self.resolver().resolve(coord, self.pen.base)
    }

    fn item(&mut self, item: &PathItem) -> Result<(), PathError> {
        match item {
            PathItem::MoveTo(coord) => {
                let p = self.resolve(coord)?;
                self.emit(MoveTo(p));
                self.pen.start = Some(p);
                self.advance(p, coord.updates_base());
            }
            PathItem::LineTo(Target::Point(coord)) => {
                let p = self.resolve(coord)?;
                self.line_to(p);
                self.advance(p, coord.updates_base());
            }
            PathItem::LineTo(Target::Cycle) => self.close(),
            PathItem::HorizontalVertical(target) => self.corner_to(target, true)?,
            PathItem::VerticalHorizontal(target) => self.corner_to(target, false)?,
            PathItem::CurveTo { controls, to } => self.curve_to(controls, to)?,
            PathItem::Arc(spec) => self.arc(spec),
            PathItem::Circle { options, radius } => {
                let r = match radius {
                    Some(text) => self.resolver().eval_length(text),
                    None => self.option_length(options, "radius").unwrap_or(0.0),
                };
                self.ellipse(DVec2::splat(r));
            }
            PathItem::Ellipse { options, radii } => {
                let radii = match radii {
                    Some((x, y)) => {
                        let r = self.resolver();
                        dvec2(r.eval_length(x), r.eval_length(y))
                    }
                    None => {
                        let shared = self.option_length(options, "radius");
                        dvec2(
                            self.option_length(options, "x radius").or(shared).unwrap_or(0.0),
                            self.option_length(options, "y radius").or(shared).unwrap_or(0.0),
                        )
                    }
                };
                self.ellipse(radii);
            }
            PathItem::Rectangle(coord) => {
                let corner = self.resolve(coord)?;
                self.rectangle(corner);
                self.pen.previous = self.pen.current;
                self.pen.current = Some(corner);
                if coord.updates_base() {
                    self.pen.base = Some(corner);
                }
            }
            PathItem::Grid { options, corner } => {
                let corner_px = self.resolve(corner)?;
                self.grid(options, corner_px);
                self.pen.previous = self.pen.current;
                self.pen.current = Some(corner_px);
                if corner.updates_base() {
                    self.pen.base = Some(corner_px);
                }
            }
            PathItem::Node(node) => self.inline_node(node)?,
            PathItem::Coordinate(name) => {
                let name = Evaluator::new(&*self.ctx, self.scope).substitute(name);
                let at = self.current_or_origin();
                self.registry.store(name, Anchored::point(at));
            }
            PathItem::Foreach { header, items } => {
                let tuples = iterations(header, &Evaluator::new(&*self.ctx, self.scope))?;
                for (index, values) in tuples.iter().enumerate() {
                    let scope = bind_iteration(self.ctx, self.scope, header, index, values)?;
                    let outer = std::mem::replace(&mut self.scope, scope);
                    let result = items.iter().try_for_each(|item| self.item(item));
                    self.scope = outer;
                    self.ctx.leave(scope);
                    result?;
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, primitive: impl Into<Primitive>) {
        let primitive = primitive.into();
        if let Some(end) = primitive.end_point() {
            self.pen.cursor = Some(end);
        }
        // a move straight after a move replaces it
        if matches!(primitive, Primitive::MoveTo(_))
            && matches!(self.traced.data.primitives.last(), Some(Primitive::MoveTo(_)))
        {
            self.traced.data.primitives.pop();
        }
        self.traced.data.push(primitive);
    }

    fn advance(&mut self, p: DVec2, updates_base: bool) {
        self.pen.previous = self.pen.current.or(Some(p));
        self.pen.current = Some(p);
        if updates_base {
            self.pen.base = Some(p);
        }
    }

    fn current_or_origin(&self) -> DVec2 {
        self.pen.current.unwrap_or(self.canvas.origin)
    }

    /// Re-issue a move when the SVG cursor has drifted from the pen.
    /// Returns false when there is no current point to draw from.
    fn sync_cursor(&mut self) -> bool {
        let Some(current) = self.pen.current else {
            return false;
        };
        if self.pen.cursor != Some(current) {
            self.emit(MoveTo(current));
            self.pen.start = Some(current);
        }
        true
    }

    fn line_to(&mut self, p: DVec2) {
        if self.sync_cursor() {
            self.emit(LineTo(p));
        } else {
            self.emit(MoveTo(p));
            self.pen.start = Some(p);
        }
    }

    fn close(&mut self) {
        let Some(start) = self.pen.start else {
            return;
        };
        if self.sync_cursor() {
            self.emit(LineTo(start));
        }
        self.emit(ClosePath);
        self.pen.cursor = Some(start);
        self.advance(start, true);
    }

    /// The point a connector heads for. `cycle` means the subpath start.
    fn target(&self, target: &Target) -> Result<(DVec2, bool), PathError> {
        match target {
            Target::Point(coord) => Ok((self.resolve(coord)?, coord.updates_base())),
            Target::Cycle => Ok((self.pen.start.unwrap_or_else(|| self.current_or_origin()), true)),
        }
    }

    /// `-|` when `horizontal_first`, otherwise `|-`
    fn corner_to(&mut self, target: &Target, horizontal_first: bool) -> Result<(), PathError> {
        let (p, updates_base) = self.target(target)?;
        let from = self.current_or_origin();
        let corner = if horizontal_first {
            dvec2(p.x, from.y)
        } else {
            dvec2(from.x, p.y)
        };
        self.line_to(corner);
        self.emit(LineTo(p));
        if matches!(target, Target::Cycle) {
            self.emit(ClosePath);
        }
        self.advance(p, updates_base);
        Ok(())
    }

    fn curve_to(&mut self, controls: &[Coordinate], to: &Target) -> Result<(), PathError> {
        let (end, updates_base) = self.target(to)?;
        let resolver = self.resolver();
        // `+` on the first control is relative to the start, on the second to the end
        let first = match controls.first() {
            Some(c) => Some(resolver.resolve(c, self.pen.current)?),
            None => None,
        };
        let second = match controls.get(1) {
            Some(c) => Some(resolver.resolve(c, Some(end))?),
            None => None,
        };

        if !self.sync_cursor() {
            self.emit(MoveTo(end));
            self.pen.start = Some(end);
            self.advance(end, updates_base);
            return Ok(());
        }
        match (first, second) {
            (Some(first), Some(second)) => self.emit(CubicTo { first, second, to: end }),
            (Some(control), None) => self.emit(QuadTo { control, to: end }),
            _ => self.emit(LineTo(end)),
        }
        if matches!(to, Target::Cycle) {
            self.emit(ClosePath);
        }
        self.advance(end, updates_base);
        Ok(())
    }

    fn option_value(&self, options: &Options, key: &str) -> Option<f64> {
        options.value(key).map(|text| self.resolver().eval_value(text))
    }

    /// A length option in centimetres
    fn option_length(&self, options: &Options, key: &str) -> Option<f64> {
        options.value(key).map(|text| self.resolver().eval_length(text))
    }

    /// Start angle, end angle and radii (cm) of an arc
    fn arc_geometry(&self, spec: &ArcSpec) -> (f64, f64, DVec2) {
        let resolver = self.resolver();
        if let Some((start, end, radius)) = &spec.angles {
            let s = resolver.eval_value(start);
            let e = resolver.eval_value(end);
            let radii = match radius.split_once(" and ") {
                Some((x, y)) => dvec2(resolver.eval_length(x), resolver.eval_length(y)),
                None => DVec2::splat(resolver.eval_length(radius)),
            };
            return (s, e, radii);
        }
        let options = &spec.options;
        let s = self.option_value(options, "start angle").unwrap_or(0.0);
        let e = match self.option_value(options, "end angle") {
            Some(e) => e,
            None => s + self.option_value(options, "delta angle").unwrap_or(0.0),
        };
        let shared = self.option_length(options, "radius").unwrap_or(0.0);
        let radii = dvec2(
            self.option_length(options, "x radius").unwrap_or(shared),
            self.option_length(options, "y radius").unwrap_or(shared),
        );
        (s, e, radii)
    }

    fn arc(&mut self, spec: &ArcSpec) {
        let (s, e, radii) = self.arc_geometry(spec);
        let radii = dvec2(self.canvas.px(radii.x), self.canvas.px(radii.y));
        let pen = self.current_or_origin();
        let on_ellipse = |degrees: f64| {
            let a = degrees.to_radians();
            dvec2(radii.x * a.cos(), -radii.y * a.sin())
        };
        let center = pen - on_ellipse(s);

        if !self.sync_cursor() {
            self.emit(MoveTo(pen));
            self.pen.start = Some(pen);
        }
        let span = e - s;
        let mut angle = s;
        if span.abs() >= 360.0 {
            let sign = span.signum();
            for _ in 0..2 {
                angle += sign * 180.0;
                self.emit(arc_segment(radii, 180.0 * sign, center + on_ellipse(angle)));
            }
        }
        let rest = span % 360.0;
        if rest != 0.0 {
            self.emit(arc_segment(radii, rest, center + on_ellipse(angle + rest)));
        }
        self.advance(center + on_ellipse(e), true);
    }

    /// Full ellipse around the pen. The pen itself does not move.
    fn ellipse(&mut self, radii_cm: DVec2) {
        let radii = dvec2(self.canvas.px(radii_cm.x), self.canvas.px(radii_cm.y));
        let center = self.current_or_origin();
        let left = center - dvec2(radii.x, 0.0);
        let right = center + dvec2(radii.x, 0.0);
        let half = |to| ArcTo {
            radii,
            large: true,
            sweep: false,
            to,
        };
        self.emit(MoveTo(left));
        self.emit(half(right));
        self.emit(half(left));
        if self.pen.current.is_none() {
            self.advance(center, true);
        }
    }

    fn rectangle(&mut self, corner: DVec2) {
        let start = self.current_or_origin();
        if self.pen.cursor != Some(start) {
            self.emit(MoveTo(start));
        }
        self.emit(LineTo(dvec2(corner.x, start.y)));
        self.emit(LineTo(corner));
        self.emit(LineTo(dvec2(start.x, corner.y)));
        self.emit(LineTo(start));
        self.emit(ClosePath);
        self.pen.cursor = Some(start);
        self.pen.start = Some(start);
    }

    /// Grid lines at multiples of the step, in user space.
    fn grid(&mut self, options: &Options, corner: DVec2) {
        let lookup = |key: &str| {
            self.option_length(options, key)
                .or_else(|| self.command_options.and_then(|o| self.option_length(o, key)))
        };
        let step = lookup("step").unwrap_or(1.0);
        let xstep = lookup("xstep").unwrap_or(step);
        let ystep = lookup("ystep").unwrap_or(step);
        if xstep <= 0.0 || ystep <= 0.0 {
            warn!(xstep, ystep, "grid step must be positive; skipping grid");
            return;
        }
        let a = self.canvas.to_user(self.current_or_origin());
        let b = self.canvas.to_user(corner);
        let (min, max) = (a.min(b), a.max(b));

        const EPS: f64 = 1e-9;
        let first = (min.x / xstep - EPS).ceil() as i64;
        let last = (max.x / xstep + EPS).floor() as i64;
        for k in first..=last {
            let x = k as f64 * xstep;
            self.emit(MoveTo(self.canvas.to_output(dvec2(x, min.y))));
            self.emit(LineTo(self.canvas.to_output(dvec2(x, max.y))));
        }
        let first = (min.y / ystep - EPS).ceil() as i64;
        let last = (max.y / ystep + EPS).floor() as i64;
        for k in first..=last {
            let y = k as f64 * ystep;
            self.emit(MoveTo(self.canvas.to_output(dvec2(min.x, y))));
            self.emit(LineTo(self.canvas.to_output(dvec2(max.x, y))));
        }
    }

    fn inline_node(&mut self, node: &Node) -> Result<(), PathError> {
        let eval = Evaluator::new(&*self.ctx, self.scope);
        let options = OptionProcessor::new(self.styles, eval).process(&node.options);

        let at = match &node.position {
            Some(coord) => self.resolve(coord)?,
            None => {
                let current = self.current_or_origin();
                let previous = self.pen.previous.unwrap_or(current);
                previous.lerp(current, segment_fraction(&options))
            }
        };

        let mut placed = node.clone();
        placed.text = eval.substitute(&node.text);
        placed.name = node.name.as_deref().map(|n| eval.substitute(n));
        if let Some(name) = &placed.name {
            self.registry.store(name.clone(), Anchored::point(at));
        }
        self.traced.nodes.push(PendingNode {
            node: placed,
            at,
            options,
        });
        Ok(())
    }
}

/// Where along the last segment an inline node sits
fn segment_fraction(options: &OptionMap) -> f64 {
    if let Some(pos) = options.get("pos").and_then(|v| v.as_number()) {
        return pos;
    }
    let keyword = |key: &str| options.contains(key);
    if keyword("midway") {
        0.5
    } else if keyword("near start") {
        0.25
    } else if keyword("near end") {
        0.75
    } else if keyword("at start") {
        0.0
    } else {
        1.0
    }
}

/// One arc command covering `span` degrees (|span| <= 360)
fn arc_segment(radii: DVec2, span: f64, to: DVec2) -> ArcTo {
    ArcTo {
        radii,
        large: span.abs() > 180.0,
        sweep: span < 0.0,
        to,
    }
}
