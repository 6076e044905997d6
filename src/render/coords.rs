//! Coordinate resolution and the named-coordinate registry

use std::collections::HashMap;

use glam::{DVec2, dvec2};

use crate::ast::Coordinate;
use crate::errors::PathError;
use crate::eval::Evaluator;
use crate::log::{trace, warn};
use crate::types::{Canvas, Unit};

/// A named position with the half extents of whatever it names.
///
/// Coordinates have zero extents. Nodes carry the size of their text box
/// so compass anchors land on its border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchored {
    /// Output pixels
    pub center: DVec2,
    /// Output pixels
    pub half: DVec2,
}

impl Anchored {
    pub fn point(center: DVec2) -> Self {
        Self {
            center,
            half: DVec2::ZERO,
        }
    }

    /// The position of `anchor`, or `None` if the anchor is unknown.
    pub fn anchor(&self, anchor: &str) -> Option<DVec2> {
        if let Some(unit) = compass_offset(anchor) {
            return Some(self.center + unit * self.half);
        }
        // numeric anchors are angles on the bounding ellipse
        let degrees: f64 = anchor.trim().parse().ok()?;
        let a = degrees.to_radians();
        Some(self.center + dvec2(self.half.x * a.cos(), -self.half.y * a.sin()))
    }
}

/// Unit offset of a compass anchor in output space (y down).
pub fn compass_offset(anchor: &str) -> Option<DVec2> {
    Some(match anchor.trim() {
        "center" => dvec2(0.0, 0.0),
        "north" => dvec2(0.0, -1.0),
        "south" => dvec2(0.0, 1.0),
        "east" => dvec2(1.0, 0.0),
        "west" => dvec2(-1.0, 0.0),
        "north east" => dvec2(1.0, -1.0),
        "north west" => dvec2(-1.0, -1.0),
        "south east" => dvec2(1.0, 1.0),
        "south west" => dvec2(-1.0, 1.0),
        _ => return None,
    })
}

/// Named coordinates and nodes defined so far in one conversion
#[derive(Debug, Default)]
pub struct NamedCoordinates {
    entries: HashMap<String, Anchored>,
}

impl NamedCoordinates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, name: impl Into<String>, position: Anchored) {
        let name = name.into();
        trace!(name = %name, x = position.center.x, y = position.center.y, "stored coordinate");
        self.entries.insert(name, position);
    }

    pub fn get(&self, name: &str) -> Option<&Anchored> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns AST coordinates into output pixels.
pub struct CoordinateResolver<'a> {
    canvas: &'a Canvas,
    registry: &'a NamedCoordinates,
    eval: Evaluator<'a>,
}

impl<'a> CoordinateResolver<'a> {
    pub fn new(canvas: &'a Canvas, registry: &'a NamedCoordinates, eval: Evaluator<'a>) -> Self {
        Self {
            canvas,
            registry,
            eval,
        }
    }

    /// Resolve `coord` to output pixels. `base` is the pen position that
    /// relative coordinates offset from.
    pub fn resolve(&self, coord: &Coordinate, base: Option<DVec2>) -> Result<DVec2, PathError> {
        match coord {
            Coordinate::Cartesian { .. } | Coordinate::Polar { .. } => {
                Ok(self.canvas.to_output(self.user_vector(coord)))
            }
            Coordinate::Named { name, anchor } => Ok(self.named(name, anchor.as_deref())),
            Coordinate::Relative { delta, .. } => {
                let base = base.ok_or_else(|| PathError::NoCurrentPosition {
                    coordinate: coord.to_string(),
                })?;
                let offset = match delta.as_ref() {
                    Coordinate::Named { name, anchor } => {
                        self.named(name, anchor.as_deref()) - self.canvas.origin
                    }
                    Coordinate::Relative { delta, .. } => self.canvas.delta(self.user_vector(delta)),
                    other => self.canvas.delta(self.user_vector(other)),
                };
                Ok(base + offset)
            }
        }
    }

    /// A Cartesian or polar coordinate in user space.
    fn user_vector(&self, coord: &Coordinate) -> DVec2 {
        match coord {
            Coordinate::Cartesian { x, y } => dvec2(self.eval_length(x), self.eval_length(y)),
            Coordinate::Polar { angle, radius } => {
                let a = self.eval_value(angle).to_radians();
                let r = self.eval_length(radius);
                dvec2(r * a.cos(), r * a.sin())
            }
            Coordinate::Named { .. } | Coordinate::Relative { .. } => DVec2::ZERO,
        }
    }

    fn named(&self, name: &str, anchor: Option<&str>) -> DVec2 {
        let name = self.eval.substitute(name);
        let anchor = anchor.map(|a| self.eval.substitute(a));

        if let Some(anchor) = &anchor {
            if let Some(exact) = self.registry.get(&format!("{name}.{anchor}")) {
                return exact.center;
            }
        }
        let Some(entry) = self.registry.get(&name) else {
            warn!(name = %name, "undefined coordinate; using the origin");
            return self.canvas.origin;
        };
        match anchor {
            None => entry.center,
            Some(anchor) => entry.anchor(&anchor).unwrap_or_else(|| {
                warn!(name = %name, anchor = %anchor, "unknown anchor; using the center");
                entry.center
            }),
        }
    }

    /// Evaluate a plain number, falling back to 0.
    pub fn eval_value(&self, text: &str) -> f64 {
        self.eval.eval_str(text).unwrap_or_else(|err| {
            warn!(expression = text, error = %err, "coordinate component defaults to 0");
            0.0
        })
    }

    /// Evaluate a length in centimetres, falling back to 0.
    pub fn eval_length(&self, text: &str) -> f64 {
        self.eval.eval_length(text, Unit::Cm).unwrap_or_else(|err| {
            warn!(expression = text, error = %err, "coordinate component defaults to 0");
            0.0
        })
    }

    pub fn evaluator(&self) -> Evaluator<'a> {
        self.eval
    }

    pub fn canvas(&self) -> &'a Canvas {
        self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalContext, Value};

    fn canvas() -> Canvas {
        Canvas::try_new(500, 500, 28.35).unwrap()
    }

    fn cart(x: &str, y: &str) -> Coordinate {
        Coordinate::Cartesian {
            x: x.into(),
            y: y.into(),
        }
    }

    fn named(name: &str, anchor: Option<&str>) -> Coordinate {
        Coordinate::Named {
            name: name.into(),
            anchor: anchor.map(Into::into),
        }
    }

    fn close(a: DVec2, b: DVec2) -> bool {
        (a - b).length() < 1e-6
    }

    #[test]
    fn cartesian_maps_through_the_canvas() {
        let (canvas, ctx, registry) = (canvas(), EvalContext::new(), NamedCoordinates::new());
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, ctx.root()));
        assert!(close(r.resolve(&cart("2", "2"), None).unwrap(), dvec2(306.7, 193.3)));
        assert!(close(r.resolve(&cart("0", "0"), None).unwrap(), dvec2(250.0, 250.0)));
        assert!(close(r.resolve(&cart("4", "0"), None).unwrap(), dvec2(363.4, 250.0)));
        assert!(close(r.resolve(&cart("10mm", "0"), None).unwrap(), dvec2(278.35, 250.0)));
    }

    #[test]
    fn polar_coordinates() {
        let (canvas, ctx, registry) = (canvas(), EvalContext::new(), NamedCoordinates::new());
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, ctx.root()));
        let coord = Coordinate::Polar {
            angle: "90".into(),
            radius: "2".into(),
        };
        assert!(close(r.resolve(&coord, None).unwrap(), dvec2(250.0, 193.3)));
    }

    #[test]
    fn named_lookup_and_fallback() {
        let (canvas, ctx) = (canvas(), EvalContext::new());
        let mut registry = NamedCoordinates::new();
        registry.store("A", Anchored::point(canvas.to_output(dvec2(1.0, 1.0))));
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, ctx.root()));
        let a = r.resolve(&named("A", None), None).unwrap();
        assert!(close(a, r.resolve(&cart("1", "1"), None).unwrap()));
        assert_eq!(r.resolve(&named("nowhere", None), None).unwrap(), dvec2(250.0, 250.0));
    }

    #[test]
    fn compass_and_angle_anchors() {
        let (canvas, ctx) = (canvas(), EvalContext::new());
        let mut registry = NamedCoordinates::new();
        registry.store(
            "box",
            Anchored {
                center: dvec2(100.0, 100.0),
                half: dvec2(20.0, 10.0),
            },
        );
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, ctx.root()));
        let at = |anchor: &str| r.resolve(&named("box", Some(anchor)), None).unwrap();
        assert_eq!(at("north"), dvec2(100.0, 90.0));
        assert_eq!(at("south west"), dvec2(80.0, 110.0));
        assert!(close(at("0"), dvec2(120.0, 100.0)));
        assert!(close(at("90"), dvec2(100.0, 90.0)));
        // unknown anchors fall back to the center
        assert_eq!(at("somewhere"), dvec2(100.0, 100.0));
    }

    #[test]
    fn names_substitute_loop_variables() {
        let canvas = canvas();
        let mut ctx = EvalContext::new();
        let root = ctx.root();
        ctx.set(root, "i", Value::Number(3.0));
        let mut registry = NamedCoordinates::new();
        registry.store("P3", Anchored::point(dvec2(1.0, 2.0)));
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, root));
        assert_eq!(r.resolve(&named("P\\i", None), None).unwrap(), dvec2(1.0, 2.0));
    }

    #[test]
    fn relative_needs_a_base() {
        let (canvas, ctx, registry) = (canvas(), EvalContext::new(), NamedCoordinates::new());
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, ctx.root()));
        let rel = Coordinate::Relative {
            delta: Box::new(cart("1", "0")),
            persistent: true,
        };
        assert!(close(
            r.resolve(&rel, Some(dvec2(250.0, 250.0))).unwrap(),
            dvec2(278.35, 250.0)
        ));
        assert!(matches!(
            r.resolve(&rel, None),
            Err(PathError::NoCurrentPosition { .. })
        ));
    }

    #[test]
    fn failing_components_default_to_zero() {
        let (canvas, ctx, registry) = (canvas(), EvalContext::new(), NamedCoordinates::new());
        let r = CoordinateResolver::new(&canvas, &registry, Evaluator::new(&ctx, ctx.root()));
        let p = r.resolve(&cart("\\missing", "1"), None).unwrap();
        assert!(close(p, dvec2(250.0, 221.65)));
    }
}
