//! Node text: cleanup, size estimation, placement and SVG output

use glam::{DVec2, dvec2};
use svg::Node as SvgNode;
use svg::node::element::{Ellipse, Rectangle, Text};

use crate::log::warn;
use crate::types::{Canvas, Unit};

use super::coords::{Anchored, compass_offset};
use super::path::fmt_coord;
use super::style::{OptionMap, Style, attr_number};

/// Padding between text and node border, in pixels
pub const INNER_SEP: f64 = 4.0;

/// Proportional advance widths for printable ASCII, in hundredths of an em-ish
/// unit. Scaled by [`CHAR_SCALE`] and the font size.
#[rustfmt::skip]
const ADVANCE: [u8; 95] = [
    45,  55,  62, 115,  90, 132, 125,  40,
    55,  55,  71, 115,  45,  48,  45,  50,
    91,  91,  91,  91,  91,  91,  91,  91,
    91,  91,  50,  50, 120, 120, 120,  78,
   142, 102, 105, 110, 115, 105,  98, 105,
   125,  58,  58, 107,  95, 145, 125, 115,
    95, 115, 107,  95,  97, 118, 102, 150,
   100,  93, 100,  58,  50,  58, 119,  72,
    72,  86,  92,  80,  92,  85,  52,  92,
    92,  47,  47,  88,  48, 135,  92,  86,
    92,  92,  69,  75,  58,  92,  80, 121,
    81,  80,  76,  91,  49,  91, 118,
];

const CHAR_SCALE: f64 = 0.6;

/// Estimated rendered width of `text` in pixels.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    let hundredths: u32 = text
        .chars()
        .map(|c| match c {
            ' '..='~' => u32::from(ADVANCE[c as usize - 0x20]),
            _ => 100,
        })
        .sum();
    f64::from(hundredths) * 0.01 * font_size * CHAR_SCALE
}

/// Control words that become a Unicode character
fn symbol(word: &str) -> Option<&'static str> {
    Some(match word {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "theta" => "θ",
        "lambda" => "λ",
        "mu" => "μ",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "phi" | "varphi" => "φ",
        "omega" => "ω",
        "Delta" => "Δ",
        "Sigma" => "Σ",
        "Omega" => "Ω",
        "cdot" => "·",
        "times" => "×",
        "pm" => "±",
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "neq" | "ne" => "≠",
        "infty" => "∞",
        "ldots" | "dots" | "cdots" => "…",
        "to" | "rightarrow" => "→",
        "leftarrow" => "←",
        "degree" | "circ" => "°",
        "quad" | "qquad" | "," | ";" => " ",
        _ => return None,
    })
}

/// Strip TeX markup down to displayable text.
///
/// Math shifts and braces disappear, `\\` becomes a space, escaped specials
/// become literal, and known symbols map to Unicode. Other control words are
/// dropped; when they take a brace argument the argument is kept.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' | '{' | '}' => {}
            '~' => out.push(' '),
            '\\' => match chars.peek().copied() {
                Some('\\') => {
                    chars.next();
                    out.push(' ');
                }
                Some(s @ ('%' | '&' | '#' | '_' | '{' | '}' | '$')) => {
                    chars.next();
                    out.push(s);
                }
                Some(s @ (',' | ';' | ' ')) => {
                    chars.next();
                    if let Some(sym) = symbol(&s.to_string()) {
                        out.push_str(sym);
                    }
                }
                Some(a) if a.is_ascii_alphabetic() => {
                    let mut word = String::new();
                    while let Some(&w) = chars.peek() {
                        if !w.is_ascii_alphabetic() {
                            break;
                        }
                        word.push(w);
                        chars.next();
                    }
                    match symbol(&word) {
                        Some(sym) => out.push_str(sym),
                        // a space after a control word only terminates it
                        None => {
                            while chars.peek() == Some(&' ') {
                                chars.next();
                            }
                        }
                    }
                }
                _ => {}
            },
            other => out.push(other),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Where and how large a node's border is
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBox {
    /// Output pixels
    pub center: DVec2,
    /// Output pixels
    pub half: DVec2,
    pub round: bool,
}

impl NodeBox {
    pub fn anchored(&self) -> Anchored {
        Anchored {
            center: self.center,
            half: self.half,
        }
    }
}

fn px(options: &OptionMap, key: &str, canvas: &Canvas) -> Option<f64> {
    options.get(key)?.to_px(Unit::Pt, canvas)
}

/// The anchor implied by placement keys, plus any extra distance they ask for.
fn placement(options: &OptionMap, canvas: &Canvas) -> (Option<String>, DVec2) {
    let mut anchor = None;
    let mut distance = DVec2::ZERO;
    for (key, value) in options.iter() {
        let (vertical, horizontal) = match key {
            "above" => (Some("south"), None),
            "below" => (Some("north"), None),
            "left" => (None, Some("east")),
            "right" => (None, Some("west")),
            "above left" => (Some("south"), Some("east")),
            "above right" => (Some("south"), Some("west")),
            "below left" => (Some("north"), Some("east")),
            "below right" => (Some("north"), Some("west")),
            "anchor" => {
                anchor = value.as_text();
                continue;
            }
            _ => continue,
        };
        anchor = Some(match (vertical, horizontal) {
            (Some(v), Some(h)) => format!("{v} {h}"),
            (Some(v), None) => v.to_string(),
            (None, Some(h)) => h.to_string(),
            (None, None) => continue,
        });
        if let Some(extra) = value.to_px(Unit::Pt, canvas) {
            let direction = compass_offset(anchor.as_deref().unwrap_or("center")).unwrap_or_default();
            distance = -direction * extra;
        }
    }
    (anchor, distance)
}

/// Size and place a node whose reference point is `at`.
pub fn layout(text: &str, options: &OptionMap, style: &Style, at: DVec2, canvas: &Canvas) -> NodeBox {
    let sep = px(options, "inner sep", canvas).unwrap_or(INNER_SEP);
    let mut half = dvec2(
        text_width(text, style.font_size) / 2.0 + sep,
        style.font_size / 2.0 + sep,
    );
    let minimum = px(options, "minimum size", canvas).unwrap_or(0.0);
    half.x = half.x.max(px(options, "minimum width", canvas).unwrap_or(minimum) / 2.0);
    half.y = half.y.max(px(options, "minimum height", canvas).unwrap_or(minimum) / 2.0);

    let round = options.contains("circle");
    if round {
        half = DVec2::splat(half.length().max(minimum / 2.0));
    }

    let (anchor, distance) = placement(options, canvas);
    let offset = match anchor.as_deref() {
        Some(name) => compass_offset(name).unwrap_or_else(|| {
            warn!(anchor = name, "unknown node anchor; centering");
            DVec2::ZERO
        }),
        None => DVec2::ZERO,
    };

    let shift = dvec2(
        px(options, "xshift", canvas).unwrap_or(0.0),
        -px(options, "yshift", canvas).unwrap_or(0.0),
    );

    NodeBox {
        center: at - offset * half + distance + shift,
        half,
        round,
    }
}

/// The border shape (if painted) followed by the text.
pub fn render(text: &str, node: &NodeBox, style: &Style) -> Vec<Box<dyn SvgNode>> {
    let mut out: Vec<Box<dyn SvgNode>> = Vec::new();

    if style.stroke.is_some() || style.fill.is_some() {
        let mut attrs = style.path_attributes();
        attrs.retain(|(name, _)| !name.starts_with("marker"));
        if node.round {
            let mut ellipse = Ellipse::new()
                .set("cx", fmt_coord(node.center.x))
                .set("cy", fmt_coord(node.center.y))
                .set("rx", fmt_coord(node.half.x))
                .set("ry", fmt_coord(node.half.y));
            for (name, value) in attrs {
                ellipse = ellipse.set(name, value);
            }
            out.push(Box::new(ellipse));
        } else {
            let corner = node.center - node.half;
            let mut rect = Rectangle::new()
                .set("x", fmt_coord(corner.x))
                .set("y", fmt_coord(corner.y))
                .set("width", fmt_coord(node.half.x * 2.0))
                .set("height", fmt_coord(node.half.y * 2.0));
            for (name, value) in attrs {
                rect = rect.set(name, value);
            }
            out.push(Box::new(rect));
        }
    }

    if !text.is_empty() {
        let mut element = Text::new(text)
            .set("x", fmt_coord(node.center.x))
            .set("y", fmt_coord(node.center.y))
            .set("text-anchor", "middle")
            .set("dominant-baseline", "middle")
            .set("font-size", attr_number(style.font_size))
            .set("font-family", "sans-serif")
            .set("fill", style.text_color.to_string());
        if style.bold {
            element = element.set("font-weight", "bold");
        }
        if let Some(opacity) = style.opacity {
            element = element.set("opacity", attr_number(opacity));
        }
        out.push(Box::new(element));
    }
    out
}
