//! Option processing and style resolution
//!
//! Raw `[key=value]` lists go through three steps: named styles expand in
//! place, values are evaluated against the current scope, and the resulting
//! [`OptionMap`] is folded into a paint [`Style`] for one command.

use std::collections::HashMap;

use crate::ast::{Command, Options};
use crate::eval::{Evaluator, format_number};
use crate::log::{debug, warn};
use crate::parse::{parse_expression, parse_option_text};
use crate::types::{Canvas, Unit};

use super::color::{Rgb, is_color};

/// Name of the style applied to every node
pub const EVERY_NODE: &str = "every node";

/// Default stroke width in pixels (`thin`)
pub const DEFAULT_STROKE_WIDTH: f64 = 1.0;
/// Default font size in pixels
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// An evaluated option value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A key without `=value`
    Flag,
    /// A unitless number
    Number(f64),
    /// A value with an explicit unit, in centimetres
    Length(f64),
    /// Anything that did not evaluate: colors, keywords, coordinates
    Text(String),
}

impl OptionValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) | OptionValue::Length(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            OptionValue::Text(s) => Some(s.clone()),
            OptionValue::Number(n) | OptionValue::Length(n) => Some(format_number(*n)),
            OptionValue::Flag => None,
        }
    }

    /// A physical length in pixels. Unitless numbers are read in `default` units.
    pub fn to_px(&self, default: Unit, canvas: &Canvas) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(canvas.px(n * default.to_cm())),
            OptionValue::Length(cm) => Some(canvas.px(*cm)),
            _ => None,
        }
    }
}

/// Evaluated options in application order. Re-inserting a key moves it to
/// the end, so the most recent setting is always last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap {
    entries: Vec<(String, OptionValue)>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue) {
        let key = key.into();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `self` overridden by `child`
    pub fn merged(&self, child: &OptionMap) -> OptionMap {
        let mut out = self.clone();
        for (key, value) in child.iter() {
            out.insert(key, value.clone());
        }
        out
    }
}

/// Named styles from `\tikzset` and `name/.style` keys
#[derive(Debug, Default)]
pub struct StyleTable {
    styles: HashMap<String, Options>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, options: Options) {
        let name = name.into();
        debug!(style = %name, "defined style");
        self.styles.insert(name, options);
    }

    pub fn append(&mut self, name: &str, options: Options) {
        self.styles
            .entry(name.to_string())
            .or_default()
            .0
            .extend(options.0);
    }

    pub fn get(&self, name: &str) -> Option<&Options> {
        self.styles.get(name)
    }

    /// Register `x/.style={...}` and `x/.append style={...}` keys from an
    /// option list.
    pub fn absorb(&mut self, options: &Options) -> Result<(), miette::Report> {
        for option in options.iter() {
            let body = option.value.as_deref().unwrap_or("");
            if let Some(name) = option.key.strip_suffix("/.style") {
                self.define(name.trim(), parse_option_text(body)?);
            } else if let Some(name) = option.key.strip_suffix("/.append style") {
                self.append(name.trim(), parse_option_text(body)?);
            }
        }
        Ok(())
    }
}

/// Evaluates raw options against a scope and expands named styles.
pub struct OptionProcessor<'a> {
    styles: &'a StyleTable,
    eval: Evaluator<'a>,
}

impl<'a> OptionProcessor<'a> {
    pub fn new(styles: &'a StyleTable, eval: Evaluator<'a>) -> Self {
        Self { styles, eval }
    }

    pub fn process(&self, options: &Options) -> OptionMap {
        let mut map = OptionMap::new();
        let mut active = Vec::new();
        self.apply(options, &mut map, &mut active);
        map
    }

    fn apply(&self, options: &Options, map: &mut OptionMap, active: &mut Vec<String>) {
        for option in options.iter() {
            let key = self.eval.substitute(&option.key).trim().to_string();
            if key.contains("/.") {
                continue;
            }
            match &option.value {
                None => match self.styles.get(&key) {
                    Some(_) if active.contains(&key) => {
                        warn!(style = %key, "style refers to itself; ignoring");
                    }
                    Some(style) => {
                        active.push(key);
                        self.apply(style, map, active);
                        active.pop();
                    }
                    None => map.insert(key, OptionValue::Flag),
                },
                Some(raw) => map.insert(key, self.value(raw)),
            }
        }
    }

    /// Evaluate one value, keeping the substituted literal if it is not numeric.
    pub fn value(&self, raw: &str) -> OptionValue {
        // a bare word such as `e` or `pi` is a name, not a math constant
        let word = raw.trim();
        if !word.is_empty() && word.bytes().all(|b| b.is_ascii_alphabetic()) {
            return OptionValue::Text(word.to_string());
        }
        if let Ok(expr) = parse_expression(raw) {
            if let Ok(v) = self.eval.eval(&expr) {
                if v.is_finite() {
                    return if expr.has_unit() {
                        OptionValue::Length(v)
                    } else {
                        OptionValue::Number(v)
                    };
                }
            }
        }
        OptionValue::Text(self.eval.substitute(raw.trim()))
    }
}

// ============================================================================
// Arrow tips
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowTip {
    Triangle,
    Bar,
}

impl ArrowTip {
    pub fn marker_id(self, at_start: bool) -> &'static str {
        match (self, at_start) {
            (ArrowTip::Bar, _) => "bar",
            (ArrowTip::Triangle, false) => "arrow-end",
            (ArrowTip::Triangle, true) => "arrow-start",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arrows {
    pub start: Option<ArrowTip>,
    pub end: Option<ArrowTip>,
}

fn parse_tip(text: &str) -> Option<Option<ArrowTip>> {
    let text = text.trim().trim_matches(|c| c == '{' || c == '}');
    match text {
        "" => Some(None),
        "|" => Some(Some(ArrowTip::Bar)),
        "<" | ">" | "<<" | ">>" | "to" | "stealth" | "latex" | "Stealth" | "Latex" | "triangle 45"
        | "triangle 60" | "triangle 90" => Some(Some(ArrowTip::Triangle)),
        _ => None,
    }
}

/// Parse an arrow specification such as `->`, `<->`, `|-|` or `-stealth`.
pub fn parse_arrows(spec: &str) -> Option<Arrows> {
    let (start, end) = spec.trim().split_once('-')?;
    if end.contains('-') {
        return None;
    }
    Some(Arrows {
        start: parse_tip(start)?,
        end: parse_tip(end)?,
    })
}

// ============================================================================
// Style resolution
// ============================================================================

fn width_keyword(key: &str) -> Option<f64> {
    Some(match key {
        "ultra thin" => 0.5,
        "very thin" => 0.75,
        "thin" => 1.0,
        "semithick" => 1.5,
        "thick" => 2.0,
        "very thick" => 3.0,
        "ultra thick" => 4.0,
        _ => return None,
    })
}

fn dash_keyword(key: &str) -> Option<Option<&'static str>> {
    Some(match key {
        "solid" => None,
        "dashed" => Some("5,5"),
        "densely dashed" => Some("3,2"),
        "loosely dashed" => Some("6,6"),
        "dotted" => Some("2,2"),
        "densely dotted" => Some("1,2"),
        "loosely dotted" => Some("1,4"),
        _ => return None,
    })
}

/// `on 2pt off 3pt on 1pt off 3pt`, in pixels
fn parse_dash_pattern(pattern: &str, canvas: &Canvas) -> Option<String> {
    let mut lengths = Vec::new();
    let mut words = pattern.split_whitespace();
    while let Some(word) = words.next() {
        if word != "on" && word != "off" {
            return None;
        }
        let length = parse_length(words.next()?, Unit::Pt)?;
        lengths.push(attr_number(canvas.px(length)));
    }
    (!lengths.is_empty()).then(|| lengths.join(","))
}

/// A plain `2pt`/`1mm`/`3` length in centimetres
fn parse_length(text: &str, default: Unit) -> Option<f64> {
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.trim().parse().ok()?;
    let unit = if unit.is_empty() {
        default
    } else {
        Unit::from_suffix(unit)?
    };
    Some(value * unit.to_cm())
}

/// Font sizes for LaTeX size switches, in pixels. Longer names first so
/// `\Large` is not read as `\large`.
const FONT_SIZES: &[(&str, f64)] = &[
    ("\\footnotesize", 10.0),
    ("\\scriptsize", 9.0),
    ("\\normalsize", 12.0),
    ("\\tiny", 8.0),
    ("\\small", 10.0),
    ("\\LARGE", 20.0),
    ("\\Large", 18.0),
    ("\\large", 16.0),
    ("\\Huge", 24.0),
    ("\\huge", 20.0),
];

fn font_size(font: &str) -> Option<f64> {
    FONT_SIZES
        .iter()
        .find(|(switch, _)| font.contains(switch))
        .map(|(_, size)| *size)
}

fn parse_color(key: &str, value: &OptionValue) -> Option<Rgb> {
    let text = value.as_text()?;
    match text.parse() {
        Ok(color) => Some(color),
        Err(err) => {
            warn!(key, error = %err, "ignoring color");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Paint {
    Unset,
    Off,
    Base,
    Color(Rgb),
}

fn paint(key: &str, value: &OptionValue) -> Paint {
    match value {
        OptionValue::Flag => Paint::Base,
        OptionValue::Text(t) if t == "none" => Paint::Off,
        other => parse_color(key, other).map_or(Paint::Unset, Paint::Color),
    }
}

/// Paint attributes for one command
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// `None` paints no stroke
    pub stroke: Option<Rgb>,
    /// `None` paints no fill
    pub fill: Option<Rgb>,
    /// Pixels
    pub stroke_width: f64,
    pub dash: Option<String>,
    pub line_cap: Option<&'static str>,
    pub line_join: Option<&'static str>,
    pub arrows: Arrows,
    pub opacity: Option<f64>,
    pub fill_opacity: Option<f64>,
    pub draw_opacity: Option<f64>,
    pub text_color: Rgb,
    /// Pixels
    pub font_size: f64,
    pub bold: bool,
    /// Keys that do not affect painting
    pub extra: Vec<(String, OptionValue)>,
}

impl Style {
    pub fn resolve(options: &OptionMap, command: Command, canvas: &Canvas) -> Style {
        let mut color = None;
        let mut draw = Paint::Unset;
        let mut fill = Paint::Unset;
        let mut text = None;
        let mut style = Style {
            stroke: None,
            fill: None,
            stroke_width: DEFAULT_STROKE_WIDTH,
            dash: None,
            line_cap: None,
            line_join: None,
            arrows: Arrows::default(),
            opacity: None,
            fill_opacity: None,
            draw_opacity: None,
            text_color: Rgb::BLACK,
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            extra: Vec::new(),
        };

        for (key, value) in options.iter() {
            if let OptionValue::Flag = value {
                if let Some(width) = width_keyword(key) {
                    style.stroke_width = width;
                    continue;
                }
                if let Some(dash) = dash_keyword(key) {
                    style.dash = dash.map(str::to_string);
                    continue;
                }
                if let Some(arrows) = parse_arrows(key) {
                    style.arrows = arrows;
                    continue;
                }
                if is_color(key) {
                    color = key.parse().ok();
                    continue;
                }
            }

            match key {
                "color" => color = parse_color(key, value).or(color),
                "draw" => draw = paint(key, value),
                "fill" => fill = paint(key, value),
                "text" => text = parse_color(key, value).or(text),
                "line width" => {
                    if let Some(px) = value.to_px(Unit::Pt, canvas) {
                        style.stroke_width = px;
                    }
                }
                "dash pattern" => {
                    style.dash = value.as_text().and_then(|p| parse_dash_pattern(&p, canvas));
                }
                "line cap" => {
                    style.line_cap = match value.as_text().as_deref() {
                        Some("round") => Some("round"),
                        Some("rect") => Some("square"),
                        Some("butt") => Some("butt"),
                        _ => None,
                    };
                }
                "line join" => {
                    style.line_join = match value.as_text().as_deref() {
                        Some("round") => Some("round"),
                        Some("bevel") => Some("bevel"),
                        Some("miter") => Some("miter"),
                        _ => None,
                    };
                }
                "arrows" => {
                    if let Some(arrows) = value.as_text().as_deref().and_then(parse_arrows) {
                        style.arrows = arrows;
                    }
                }
                "opacity" => style.opacity = value.as_number(),
                "fill opacity" => style.fill_opacity = value.as_number(),
                "draw opacity" => style.draw_opacity = value.as_number(),
                "font" => {
                    if let Some(font) = value.as_text() {
                        style.font_size = font_size(&font).unwrap_or(style.font_size);
                        style.bold = font.contains("\\bfseries");
                    }
                }
                "font size" => {
                    if let Some(px) = value.to_px(Unit::Pt, canvas) {
                        style.font_size = px;
                    }
                }
                _ => style.extra.push((key.to_string(), value.clone())),
            }
        }

        let base = color.unwrap_or(Rgb::BLACK);
        style.stroke = match (draw, command) {
            (Paint::Off, _) => None,
            (Paint::Color(c), _) => Some(c),
            (Paint::Base, _) => Some(base),
            (Paint::Unset, Command::Draw | Command::FillDraw) => Some(base),
            (Paint::Unset, _) => None,
        };
        style.fill = match (fill, command) {
            (Paint::Off, _) => None,
            (Paint::Color(c), _) => Some(c),
            (Paint::Base, _) => Some(base),
            (Paint::Unset, Command::Fill | Command::FillDraw) => Some(base),
            (Paint::Unset, _) => None,
        };
        style.text_color = text.unwrap_or(base);
        style
    }

    /// Presentation attributes for a `<path>`
    pub fn path_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("fill", paint_attr(self.fill)),
            ("stroke", paint_attr(self.stroke)),
        ];
        if self.stroke.is_some() {
            attrs.push(("stroke-width", attr_number(self.stroke_width)));
            if let Some(dash) = &self.dash {
                attrs.push(("stroke-dasharray", dash.clone()));
            }
            if let Some(cap) = self.line_cap {
                attrs.push(("stroke-linecap", cap.to_string()));
            }
            if let Some(join) = self.line_join {
                attrs.push(("stroke-linejoin", join.to_string()));
            }
            if let Some(tip) = self.arrows.start {
                attrs.push(("marker-start", format!("url(#{})", tip.marker_id(true))));
            }
            if let Some(tip) = self.arrows.end {
                attrs.push(("marker-end", format!("url(#{})", tip.marker_id(false))));
            }
        }
        self.push_opacity(&mut attrs);
        attrs
    }

    fn push_opacity(&self, attrs: &mut Vec<(&'static str, String)>) {
        if let Some(o) = self.opacity {
            attrs.push(("opacity", attr_number(o)));
        }
        if let Some(o) = self.fill_opacity {
            attrs.push(("fill-opacity", attr_number(o)));
        }
        if let Some(o) = self.draw_opacity {
            attrs.push(("stroke-opacity", attr_number(o)));
        }
    }
}

/// Attributes for a scope's `<g>`: only what the scope's own options set.
pub fn scope_attributes(options: &OptionMap, canvas: &Canvas) -> Vec<(&'static str, String)> {
    let style = Style::resolve(options, Command::Draw, canvas);
    let mut attrs = Vec::new();

    if any_key(options, |k, v| k == "color" || (matches!(v, OptionValue::Flag) && is_color(k))) {
        attrs.push(("stroke", paint_attr(style.stroke)));
    }
    if any_key(options, |k, v| {
        k == "line width" || (matches!(v, OptionValue::Flag) && width_keyword(k).is_some())
    }) {
        attrs.push(("stroke-width", attr_number(style.stroke_width)));
    }
    if let Some(dash) = &style.dash {
        attrs.push(("stroke-dasharray", dash.clone()));
    }
    style.push_opacity(&mut attrs);
    attrs
}

fn any_key(options: &OptionMap, pred: impl Fn(&str, &OptionValue) -> bool) -> bool {
    options.iter().any(|(k, v)| pred(k, v))
}

fn paint_attr(color: Option<Rgb>) -> String {
    color.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Attribute numbers: at most two decimals, no trailing zeros.
pub fn attr_number(value: f64) -> String {
    format_number((value * 100.0).round() / 100.0)
}
