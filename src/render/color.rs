//! Color parsing: xcolor names, hex literals and `a!p!b` mixes

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color `{0}`")]
pub struct UnknownColor(pub String);

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `percent`% of `self`, the rest `other`
    pub fn mix(self, other: Rgb, percent: f64) -> Rgb {
        let t = (percent / 100.0).clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (f64::from(a) * t + f64::from(b) * (1.0 - t)).round() as u8;
        Rgb::new(
            channel(self.r, other.r),
            channel(self.g, other.g),
            channel(self.b, other.b),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// The xcolor base palette
pub fn named(name: &str) -> Option<Rgb> {
    let rgb = |r: f64, g: f64, b: f64| {
        Rgb::new(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        )
    };
    Some(match name {
        "red" => rgb(1.0, 0.0, 0.0),
        "green" => rgb(0.0, 1.0, 0.0),
        "blue" => rgb(0.0, 0.0, 1.0),
        "cyan" => rgb(0.0, 1.0, 1.0),
        "magenta" => rgb(1.0, 0.0, 1.0),
        "yellow" => rgb(1.0, 1.0, 0.0),
        "black" => Rgb::BLACK,
        "white" => Rgb::WHITE,
        "gray" => rgb(0.5, 0.5, 0.5),
        "darkgray" => rgb(0.25, 0.25, 0.25),
        "lightgray" => rgb(0.75, 0.75, 0.75),
        "brown" => rgb(0.75, 0.5, 0.25),
        "lime" => rgb(0.75, 1.0, 0.0),
        "olive" => rgb(0.5, 0.5, 0.0),
        "orange" => rgb(1.0, 0.5, 0.0),
        "pink" => rgb(1.0, 0.75, 0.75),
        "purple" => rgb(0.75, 0.0, 0.25),
        "teal" => rgb(0.0, 0.5, 0.5),
        "violet" => rgb(0.5, 0.0, 0.5),
        _ => return None,
    })
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let digits = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some(Rgb::new(digits(&hex[0..2])?, digits(&hex[2..4])?, digits(&hex[4..6])?)),
        3 => {
            let expand = |i: usize| digits(&hex[i..i + 1]).map(|d| d * 17);
            Some(Rgb::new(expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

fn parse_single(text: &str) -> Option<Rgb> {
    let text = text.trim();
    match text.strip_prefix('#') {
        Some(hex) if hex.is_ascii() => parse_hex(hex),
        Some(_) => None,
        None => named(text),
    }
}

impl FromStr for Rgb {
    type Err = UnknownColor;

    /// `red`, `#ff8000`, `blue!30`, `red!50!blue`, `red!50!blue!20!white`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownColor(s.trim().to_string());
        let mut parts = s.split('!');
        let mut color = parts.next().and_then(parse_single).ok_or_else(unknown)?;

        while let Some(percent) = parts.next() {
            let percent: f64 = percent.trim().parse().map_err(|_| unknown())?;
            let other = match parts.next() {
                Some(name) => parse_single(name).ok_or_else(unknown)?,
                None => Rgb::WHITE,
            };
            color = color.mix(other, percent);
        }
        Ok(color)
    }
}

/// Whether `text` names a color, so a bare option flag like `blue!20` sets it.
pub fn is_color(text: &str) -> bool {
    text.parse::<Rgb>().is_ok()
}
