//! Numeric primitives shared by the evaluator and the renderer.
//!
//! User space is TikZ's: centimetres, y pointing up, origin in the middle of
//! the canvas. Output space is SVG pixels, y pointing down, origin top-left.
//! All conversions between the two go through [`Canvas`].

use std::fmt;

use glam::{DVec2, dvec2};

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is zero when non-zero required
    Zero,
    /// Value is negative when positive required
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

/// Reject anything that cannot be a size or a scale factor.
pub fn positive(value: f64) -> Result<f64, NumericError> {
    if value.is_nan() {
        Err(NumericError::NaN)
    } else if value.is_infinite() {
        Err(NumericError::Infinite)
    } else if value == 0.0 {
        Err(NumericError::Zero)
    } else if value < 0.0 {
        Err(NumericError::Negative)
    } else {
        Ok(value)
    }
}

/// TeX points per centimetre.
pub const PT_PER_CM: f64 = 28.452_755_9;

/// Length units accepted as expression suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Cm,
    Mm,
    Pt,
    In,
    Ex,
    Em,
}

impl Unit {
    pub fn from_suffix(suffix: &str) -> Option<Unit> {
        match suffix {
            "cm" => Some(Unit::Cm),
            "mm" => Some(Unit::Mm),
            "pt" => Some(Unit::Pt),
            "in" => Some(Unit::In),
            "ex" => Some(Unit::Ex),
            "em" => Some(Unit::Em),
            _ => None,
        }
    }

    /// How many centimetres one of this unit is.
    pub fn to_cm(self) -> f64 {
        match self {
            Unit::Cm => 1.0,
            Unit::Mm => 0.1,
            Unit::Pt => 1.0 / PT_PER_CM,
            Unit::In => 2.54,
            // Computer Modern at 10pt
            Unit::Ex => 4.3 / PT_PER_CM,
            Unit::Em => 10.0 / PT_PER_CM,
        }
    }
}

/// The validated drawing surface: pixel size, unit scale and origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    /// Pixels per centimetre
    pub scale: f64,
    /// Output position of the user-space origin
    pub origin: DVec2,
}

impl Canvas {
    /// Validate the dimensions and place the origin at the canvas center.
    pub fn try_new(width: u32, height: u32, scale: f64) -> Result<Self, (&'static str, NumericError)> {
        positive(f64::from(width)).map_err(|e| ("width", e))?;
        positive(f64::from(height)).map_err(|e| ("height", e))?;
        let scale = positive(scale).map_err(|e| ("scale", e))?;
        Ok(Canvas {
            width,
            height,
            scale,
            origin: dvec2(f64::from(width / 2), f64::from(height / 2)),
        })
    }

    /// User-space point (cm, y up) to output pixels (y down).
    pub fn to_output(&self, user: DVec2) -> DVec2 {
        dvec2(
            self.origin.x + user.x * self.scale,
            self.origin.y - user.y * self.scale,
        )
    }

    /// Output pixels back to user space.
    pub fn to_user(&self, output: DVec2) -> DVec2 {
        dvec2(
            (output.x - self.origin.x) / self.scale,
            (self.origin.y - output.y) / self.scale,
        )
    }

    /// A user-space displacement in output pixels (no origin shift).
    pub fn delta(&self, user: DVec2) -> DVec2 {
        dvec2(user.x * self.scale, -user.y * self.scale)
    }

    /// Centimetres to pixels.
    pub fn px(&self, cm: f64) -> f64 {
        cm * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Canvas {
        Canvas::try_new(500, 500, 28.35).unwrap()
    }

    #[test]
    fn origin_is_canvas_center() {
        assert_eq!(canvas().origin, dvec2(250.0, 250.0));
    }

    #[test]
    fn odd_sizes_floor_the_origin() {
        let c = Canvas::try_new(501, 301, 28.35).unwrap();
        assert_eq!(c.origin, dvec2(250.0, 150.0));
    }

    #[test]
    fn user_to_output_flips_y() {
        let p = canvas().to_output(dvec2(2.0, 2.0));
        assert!((p.x - 306.7).abs() < 1e-9);
        assert!((p.y - 193.3).abs() < 1e-9);
    }

    #[test]
    fn output_round_trips_to_user() {
        let c = canvas();
        let user = dvec2(-1.5, 3.25);
        let back = c.to_user(c.to_output(user));
        assert!((back - user).length() < 1e-12);
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert_eq!(Canvas::try_new(0, 10, 1.0), Err(("width", NumericError::Zero)));
        assert_eq!(Canvas::try_new(10, 10, -1.0), Err(("scale", NumericError::Negative)));
        assert_eq!(Canvas::try_new(10, 10, f64::NAN).map_err(|e| e.0), Err("scale"));
    }

    #[test]
    fn unit_conversion() {
        assert_eq!(Unit::Mm.to_cm(), 0.1);
        assert!((Unit::Pt.to_cm() * PT_PER_CM - 1.0).abs() < 1e-12);
        assert_eq!(Unit::from_suffix("in"), Some(Unit::In));
        assert_eq!(Unit::from_suffix("px"), None);
    }
}
