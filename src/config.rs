//! Conversion settings

use crate::errors::RenderError;
use crate::types::Canvas;

/// Pixels per centimetre at 72 dpi.
pub const DEFAULT_SCALE: f64 = 28.35;
pub const DEFAULT_WIDTH: u32 = 500;
pub const DEFAULT_HEIGHT: u32 = 500;

/// User-facing conversion settings.
///
/// Validated into a [`Canvas`] at the start of every conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Pixels per user unit (centimetre)
    pub scale: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scale: DEFAULT_SCALE,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn canvas(&self) -> Result<Canvas, RenderError> {
        Canvas::try_new(self.width, self.height, self.scale)
            .map_err(|(field, source)| RenderError::InvalidCanvas { field, source })
    }
}
