//! The rasterizer contract
//!
//! A [`Scaler`] is the opaque glyph rasterizer behind a physical font. Give it
//! a context built from a strike's configuration and it hands back metrics,
//! glyph images and outlines. Any call may fail; when one does, callers stop
//! using that scaler for good and switch to the [`NullScaler`], which answers
//! every question with zeros and never fails.

use kurbo::{Affine, BezPath, Point, Vec2};

use crate::error::ScalerError;
use crate::key::{AntiAliasMode, FractionalMetrics};
use crate::types::GlyphId;

/// Opaque handle to native per-strike scaler state
///
/// `ScalerContext::NULL` is what the null scaler hands out and is never
/// freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScalerContext(u64);

impl ScalerContext {
    pub const NULL: ScalerContext = ScalerContext(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Emboldening applied when a bold style is faked
pub const SYNTHETIC_BOLDNESS: f32 = 1.33;

/// Oblique factor applied when an italic style is faked
pub const SYNTHETIC_ITALIC: f32 = 0.7;

/// Everything a scaler needs to set up a context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextParams {
    /// Glyph transform in device space, translation removed
    pub matrix: Affine,
    pub aa: AntiAliasMode,
    pub fm: FractionalMetrics,
    /// 1.0 for no emboldening
    pub boldness: f32,
    /// 0.0 for no obliquing
    pub italic: f32,
}

/// Pixel layout of a glyph image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// No pixels at all (spaces, invisible glyphs, failures)
    #[default]
    Empty,
    /// One bit per pixel
    Mono,
    /// One coverage byte per pixel
    Gray8,
    /// Three coverage bytes per pixel, sub-pixel ordered
    Lcd,
}

/// One rasterized glyph as produced by a scaler
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphImage {
    pub width: u16,
    pub height: u16,
    pub row_bytes: u16,
    /// Offset of the image's top-left corner from the glyph origin
    pub top_left: Point,
    /// Advance in device space
    pub advance: Vec2,
    pub format: ImageFormat,
    pub pixels: Box<[u8]>,
}

impl GlyphImage {
    /// Image with no pixels and no advance
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

/// Font-wide line metrics for one strike
///
/// Each metric is a vector so rotated strikes report direction as well as
/// magnitude. Ascent points up (negative y), descent and leading point down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrikeMetrics {
    pub ascent: Vec2,
    pub descent: Vec2,
    pub baseline: Vec2,
    pub leading: Vec2,
    pub max_advance: Vec2,
}

impl StrikeMetrics {
    /// Grow these metrics so they also cover `other`
    pub fn merge(&mut self, other: &StrikeMetrics) {
        self.ascent.x = self.ascent.x.min(other.ascent.x);
        self.ascent.y = self.ascent.y.min(other.ascent.y);
        self.descent.x = self.descent.x.max(other.descent.x);
        self.descent.y = self.descent.y.max(other.descent.y);
        self.baseline.x = self.baseline.x.max(other.baseline.x);
        self.baseline.y = self.baseline.y.max(other.baseline.y);
        self.leading.x = self.leading.x.max(other.leading.x);
        self.leading.y = self.leading.y.max(other.leading.y);
        self.max_advance.x = self.max_advance.x.max(other.max_advance.x);
        self.max_advance.y = self.max_advance.y.max(other.max_advance.y);
    }

    /// Map device-space metrics back into user space
    pub fn to_user_space(&self, inverse_device: &Affine) -> StrikeMetrics {
        let map = |v: Vec2| {
            let [a, b, c, d, _, _] = inverse_device.as_coeffs();
            Vec2::new(a * v.x + c * v.y, b * v.x + d * v.y)
        };
        StrikeMetrics {
            ascent: map(self.ascent),
            descent: map(self.descent),
            baseline: map(self.baseline),
            leading: map(self.leading),
            max_advance: map(self.max_advance),
        }
    }

    /// Distance from baseline to the top of the line
    pub fn ascent_len(&self) -> f64 {
        self.ascent.hypot()
    }

    /// Distance from baseline to the bottom of the line
    pub fn descent_len(&self) -> f64 {
        self.descent.hypot()
    }

    pub fn line_height(&self) -> f64 {
        self.ascent_len() + self.descent_len() + self.leading.hypot()
    }
}

/// Glyph rasterizer for one physical font
///
/// Contexts handed out by `create_context` stay valid for `free_context`
/// even after [`Scaler::dispose`] or [`Scaler::invalidate_context`]; other
/// calls against an invalidated context must fail or return empty data,
/// never touch freed state.
pub trait Scaler: Send + Sync {
    /// Identify yourself in logs
    fn name(&self) -> &'static str;

    /// Set up native state for one strike
    fn create_context(&self, params: &ContextParams) -> Result<ScalerContext, ScalerError>;

    /// Font-wide metrics in device space
    fn strike_metrics(&self, context: ScalerContext) -> Result<StrikeMetrics, ScalerError>;

    /// Rasterize one glyph
    fn glyph_image(&self, context: ScalerContext, glyph: GlyphId)
        -> Result<GlyphImage, ScalerError>;

    /// Horizontal advance in device space
    fn glyph_advance(&self, context: ScalerContext, glyph: GlyphId) -> Result<f32, ScalerError>;

    /// Outline positioned at `(x, y)`
    fn glyph_outline(
        &self,
        context: ScalerContext,
        glyph: GlyphId,
        x: f32,
        y: f32,
    ) -> Result<BezPath, ScalerError>;

    /// Mark a context unusable; it is still freed later
    fn invalidate_context(&self, context: ScalerContext);

    /// Release a context's native state
    fn free_context(&self, context: ScalerContext);

    /// Release the scaler's own native state
    fn dispose(&self);

    /// The no-op stand-in answers true
    fn is_null(&self) -> bool {
        false
    }
}

/// Scaler of last resort: zero metrics, empty images, never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScaler;

impl Scaler for NullScaler {
    fn name(&self) -> &'static str {
        "null"
    }

    fn create_context(&self, _params: &ContextParams) -> Result<ScalerContext, ScalerError> {
        Ok(ScalerContext::NULL)
    }

    fn strike_metrics(&self, _context: ScalerContext) -> Result<StrikeMetrics, ScalerError> {
        Ok(StrikeMetrics::default())
    }

    fn glyph_image(
        &self,
        _context: ScalerContext,
        _glyph: GlyphId,
    ) -> Result<GlyphImage, ScalerError> {
        Ok(GlyphImage::empty())
    }

    fn glyph_advance(&self, _context: ScalerContext, _glyph: GlyphId) -> Result<f32, ScalerError> {
        Ok(0.0)
    }

    fn glyph_outline(
        &self,
        _context: ScalerContext,
        _glyph: GlyphId,
        _x: f32,
        _y: f32,
    ) -> Result<BezPath, ScalerError> {
        Ok(BezPath::new())
    }

    fn invalidate_context(&self, _context: ScalerContext) {}

    fn free_context(&self, _context: ScalerContext) {}

    fn dispose(&self) {}

    fn is_null(&self) -> bool {
        true
    }
}
