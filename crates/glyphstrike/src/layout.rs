//! Turning text runs into positioned glyphs
//!
//! Most text maps one code unit to one glyph and advances by each glyph's
//! width. Runs that contain complex script characters go to a [`Shaper`]
//! instead. If there is no shaper, or it declines, the run is placed one
//! glyph per code unit anyway.

use std::ops::Range;
use std::sync::Arc;

use glyphstrike_core::types::GlyphId;
use glyphstrike_core::{LayoutError, Result};
use icu_properties::props::Script;
use kurbo::{Affine, Point, Vec2};

use crate::font::{Font2D, FontSpec, RenderContext};
use crate::strike::FontStrike;

/// A slice of text in one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub range: Range<usize>,
    pub script: Script,
}

impl TextRun {
    pub fn new(range: Range<usize>, script: Script) -> Self {
        Self { range, script }
    }
}

/// Everything a shaper gets to see
pub struct ShapeRequest<'a> {
    pub font: &'a Arc<Font2D>,
    pub strike: &'a Arc<FontStrike>,
    pub point_size: f32,
    pub matrix: Affine,
    pub script: Script,
    /// The whole paragraph, for context
    pub text: &'a [u16],
    /// The part to shape
    pub run: Range<usize>,
}

/// Contextual shaping for complex scripts
pub trait Shaper: Send + Sync {
    /// Identify yourself in logs
    fn name(&self) -> &'static str;

    /// Shape `request.run` into `out`; false to decline
    fn shape(&self, request: &ShapeRequest<'_>, out: &mut GlyphBuffer) -> bool;
}

/// Positioned glyphs with the text index each came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphBuffer {
    glyphs: Vec<GlyphId>,
    positions: Vec<Point>,
    char_indices: Vec<usize>,
    advance: Vec2,
}

impl GlyphBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            glyphs: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            char_indices: Vec::with_capacity(capacity),
            advance: Vec2::ZERO,
        }
    }

    pub fn push(&mut self, glyph: GlyphId, position: Point, char_index: usize) {
        self.glyphs.push(glyph);
        self.positions.push(position);
        self.char_indices.push(char_index);
    }

    pub fn glyphs(&self) -> &[GlyphId] {
        &self.glyphs
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn char_indices(&self) -> &[usize] {
        &self.char_indices
    }

    /// Pen movement over the whole buffer
    pub fn advance(&self) -> Vec2 {
        self.advance
    }

    pub fn set_advance(&mut self, advance: Vec2) {
        self.advance = advance;
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn clear(&mut self) {
        self.glyphs.clear();
        self.positions.clear();
        self.char_indices.clear();
        self.advance = Vec2::ZERO;
    }

    /// Append `other`, shifted by this buffer's advance
    fn append(&mut self, other: GlyphBuffer) {
        let offset = self.advance;
        for ((glyph, position), index) in other
            .glyphs
            .into_iter()
            .zip(other.positions)
            .zip(other.char_indices)
        {
            self.push(glyph, position + offset, index);
        }
        self.advance += other.advance;
    }
}

/// Lays out runs, with an optional shaper for complex text
#[derive(Default)]
pub struct GlyphLayout {
    shaper: Option<Arc<dyn Shaper>>,
}

impl GlyphLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shaper(shaper: Arc<dyn Shaper>) -> Self {
        Self {
            shaper: Some(shaper),
        }
    }

    /// Lay out one run of `text` with `strike`
    pub fn layout_run(
        &self,
        font: &Arc<Font2D>,
        strike: &Arc<FontStrike>,
        point_size: f32,
        text: &[u16],
        run: &TextRun,
    ) -> Result<GlyphBuffer> {
        let Range { start, end } = run.range;
        if start > end || end > text.len() {
            return Err(LayoutError::InvalidRange {
                start,
                limit: end,
                len: text.len(),
            }
            .into());
        }
        let units = &text[start..end];
        let mapper = font.mapper();
        let mut glyphs = vec![0; units.len()];

        if mapper.chars_to_glyphs_ns(units, &mut glyphs)? {
            if let Some(shaper) = &self.shaper {
                let request = ShapeRequest {
                    font,
                    strike,
                    point_size,
                    matrix: strike.key().glyph_transform(),
                    script: run.script,
                    text,
                    run: run.range.clone(),
                };
                let mut shaped = GlyphBuffer::with_capacity(units.len());
                if shaper.shape(&request, &mut shaped) && !shaped.is_empty() {
                    return Ok(shaped);
                }
                log::debug!(
                    "{} declined run {:?}; placing glyphs one per code unit",
                    shaper.name(),
                    run.range
                );
            }
            mapper.chars_to_glyphs_into(units, &mut glyphs)?;
        }

        let mut out = GlyphBuffer::with_capacity(units.len());
        let mut pen = Point::ORIGIN;
        for (offset, &glyph) in glyphs.iter().enumerate() {
            out.push(glyph, pen, start + offset);
            pen += strike.glyph_metrics(glyph);
        }
        out.set_advance(pen.to_vec2());
        Ok(out)
    }

    /// Lay out consecutive runs with one font
    pub fn layout(
        &self,
        spec: &FontSpec,
        ctx: &RenderContext,
        text: &[u16],
        runs: &[TextRun],
    ) -> Result<GlyphBuffer> {
        let font = spec.font2d();
        let strike = font.strike_for(f64::from(spec.size()), spec.transform(), spec.style(), ctx);
        let mut out = GlyphBuffer::new();
        for run in runs {
            let laid_out = self.layout_run(&font, &strike, spec.size(), text, run)?;
            out.append(laid_out);
        }
        Ok(out)
    }
}
