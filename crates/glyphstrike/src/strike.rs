//! Strikes: glyph caches for one rendering configuration
//!
//! Every strike answers the same questions (images, advances, outlines,
//! line metrics) for a fixed [`StrikeKey`]. Physical strikes ask a scaler;
//! composite strikes route each glyph to the physical strike of the slot
//! encoded in its id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glyphstrike_core::types::GlyphId;
use glyphstrike_core::{GlyphImage, LayoutError, StrikeKey, StrikeMetrics};
use kurbo::{BezPath, Vec2};

use crate::arena::GlyphImageHandle;
use crate::composite_strike::CompositeStrike;
use crate::font::Font2D;
use crate::physical_strike::PhysicalStrike;

static NEXT_STRIKE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique strike identity
///
/// Registry entries remember the id of the strike they point at, so a
/// dying strike can only ever remove its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrikeId(u64);

impl StrikeId {
    pub(crate) fn next() -> Self {
        StrikeId(NEXT_STRIKE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A strike of either kind
pub enum FontStrike {
    Physical(PhysicalStrike),
    Composite(CompositeStrike),
}

impl FontStrike {
    pub fn id(&self) -> StrikeId {
        match self {
            FontStrike::Physical(s) => s.id(),
            FontStrike::Composite(s) => s.id(),
        }
    }

    pub fn key(&self) -> &StrikeKey {
        match self {
            FontStrike::Physical(s) => s.key(),
            FontStrike::Composite(s) => s.key(),
        }
    }

    /// The font this strike renders
    pub fn font(&self) -> &Arc<Font2D> {
        match self {
            FontStrike::Physical(s) => s.font(),
            FontStrike::Composite(s) => s.font(),
        }
    }

    /// Line metrics in user space
    pub fn font_metrics(&self) -> StrikeMetrics {
        match self {
            FontStrike::Physical(s) => s.font_metrics(),
            FontStrike::Composite(s) => s.font_metrics(),
        }
    }

    /// Image handle for one glyph, rasterizing on first use
    pub fn glyph_image(&self, glyph: GlyphId) -> GlyphImageHandle {
        match self {
            FontStrike::Physical(s) => s.glyph_image(glyph),
            FontStrike::Composite(s) => s.glyph_image(glyph),
        }
    }

    /// Image handles for a run of glyphs
    pub fn glyph_images(&self, glyphs: &[GlyphId]) -> Vec<GlyphImageHandle> {
        let mut images = vec![GlyphImageHandle::EMPTY; glyphs.len()];
        self.fill_glyph_images(glyphs, &mut images);
        images
    }

    /// Image handles for a run of glyphs, written into `images`
    pub fn glyph_images_into(
        &self,
        glyphs: &[GlyphId],
        images: &mut [GlyphImageHandle],
    ) -> Result<(), LayoutError> {
        if images.len() < glyphs.len() {
            return Err(LayoutError::OutputTooShort {
                required: glyphs.len(),
                actual: images.len(),
            });
        }
        self.fill_glyph_images(glyphs, &mut images[..glyphs.len()]);
        Ok(())
    }

    fn fill_glyph_images(&self, glyphs: &[GlyphId], images: &mut [GlyphImageHandle]) {
        match self {
            FontStrike::Physical(s) => {
                for (image, &glyph) in images.iter_mut().zip(glyphs) {
                    *image = s.glyph_image(glyph);
                }
            }
            FontStrike::Composite(s) => s.glyph_images(glyphs, images),
        }
    }

    /// Advance vector in user space
    pub fn glyph_metrics(&self, glyph: GlyphId) -> Vec2 {
        match self {
            FontStrike::Physical(s) => s.glyph_metrics(glyph),
            FontStrike::Composite(s) => s.glyph_metrics(glyph),
        }
    }

    /// Horizontal advance in user space
    pub fn glyph_advance(&self, glyph: GlyphId) -> f32 {
        self.glyph_metrics(glyph).x as f32
    }

    /// Glyph outline placed at `(x, y)`
    pub fn glyph_outline(&self, glyph: GlyphId, x: f32, y: f32) -> BezPath {
        match self {
            FontStrike::Physical(s) => s.glyph_outline(glyph, x, y),
            FontStrike::Composite(s) => s.glyph_outline(glyph, x, y),
        }
    }

    /// Resolve a handle this strike returned
    ///
    /// `None` once the image has been freed.
    pub fn image(&self, handle: GlyphImageHandle) -> Option<Arc<GlyphImage>> {
        self.font().strike_cache().image(handle)
    }

    pub fn as_physical(&self) -> Option<&PhysicalStrike> {
        match self {
            FontStrike::Physical(s) => Some(s),
            FontStrike::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeStrike> {
        match self {
            FontStrike::Composite(s) => Some(s),
            FontStrike::Physical(_) => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, FontStrike::Composite(_))
    }
}

impl std::fmt::Debug for FontStrike {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(if self.is_composite() {
            "CompositeStrike"
        } else {
            "PhysicalStrike"
        })
        .field("id", &self.id())
        .field("font", &self.font().full_name())
        .field("key", self.key())
        .finish()
    }
}
