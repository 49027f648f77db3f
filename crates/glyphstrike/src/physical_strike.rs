//! Strikes backed by a real scaler
//!
//! A physical strike owns one scaler context and caches what it produced:
//! glyph images in the shared arena, advances, and the line metrics. Two
//! threads asking for the same uncached glyph both rasterize it; the first
//! to publish wins and the other frees its copy.
//!
//! When the scaler fails, the font is flagged bad and every later question
//! is answered by the null scaler, so callers see empty glyphs rather than
//! errors.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use glyphstrike_core::scaler::{SYNTHETIC_BOLDNESS, SYNTHETIC_ITALIC};
use glyphstrike_core::types::{GlyphId, GLYPH_MASK, INVISIBLE_GLYPHS, MISSING_GLYPH};
use glyphstrike_core::{
    ContextParams, NullScaler, Scaler, ScalerContext, ScalerError, StrikeKey, StrikeMetrics, Style,
};
use kurbo::{Affine, BezPath, Vec2};

use crate::arena::{GlyphImageArena, GlyphImageHandle};
use crate::disposer::DisposalRecord;
use crate::font::Font2D;
use crate::strike::StrikeId;

/// Fonts with at most this many glyphs get a flat image table
const DENSE_TABLE_LIMIT: u32 = 8192;

const UNCACHED: u64 = u64::MAX;

enum ImageTable {
    Dense(Box<[AtomicU64]>),
    Sparse(DashMap<GlyphId, GlyphImageHandle>),
}

impl ImageTable {
    fn new(num_glyphs: u32) -> Self {
        if num_glyphs > 0 && num_glyphs <= DENSE_TABLE_LIMIT {
            ImageTable::Dense((0..num_glyphs).map(|_| AtomicU64::new(UNCACHED)).collect())
        } else {
            ImageTable::Sparse(DashMap::new())
        }
    }

    fn get(&self, glyph: GlyphId) -> Option<GlyphImageHandle> {
        match self {
            ImageTable::Dense(slots) => {
                let raw = slots.get(glyph as usize)?.load(Ordering::Acquire);
                (raw != UNCACHED).then(|| GlyphImageHandle::from_raw(raw))
            }
            ImageTable::Sparse(map) => map.get(&glyph).map(|h| *h),
        }
    }

    /// Store `handle` unless another thread already stored one
    ///
    /// Returns the winning handle and whether it was ours.
    fn publish(&self, glyph: GlyphId, handle: GlyphImageHandle) -> (GlyphImageHandle, bool) {
        match self {
            ImageTable::Dense(slots) => match slots.get(glyph as usize) {
                Some(slot) => match slot.compare_exchange(
                    UNCACHED,
                    handle.raw(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => (handle, true),
                    Err(existing) => (GlyphImageHandle::from_raw(existing), false),
                },
                // Not cacheable; the caller keeps ownership
                None => (handle, false),
            },
            ImageTable::Sparse(map) => {
                let winner = *map.entry(glyph).or_insert(handle);
                (winner, winner == handle)
            }
        }
    }

    fn take_handles(&mut self) -> Vec<GlyphImageHandle> {
        match self {
            ImageTable::Dense(slots) => slots
                .iter_mut()
                .map(|slot| *slot.get_mut())
                .filter(|&raw| raw != UNCACHED)
                .map(GlyphImageHandle::from_raw)
                .filter(|h| !h.is_empty())
                .collect(),
            ImageTable::Sparse(map) => std::mem::take(map)
                .into_iter()
                .map(|(_, h)| h)
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }
}

/// Glyph cache for one physical font in one configuration
pub struct PhysicalStrike {
    id: StrikeId,
    key: StrikeKey,
    font: Arc<Font2D>,
    arena: Arc<GlyphImageArena>,
    num_glyphs: u32,
    inverse_device: Option<Affine>,
    owner: Arc<dyn Scaler>,
    context: ScalerContext,
    invalidated: AtomicBool,
    images: ImageTable,
    advances: DashMap<GlyphId, Vec2>,
    metrics: OnceLock<StrikeMetrics>,
}

impl PhysicalStrike {
    pub(crate) fn new(font: Arc<Font2D>, key: StrikeKey) -> Self {
        let owner = font.scaler();
        let num_glyphs = font.num_glyphs();
        let missing = key.style().difference(font.style());
        let params = ContextParams {
            matrix: key.glyph_transform(),
            aa: key.antialias(),
            fm: key.fractional_metrics(),
            boldness: if missing.contains(Style::BOLD) {
                SYNTHETIC_BOLDNESS
            } else {
                1.0
            },
            italic: if missing.contains(Style::ITALIC) {
                SYNTHETIC_ITALIC
            } else {
                0.0
            },
        };
        let context = match owner.create_context(&params) {
            Ok(context) => context,
            Err(err) => {
                font.scaler_failed(&err);
                ScalerContext::NULL
            }
        };
        log::trace!(
            "New strike for {} ({} glyphs, scaler {})",
            font.full_name(),
            num_glyphs,
            owner.name()
        );

        Self {
            id: StrikeId::next(),
            inverse_device: key.inverse_device(),
            key,
            arena: Arc::clone(font.strike_cache().arena()),
            font,
            num_glyphs,
            owner,
            context,
            invalidated: AtomicBool::new(false),
            images: ImageTable::new(num_glyphs),
            advances: DashMap::new(),
            metrics: OnceLock::new(),
        }
    }

    pub fn id(&self) -> StrikeId {
        self.id
    }

    pub fn key(&self) -> &StrikeKey {
        &self.key
    }

    pub fn font(&self) -> &Arc<Font2D> {
        &self.font
    }

    pub fn context(&self) -> ScalerContext {
        self.context
    }

    /// Has the context been invalidated after a scaler failure?
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Run a scaler call, degrading to the null scaler on failure
    fn scale<T: Default>(
        &self,
        op: impl Fn(&dyn Scaler, ScalerContext) -> Result<T, ScalerError>,
    ) -> T {
        let scaler = self.font.scaler();
        let context = if scaler.is_null() || self.is_invalidated() {
            ScalerContext::NULL
        } else {
            self.context
        };
        match op(scaler.as_ref(), context) {
            Ok(value) => value,
            Err(err) => {
                self.font.scaler_failed(&err);
                let null: &dyn Scaler = &NullScaler;
                op(null, ScalerContext::NULL).unwrap_or_default()
            }
        }
    }

    /// Glyph ids past the end of the font draw the missing glyph
    fn checked(&self, glyph: GlyphId) -> GlyphId {
        if self.num_glyphs > 0 && glyph >= self.num_glyphs {
            MISSING_GLYPH
        } else {
            glyph
        }
    }

    pub fn glyph_image(&self, glyph: GlyphId) -> GlyphImageHandle {
        if glyph >= INVISIBLE_GLYPHS {
            return GlyphImageHandle::EMPTY;
        }
        let glyph = self.checked(glyph);
        if let Some(handle) = self.images.get(glyph) {
            return handle;
        }

        let image = self.scale(|scaler, ctx| scaler.glyph_image(ctx, glyph));
        let handle = self.arena.allocate(image);
        let (winner, ours) = self.images.publish(glyph, handle);
        if !ours && winner != handle {
            self.arena.free([handle]);
        }
        winner
    }

    /// Fill `images` for as long as glyphs stay in this strike's range
    ///
    /// Returns how many entries were written. Composite strikes use this
    /// for the common case where a run lives entirely in slot 0.
    pub fn slot0_glyph_images(&self, glyphs: &[GlyphId], images: &mut [GlyphImageHandle]) -> usize {
        let mut written = 0;
        for (image, &glyph) in images.iter_mut().zip(glyphs) {
            if glyph > GLYPH_MASK {
                break;
            }
            *image = self.glyph_image(glyph);
            written += 1;
        }
        written
    }

    /// Advance in device space
    fn device_advance(&self, glyph: GlyphId) -> Vec2 {
        if glyph >= INVISIBLE_GLYPHS {
            return Vec2::ZERO;
        }
        let glyph = self.checked(glyph);
        if let Some(advance) = self.advances.get(&glyph) {
            return *advance;
        }
        let cached_image = self
            .images
            .get(glyph)
            .filter(|h| !h.is_empty())
            .and_then(|h| self.arena.get(h));
        let advance = match cached_image {
            Some(image) => image.advance,
            None => Vec2::new(
                f64::from(self.scale(|scaler, ctx| scaler.glyph_advance(ctx, glyph))),
                0.0,
            ),
        };
        self.advances.insert(glyph, advance);
        advance
    }

    /// Advance vector in user space
    pub fn glyph_metrics(&self, glyph: GlyphId) -> Vec2 {
        let advance = self.device_advance(glyph);
        match &self.inverse_device {
            Some(inverse) => {
                let [a, b, c, d, _, _] = inverse.as_coeffs();
                Vec2::new(a * advance.x + c * advance.y, b * advance.x + d * advance.y)
            }
            None => advance,
        }
    }

    pub fn glyph_advance(&self, glyph: GlyphId) -> f32 {
        self.glyph_metrics(glyph).x as f32
    }

    pub fn glyph_outline(&self, glyph: GlyphId, x: f32, y: f32) -> BezPath {
        if glyph >= INVISIBLE_GLYPHS {
            return BezPath::new();
        }
        let glyph = self.checked(glyph);
        self.scale(|scaler, ctx| scaler.glyph_outline(ctx, glyph, x, y))
    }

    /// Line metrics in user space, computed once
    pub fn font_metrics(&self) -> StrikeMetrics {
        *self.metrics.get_or_init(|| {
            let metrics = self.scale(|scaler, ctx| scaler.strike_metrics(ctx));
            match &self.inverse_device {
                Some(inverse) => metrics.to_user_space(inverse),
                None => metrics,
            }
        })
    }

    /// Stop using the context; it is still freed on disposal
    pub(crate) fn invalidate_context(&self) {
        if self.context.is_null() || self.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.owner.invalidate_context(self.context);
    }
}

impl Drop for PhysicalStrike {
    fn drop(&mut self) {
        let record = DisposalRecord {
            font: Arc::downgrade(&self.font),
            key: self.key.clone(),
            id: self.id,
            images: self.images.take_handles(),
            context: (!self.context.is_null()).then(|| (Arc::clone(&self.owner), self.context)),
        };
        self.font.strike_cache().disposer().submit(record);
    }
}
