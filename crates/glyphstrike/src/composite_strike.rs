//! Strikes for composite fonts
//!
//! A composite strike owns no images. Each glyph id carries its slot in the
//! top byte; the strike looks up (and remembers) the physical strike of that
//! slot's font under the same key and forwards the question.

use std::sync::{Arc, OnceLock};

use glyphstrike_core::types::{local_glyph, slot_of, GlyphId};
use glyphstrike_core::{StrikeKey, StrikeMetrics};
use kurbo::{BezPath, Vec2};

use crate::arena::GlyphImageHandle;
use crate::composite_font::ComponentTable;
use crate::disposer::DisposalRecord;
use crate::font::Font2D;
use crate::strike::{FontStrike, StrikeId};

pub struct CompositeStrike {
    id: StrikeId,
    key: StrikeKey,
    font: Arc<Font2D>,
    components: Arc<ComponentTable>,
    slots: Box<[OnceLock<Arc<FontStrike>>]>,
    metrics: OnceLock<StrikeMetrics>,
}

impl CompositeStrike {
    pub(crate) fn new(font: Arc<Font2D>, components: Arc<ComponentTable>, key: StrikeKey) -> Self {
        let slots = (0..components.num_slots().max(1))
            .map(|_| OnceLock::new())
            .collect();
        Self {
            id: StrikeId::next(),
            key,
            font,
            components,
            slots,
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

    /// Physical strike behind `slot`; out-of-range slots mean slot 0
    pub fn strike_for_slot(&self, slot: usize) -> &Arc<FontStrike> {
        let slot = if slot < self.slots.len() { slot } else { 0 };
        self.slots[slot].get_or_init(|| self.components.slot_font(slot).strike(&self.key))
    }

    /// Has the strike for `slot` been created yet?
    pub fn is_slot_loaded(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.get().is_some())
    }

    pub fn glyph_image(&self, glyph: GlyphId) -> GlyphImageHandle {
        self.strike_for_slot(slot_of(glyph))
            .glyph_image(local_glyph(glyph))
    }

    /// Batch lookup, trying slot 0 for the whole run first
    pub(crate) fn glyph_images(&self, glyphs: &[GlyphId], images: &mut [GlyphImageHandle]) {
        let done = match self.strike_for_slot(0).as_physical() {
            Some(slot0) => slot0.slot0_glyph_images(glyphs, images),
            None => 0,
        };
        for (image, &glyph) in images[done..].iter_mut().zip(&glyphs[done..]) {
            *image = self.glyph_image(glyph);
        }
    }

    pub fn glyph_metrics(&self, glyph: GlyphId) -> Vec2 {
        self.strike_for_slot(slot_of(glyph))
            .glyph_metrics(local_glyph(glyph))
    }

    pub fn glyph_advance(&self, glyph: GlyphId) -> f32 {
        self.glyph_metrics(glyph).x as f32
    }

    pub fn glyph_outline(&self, glyph: GlyphId, x: f32, y: f32) -> BezPath {
        self.strike_for_slot(slot_of(glyph))
            .glyph_outline(local_glyph(glyph), x, y)
    }

    /// Merged metrics of the metrics slots only
    ///
    /// Fallback slots never stretch the line height.
    pub fn font_metrics(&self) -> StrikeMetrics {
        *self.metrics.get_or_init(|| {
            let count = self.components.num_metrics_slots().clamp(1, self.slots.len());
            let mut metrics = self.strike_for_slot(0).font_metrics();
            for slot in 1..count {
                metrics.merge(&self.strike_for_slot(slot).font_metrics());
            }
            metrics
        })
    }
}

impl Drop for CompositeStrike {
    fn drop(&mut self) {
        let record = DisposalRecord {
            font: Arc::downgrade(&self.font),
            key: self.key.clone(),
            id: self.id,
            images: Vec::new(),
            context: None,
        };
        self.font.strike_cache().disposer().submit(record);
    }
}
