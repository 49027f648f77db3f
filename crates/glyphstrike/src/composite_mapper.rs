//! Glyph mapping across composite slots
//!
//! A character maps to the first slot, in order, whose font has it and
//! whose exclusion ranges don't cover it. The result carries the slot in
//! its top byte. Hits below the surrogate range are cached in lazily
//! allocated blocks of 256 entries. Misses are not cached.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use glyphstrike_core::types::{composite_glyph, GlyphId, UNINITIALIZED_GLYPH};

use crate::composite_font::ComponentTable;
use crate::mapper::GlyphMapper;

const BLOCK_SIZE: usize = 256;
const NUM_BLOCKS: usize = 216;
/// First code point the block cache does not cover
const CACHE_LIMIT: u32 = (BLOCK_SIZE * NUM_BLOCKS) as u32;

type Block = Box<[AtomicU32]>;

pub struct CompositeGlyphMapper {
    components: Arc<ComponentTable>,
    slot_mappers: Box<[OnceLock<Arc<dyn GlyphMapper>>]>,
    blocks: Box<[OnceLock<Block>]>,
    has_exclusions: bool,
}

impl CompositeGlyphMapper {
    pub(crate) fn new(components: Arc<ComponentTable>) -> Self {
        Self {
            slot_mappers: (0..components.num_slots()).map(|_| OnceLock::new()).collect(),
            blocks: (0..NUM_BLOCKS).map(|_| OnceLock::new()).collect(),
            has_exclusions: components.has_exclusions(),
            components,
        }
    }

    fn slot_mapper(&self, slot: usize) -> &Arc<dyn GlyphMapper> {
        self.slot_mappers[slot].get_or_init(|| self.components.slot_font(slot).mapper())
    }

    fn cached(&self, cp: u32) -> Option<GlyphId> {
        if cp >= CACHE_LIMIT {
            return None;
        }
        let block = self.blocks[cp as usize / BLOCK_SIZE].get()?;
        let glyph = block[cp as usize % BLOCK_SIZE].load(Ordering::Relaxed);
        (glyph != UNINITIALIZED_GLYPH).then_some(glyph)
    }

    fn remember(&self, cp: u32, glyph: GlyphId) {
        if cp >= CACHE_LIMIT {
            return;
        }
        let block = self.blocks[cp as usize / BLOCK_SIZE].get_or_init(|| {
            (0..BLOCK_SIZE)
                .map(|_| AtomicU32::new(UNINITIALIZED_GLYPH))
                .collect()
        });
        block[cp as usize % BLOCK_SIZE].store(glyph, Ordering::Relaxed);
    }

    /// Which slots have had their mapper loaded
    pub fn loaded_slots(&self) -> Vec<usize> {
        (0..self.slot_mappers.len())
            .filter(|&slot| self.slot_mappers[slot].get().is_some())
            .collect()
    }
}

impl GlyphMapper for CompositeGlyphMapper {
    fn num_glyphs(&self) -> u32 {
        self.slot_mapper(0).num_glyphs()
    }

    fn missing_glyph(&self) -> GlyphId {
        composite_glyph(0, self.slot_mapper(0).missing_glyph())
    }

    fn code_point_to_glyph(&self, cp: u32) -> GlyphId {
        if let Some(glyph) = self.cached(cp) {
            return glyph;
        }
        for slot in 0..self.slot_mappers.len() {
            if self.has_exclusions && self.components.is_excluded(slot, cp) {
                continue;
            }
            let mapper = self.slot_mapper(slot);
            let glyph = mapper.code_point_to_glyph(cp);
            if glyph != mapper.missing_glyph() {
                let glyph = composite_glyph(slot, glyph);
                self.remember(cp, glyph);
                return glyph;
            }
        }
        self.missing_glyph()
    }
}
