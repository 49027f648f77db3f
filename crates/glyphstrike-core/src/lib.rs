//! Glyphstrike Core: the vocabulary of the strike cache
//!
//! A strike is every glyph of one font rendered one particular way. This
//! crate holds the small pieces everything else is built from:
//!
//! - [`key`] - [`StrikeKey`], the identity of a rendering configuration,
//!   plus the hints and style bits that feed it
//! - [`scaler`] - the [`Scaler`] contract a rasterizer implements, and the
//!   [`NullScaler`] that stands in when one breaks
//! - [`transform`] - translation stripping and transform classification
//! - [`unicode`] - surrogates, ignorables and the "does this need shaping?"
//!   test
//! - [`config`] - cache tunables and their environment overrides
//! - [`error`] - the error taxonomy
//!
//! The engine itself (fonts, strikes, the cache and glyph mappers) lives in
//! the `glyphstrike` crate.

pub mod config;
pub mod error;
pub mod key;
pub mod scaler;
pub mod transform;
pub mod unicode;

pub use config::{DisposalMode, Retention, StrikeCacheConfig};
pub use error::{FontLoadError, GlyphStrikeError, LayoutError, Result, ScalerError};
pub use key::{
    AntiAliasMode, FractionalMetrics, FractionalMetricsHint, StrikeKey, Style, TextAntialiasHint,
};
pub use scaler::{
    ContextParams, GlyphImage, ImageFormat, NullScaler, Scaler, ScalerContext, StrikeMetrics,
};
pub use transform::TransformClass;

/// Glyph ids and the composite id encoding
pub mod types {
    /// Glyph identifier; composite fonts pack a slot into the top byte
    pub type GlyphId = u32;

    /// Glyph that draws nothing and takes no space
    pub const INVISIBLE_GLYPH_ID: GlyphId = 0xFFFF;

    /// Physical strikes treat ids at or above this as invisible
    pub const INVISIBLE_GLYPHS: GlyphId = 0xFFFE;

    /// The missing glyph of a physical font
    pub const MISSING_GLYPH: GlyphId = 0;

    /// Composite cache marker for "not looked up yet"
    pub const UNINITIALIZED_GLYPH: GlyphId = u32::MAX;

    pub const SLOT_SHIFT: u32 = 24;
    pub const SLOT_MASK: GlyphId = 0xFF00_0000;
    pub const GLYPH_MASK: GlyphId = 0x00FF_FFFF;

    /// Slots a composite glyph id can address; the last value is reserved
    /// so that no composite id collides with [`UNINITIALIZED_GLYPH`]
    pub const MAX_SLOTS: usize = 255;

    /// Pack a slot and a physical glyph id
    pub const fn composite_glyph(slot: usize, glyph: GlyphId) -> GlyphId {
        ((slot as GlyphId) << SLOT_SHIFT) | (glyph & GLYPH_MASK)
    }

    /// Slot encoded in a composite glyph id
    pub const fn slot_of(glyph: GlyphId) -> usize {
        (glyph >> SLOT_SHIFT) as usize
    }

    /// Physical glyph id encoded in a composite glyph id
    pub const fn local_glyph(glyph: GlyphId) -> GlyphId {
        glyph & GLYPH_MASK
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn composite_ids_pack_slot_in_top_byte() {
            let id = composite_glyph(3, 0x1234);
            assert_eq!(id, 0x0300_1234);
            assert_eq!(slot_of(id), 3);
            assert_eq!(local_glyph(id), 0x1234);
            assert_ne!(composite_glyph(MAX_SLOTS - 1, GLYPH_MASK), UNINITIALIZED_GLYPH);
        }
    }
}
