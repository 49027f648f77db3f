//! Glyphstrike: strike caching and composite font resolution
//!
//! Rendering text means asking the same questions over and over: what does
//! glyph 42 of this font look like at 12pt, antialiased, under this
//! transform? This crate remembers the answers.
//!
//! ## The Pieces
//!
//! - [`Font2D`] - a physical font (scaler plus character map) or a
//!   composite font (ordered physical slots, some loaded lazily)
//! - [`FontStrike`] - one font in one rendering configuration, caching
//!   images, advances and line metrics
//! - [`StrikeCache`] - keeps recently used strikes alive, owns the image
//!   arena, and disposes of strikes nobody holds anymore
//! - [`GlyphMapper`] - characters to glyph ids, across slots for composites
//! - [`FontManager`] - registration, lookup by name, and swapping out fonts
//!   whose scaler broke
//! - [`GlyphLayout`] - runs of text to positioned glyphs, with a [`Shaper`]
//!   hook for complex scripts
//!
//! ## Quick Look
//!
//! ```rust
//! use std::sync::Arc;
//! use glyphstrike::{
//!     CharMap, Font2D, FontDescriptor, PhysicalFont, RenderContext, StrikeCache,
//! };
//! use glyphstrike_core::{DisposalMode, NullScaler, StrikeCacheConfig, Style};
//!
//! struct Ascii;
//! impl CharMap for Ascii {
//!     fn glyph_for(&self, cp: u32) -> u32 {
//!         if (0x20..0x7F).contains(&cp) { cp - 0x1F } else { 0 }
//!     }
//!     fn num_glyphs(&self) -> u32 { 0x61 }
//! }
//!
//! let cache = StrikeCache::new(StrikeCacheConfig {
//!     disposal: DisposalMode::Inline,
//!     ..StrikeCacheConfig::default()
//! });
//! let font = Font2D::physical(
//!     PhysicalFont::new(
//!         FontDescriptor::new("Mono", "Mono Regular", Style::PLAIN),
//!         Arc::new(Ascii),
//!         Arc::new(NullScaler),
//!     ),
//!     cache,
//! );
//!
//! let strike = font.strike_for(12.0, None, Style::PLAIN, &RenderContext::default());
//! let glyph = font.char_to_glyph('A' as u32);
//! assert_eq!(glyph, 0x22);
//! assert!(strike.glyph_image(glyph).is_empty());
//! ```

pub mod arena;
pub mod composite_font;
pub mod composite_mapper;
pub mod composite_strike;
mod disposer;
pub mod font;
pub mod layout;
pub mod manager;
pub mod mapper;
pub mod physical_strike;
mod registry;
pub mod strike;
pub mod strike_cache;

pub use arena::{ArenaStats, GlyphImageArena, GlyphImageHandle};
pub use composite_font::{
    CompositeFont, CompositeFontBuilder, CompositeSlot, SlotResolver, SlotSource,
};
pub use composite_mapper::CompositeGlyphMapper;
pub use composite_strike::CompositeStrike;
pub use font::{
    BadFontSink, Font2D, Font2DHandle, FontDescriptor, FontId, FontKind, FontRank, FontSpec,
    GaspRange, GaspTable, PhysicalFont, RenderContext,
};
pub use layout::{GlyphBuffer, GlyphLayout, ShapeRequest, Shaper, TextRun};
pub use manager::{CompositeSpec, Fallback, FontFileLoader, FontManager};
pub use mapper::{CharMap, CmapGlyphMapper, GlyphMapper};
pub use physical_strike::PhysicalStrike;
pub use strike::{FontStrike, StrikeId};
pub use strike_cache::{StrikeCache, StrikeCacheStats};
