//! From characters to glyph ids
//!
//! Mappers take UTF-16 text. A surrogate pair maps to one glyph in the high
//! surrogate's position and [`INVISIBLE_GLYPH_ID`] in the low one, so the
//! glyph array always has exactly one entry per code unit.

use std::sync::Arc;

use glyphstrike_core::types::{GlyphId, INVISIBLE_GLYPH_ID, MISSING_GLYPH};
use glyphstrike_core::unicode::{
    decode_surrogates, is_default_ignorable, is_high_surrogate, is_ignorable_whitespace,
    is_low_surrogate, ComplexClassifier,
};
use glyphstrike_core::LayoutError;

/// A font's character map, as supplied by whoever parsed the font
pub trait CharMap: Send + Sync {
    /// Glyph for a code point; [`MISSING_GLYPH`] when unmapped
    fn glyph_for(&self, cp: u32) -> GlyphId;

    fn num_glyphs(&self) -> u32;
}

/// Character to glyph translation for one font
pub trait GlyphMapper: Send + Sync {
    fn num_glyphs(&self) -> u32;

    /// What unmapped characters come back as
    fn missing_glyph(&self) -> GlyphId;

    fn code_point_to_glyph(&self, cp: u32) -> GlyphId;

    /// Map a lone code unit; surrogates map to the missing glyph
    fn char_to_glyph(&self, unit: u16) -> GlyphId {
        self.code_point_to_glyph(u32::from(unit))
    }

    fn can_display(&self, cp: u32) -> bool {
        self.code_point_to_glyph(cp) != self.missing_glyph()
    }

    /// Map a run into a caller buffer at least as long as the run
    fn chars_to_glyphs_into(
        &self,
        units: &[u16],
        glyphs: &mut [GlyphId],
    ) -> Result<(), LayoutError> {
        check_output(units, glyphs)?;
        map_utf16(self, units, glyphs, None);
        Ok(())
    }

    fn chars_to_glyphs(&self, units: &[u16]) -> Vec<GlyphId> {
        let mut glyphs = vec![MISSING_GLYPH; units.len()];
        map_utf16(self, units, &mut glyphs, None);
        glyphs
    }

    /// Map a run, stopping at the first code point that needs shaping
    ///
    /// Returns `Ok(true)` if mapping stopped early; the run must then go
    /// through the shaper and the buffer contents are incomplete.
    fn chars_to_glyphs_ns(
        &self,
        units: &[u16],
        glyphs: &mut [GlyphId],
    ) -> Result<bool, LayoutError> {
        check_output(units, glyphs)?;
        let classifier = ComplexClassifier::new();
        Ok(map_utf16(self, units, glyphs, Some(&classifier)))
    }

    fn code_points_to_glyphs(&self, cps: &[u32]) -> Vec<GlyphId> {
        cps.iter().map(|&cp| self.code_point_to_glyph(cp)).collect()
    }
}

fn check_output(units: &[u16], glyphs: &[GlyphId]) -> Result<(), LayoutError> {
    if glyphs.len() < units.len() {
        return Err(LayoutError::OutputTooShort {
            required: units.len(),
            actual: glyphs.len(),
        });
    }
    Ok(())
}

/// Returns true if `classifier` asked to stop
fn map_utf16<M: GlyphMapper + ?Sized>(
    mapper: &M,
    units: &[u16],
    glyphs: &mut [GlyphId],
    classifier: Option<&ComplexClassifier>,
) -> bool {
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        let mut step = 1;
        let mut cp = u32::from(unit);
        if is_high_surrogate(unit) && i + 1 < units.len() && is_low_surrogate(units[i + 1]) {
            cp = decode_surrogates(unit, units[i + 1]);
            glyphs[i + 1] = INVISIBLE_GLYPH_ID;
            step = 2;
        }
        glyphs[i] = mapper.code_point_to_glyph(cp);
        if classifier.is_some_and(|c| c.needs_shaping(cp)) {
            return true;
        }
        i += step;
    }
    false
}

/// Mapper over a physical font's character map
///
/// Control characters that never draw (TAB, LF, CR) and default-ignorable
/// code points the font lacks come back invisible instead of missing.
pub struct CmapGlyphMapper {
    char_map: Arc<dyn CharMap>,
}

impl CmapGlyphMapper {
    pub fn new(char_map: Arc<dyn CharMap>) -> Self {
        Self { char_map }
    }
}

impl GlyphMapper for CmapGlyphMapper {
    fn num_glyphs(&self) -> u32 {
        self.char_map.num_glyphs()
    }

    fn missing_glyph(&self) -> GlyphId {
        MISSING_GLYPH
    }

    fn code_point_to_glyph(&self, cp: u32) -> GlyphId {
        if is_ignorable_whitespace(cp) {
            return INVISIBLE_GLYPH_ID;
        }
        let glyph = self.char_map.glyph_for(cp);
        let num_glyphs = self.char_map.num_glyphs();
        if glyph != MISSING_GLYPH && (num_glyphs == 0 || glyph < num_glyphs) {
            return glyph;
        }
        if is_default_ignorable(cp) {
            INVISIBLE_GLYPH_ID
        } else {
            MISSING_GLYPH
        }
    }
}
