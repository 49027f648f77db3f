//! Unicode classification used by glyph mappers
//!
//! Mappers walk UTF-16 text, so surrogate handling lives here together with
//! the test that decides whether a run can skip the shaper entirely.

use icu_properties::{
    props::{GeneralCategory, Script},
    CodePointMapData, CodePointMapDataBorrowed,
};

pub const HI_SURROGATE_START: u16 = 0xD800;
pub const HI_SURROGATE_END: u16 = 0xDBFF;
pub const LO_SURROGATE_START: u16 = 0xDC00;
pub const LO_SURROGATE_END: u16 = 0xDFFF;

/// Below this code point nothing needs shaping
pub const MIN_LAYOUT_CODE_POINT: u32 = 0x0300;

/// Scripts whose glyph selection depends on context
const COMPLEX_SCRIPTS: &[Script] = &[
    Script::Arabic,
    Script::Hebrew,
    Script::Syriac,
    Script::Thaana,
    Script::Nko,
    Script::Devanagari,
    Script::Bengali,
    Script::Gurmukhi,
    Script::Gujarati,
    Script::Oriya,
    Script::Tamil,
    Script::Telugu,
    Script::Kannada,
    Script::Malayalam,
    Script::Sinhala,
    Script::Thai,
    Script::Lao,
    Script::Tibetan,
    Script::Myanmar,
    Script::Khmer,
    Script::Mongolian,
];

pub fn is_high_surrogate(unit: u16) -> bool {
    (HI_SURROGATE_START..=HI_SURROGATE_END).contains(&unit)
}

pub fn is_low_surrogate(unit: u16) -> bool {
    (LO_SURROGATE_START..=LO_SURROGATE_END).contains(&unit)
}

/// Combine a surrogate pair into a supplementary code point
pub fn decode_surrogates(high: u16, low: u16) -> u32 {
    ((u32::from(high) - u32::from(HI_SURROGATE_START)) << 10)
        + (u32::from(low) - u32::from(LO_SURROGATE_START))
        + 0x10000
}

/// TAB, LF and CR never draw anything
pub fn is_ignorable_whitespace(cp: u32) -> bool {
    matches!(cp, 0x0009 | 0x000A | 0x000D)
}

/// Variation selectors, including the supplementary block
pub fn is_variation_selector(cp: u32) -> bool {
    matches!(cp, 0x180B..=0x180D | 0xFE00..=0xFE0F | 0xE0100..=0xE01EF)
}

/// Default-ignorable code points that render as nothing when unsupported
pub fn is_default_ignorable(cp: u32) -> bool {
    matches!(
        cp,
        0x00AD
            | 0x034F
            | 0x061C
            | 0x115F..=0x1160
            | 0x17B4..=0x17B5
            | 0x180B..=0x180F
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x206F
            | 0x3164
            | 0xFE00..=0xFE0F
            | 0xFEFF
            | 0xFFA0
            | 0xFFF0..=0xFFF8
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0xE0000..=0xE0FFF
    )
}

/// Classifies code points that force a run through the shaper
pub struct ComplexClassifier {
    scripts: CodePointMapDataBorrowed<'static, Script>,
    categories: CodePointMapDataBorrowed<'static, GeneralCategory>,
}

impl ComplexClassifier {
    /// Create a classifier with ICU data baked in
    pub fn new() -> Self {
        Self {
            scripts: CodePointMapData::<Script>::new(),
            categories: CodePointMapData::<GeneralCategory>::new(),
        }
    }

    /// Does this code point need contextual shaping?
    pub fn is_complex(&self, cp: u32) -> bool {
        if cp < MIN_LAYOUT_CODE_POINT {
            return false;
        }
        // Joiners and directional controls
        if matches!(cp, 0x200C..=0x200D | 0x202A..=0x202E | 0x206A..=0x206F) {
            return true;
        }
        // Conjoining Hangul jamo
        if (0x1100..=0x11FF).contains(&cp) {
            return true;
        }
        let Some(ch) = char::from_u32(cp) else {
            return false;
        };
        if matches!(
            self.categories.get(ch),
            GeneralCategory::NonspacingMark
                | GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
        ) {
            return true;
        }
        COMPLEX_SCRIPTS.contains(&self.scripts.get(ch))
    }

    /// Complex code point or variation selector
    pub fn needs_shaping(&self, cp: u32) -> bool {
        cp >= MIN_LAYOUT_CODE_POINT && (is_variation_selector(cp) || self.is_complex(cp))
    }
}

impl Default for ComplexClassifier {
    fn default() -> Self {
        Self::new()
    }
}
