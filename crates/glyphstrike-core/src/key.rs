//! Strike keys: one value per rendering configuration
//!
//! A [`StrikeKey`] names everything that changes how a glyph is rasterized:
//! the device transform, the glyph transform (point size × font transform ×
//! graphics transform), style bits, antialiasing and fractional metrics.
//! Translation never changes a glyph's shape, so both transforms are stored
//! with translation removed and equality only ever looks at the linear part.

use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use kurbo::Affine;

use crate::transform::{linear_bits, linear_eq, strip_translation, TransformClass};

bitflags! {
    /// Font style bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Style: u8 {
        const BOLD = 0b01;
        const ITALIC = 0b10;
        const BOLD_ITALIC = Self::BOLD.bits() | Self::ITALIC.bits();
    }
}

impl Style {
    pub const PLAIN: Style = Style::empty();

    /// Suffix used when style is folded into a lookup name
    pub fn suffix(self) -> &'static str {
        match (self.contains(Style::BOLD), self.contains(Style::ITALIC)) {
            (false, false) => ".plain",
            (true, false) => ".bold",
            (false, true) => ".italic",
            (true, true) => ".bolditalic",
        }
    }

    /// Index into a four-entry style table
    pub fn index(self) -> usize {
        usize::from(self.bits() & Style::BOLD_ITALIC.bits())
    }
}

/// Resolved antialiasing mode stored in a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AntiAliasMode {
    #[default]
    Off = 1,
    On = 2,
    LcdHrgb = 4,
    LcdHbgr = 5,
    LcdVrgb = 6,
    LcdVbgr = 7,
}

impl AntiAliasMode {
    pub fn is_lcd(self) -> bool {
        (self as u8) >= AntiAliasMode::LcdHrgb as u8
    }

    /// Vertical sub-pixel order
    pub fn is_vertical(self) -> bool {
        matches!(self, AntiAliasMode::LcdVrgb | AntiAliasMode::LcdVbgr)
    }
}

/// Resolved fractional metrics mode stored in a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FractionalMetrics {
    #[default]
    Off = 1,
    On = 2,
}

/// Antialiasing as requested by the caller, before resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextAntialiasHint {
    #[default]
    Default,
    Off,
    On,
    /// Let the font's gasp table decide per size
    Gasp,
    LcdHrgb,
    LcdHbgr,
    LcdVrgb,
    LcdVbgr,
}

impl TextAntialiasHint {
    /// Resolve to a key mode; `gasp_says_aa` is consulted for [`Self::Gasp`]
    pub fn resolve(self, gasp_says_aa: impl FnOnce() -> bool) -> AntiAliasMode {
        match self {
            TextAntialiasHint::Default | TextAntialiasHint::Off => AntiAliasMode::Off,
            TextAntialiasHint::On => AntiAliasMode::On,
            TextAntialiasHint::Gasp => {
                if gasp_says_aa() {
                    AntiAliasMode::On
                } else {
                    AntiAliasMode::Off
                }
            }
            TextAntialiasHint::LcdHrgb => AntiAliasMode::LcdHrgb,
            TextAntialiasHint::LcdHbgr => AntiAliasMode::LcdHbgr,
            TextAntialiasHint::LcdVrgb => AntiAliasMode::LcdVrgb,
            TextAntialiasHint::LcdVbgr => AntiAliasMode::LcdVbgr,
        }
    }
}

/// Fractional metrics as requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FractionalMetricsHint {
    #[default]
    Default,
    Off,
    On,
}

impl FractionalMetricsHint {
    pub fn resolve(self) -> FractionalMetrics {
        match self {
            FractionalMetricsHint::On => FractionalMetrics::On,
            FractionalMetricsHint::Default | FractionalMetricsHint::Off => FractionalMetrics::Off,
        }
    }
}

/// Identifies one rendering configuration of one font
///
/// Keys are plain values: transforms are copied in, so a cached key can
/// never observe later changes to the caller's originals.
#[derive(Debug, Clone)]
pub struct StrikeKey {
    device_tx: Affine,
    glyph_tx: Affine,
    style: Style,
    aa: AntiAliasMode,
    fm: FractionalMetrics,
    packed: u32,
}

impl StrikeKey {
    /// Build a key, discarding translation on both transforms
    pub fn new(
        device_tx: Affine,
        glyph_tx: Affine,
        style: Style,
        aa: AntiAliasMode,
        fm: FractionalMetrics,
    ) -> Self {
        let packed =
            u32::from(style.bits()) | (u32::from(aa as u8) << 8) | (u32::from(fm as u8) << 16);
        Self {
            device_tx: strip_translation(device_tx),
            glyph_tx: strip_translation(glyph_tx),
            style,
            aa,
            fm,
            packed,
        }
    }

    /// Key for a font of `size` points under `device_tx`
    ///
    /// The glyph transform is `device × scale(size) × font_tx`.
    pub fn for_size(
        device_tx: Affine,
        size: f64,
        font_tx: Option<Affine>,
        style: Style,
        aa: AntiAliasMode,
        fm: FractionalMetrics,
    ) -> Self {
        let mut glyph_tx = device_tx * Affine::scale(size);
        if let Some(font_tx) = font_tx {
            glyph_tx = glyph_tx * font_tx;
        }
        Self::new(device_tx, glyph_tx, style, aa, fm)
    }

    pub fn device_transform(&self) -> Affine {
        self.device_tx
    }

    pub fn glyph_transform(&self) -> Affine {
        self.glyph_tx
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn antialias(&self) -> AntiAliasMode {
        self.aa
    }

    pub fn fractional_metrics(&self) -> FractionalMetrics {
        self.fm
    }

    /// Same configuration with different style bits
    pub fn with_style(&self, style: Style) -> Self {
        Self::new(self.device_tx, self.glyph_tx, style, self.aa, self.fm)
    }

    /// Shape class of the glyph transform
    pub fn transform_class(&self) -> TransformClass {
        TransformClass::of(&self.glyph_tx)
    }

    /// Inverse device transform, if the device transform is not identity
    pub fn inverse_device(&self) -> Option<Affine> {
        if self.device_tx == Affine::IDENTITY || self.device_tx.determinant() == 0.0 {
            None
        } else {
            Some(self.device_tx.inverse())
        }
    }
}

impl PartialEq for StrikeKey {
    fn eq(&self, other: &Self) -> bool {
        self.packed == other.packed
            && linear_eq(&self.glyph_tx, &other.glyph_tx)
            && linear_eq(&self.device_tx, &other.device_tx)
    }
}

impl Eq for StrikeKey {}

impl Hash for StrikeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.packed.hash(state);
        linear_bits(&self.glyph_tx).hash(state);
        linear_bits(&self.device_tx).hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &StrikeKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn key(glyph_tx: Affine) -> StrikeKey {
        StrikeKey::new(
            Affine::IDENTITY,
            glyph_tx,
            Style::PLAIN,
            AntiAliasMode::On,
            FractionalMetrics::Off,
        )
    }

    #[test]
    fn packed_fields_distinguish_keys() {
        let base = key(Affine::scale(12.0));
        assert_ne!(base, base.with_style(Style::BOLD));

        let lcd = StrikeKey::new(
            Affine::IDENTITY,
            Affine::scale(12.0),
            Style::PLAIN,
            AntiAliasMode::LcdHrgb,
            FractionalMetrics::Off,
        );
        assert_ne!(base, lcd);
    }

    #[test]
    fn for_size_scales_by_point_size() {
        let k = StrikeKey::for_size(
            Affine::scale(2.0),
            12.0,
            None,
            Style::PLAIN,
            AntiAliasMode::Off,
            FractionalMetrics::Off,
        );
        assert_eq!(k.glyph_transform().as_coeffs(), [24.0, 0.0, 0.0, 24.0, 0.0, 0.0]);
        assert!(k.inverse_device().is_some());
    }

    #[test]
    fn hints_resolve() {
        assert_eq!(TextAntialiasHint::Default.resolve(|| true), AntiAliasMode::Off);
        assert_eq!(TextAntialiasHint::Gasp.resolve(|| true), AntiAliasMode::On);
        assert_eq!(TextAntialiasHint::Gasp.resolve(|| false), AntiAliasMode::Off);
        assert!(TextAntialiasHint::LcdVbgr.resolve(|| false).is_vertical());
        assert!(AntiAliasMode::LcdHbgr.is_lcd());
        assert!(!AntiAliasMode::On.is_lcd());
        assert_eq!(FractionalMetricsHint::On.resolve(), FractionalMetrics::On);
    }

    #[test]
    fn style_suffix_and_index() {
        assert_eq!(Style::PLAIN.suffix(), ".plain");
        assert_eq!(Style::BOLD_ITALIC.suffix(), ".bolditalic");
        assert_eq!(Style::ITALIC.index(), 2);
    }

    proptest! {
        #[test]
        fn translation_never_affects_equality(
            a in -50.0f64..50.0,
            b in -5.0f64..5.0,
            c in -5.0f64..5.0,
            d in -50.0f64..50.0,
            tx1 in -1000.0f64..1000.0,
            ty1 in -1000.0f64..1000.0,
            tx2 in -1000.0f64..1000.0,
            ty2 in -1000.0f64..1000.0,
        ) {
            let k1 = key(Affine::new([a, b, c, d, tx1, ty1]));
            let k2 = key(Affine::new([a, b, c, d, tx2, ty2]));
            prop_assert_eq!(&k1, &k2);
            prop_assert_eq!(hash_of(&k1), hash_of(&k2));
        }
    }
}
