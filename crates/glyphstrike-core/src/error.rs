//! Error types for glyphstrike

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GlyphStrikeError>;

/// Main error type for glyphstrike
///
/// Glyph queries never return these: scaler trouble degrades to empty
/// glyphs. What remains are font registration failures and caller mistakes.
#[derive(Debug, Error)]
pub enum GlyphStrikeError {
    #[error("Font loading failed: {0}")]
    FontLoad(#[from] FontLoadError),

    #[error("Scaler failed: {0}")]
    Scaler(#[from] ScalerError),

    #[error("Layout request rejected: {0}")]
    Layout(#[from] LayoutError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Font loading errors
#[derive(Debug, Error)]
pub enum FontLoadError {
    #[error("Font file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid font data: {0}")]
    InvalidData(String),

    #[error("Not a physical font: {0}")]
    NotPhysical(String),

    #[error("Font not registered: {0}")]
    NotRegistered(String),

    #[error("Composite font {name} has no slots")]
    EmptyComposite { name: String },

    #[error("Composite font {name} declares {slots} slots, at most {max} are addressable")]
    TooManySlots { name: String, slots: usize, max: usize },
}

/// Failures reported by a [`Scaler`](crate::scaler::Scaler)
///
/// Any of these means the scaler must not be used again for the font.
#[derive(Debug, Clone, Error)]
pub enum ScalerError {
    #[error("Corrupt font data: {0}")]
    CorruptFont(String),

    #[error("Native scaler failure: {0}")]
    Native(String),

    #[error("Scaler context is no longer valid")]
    InvalidContext,
}

/// Malformed caller input to mapping and layout APIs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("Invalid run {start}..{limit} for text of length {len}")]
    InvalidRange {
        start: usize,
        limit: usize,
        len: usize,
    },

    #[error("Output buffer holds {actual} glyphs, {required} required")]
    OutputTooShort { required: usize, actual: usize },

    #[error("Invalid point size: {0}")]
    InvalidSize(f32),
}
