//! Fonts, the handles that point at them, and how strikes get made
//!
//! [`Font2D`] is the engine's font: physical (backed by a scaler and a
//! character map) or composite (a list of physical slot fonts). Each font
//! keeps a registry of its live strikes and hands them out through
//! [`Font2D::strike`]:
//!
//! 1. The strike handed out last time, if the key matches
//! 2. A live strike from the registry
//! 3. A new strike, built without holding any lock, then published; if
//!    another thread published first, its strike wins and ours is dropped
//!
//! Callers hold fonts through a [`Font2DHandle`], which the font manager can
//! redirect when a font turns out to be bad.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use glyphstrike_core::transform::vertical_scale;
use glyphstrike_core::types::GlyphId;
use glyphstrike_core::{
    FractionalMetricsHint, LayoutError, NullScaler, Retention, Scaler, ScalerError, StrikeKey,
    Style, TextAntialiasHint,
};
use kurbo::Affine;
use parking_lot::RwLock;

use crate::composite_font::CompositeFont;
use crate::composite_mapper::CompositeGlyphMapper;
use crate::composite_strike::CompositeStrike;
use crate::mapper::{CharMap, CmapGlyphMapper, GlyphMapper};
use crate::physical_strike::PhysicalStrike;
use crate::registry::StrikeRegistry;
use crate::strike::FontStrike;
use crate::strike_cache::StrikeCache;

static NEXT_FONT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(u64);

impl FontId {
    fn next() -> Self {
        FontId(NEXT_FONT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a font came from; lower ranks win name conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum FontRank {
    Bundled = 1,
    FontConfig = 2,
    TrueType = 3,
    Type1 = 4,
    Native = 5,
    #[default]
    Unknown = 6,
}

/// Names and style of a font
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDescriptor {
    pub family: String,
    pub full_name: String,
    pub style: Style,
    pub rank: FontRank,
}

impl FontDescriptor {
    pub fn new(family: impl Into<String>, full_name: impl Into<String>, style: Style) -> Self {
        Self {
            family: family.into(),
            full_name: full_name.into(),
            style,
            rank: FontRank::Unknown,
        }
    }

    pub fn with_rank(mut self, rank: FontRank) -> Self {
        self.rank = rank;
        self
    }
}

/// One `gasp` record: sizes up to `max_ppem` use `flags`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaspRange {
    pub max_ppem: u16,
    pub flags: u16,
}

/// A font's grid-fitting and scan-conversion table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GaspTable {
    ranges: Vec<GaspRange>,
}

impl GaspTable {
    /// Gray-scale rendering requested
    pub const DO_GRAY: u16 = 0x0002;

    pub fn new(mut ranges: Vec<GaspRange>) -> Self {
        ranges.sort_by_key(|r| r.max_ppem);
        Self { ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether this table asks for antialiasing at `ppem`
    ///
    /// Sizes past the last range antialias.
    pub fn use_aa(&self, ppem: f64) -> bool {
        let ppem = ppem.round().clamp(0.0, f64::from(u16::MAX)) as u16;
        self.ranges
            .iter()
            .find(|r| ppem <= r.max_ppem)
            .map_or(true, |r| r.flags & Self::DO_GRAY != 0)
    }
}

/// A font file's worth of glyphs behind a scaler
pub struct PhysicalFont {
    descriptor: FontDescriptor,
    path: Option<PathBuf>,
    char_map: Arc<dyn CharMap>,
    scaler: RwLock<Arc<dyn Scaler>>,
    gasp: Option<GaspTable>,
}

impl PhysicalFont {
    pub fn new(
        descriptor: FontDescriptor,
        char_map: Arc<dyn CharMap>,
        scaler: Arc<dyn Scaler>,
    ) -> Self {
        Self {
            descriptor,
            path: None,
            char_map,
            scaler: RwLock::new(scaler),
            gasp: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_gasp(mut self, gasp: GaspTable) -> Self {
        self.gasp = Some(gasp);
        self
    }

    pub fn descriptor(&self) -> &FontDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn char_map(&self) -> &Arc<dyn CharMap> {
        &self.char_map
    }

    pub fn scaler(&self) -> Arc<dyn Scaler> {
        self.scaler.read().clone()
    }

    fn replace_scaler(&self, scaler: Arc<dyn Scaler>) -> Arc<dyn Scaler> {
        std::mem::replace(&mut *self.scaler.write(), scaler)
    }

    /// Antialias at this size when the caller asked for gasp behaviour?
    ///
    /// Without a usable gasp table bold fonts always antialias, others
    /// only at 8pt and below or 18pt and above.
    pub fn use_aa_for_size(&self, size: f64) -> bool {
        match &self.gasp {
            Some(gasp) if !gasp.is_empty() => gasp.use_aa(size),
            _ => self.descriptor.style.contains(Style::BOLD) || size <= 8.0 || size >= 18.0,
        }
    }
}

pub enum FontKind {
    Physical(PhysicalFont),
    Composite(CompositeFont),
}

/// Told when a font's scaler fails, so the font can be replaced
pub trait BadFontSink: Send + Sync {
    fn deregister_bad_font(&self, font: &Arc<Font2D>);
}

/// The engine's font
pub struct Font2D {
    id: FontId,
    kind: FontKind,
    cache: Arc<StrikeCache>,
    strikes: StrikeRegistry,
    mapper: RwLock<Option<Arc<dyn GlyphMapper>>>,
    bad: AtomicBool,
    bad_font_sink: RwLock<Option<Weak<dyn BadFontSink>>>,
}

impl Font2D {
    pub fn physical(font: PhysicalFont, cache: Arc<StrikeCache>) -> Arc<Self> {
        Self::with_kind(FontKind::Physical(font), cache)
    }

    pub fn composite(font: CompositeFont, cache: Arc<StrikeCache>) -> Arc<Self> {
        Self::with_kind(FontKind::Composite(font), cache)
    }

    fn with_kind(kind: FontKind, cache: Arc<StrikeCache>) -> Arc<Self> {
        Arc::new(Self {
            id: FontId::next(),
            kind,
            cache,
            strikes: StrikeRegistry::new(),
            mapper: RwLock::new(None),
            bad: AtomicBool::new(false),
            bad_font_sink: RwLock::new(None),
        })
    }

    pub fn id(&self) -> FontId {
        self.id
    }

    pub fn kind(&self) -> &FontKind {
        &self.kind
    }

    pub fn descriptor(&self) -> &FontDescriptor {
        match &self.kind {
            FontKind::Physical(font) => font.descriptor(),
            FontKind::Composite(font) => font.descriptor(),
        }
    }

    pub fn family_name(&self) -> &str {
        &self.descriptor().family
    }

    pub fn full_name(&self) -> &str {
        &self.descriptor().full_name
    }

    pub fn style(&self) -> Style {
        self.descriptor().style
    }

    pub fn rank(&self) -> FontRank {
        self.descriptor().rank
    }

    pub fn as_physical(&self) -> Option<&PhysicalFont> {
        match &self.kind {
            FontKind::Physical(font) => Some(font),
            FontKind::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeFont> {
        match &self.kind {
            FontKind::Composite(font) => Some(font),
            FontKind::Physical(_) => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, FontKind::Composite(_))
    }

    pub fn strike_cache(&self) -> &Arc<StrikeCache> {
        &self.cache
    }

    /// Current scaler; the null scaler once the font has gone bad
    pub fn scaler(&self) -> Arc<dyn Scaler> {
        match &self.kind {
            FontKind::Physical(font) => font.scaler(),
            FontKind::Composite(_) => Arc::new(NullScaler),
        }
    }

    /// This font's glyph mapper, created on first use
    pub fn mapper(&self) -> Arc<dyn GlyphMapper> {
        if let Some(mapper) = self.mapper.read().as_ref() {
            return Arc::clone(mapper);
        }
        let mut slot = self.mapper.write();
        let mapper = slot.get_or_insert_with(|| {
            let mapper: Arc<dyn GlyphMapper> = match &self.kind {
                FontKind::Physical(font) => {
                    Arc::new(CmapGlyphMapper::new(Arc::clone(font.char_map())))
                }
                FontKind::Composite(font) => {
                    Arc::new(CompositeGlyphMapper::new(Arc::clone(font.components())))
                }
            };
            mapper
        });
        Arc::clone(mapper)
    }

    /// Forget cached mappings after the slot list changed
    pub(crate) fn reset_mapper(&self) {
        self.mapper.write().take();
    }

    pub fn num_glyphs(&self) -> u32 {
        match &self.kind {
            FontKind::Physical(font) => font.char_map().num_glyphs(),
            FontKind::Composite(_) => self.mapper().num_glyphs(),
        }
    }

    pub fn missing_glyph(&self) -> GlyphId {
        self.mapper().missing_glyph()
    }

    pub fn char_to_glyph(&self, cp: u32) -> GlyphId {
        self.mapper().code_point_to_glyph(cp)
    }

    pub fn can_display(&self, cp: u32) -> bool {
        self.mapper().can_display(cp)
    }

    /// Gasp decision for a size in pixels; composites ask slot 0
    pub fn use_aa_for_size(&self, size: f64) -> bool {
        match &self.kind {
            FontKind::Physical(font) => font.use_aa_for_size(size),
            FontKind::Composite(font) => font.slot_font(0).use_aa_for_size(size),
        }
    }

    pub fn is_bad(&self) -> bool {
        self.bad.load(Ordering::Acquire)
    }

    /// Who to tell if this font's scaler fails
    pub fn set_bad_font_sink(&self, sink: Weak<dyn BadFontSink>) {
        *self.bad_font_sink.write() = Some(sink);
    }

    /// Resolve hints and build the key for `size` points under `ctx`
    pub fn strike_key(
        &self,
        size: f64,
        font_tx: Option<Affine>,
        style: Style,
        ctx: &RenderContext,
    ) -> StrikeKey {
        let aa = ctx.antialias.resolve(|| {
            let mut tx = ctx.transform * Affine::scale(size);
            if let Some(font_tx) = font_tx {
                tx = tx * font_tx;
            }
            self.use_aa_for_size(vertical_scale(&tx))
        });
        StrikeKey::for_size(
            ctx.transform,
            size,
            font_tx,
            style,
            aa,
            ctx.fractional_metrics.resolve(),
        )
    }

    /// The strike for `key`, creating it if nobody has it
    pub fn strike(self: &Arc<Self>, key: &StrikeKey) -> Arc<FontStrike> {
        if let Some(strike) = self.strikes.last_used(key) {
            self.cache.touch(&strike);
            return strike;
        }
        if let Some((strike, retention)) = self.strikes.lookup(key) {
            self.strikes.set_last(&strike);
            self.cache.retain(&strike, retention);
            return strike;
        }

        let retention = self.retention_for(key);
        let created = Arc::new(match &self.kind {
            FontKind::Physical(_) => {
                FontStrike::Physical(PhysicalStrike::new(Arc::clone(self), key.clone()))
            }
            FontKind::Composite(font) => FontStrike::Composite(CompositeStrike::new(
                Arc::clone(self),
                Arc::clone(font.components()),
                key.clone(),
            )),
        });
        let published = self.strikes.publish(key.clone(), created, retention);
        if published.discarded.is_some() {
            log::trace!("{}: lost strike creation race", self.full_name());
        }
        drop(published.discarded);

        self.strikes.set_last(&published.strike);
        self.cache.retain(&published.strike, published.retention);
        published.strike
    }

    /// Strike for `size` points rendered under `ctx`
    pub fn strike_for(
        self: &Arc<Self>,
        size: f64,
        font_tx: Option<Affine>,
        style: Style,
        ctx: &RenderContext,
    ) -> Arc<FontStrike> {
        self.strike(&self.strike_key(size, font_tx, style, ctx))
    }

    fn retention_for(&self, key: &StrikeKey) -> Retention {
        let config = self.cache.config();
        let class = key.transform_class();
        if config.reference_policy == Retention::Evictable
            || class.is_general()
            || (class.is_general_rotation() && self.strikes.len() > config.weak_strike_threshold)
        {
            Retention::Evictable
        } else {
            Retention::Sticky
        }
    }

    /// Registry entries, including ones whose strike is being disposed
    pub fn strike_count(&self) -> usize {
        self.strikes.len()
    }

    pub fn has_strike(&self, key: &StrikeKey) -> bool {
        self.strikes.contains(key)
    }

    pub(crate) fn forget_strike(&self, key: &StrikeKey, id: crate::strike::StrikeId) -> bool {
        self.strikes.forget(key, id)
    }

    /// Retire the scaler after a failure; only the first report counts
    pub(crate) fn scaler_failed(self: &Arc<Self>, err: &ScalerError) {
        if self.bad.swap(true, Ordering::AcqRel) {
            return;
        }
        log::error!(
            "Scaler for {} failed: {}; rendering it with the null scaler",
            self.full_name(),
            err
        );

        if let FontKind::Physical(font) = &self.kind {
            let broken = font.replace_scaler(Arc::new(NullScaler));
            let live = self.strikes.live_strikes();
            for strike in &live {
                if let Some(strike) = strike.as_physical() {
                    strike.invalidate_context();
                }
            }
            drop(live);
            broken.dispose();
        }

        let sink = self
            .bad_font_sink
            .read()
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(sink) = sink {
            sink.deregister_bad_font(self);
        }
    }
}

impl std::fmt::Debug for Font2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font2D")
            .field("id", &self.id)
            .field("name", &self.full_name())
            .field("composite", &self.is_composite())
            .field("bad", &self.is_bad())
            .finish()
    }
}

/// Rendering state a strike key is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub transform: Affine,
    pub antialias: TextAntialiasHint,
    pub fractional_metrics: FractionalMetricsHint,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            antialias: TextAntialiasHint::Default,
            fractional_metrics: FractionalMetricsHint::Default,
        }
    }
}

/// Stable reference to a font that may be swapped out
#[derive(Debug)]
pub struct Font2DHandle {
    font: RwLock<Arc<Font2D>>,
}

impl Font2DHandle {
    pub fn new(font: Arc<Font2D>) -> Arc<Self> {
        Arc::new(Self {
            font: RwLock::new(font),
        })
    }

    pub fn font(&self) -> Arc<Font2D> {
        self.font.read().clone()
    }

    pub(crate) fn redirect(&self, font: Arc<Font2D>) -> Arc<Font2D> {
        std::mem::replace(&mut *self.font.write(), font)
    }
}

/// What a caller asks for: a font, a size, a style
#[derive(Debug, Clone)]
pub struct FontSpec {
    handle: Arc<Font2DHandle>,
    size: f32,
    style: Style,
    transform: Option<Affine>,
}

impl FontSpec {
    pub fn new(handle: Arc<Font2DHandle>, size: f32, style: Style) -> Result<Self, LayoutError> {
        if !size.is_finite() || size < 0.0 {
            return Err(LayoutError::InvalidSize(size));
        }
        Ok(Self {
            handle,
            size,
            style,
            transform: None,
        })
    }

    /// Extra transform applied to glyphs before the device transform
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = (transform != Affine::IDENTITY).then_some(transform);
        self
    }

    pub fn handle(&self) -> &Arc<Font2DHandle> {
        &self.handle
    }

    pub fn font2d(&self) -> Arc<Font2D> {
        self.handle.font()
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn transform(&self) -> Option<Affine> {
        self.transform
    }

    pub fn strike_key(&self, ctx: &RenderContext) -> StrikeKey {
        self.font2d()
            .strike_key(f64::from(self.size), self.transform, self.style, ctx)
    }

    pub fn strike(&self, ctx: &RenderContext) -> Arc<FontStrike> {
        let font = self.font2d();
        let key = font.strike_key(f64::from(self.size), self.transform, self.style, ctx);
        font.strike(&key)
    }
}
