#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glyphstrike::{
    BadFontSink, CharMap, Font2D, FontDescriptor, FontFileLoader, FontRank, PhysicalFont,
    StrikeCache,
};
use glyphstrike_core::types::{GlyphId, MISSING_GLYPH};
use glyphstrike_core::{
    AntiAliasMode, ContextParams, DisposalMode, FontLoadError, FractionalMetrics, GlyphImage,
    ImageFormat, Scaler, ScalerContext, ScalerError, StrikeCacheConfig, StrikeKey, StrikeMetrics,
    Style,
};
use kurbo::{Affine, BezPath, Point, Rect, Shape, Vec2};

/// Scaler with fixed metrics that counts everything done to it
pub struct StubScaler {
    pub advance: f32,
    pub ascent: f64,
    pub descent: f64,
    failing: AtomicBool,
    next_context: AtomicU64,
    pub created: AtomicUsize,
    pub rasterized: AtomicUsize,
    pub invalidated: AtomicUsize,
    pub freed: AtomicUsize,
    pub disposed: AtomicUsize,
}

impl StubScaler {
    pub fn new(advance: f32, ascent: f64, descent: f64) -> Arc<Self> {
        Arc::new(Self {
            advance,
            ascent,
            descent,
            failing: AtomicBool::new(false),
            next_context: AtomicU64::new(1),
            created: AtomicUsize::new(0),
            rasterized: AtomicUsize::new(0),
            invalidated: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
            disposed: AtomicUsize::new(0),
        })
    }

    pub fn simple() -> Arc<Self> {
        Self::new(10.0, 9.0, 3.0)
    }

    /// Make every later call fail
    pub fn break_now(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ScalerError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ScalerError::CorruptFont("stub scaler broken".into()))
        } else {
            Ok(())
        }
    }
}

impl Scaler for StubScaler {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn create_context(&self, _params: &ContextParams) -> Result<ScalerContext, ScalerError> {
        self.check()?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(ScalerContext::from_raw(
            self.next_context.fetch_add(1, Ordering::SeqCst),
        ))
    }

    fn strike_metrics(&self, _context: ScalerContext) -> Result<StrikeMetrics, ScalerError> {
        self.check()?;
        Ok(StrikeMetrics {
            ascent: Vec2::new(0.0, -self.ascent),
            descent: Vec2::new(0.0, self.descent),
            baseline: Vec2::ZERO,
            leading: Vec2::new(0.0, 1.0),
            max_advance: Vec2::new(f64::from(self.advance), 0.0),
        })
    }

    fn glyph_image(&self, _context: ScalerContext, _glyph: GlyphId) -> Result<GlyphImage, ScalerError> {
        self.check()?;
        self.rasterized.fetch_add(1, Ordering::SeqCst);
        Ok(GlyphImage {
            width: 8,
            height: 10,
            row_bytes: 8,
            top_left: Point::new(0.0, -10.0),
            advance: Vec2::new(f64::from(self.advance), 0.0),
            format: ImageFormat::Gray8,
            pixels: vec![0x80; 80].into_boxed_slice(),
        })
    }

    fn glyph_advance(&self, _context: ScalerContext, _glyph: GlyphId) -> Result<f32, ScalerError> {
        self.check()?;
        Ok(self.advance)
    }

    fn glyph_outline(
        &self,
        _context: ScalerContext,
        _glyph: GlyphId,
        x: f32,
        y: f32,
    ) -> Result<BezPath, ScalerError> {
        self.check()?;
        let origin = Point::new(f64::from(x), f64::from(y));
        Ok(Rect::from_origin_size(origin, (8.0, 10.0)).to_path(0.1))
    }

    fn invalidate_context(&self, _context: ScalerContext) {
        self.invalidated.fetch_add(1, Ordering::SeqCst);
    }

    fn free_context(&self, _context: ScalerContext) {
        self.freed.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Character map over an explicit table, counting lookups
pub struct StubCharMap {
    table: HashMap<u32, GlyphId>,
    num_glyphs: u32,
    pub lookups: AtomicUsize,
}

impl StubCharMap {
    /// Map each character of `chars` to glyphs 1, 2, 3...
    pub fn covering(chars: &str) -> Arc<Self> {
        let table: HashMap<u32, GlyphId> = chars
            .chars()
            .enumerate()
            .map(|(i, ch)| (ch as u32, i as GlyphId + 1))
            .collect();
        Arc::new(Self {
            num_glyphs: 100,
            table,
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl CharMap for StubCharMap {
    fn glyph_for(&self, cp: u32) -> GlyphId {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table.get(&cp).copied().unwrap_or(MISSING_GLYPH)
    }

    fn num_glyphs(&self) -> u32 {
        self.num_glyphs
    }
}

/// Counts bad-font reports
#[derive(Default)]
pub struct CountingSink {
    pub reports: AtomicUsize,
}

impl BadFontSink for CountingSink {
    fn deregister_bad_font(&self, _font: &Arc<Font2D>) {
        self.reports.fetch_add(1, Ordering::SeqCst);
    }
}

/// What an in-memory font file contains
pub struct StubFile {
    pub family: String,
    pub full_name: String,
    pub chars: String,
    pub scaler: Arc<StubScaler>,
}

/// Loader over a fixed set of fake files
#[derive(Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, StubFile>,
    loads: parking_lot::Mutex<HashMap<PathBuf, usize>>,
    delay: Option<Duration>,
}

impl MemoryLoader {
    pub fn with_file(mut self, path: &str, family: &str, full_name: &str, chars: &str) -> Self {
        self.files.insert(
            PathBuf::from(path),
            StubFile {
                family: family.into(),
                full_name: full_name.into(),
                chars: chars.into(),
                scaler: StubScaler::simple(),
            },
        );
        self
    }

    /// Take this long over every load
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn loads(&self, path: &str) -> usize {
        self.loads
            .lock()
            .get(Path::new(path))
            .copied()
            .unwrap_or(0)
    }
}

impl FontFileLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<PhysicalFont, FontLoadError> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| FontLoadError::FileNotFound(path.display().to_string()))?;
        *self.loads.lock().entry(path.to_path_buf()).or_default() += 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let descriptor = FontDescriptor::new(&file.family, &file.full_name, Style::PLAIN)
            .with_rank(FontRank::TrueType);
        Ok(PhysicalFont::new(
            descriptor,
            StubCharMap::covering(&file.chars),
            file.scaler.clone(),
        ))
    }
}

pub fn config(disposal: DisposalMode) -> StrikeCacheConfig {
    StrikeCacheConfig {
        disposal,
        ..StrikeCacheConfig::default()
    }
}

pub fn inline_cache() -> Arc<StrikeCache> {
    StrikeCache::new(config(DisposalMode::Inline))
}

/// A cache that keeps nothing alive on its own
pub fn unretained_cache(disposal: DisposalMode) -> Arc<StrikeCache> {
    StrikeCache::new(StrikeCacheConfig {
        recent_strikes: 0,
        sticky_strikes: 0,
        ..config(disposal)
    })
}

pub fn physical_font(
    name: &str,
    chars: &str,
    scaler: Arc<StubScaler>,
    cache: &Arc<StrikeCache>,
) -> Arc<Font2D> {
    Font2D::physical(physical(name, chars, scaler), Arc::clone(cache))
}

pub fn physical(name: &str, chars: &str, scaler: Arc<StubScaler>) -> PhysicalFont {
    PhysicalFont::new(
        FontDescriptor::new(name, name, Style::PLAIN),
        StubCharMap::covering(chars),
        scaler,
    )
}

/// Plain, antialiased key for `size` points on an identity device
pub fn key(size: f64) -> StrikeKey {
    StrikeKey::for_size(
        Affine::IDENTITY,
        size,
        None,
        Style::PLAIN,
        AntiAliasMode::On,
        FractionalMetrics::Off,
    )
}

pub fn utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
