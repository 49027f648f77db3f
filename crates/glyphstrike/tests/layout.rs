mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use glyphstrike::{
    Font2DHandle, FontSpec, GlyphBuffer, GlyphLayout, RenderContext, ShapeRequest, Shaper,
    TextRun,
};
use glyphstrike_core::types::INVISIBLE_GLYPH_ID;
use glyphstrike_core::{GlyphStrikeError, LayoutError, Style};
use icu_properties::props::Script;
use kurbo::{Point, Vec2};

/// Emits a single glyph 99 per run, or declines
struct OneGlyphShaper {
    accept: bool,
    calls: AtomicUsize,
}

impl OneGlyphShaper {
    fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Shaper for OneGlyphShaper {
    fn name(&self) -> &'static str {
        "one-glyph"
    }

    fn shape(&self, request: &ShapeRequest<'_>, out: &mut GlyphBuffer) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.accept {
            out.push(99, Point::ORIGIN, request.run.start);
            out.set_advance(Vec2::new(7.0, 0.0));
        }
        self.accept
    }
}

const CHARS: &str = "AB\u{0628}😀";

#[test]
fn simple_text_is_placed_one_glyph_per_unit() {
    init_logging();
    let cache = inline_cache();
    let font = physical_font("Sans", CHARS, StubScaler::simple(), &cache);
    let strike = font.strike(&key(12.0));
    let text = utf16("AB");

    let out = GlyphLayout::new()
        .layout_run(&font, &strike, 12.0, &text, &TextRun::new(0..2, Script::Latin))
        .unwrap();
    assert_eq!(out.glyphs(), &[1, 2]);
    assert_eq!(out.positions(), &[Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    assert_eq!(out.char_indices(), &[0, 1]);
    assert_eq!(out.advance(), Vec2::new(20.0, 0.0));
}

#[test]
fn complex_runs_go_to_the_shaper() {
    let cache = inline_cache();
    let font = physical_font("Sans", CHARS, StubScaler::simple(), &cache);
    let strike = font.strike(&key(12.0));
    let text = utf16("A\u{0628}");
    let shaper = OneGlyphShaper::new(true);

    let out = GlyphLayout::with_shaper(shaper.clone())
        .layout_run(&font, &strike, 12.0, &text, &TextRun::new(0..2, Script::Arabic))
        .unwrap();
    assert_eq!(shaper.calls.load(Ordering::SeqCst), 1);
    assert_eq!(out.glyphs(), &[99]);
    assert_eq!(out.advance(), Vec2::new(7.0, 0.0));

    // Simple runs never reach it
    GlyphLayout::with_shaper(shaper.clone())
        .layout_run(&font, &strike, 12.0, &text, &TextRun::new(0..1, Script::Latin))
        .unwrap();
    assert_eq!(shaper.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn declined_runs_are_mapped_in_full() {
    let cache = inline_cache();
    let font = physical_font("Sans", CHARS, StubScaler::simple(), &cache);
    let strike = font.strike(&key(12.0));
    let text = utf16("A\u{0628}B");
    let run = TextRun::new(0..3, Script::Arabic);

    let shaper = OneGlyphShaper::new(false);
    let declined = GlyphLayout::with_shaper(shaper.clone())
        .layout_run(&font, &strike, 12.0, &text, &run)
        .unwrap();
    assert_eq!(shaper.calls.load(Ordering::SeqCst), 1);
    assert_eq!(declined.glyphs(), &[1, 3, 2]);
    assert_eq!(declined.advance(), Vec2::new(30.0, 0.0));

    let unshaped = GlyphLayout::new()
        .layout_run(&font, &strike, 12.0, &text, &run)
        .unwrap();
    assert_eq!(unshaped, declined);
}

#[test]
fn surrogate_pairs_advance_once() {
    let cache = inline_cache();
    let font = physical_font("Sans", CHARS, StubScaler::simple(), &cache);
    let strike = font.strike(&key(12.0));
    let text = utf16("😀A");

    let out = GlyphLayout::new()
        .layout_run(&font, &strike, 12.0, &text, &TextRun::new(0..3, Script::Common))
        .unwrap();
    assert_eq!(out.glyphs(), &[4, INVISIBLE_GLYPH_ID, 1]);
    assert_eq!(out.positions()[1], Point::new(10.0, 0.0));
    assert_eq!(out.positions()[2], Point::new(10.0, 0.0));
    assert_eq!(out.advance(), Vec2::new(20.0, 0.0));
}

#[test]
fn runs_outside_the_text_are_rejected() {
    let cache = inline_cache();
    let font = physical_font("Sans", CHARS, StubScaler::simple(), &cache);
    let strike = font.strike(&key(12.0));
    let text = utf16("ABA");

    let err = GlyphLayout::new()
        .layout_run(&font, &strike, 12.0, &text, &TextRun::new(2..5, Script::Latin))
        .unwrap_err();
    assert!(matches!(
        err,
        GlyphStrikeError::Layout(LayoutError::InvalidRange {
            start: 2,
            limit: 5,
            len: 3
        })
    ));
}

#[test]
fn consecutive_runs_continue_the_pen() {
    let cache = inline_cache();
    let font = physical_font("Sans", CHARS, StubScaler::simple(), &cache);
    let spec = FontSpec::new(Font2DHandle::new(font), 12.0, Style::PLAIN).unwrap();
    let text = utf16("AB\u{0628}");
    let runs = [
        TextRun::new(0..2, Script::Latin),
        TextRun::new(2..3, Script::Arabic),
    ];

    let out = GlyphLayout::with_shaper(OneGlyphShaper::new(true))
        .layout(&spec, &RenderContext::default(), &text, &runs)
        .unwrap();
    assert_eq!(out.glyphs(), &[1, 2, 99]);
    assert_eq!(out.char_indices(), &[0, 1, 2]);
    assert_eq!(out.positions()[2], Point::new(20.0, 0.0));
    assert_eq!(out.advance(), Vec2::new(27.0, 0.0));
}

#[test]
fn font_specs_need_a_usable_size() {
    let cache = inline_cache();
    let handle = Font2DHandle::new(physical_font("Sans", CHARS, StubScaler::simple(), &cache));
    assert_eq!(
        FontSpec::new(handle.clone(), -1.0, Style::PLAIN).unwrap_err(),
        LayoutError::InvalidSize(-1.0)
    );
    assert!(FontSpec::new(handle.clone(), f32::NAN, Style::PLAIN).is_err());
    assert!(FontSpec::new(handle, 0.0, Style::PLAIN).is_ok());
}
