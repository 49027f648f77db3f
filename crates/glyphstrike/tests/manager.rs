mod common;

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use glyphstrike::{
    CompositeSlot, CompositeSpec, Fallback, Font2D, FontDescriptor, FontManager, FontRank,
    PhysicalFont,
};
use glyphstrike_core::types::composite_glyph;
use glyphstrike_core::{GlyphStrikeError, FontLoadError, Style};

struct Setup {
    manager: Arc<FontManager>,
    loader: Arc<MemoryLoader>,
    sans: Arc<Font2D>,
}

impl Drop for Setup {
    fn drop(&mut self) {
        self.manager.strike_cache().clear();
    }
}

fn ranked(name: &str, family: &str, style: Style, rank: FontRank, chars: &str) -> PhysicalFont {
    ranked_with(name, family, style, rank, chars, StubScaler::simple())
}

fn ranked_with(
    name: &str,
    family: &str,
    style: Style,
    rank: FontRank,
    chars: &str,
    scaler: Arc<StubScaler>,
) -> PhysicalFont {
    PhysicalFont::new(
        FontDescriptor::new(family, name, style).with_rank(rank),
        StubCharMap::covering(chars),
        scaler,
    )
}

fn setup() -> Setup {
    setup_with(MemoryLoader::default())
}

fn setup_with(loader: MemoryLoader) -> Setup {
    init_logging();
    let loader = Arc::new(
        loader
            .with_file("/fonts/cjk.ttf", "CJK", "CJK", "中文")
            .with_file("/fonts/hebrew.ttf", "Hebrew", "Hebrew", "אב"),
    );
    let manager = FontManager::new(inline_cache(), loader.clone());
    let sans = manager.register_physical(ranked(
        "Sans Regular",
        "Sans",
        Style::PLAIN,
        FontRank::Bundled,
        "ABC",
    ));
    manager.register_physical(ranked(
        "Sans Bold",
        "Sans",
        Style::BOLD,
        FontRank::Bundled,
        "ABC",
    ));
    Setup {
        manager,
        loader,
        sans,
    }
}

fn dialog_spec(style: Style, extra: Vec<CompositeSlot>) -> CompositeSpec {
    let mut slots = vec![CompositeSlot::deferred("CJK", "/fonts/cjk.ttf")];
    slots.extend(extra);
    CompositeSpec {
        name: "Dialog".into(),
        style,
        slots,
        num_metrics_slots: 1,
        eager: false,
    }
}

#[test]
fn lookup_by_full_name_family_and_style() {
    let s = setup();
    let m = &s.manager;

    let regular = m.find_font2d("sans regular", Style::PLAIN, Fallback::None).unwrap();
    assert!(Arc::ptr_eq(&regular, &s.sans));

    let bold = m.find_font2d("Sans", Style::BOLD, Fallback::None).unwrap();
    assert_eq!(bold.full_name(), "Sans Bold");

    // No italic member: italic falls back to bold-italic, then plain
    let italic = m.find_font2d("Sans", Style::ITALIC, Fallback::None).unwrap();
    assert!(Arc::ptr_eq(&italic, &s.sans));
    // Bold-italic prefers italic, then bold
    let bold_italic = m.find_font2d("Sans", Style::BOLD_ITALIC, Fallback::None).unwrap();
    assert_eq!(bold_italic.full_name(), "Sans Bold");

    // Cached answers match fresh ones
    let again = m.find_font2d("SANS", Style::BOLD, Fallback::None).unwrap();
    assert!(Arc::ptr_eq(&again, &bold));

    assert_eq!(m.family_names(), vec!["Sans".to_string()]);
}

#[test]
fn unknown_names_honor_the_fallback() {
    let s = setup();
    let m = &s.manager;
    m.register_composite(dialog_spec(Style::PLAIN, vec![])).unwrap();
    m.register_composite(dialog_spec(Style::BOLD, vec![])).unwrap();

    assert!(m.find_font2d("Nope", Style::PLAIN, Fallback::None).is_none());

    let physical = m.find_font2d("Nope", Style::PLAIN, Fallback::Physical).unwrap();
    assert!(Arc::ptr_eq(&physical, &s.sans));
    assert!(!physical.is_composite());

    let logical = m.find_font2d("Nope", Style::BOLD, Fallback::Logical).unwrap();
    assert!(logical.is_composite());
    assert_eq!(logical.full_name(), "Dialog.bold");

    let by_full_name = m.find_font2d("dialog.plain", Style::BOLD, Fallback::None).unwrap();
    assert_eq!(by_full_name.full_name(), "Dialog.plain");
}

#[test]
fn default_physical_font_prefers_the_configured_face() {
    let s = setup();
    let m = &s.manager;
    assert!(Arc::ptr_eq(&m.default_physical_font().unwrap(), &s.sans));

    m.set_default_face("Sans Bold");
    assert_eq!(m.default_physical_font().unwrap().full_name(), "Sans Bold");
}

#[test]
fn better_ranked_fonts_win_name_conflicts() {
    let s = setup();
    let m = &s.manager;
    m.register_physical(ranked(
        "Sans Regular",
        "Sans",
        Style::PLAIN,
        FontRank::Type1,
        "XYZ",
    ));
    let found = m.find_font2d("Sans Regular", Style::PLAIN, Fallback::None).unwrap();
    assert!(Arc::ptr_eq(&found, &s.sans));
}

#[test]
fn composites_need_a_default_font() {
    let manager = FontManager::new(inline_cache(), Arc::new(MemoryLoader::default()));
    let err = manager
        .register_composite(dialog_spec(Style::PLAIN, vec![]))
        .unwrap_err();
    assert!(matches!(
        err,
        GlyphStrikeError::FontLoad(FontLoadError::NotRegistered(_))
    ));
}

#[test]
fn deferred_slots_load_on_first_use_exactly_once() {
    let s = setup();
    let mut spec = dialog_spec(Style::PLAIN, vec![]);
    spec.slots.insert(0, CompositeSlot::font(s.sans.clone()));
    let dialog = s.manager.register_composite(spec).unwrap();
    let composite = dialog.as_composite().unwrap();

    // Latin text never touches the CJK slot
    assert_eq!(dialog.char_to_glyph('A' as u32), composite_glyph(0, 1));
    assert!(!composite.is_slot_resolved(1));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 0);

    let glyphs: Vec<u32> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| dialog.char_to_glyph('文' as u32)))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(glyphs.iter().all(|&g| g == composite_glyph(1, 2)));
    assert!(composite.is_slot_resolved(1));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 1);

    // The loaded font is registered like any other
    let cjk = s.manager.find_font2d("CJK", Style::PLAIN, Fallback::None).unwrap();
    assert!(Arc::ptr_eq(&composite.slot_font(1), &cjk));
}

#[test]
fn eager_composites_load_at_registration() {
    let s = setup();
    let mut spec = dialog_spec(Style::PLAIN, vec![]);
    spec.eager = true;
    let dialog = s.manager.register_composite(spec).unwrap();
    assert!(dialog.as_composite().unwrap().is_slot_resolved(0));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 1);
}

#[test]
fn unloadable_slots_resolve_to_the_default_font() {
    let s = setup();
    let spec = dialog_spec(
        Style::PLAIN,
        vec![
            CompositeSlot::deferred("Missing", "/fonts/missing.ttf"),
            // The file holds "Hebrew", not "Hebrew Bold"
            CompositeSlot::deferred("Hebrew Bold", "/fonts/hebrew.ttf"),
        ],
    );
    let dialog = s.manager.register_composite(spec).unwrap();
    let composite = dialog.as_composite().unwrap();

    assert!(Arc::ptr_eq(&composite.slot_font(1), &s.sans));
    assert!(Arc::ptr_eq(&composite.slot_font(2), &s.sans));
    assert_eq!(s.loader.loads("/fonts/hebrew.ttf"), 1);
}

#[test]
fn font_files_are_loaded_once() {
    let s = setup();
    let first = s.manager.register_font_file(Path::new("/fonts/cjk.ttf")).unwrap();
    let second = s.manager.register_font_file(Path::new("/fonts/cjk.ttf")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 1);
    assert_eq!(
        first.as_physical().unwrap().path(),
        Some(Path::new("/fonts/cjk.ttf"))
    );

    let err = s
        .manager
        .register_font_file(Path::new("/fonts/none.ttf"))
        .unwrap_err();
    assert!(matches!(
        err,
        GlyphStrikeError::FontLoad(FontLoadError::FileNotFound(_))
    ));
}

#[test]
fn composites_sharing_a_file_load_it_once() {
    let s = setup_with(MemoryLoader::default().slow(Duration::from_millis(100)));
    let plain = s.manager.register_composite(dialog_spec(Style::PLAIN, vec![])).unwrap();
    let bold = s.manager.register_composite(dialog_spec(Style::BOLD, vec![])).unwrap();

    let fonts: Vec<Arc<Font2D>> = thread::scope(|scope| {
        let workers: Vec<_> = [&plain, &bold]
            .into_iter()
            .map(|dialog| scope.spawn(move || dialog.as_composite().unwrap().slot_font(0)))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 1);
    assert!(Arc::ptr_eq(&fonts[0], &fonts[1]));
    assert_eq!(fonts[0].full_name(), "CJK");
}

#[test]
fn bad_fonts_are_replaced_everywhere() {
    let s = setup();
    let m = &s.manager;
    let scaler = StubScaler::simple();
    let fragile = m.register_physical(ranked_with(
        "Fragile",
        "Fragile",
        Style::PLAIN,
        FontRank::TrueType,
        "中XYZ",
        scaler.clone(),
    ));
    let handle = m.handle(&fragile);
    assert!(Arc::ptr_eq(&m.handle(&fragile), &handle));

    let dialog = m
        .register_composite(CompositeSpec {
            name: "Dialog".into(),
            style: Style::PLAIN,
            slots: vec![
                CompositeSlot::font(s.sans.clone()),
                CompositeSlot::font(fragile.clone()),
            ],
            num_metrics_slots: 1,
            eager: false,
        })
        .unwrap();
    assert_eq!(dialog.char_to_glyph('X' as u32), composite_glyph(1, 2));

    scaler.break_now();
    let strike = fragile.strike(&key(12.0));
    strike.glyph_image(2);

    assert!(fragile.is_bad());
    assert!(Arc::ptr_eq(&handle.font(), &s.sans));
    assert_eq!(m.replacement_of(fragile.id()), Some(s.sans.id()));
    assert!(m.find_font2d("Fragile", Style::PLAIN, Fallback::None).is_none());

    // A bundled replacement never goes into a composite slot
    let composite = dialog.as_composite().unwrap();
    assert!(Arc::ptr_eq(&composite.slot_font(1), &fragile));
    assert_eq!(dialog.char_to_glyph('X' as u32), composite_glyph(1, 2));

    // Replacing again is a no-op
    m.replace_font(&fragile, s.sans.clone());
    assert_eq!(m.replacement_of(fragile.id()), Some(s.sans.id()));
}

#[test]
fn composite_slots_take_only_poorly_ranked_replacements() {
    let s = setup();
    let m = &s.manager;
    let fragile = m.register_physical(ranked(
        "Fragile",
        "Fragile",
        Style::PLAIN,
        FontRank::TrueType,
        "XYZ",
    ));
    let system = m.register_physical(ranked(
        "System",
        "System",
        Style::PLAIN,
        FontRank::FontConfig,
        "ZX",
    ));
    let spare = m.register_physical(ranked(
        "Spare",
        "Spare",
        Style::PLAIN,
        FontRank::Type1,
        "QX",
    ));
    let dialog = m
        .register_composite(CompositeSpec {
            name: "Dialog".into(),
            style: Style::PLAIN,
            slots: vec![
                CompositeSlot::font(s.sans.clone()),
                CompositeSlot::font(fragile.clone()),
                CompositeSlot::font(system.clone()),
            ],
            num_metrics_slots: 1,
            eager: false,
        })
        .unwrap();
    let composite = dialog.as_composite().unwrap();
    assert_eq!(dialog.char_to_glyph('X' as u32), composite_glyph(1, 1));

    // A font-config replacement leaves the slot alone
    m.replace_font(&system, s.sans.clone());
    assert_eq!(m.replacement_of(system.id()), Some(s.sans.id()));
    assert!(Arc::ptr_eq(&composite.slot_font(2), &system));

    // A worse-ranked one takes the slot, and the mapper starts over
    m.replace_font(&fragile, spare.clone());
    assert_eq!(m.replacement_of(fragile.id()), Some(spare.id()));
    assert!(Arc::ptr_eq(&composite.slot_font(1), &spare));
    assert_eq!(dialog.char_to_glyph('X' as u32), composite_glyph(1, 2));
    assert_eq!(dialog.char_to_glyph('Y' as u32), dialog.missing_glyph());
}

#[test]
fn physical_fonts_can_front_a_composite() {
    let s = setup();
    let m = &s.manager;
    let base = m.register_composite(dialog_spec(Style::PLAIN, vec![])).unwrap();
    let custom = m.register_physical(ranked(
        "Custom",
        "Custom",
        Style::PLAIN,
        FontRank::TrueType,
        "AQ",
    ));

    let combined = m.composite_with_fallback(&custom, &base).unwrap();
    let composite = combined.as_composite().unwrap();
    assert_eq!(composite.num_slots(), 2);
    assert_eq!(composite.num_metrics_slots(), 1);
    assert_eq!(combined.full_name(), "Custom");

    // The base's deferred slot is still deferred in the copy
    assert!(!composite.is_slot_resolved(1));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 0);

    assert_eq!(combined.char_to_glyph('Q' as u32), composite_glyph(0, 2));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 0);
    assert_eq!(combined.char_to_glyph('中' as u32), composite_glyph(1, 1));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 1);

    // Base and copy end up sharing the one loaded font
    let base_composite = base.as_composite().unwrap();
    assert!(Arc::ptr_eq(&base_composite.slot_font(0), &composite.slot_font(1)));
    assert_eq!(s.loader.loads("/fonts/cjk.ttf"), 1);

    let err = m.composite_with_fallback(&base, &base).unwrap_err();
    assert!(matches!(
        err,
        GlyphStrikeError::FontLoad(FontLoadError::NotPhysical(_))
    ));
    let err = m.composite_with_fallback(&custom, &custom).unwrap_err();
    assert!(matches!(
        err,
        GlyphStrikeError::FontLoad(FontLoadError::NotRegistered(_))
    ));
}
