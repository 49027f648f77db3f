//! The font manager: names in, fonts out
//!
//! Registers physical fonts (directly or from files through a
//! [`FontFileLoader`]) and composite fonts, and answers lookups by full
//! name or family and style. Lookups are memoized in a name cache that is
//! invalidated whenever the set of fonts changes.
//!
//! The manager is also where bad fonts end up. When a font's scaler fails,
//! the manager swaps it for the default physical font everywhere it can
//! reach: every handle and the name tables. Composite slots only move when
//! the replacement ranks below FontConfig; logical fonts are never pointed
//! at a font-config font they were not configured with.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use glyphstrike_core::types::MAX_SLOTS;
use glyphstrike_core::{FontLoadError, Result, Style};
use moka::sync::Cache;
use parking_lot::{Mutex, RwLock};

use crate::composite_font::{CompositeFont, CompositeSlot, SlotResolver};
use crate::font::{
    BadFontSink, Font2D, Font2DHandle, FontDescriptor, FontId, FontRank, PhysicalFont,
};
use crate::strike_cache::StrikeCache;

/// Name cache capacity
const NAME_CACHE_SIZE: u64 = 512;

/// Family used for [`FontManager::default_logical_font`]
pub const DEFAULT_LOGICAL_FAMILY: &str = "dialog";

/// Turns font files into physical fonts
pub trait FontFileLoader: Send + Sync {
    fn load(&self, path: &Path) -> std::result::Result<PhysicalFont, FontLoadError>;
}

/// What a failed lookup falls back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    #[default]
    None,
    /// The default physical font
    Physical,
    /// The default logical (composite) font in the requested style
    Logical,
}

/// A composite font to register
#[derive(Clone)]
pub struct CompositeSpec {
    /// Logical family, e.g. "Dialog"
    pub name: String,
    pub style: Style,
    pub slots: Vec<CompositeSlot>,
    pub num_metrics_slots: usize,
    /// Load deferred slots at registration instead of first use
    pub eager: bool,
}

/// Up to four members of one family, one per style
#[derive(Default)]
struct FontFamily {
    members: [Option<Arc<Font2D>>; 4],
}

impl FontFamily {
    /// Lower ranks replace higher ones; ties keep the first
    fn insert(&mut self, font: &Arc<Font2D>) {
        let member = &mut self.members[font.style().index()];
        match member {
            Some(existing) if existing.rank() <= font.rank() => {}
            _ => *member = Some(Arc::clone(font)),
        }
    }

    fn remove(&mut self, font: &Arc<Font2D>) {
        for member in &mut self.members {
            if member.as_ref().is_some_and(|m| Arc::ptr_eq(m, font)) {
                *member = None;
            }
        }
    }

    fn get(&self, style: Style) -> Option<&Arc<Font2D>> {
        self.members[style.index()].as_ref()
    }

    /// Exact style, else the nearest one that exists
    fn closest(&self, style: Style) -> Option<Arc<Font2D>> {
        let order: [Style; 4] = match style {
            s if s == Style::BOLD => [Style::BOLD, Style::PLAIN, Style::BOLD_ITALIC, Style::ITALIC],
            s if s == Style::ITALIC => {
                [Style::ITALIC, Style::BOLD_ITALIC, Style::PLAIN, Style::BOLD]
            }
            s if s == Style::BOLD_ITALIC => {
                [Style::BOLD_ITALIC, Style::ITALIC, Style::BOLD, Style::PLAIN]
            }
            _ => [Style::PLAIN, Style::BOLD, Style::ITALIC, Style::BOLD_ITALIC],
        };
        order.iter().find_map(|&s| self.get(s).cloned())
    }

    fn is_empty(&self) -> bool {
        self.members.iter().all(Option::is_none)
    }
}

pub struct FontManager {
    this: Weak<FontManager>,
    cache: Arc<StrikeCache>,
    loader: Arc<dyn FontFileLoader>,
    physical: DashMap<String, Arc<Font2D>>,
    composites: DashMap<String, Arc<Font2D>>,
    families: DashMap<String, FontFamily>,
    files: DashMap<PathBuf, Arc<Font2D>>,
    file_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    handles: DashMap<FontId, Arc<Font2DHandle>>,
    replaced: DashMap<FontId, FontId>,
    name_cache: Cache<String, Arc<Font2D>>,
    default_face: RwLock<Option<String>>,
    default_physical: RwLock<Option<Arc<Font2D>>>,
    replace_lock: Mutex<()>,
}

impl FontManager {
    pub fn new(cache: Arc<StrikeCache>, loader: Arc<dyn FontFileLoader>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            cache,
            loader,
            physical: DashMap::new(),
            composites: DashMap::new(),
            families: DashMap::new(),
            files: DashMap::new(),
            file_locks: DashMap::new(),
            handles: DashMap::new(),
            replaced: DashMap::new(),
            name_cache: Cache::new(NAME_CACHE_SIZE),
            default_face: RwLock::new(None),
            default_physical: RwLock::new(None),
            replace_lock: Mutex::new(()),
        })
    }

    pub fn strike_cache(&self) -> &Arc<StrikeCache> {
        &self.cache
    }

    /// Prefer this physical font when a default is needed
    pub fn set_default_face(&self, name: impl Into<String>) {
        *self.default_face.write() = Some(name.into());
        self.default_physical.write().take();
    }

    fn resolver(&self) -> Weak<dyn SlotResolver> {
        self.this.clone()
    }

    fn sink(&self) -> Weak<dyn BadFontSink> {
        self.this.clone()
    }

    /// Add a physical font to the name tables
    pub fn register_physical(&self, font: PhysicalFont) -> Arc<Font2D> {
        let path = font.path().map(Path::to_path_buf);
        let font = Font2D::physical(font, Arc::clone(&self.cache));
        font.set_bad_font_sink(self.sink());

        let key = font.full_name().to_lowercase();
        let keep_existing = self
            .physical
            .get(&key)
            .is_some_and(|existing| existing.rank() <= font.rank());
        if keep_existing {
            log::debug!("{} already registered with a better rank", font.full_name());
        } else {
            self.physical.insert(key, Arc::clone(&font));
        }
        self.families
            .entry(font.family_name().to_lowercase())
            .or_default()
            .insert(&font);
        if let Some(path) = path {
            self.files.insert(path, Arc::clone(&font));
        }

        self.name_cache.invalidate_all();
        log::debug!("Registered {} ({:?})", font.full_name(), font.rank());
        font
    }

    /// Load and register the font in `path`, once per path
    pub fn register_font_file(&self, path: &Path) -> Result<Arc<Font2D>> {
        Ok(self.load_file(path)?)
    }

    fn loaded_file(&self, path: &Path) -> Option<Arc<Font2D>> {
        self.files.get(path).map(|font| Arc::clone(font.value()))
    }

    /// Loads are serialized per path so concurrent callers share one font
    fn load_file(&self, path: &Path) -> std::result::Result<Arc<Font2D>, FontLoadError> {
        if let Some(font) = self.loaded_file(path) {
            return Ok(font);
        }
        let lock = Arc::clone(self.file_locks.entry(path.to_path_buf()).or_default().value());
        let _loading = lock.lock();
        if let Some(font) = self.loaded_file(path) {
            return Ok(font);
        }
        let font = self.loader.load(path)?.with_path(path);
        Ok(self.register_physical(font))
    }

    /// Add a composite font; its full name is the family plus a style suffix
    pub fn register_composite(&self, spec: CompositeSpec) -> Result<Arc<Font2D>> {
        let fallback = self
            .default_physical_font()
            .ok_or_else(|| FontLoadError::NotRegistered("default physical font".into()))?;
        let full_name = format!("{}{}", spec.name, spec.style.suffix());
        let descriptor = FontDescriptor::new(spec.name.clone(), full_name, spec.style)
            .with_rank(FontRank::FontConfig);

        let composite = CompositeFont::builder(descriptor, fallback)
            .slots(spec.slots)
            .metrics_slots(spec.num_metrics_slots)
            .resolver(self.resolver())
            .eager(spec.eager)
            .build()?;
        let font = Font2D::composite(composite, Arc::clone(&self.cache));

        self.composites
            .insert(font.full_name().to_lowercase(), Arc::clone(&font));
        self.families
            .entry(font.family_name().to_lowercase())
            .or_default()
            .insert(&font);
        self.name_cache.invalidate_all();
        log::debug!("Registered composite {}", font.full_name());
        Ok(font)
    }

    /// Find a font by full name or family, with an optional fallback
    pub fn find_font2d(&self, name: &str, style: Style, fallback: Fallback) -> Option<Arc<Font2D>> {
        let lower = name.to_lowercase();
        let cache_key = format!("{}{}", lower, style.suffix());
        if let Some(font) = self.name_cache.get(&cache_key) {
            return Some(font);
        }

        if let Some(font) = self.lookup(&lower, style) {
            self.name_cache.insert(cache_key, Arc::clone(&font));
            return Some(font);
        }

        match fallback {
            Fallback::None => None,
            Fallback::Physical => self.default_physical_font(),
            Fallback::Logical => self.default_logical_font(style),
        }
    }

    fn lookup(&self, lower: &str, style: Style) -> Option<Arc<Font2D>> {
        if let Some(font) = self.physical.get(lower) {
            return Some(Arc::clone(font.value()));
        }
        if let Some(font) = self.composites.get(lower) {
            return Some(Arc::clone(font.value()));
        }
        self.families.get(lower)?.closest(style)
    }

    /// Physical font by full name or family; never a composite
    pub fn find_physical(&self, name: &str, style: Style) -> Option<Arc<Font2D>> {
        let lower = name.to_lowercase();
        if let Some(font) = self.physical.get(&lower) {
            return Some(Arc::clone(font.value()));
        }
        self.families
            .get(&lower)?
            .closest(style)
            .filter(|font| !font.is_composite())
    }

    /// The font of last resort: never composite, never bad
    pub fn default_physical_font(&self) -> Option<Arc<Font2D>> {
        if let Some(font) = self.default_physical.read().as_ref() {
            if !font.is_bad() {
                return Some(Arc::clone(font));
            }
        }

        let preferred = self.default_face.read().clone();
        let font = preferred
            .and_then(|name| self.find_physical(&name, Style::PLAIN))
            .filter(|font| !font.is_bad())
            .or_else(|| {
                self.physical
                    .iter()
                    .map(|entry| Arc::clone(entry.value()))
                    .filter(|font| !font.is_bad())
                    .min_by_key(|font| (font.rank(), font.id()))
            });
        if let Some(font) = &font {
            log::debug!("Default physical font is {}", font.full_name());
        }
        *self.default_physical.write() = font.clone();
        font
    }

    /// The "dialog" composite in `style`
    pub fn default_logical_font(&self, style: Style) -> Option<Arc<Font2D>> {
        self.find_font2d(DEFAULT_LOGICAL_FAMILY, style, Fallback::None)
    }

    /// The handle callers should hold for `font`
    pub fn handle(&self, font: &Arc<Font2D>) -> Arc<Font2DHandle> {
        let handle = self
            .handles
            .entry(font.id())
            .or_insert_with(|| Font2DHandle::new(Arc::clone(font)));
        Arc::clone(handle.value())
    }

    /// Replace `old` with `new` everywhere the manager can reach
    ///
    /// Does nothing if `old` was already replaced. If `new` is `old` itself
    /// or is bad, some other usable physical font is chosen instead.
    pub fn replace_font(&self, old: &Arc<Font2D>, new: Arc<Font2D>) {
        let _replacing = self.replace_lock.lock();
        if self.replaced.contains_key(&old.id()) || old.is_composite() {
            return;
        }

        let new = if Arc::ptr_eq(old, &new) || new.is_bad() {
            let other = self
                .physical
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .filter(|font| !Arc::ptr_eq(font, old) && !font.is_bad())
                .min_by_key(|font| (font.rank(), font.id()));
            match other {
                Some(font) => font,
                None => {
                    log::error!("No usable font left to replace {}", old.full_name());
                    return;
                }
            }
        } else {
            new
        };

        let mut redirected = 0;
        for handle in self.handles.iter() {
            if Arc::ptr_eq(&handle.font(), old) {
                handle.redirect(Arc::clone(&new));
                redirected += 1;
            }
        }

        self.physical.retain(|_, font| !Arc::ptr_eq(font, old));
        if let Some(mut family) = self.families.get_mut(&old.family_name().to_lowercase()) {
            family.remove(old);
        }
        self.families.retain(|_, family| !family.is_empty());
        for mut entry in self.files.iter_mut() {
            if Arc::ptr_eq(entry.value(), old) {
                *entry.value_mut() = Arc::clone(&new);
            }
        }
        {
            let mut default = self.default_physical.write();
            if default.as_ref().is_some_and(|font| Arc::ptr_eq(font, old)) {
                *default = None;
            }
        }

        let mut composites = 0;
        if new.rank() > FontRank::FontConfig {
            for entry in self.composites.iter() {
                let Some(composite) = entry.value().as_composite() else {
                    continue;
                };
                if composite.replace_component(old, &new) {
                    entry.value().reset_mapper();
                    composites += 1;
                }
            }
        }

        self.replaced.insert(old.id(), new.id());
        self.name_cache.invalidate_all();
        log::warn!(
            "Replaced {} with {}: {} handles, {} composites",
            old.full_name(),
            new.full_name(),
            redirected,
            composites
        );
    }

    /// A composite with `physical` in slot 0 followed by the slots of `base`
    ///
    /// Only slot 0 contributes metrics. The result is not registered by name.
    pub fn composite_with_fallback(
        &self,
        physical: &Arc<Font2D>,
        base: &Arc<Font2D>,
    ) -> Result<Arc<Font2D>> {
        if physical.is_composite() {
            return Err(FontLoadError::NotPhysical(physical.full_name().to_string()).into());
        }
        let Some(base_composite) = base.as_composite() else {
            return Err(FontLoadError::NotRegistered(format!(
                "{} is not a composite font",
                base.full_name()
            ))
            .into());
        };
        let slots = base_composite.num_slots() + 1;
        if slots > MAX_SLOTS {
            return Err(FontLoadError::TooManySlots {
                name: physical.full_name().to_string(),
                slots,
                max: MAX_SLOTS,
            }
            .into());
        }

        let descriptor = physical.descriptor().clone();
        let composite = CompositeFont::builder(descriptor, Arc::clone(physical))
            .slot(CompositeSlot::font(Arc::clone(physical)))
            .slots(base_composite.slot_sources())
            .metrics_slots(1)
            .resolver(self.resolver())
            .build()?;
        let font = Font2D::composite(composite, Arc::clone(&self.cache));
        log::debug!(
            "Built {} over {} ({} slots)",
            physical.full_name(),
            base.full_name(),
            slots
        );
        Ok(font)
    }

    /// Every registered font, physical first
    pub fn registered_fonts(&self) -> Vec<Arc<Font2D>> {
        let mut fonts: Vec<Arc<Font2D>> = self
            .physical
            .iter()
            .chain(self.composites.iter())
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        fonts.sort_by_key(|font| (font.is_composite(), font.id()));
        fonts
    }

    pub fn family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .families
            .iter()
            .filter_map(|entry| {
                entry
                    .members
                    .iter()
                    .flatten()
                    .next()
                    .map(|font| font.family_name().to_string())
            })
            .collect();
        names.sort();
        names
    }

    /// What `old` was replaced by, if it was
    pub fn replacement_of(&self, old: FontId) -> Option<FontId> {
        self.replaced.get(&old).map(|id| *id)
    }
}

impl SlotResolver for FontManager {
    fn load_component(&self, file: &Path) -> std::result::Result<Arc<Font2D>, FontLoadError> {
        self.load_file(file)
    }

    fn find_physical(&self, name: &str, style: Style) -> Option<Arc<Font2D>> {
        FontManager::find_physical(self, name, style)
    }
}

impl BadFontSink for FontManager {
    fn deregister_bad_font(&self, font: &Arc<Font2D>) {
        if font.is_composite() {
            return;
        }
        log::error!("Deregistering bad font {}", font.full_name());
        match self.default_physical_font() {
            Some(default) => self.replace_font(font, default),
            None => log::error!("No default font to stand in for {}", font.full_name()),
        }
    }
}

impl std::fmt::Debug for FontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontManager")
            .field("physical", &self.physical.len())
            .field("composites", &self.composites.len())
            .field("families", &self.families.len())
            .finish()
    }
}
