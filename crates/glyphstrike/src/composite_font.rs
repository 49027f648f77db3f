//! Composite fonts: an ordered list of physical fonts acting as one
//!
//! Each slot names a physical font. Slots may be deferred: only a file path
//! is known until the first glyph or strike needs that slot, at which point
//! the file is loaded exactly once. A slot that cannot be loaded resolves to
//! the fallback font instead, so every slot resolves to something.
//!
//! Slots may also carry exclusion ranges: code points inside them are never
//! taken from that slot even if its font covers them.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use glyphstrike_core::types::MAX_SLOTS;
use glyphstrike_core::{FontLoadError, Style};
use parking_lot::{Mutex, RwLock};

use crate::font::{FontDescriptor, Font2D};

/// Loads the fonts behind deferred slots
pub trait SlotResolver: Send + Sync {
    /// Load (or return the already loaded) physical font in `file`
    fn load_component(&self, file: &Path) -> Result<Arc<Font2D>, FontLoadError>;

    /// Registered physical font by full name or family
    fn find_physical(&self, name: &str, style: Style) -> Option<Arc<Font2D>>;
}

/// Where a slot's font comes from
#[derive(Clone)]
pub enum SlotSource {
    Font(Arc<Font2D>),
    /// Loaded on first use
    Deferred(PathBuf),
}

/// One slot of a composite under construction
#[derive(Clone)]
pub struct CompositeSlot {
    pub name: String,
    pub source: SlotSource,
    pub exclusions: Vec<RangeInclusive<u32>>,
}

impl CompositeSlot {
    pub fn font(font: Arc<Font2D>) -> Self {
        Self {
            name: font.full_name().to_string(),
            source: SlotSource::Font(font),
            exclusions: Vec::new(),
        }
    }

    pub fn deferred(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: SlotSource::Deferred(file.into()),
            exclusions: Vec::new(),
        }
    }

    /// Never take these code points from this slot
    pub fn excluding(mut self, range: RangeInclusive<u32>) -> Self {
        self.exclusions.push(range);
        self
    }
}

enum SlotState {
    Deferred(PathBuf),
    Resolving,
    Resolved(Arc<Font2D>),
}

struct Slot {
    name: String,
    state: SlotState,
}

/// Slot list shared by a composite font, its strikes and its mapper
pub(crate) struct ComponentTable {
    name: String,
    style: Style,
    slots: RwLock<Vec<Slot>>,
    resolve_lock: Mutex<()>,
    exclusions: Vec<Vec<RangeInclusive<u32>>>,
    num_slots: usize,
    num_metrics_slots: usize,
    resolver: Option<Weak<dyn SlotResolver>>,
    fallback: Arc<Font2D>,
}

impl ComponentTable {
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn num_metrics_slots(&self) -> usize {
        self.num_metrics_slots
    }

    pub fn has_exclusions(&self) -> bool {
        self.exclusions.iter().any(|ranges| !ranges.is_empty())
    }

    pub fn is_excluded(&self, slot: usize, cp: u32) -> bool {
        self.exclusions
            .get(slot)
            .is_some_and(|ranges| ranges.iter().any(|r| r.contains(&cp)))
    }

    pub fn exclusions(&self, slot: usize) -> &[RangeInclusive<u32>] {
        self.exclusions
            .get(slot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn slot_name(&self, slot: usize) -> Option<String> {
        self.slots.read().get(slot).map(|s| s.name.clone())
    }

    pub fn is_resolved(&self, slot: usize) -> bool {
        self.resolved(slot).is_some()
    }

    fn resolved(&self, slot: usize) -> Option<Arc<Font2D>> {
        match &self.slots.read().get(slot)?.state {
            SlotState::Resolved(font) => Some(Arc::clone(font)),
            SlotState::Deferred(_) | SlotState::Resolving => None,
        }
    }

    /// Font of `slot`, loading it if deferred; out-of-range means slot 0
    pub fn slot_font(&self, slot: usize) -> Arc<Font2D> {
        let slot = if slot < self.num_slots { slot } else { 0 };
        if let Some(font) = self.resolved(slot) {
            return font;
        }

        let _resolving = self.resolve_lock.lock();
        let (file, name) = {
            let mut slots = self.slots.write();
            let entry = &mut slots[slot];
            match std::mem::replace(&mut entry.state, SlotState::Resolving) {
                SlotState::Resolved(font) => {
                    entry.state = SlotState::Resolved(Arc::clone(&font));
                    return font;
                }
                SlotState::Deferred(file) => (file, entry.name.clone()),
                SlotState::Resolving => {
                    // Left behind by a load that panicked
                    log::warn!("{}: slot {} requested while loading", self.name, slot);
                    entry.state = SlotState::Resolved(Arc::clone(&self.fallback));
                    return Arc::clone(&self.fallback);
                }
            }
        };

        let font = self.load_slot(slot, &file, &name);
        self.slots.write()[slot].state = SlotState::Resolved(Arc::clone(&font));
        font
    }

    fn load_slot(&self, slot: usize, file: &Path, name: &str) -> Arc<Font2D> {
        let Some(resolver) = self.resolver.as_ref().and_then(Weak::upgrade) else {
            log::warn!(
                "{}: no resolver for deferred slot {} ({}), using {}",
                self.name,
                slot,
                name,
                self.fallback.full_name()
            );
            return Arc::clone(&self.fallback);
        };

        let loaded = match resolver.load_component(file) {
            Ok(font) if !font.is_composite() => Some(font),
            Ok(font) => {
                log::warn!("{}: {} is not a physical font", self.name, font.full_name());
                None
            }
            Err(err) => {
                log::warn!("{}: slot {} failed to load: {}", self.name, slot, err);
                None
            }
        };

        let found = match loaded {
            Some(font) if font.full_name().eq_ignore_ascii_case(name) => Some(font),
            Some(font) => {
                log::debug!(
                    "{}: {} holds {}, looking up {} by name",
                    self.name,
                    file.display(),
                    font.full_name(),
                    name
                );
                resolver.find_physical(name, self.style)
            }
            None => None,
        };

        match found {
            Some(font) => {
                log::debug!("{}: slot {} resolved to {}", self.name, slot, font.full_name());
                font
            }
            None => {
                log::warn!(
                    "{}: slot {} ({}) substituted by {}",
                    self.name,
                    slot,
                    name,
                    self.fallback.full_name()
                );
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Slot source as it stands: loaded slots give their font, deferred ones
    /// their file
    pub fn slot_source(&self, slot: usize) -> SlotSource {
        match &self.slots.read()[slot].state {
            SlotState::Resolved(font) => return SlotSource::Font(Arc::clone(font)),
            SlotState::Deferred(file) => return SlotSource::Deferred(file.clone()),
            SlotState::Resolving => {}
        }
        // Another thread is loading it; wait for that load
        SlotSource::Font(self.slot_font(slot))
    }

    /// Point every slot holding `old` at `new`
    pub fn replace_component(&self, old: &Arc<Font2D>, new: &Arc<Font2D>) -> bool {
        let mut replaced = false;
        for slot in self.slots.write().iter_mut() {
            if let SlotState::Resolved(font) = &mut slot.state {
                if Arc::ptr_eq(font, old) {
                    *font = Arc::clone(new);
                    replaced = true;
                }
            }
        }
        replaced
    }
}

/// A logical font made of physical slot fonts
pub struct CompositeFont {
    descriptor: FontDescriptor,
    components: Arc<ComponentTable>,
}

impl CompositeFont {
    pub fn builder(descriptor: FontDescriptor, fallback: Arc<Font2D>) -> CompositeFontBuilder {
        CompositeFontBuilder {
            descriptor,
            fallback,
            slots: Vec::new(),
            num_metrics_slots: 1,
            resolver: None,
            eager: false,
        }
    }

    pub fn descriptor(&self) -> &FontDescriptor {
        &self.descriptor
    }

    pub(crate) fn components(&self) -> &Arc<ComponentTable> {
        &self.components
    }

    pub fn num_slots(&self) -> usize {
        self.components.num_slots()
    }

    pub fn num_metrics_slots(&self) -> usize {
        self.components.num_metrics_slots()
    }

    pub fn slot_font(&self, slot: usize) -> Arc<Font2D> {
        self.components.slot_font(slot)
    }

    pub fn slot_name(&self, slot: usize) -> Option<String> {
        self.components.slot_name(slot)
    }

    pub fn is_slot_resolved(&self, slot: usize) -> bool {
        self.components.is_resolved(slot)
    }

    pub fn is_excluded(&self, slot: usize, cp: u32) -> bool {
        self.components.is_excluded(slot, cp)
    }

    pub fn exclusions(&self, slot: usize) -> &[RangeInclusive<u32>] {
        self.components.exclusions(slot)
    }

    pub(crate) fn replace_component(&self, old: &Arc<Font2D>, new: &Arc<Font2D>) -> bool {
        self.components.replace_component(old, new)
    }

    /// Copies of this composite's slots for building a derived font
    ///
    /// Slots that have not been loaded yet stay deferred in the copy.
    pub(crate) fn slot_sources(&self) -> Vec<CompositeSlot> {
        (0..self.num_slots())
            .map(|slot| CompositeSlot {
                name: self.slot_name(slot).unwrap_or_default(),
                source: self.components.slot_source(slot),
                exclusions: self.exclusions(slot).to_vec(),
            })
            .collect()
    }
}

impl std::fmt::Debug for CompositeFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeFont")
            .field("name", &self.descriptor.full_name)
            .field("slots", &self.num_slots())
            .field("metrics_slots", &self.num_metrics_slots())
            .finish()
    }
}

pub struct CompositeFontBuilder {
    descriptor: FontDescriptor,
    fallback: Arc<Font2D>,
    slots: Vec<CompositeSlot>,
    num_metrics_slots: usize,
    resolver: Option<Weak<dyn SlotResolver>>,
    eager: bool,
}

impl CompositeFontBuilder {
    pub fn slot(mut self, slot: CompositeSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn slots(mut self, slots: impl IntoIterator<Item = CompositeSlot>) -> Self {
        self.slots.extend(slots);
        self
    }

    /// How many leading slots contribute to line metrics
    pub fn metrics_slots(mut self, count: usize) -> Self {
        self.num_metrics_slots = count;
        self
    }

    pub fn resolver(mut self, resolver: Weak<dyn SlotResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Load deferred slots while building instead of on first use
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn build(self) -> Result<CompositeFont, FontLoadError> {
        let name = self.descriptor.full_name.clone();
        if self.slots.is_empty() {
            return Err(FontLoadError::EmptyComposite { name });
        }
        if self.slots.len() > MAX_SLOTS {
            return Err(FontLoadError::TooManySlots {
                name,
                slots: self.slots.len(),
                max: MAX_SLOTS,
            });
        }

        let num_slots = self.slots.len();
        let mut exclusions = Vec::with_capacity(num_slots);
        let mut slots = Vec::with_capacity(num_slots);
        for slot in self.slots {
            let state = match slot.source {
                SlotSource::Font(font) if font.is_composite() => {
                    return Err(FontLoadError::NotPhysical(font.full_name().to_string()));
                }
                SlotSource::Font(font) => SlotState::Resolved(font),
                SlotSource::Deferred(file) => SlotState::Deferred(file),
            };
            exclusions.push(slot.exclusions);
            slots.push(Slot {
                name: slot.name,
                state,
            });
        }

        let components = Arc::new(ComponentTable {
            name,
            style: self.descriptor.style,
            slots: RwLock::new(slots),
            resolve_lock: Mutex::new(()),
            exclusions,
            num_slots,
            num_metrics_slots: self.num_metrics_slots.clamp(1, num_slots),
            resolver: self.resolver,
            fallback: self.fallback,
        });
        if self.eager {
            for slot in 0..num_slots {
                components.slot_font(slot);
            }
        }

        Ok(CompositeFont {
            descriptor: self.descriptor,
            components,
        })
    }
}
