//! Glyph image arena: where rasterized glyphs live
//!
//! Strikes never hand out image records directly. They hand out
//! [`GlyphImageHandle`]s, pointer-sized tokens into this arena, and free
//! them in bulk when the strike dies. Looking up a freed handle yields
//! nothing rather than stale pixels.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use glyphstrike_core::GlyphImage;

/// Opaque token for one glyph image
///
/// [`GlyphImageHandle::EMPTY`] is shared by every invisible or failed glyph
/// and is never allocated or freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphImageHandle(u64);

impl GlyphImageHandle {
    pub const EMPTY: GlyphImageHandle = GlyphImageHandle(0);

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub allocated: u64,
    pub freed: u64,
    pub live: usize,
}

/// Owner of every glyph image produced for any strike
pub struct GlyphImageArena {
    images: DashMap<GlyphImageHandle, Arc<GlyphImage>>,
    next: AtomicU64,
    allocated: AtomicU64,
    freed: AtomicU64,
    empty: Arc<GlyphImage>,
}

impl GlyphImageArena {
    pub fn new() -> Self {
        Self {
            images: DashMap::new(),
            next: AtomicU64::new(1),
            allocated: AtomicU64::new(0),
            freed: AtomicU64::new(0),
            empty: Arc::new(GlyphImage::empty()),
        }
    }

    /// Take ownership of an image; empty images share the empty handle
    pub fn allocate(&self, image: GlyphImage) -> GlyphImageHandle {
        if image.is_empty() && image.advance.x == 0.0 && image.advance.y == 0.0 {
            return GlyphImageHandle::EMPTY;
        }
        let handle = GlyphImageHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.images.insert(handle, Arc::new(image));
        self.allocated.fetch_add(1, Ordering::Relaxed);
        handle
    }

    /// The image behind a handle, if it is still live
    pub fn get(&self, handle: GlyphImageHandle) -> Option<Arc<GlyphImage>> {
        if handle.is_empty() {
            return Some(self.empty.clone());
        }
        self.images.get(&handle).map(|entry| entry.value().clone())
    }

    /// Release images; unknown handles are reported, never freed twice
    pub fn free(&self, handles: impl IntoIterator<Item = GlyphImageHandle>) -> usize {
        let mut released = 0;
        for handle in handles {
            if handle.is_empty() {
                continue;
            }
            if self.images.remove(&handle).is_some() {
                released += 1;
            } else {
                log::warn!("Glyph image {:?} freed twice or never allocated", handle);
            }
        }
        self.freed.fetch_add(released as u64, Ordering::Relaxed);
        released
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            freed: self.freed.load(Ordering::Relaxed),
            live: self.images.len(),
        }
    }
}

impl Default for GlyphImageArena {
    fn default() -> Self {
        Self::new()
    }
}
