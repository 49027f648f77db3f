//! Keep the strikes you use, let go of the ones you don't
//!
//! Fonts only remember their strikes weakly. What keeps a strike alive
//! between draws is this cache:
//! - Recent pool: the last few strikes touched, whatever their retention,
//!   so flipping between two sizes never rebuilds either
//! - Sticky pool: a larger LRU of sticky strikes, aged out by [`sweep`] and
//!   emptied by [`release_memory`]
//!
//! The cache also owns the glyph image arena and the disposer that cleans
//! up after strikes once the last reference goes away.
//!
//! [`sweep`]: StrikeCache::sweep
//! [`release_memory`]: StrikeCache::release_memory

use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use glyphstrike_core::{DisposalMode, GlyphImage, Retention, StrikeCacheConfig};
use lru::LruCache;
use parking_lot::Mutex;

use crate::arena::{ArenaStats, GlyphImageArena, GlyphImageHandle};
use crate::disposer::Disposer;
use crate::strike::{FontStrike, StrikeId};

static GLOBAL_CACHE: OnceLock<Arc<StrikeCache>> = OnceLock::new();

struct StickyEntry {
    strike: Arc<FontStrike>,
    last_used: Instant,
}

/// A snapshot of what the cache is holding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeCacheStats {
    pub recent: usize,
    pub sticky: usize,
    pub pending_disposals: usize,
    pub disposed: u64,
    pub images: ArenaStats,
}

/// Retention pools, image arena and disposer shared by a set of fonts
pub struct StrikeCache {
    config: StrikeCacheConfig,
    arena: Arc<GlyphImageArena>,
    disposer: Disposer,
    recent: Mutex<Option<LruCache<StrikeId, Arc<FontStrike>>>>,
    sticky: Mutex<Option<LruCache<StrikeId, StickyEntry>>>,
}

impl StrikeCache {
    /// Build a private cache
    ///
    /// Strikes keep their font alive and fonts keep their cache alive, so a
    /// private cache lives until [`clear`](Self::clear) empties its pools.
    pub fn new(config: StrikeCacheConfig) -> Arc<Self> {
        let arena = Arc::new(GlyphImageArena::new());
        let disposer = Disposer::new(config.disposal, Arc::clone(&arena));
        log::debug!(
            "Strike cache: {} recent, {} sticky, {:?} disposal",
            config.recent_strikes,
            config.sticky_strikes,
            disposer.mode()
        );
        Arc::new(Self {
            recent: Mutex::new(NonZeroUsize::new(config.recent_strikes).map(LruCache::new)),
            sticky: Mutex::new(NonZeroUsize::new(config.sticky_strikes).map(LruCache::new)),
            config,
            arena,
            disposer,
        })
    }

    /// The process-wide cache, configured from the environment
    pub fn global() -> Arc<Self> {
        GLOBAL_CACHE
            .get_or_init(|| StrikeCache::new(StrikeCacheConfig::from_env()))
            .clone()
    }

    pub fn config(&self) -> &StrikeCacheConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arc<GlyphImageArena> {
        &self.arena
    }

    /// Look up an image handed out by one of this cache's strikes
    pub fn image(&self, handle: GlyphImageHandle) -> Option<Arc<GlyphImage>> {
        self.arena.get(handle)
    }

    pub fn disposal_mode(&self) -> DisposalMode {
        self.disposer.mode()
    }

    pub(crate) fn disposer(&self) -> &Disposer {
        &self.disposer
    }

    /// Note that a strike was just used
    pub(crate) fn retain(&self, strike: &Arc<FontStrike>, retention: Retention) {
        // Evicted strikes may be the last reference; drop them unlocked
        let mut evicted = Vec::new();
        {
            let mut recent = self.recent.lock();
            if let Some(pool) = recent.as_mut() {
                if let Some((_, old)) = pool.push(strike.id(), Arc::clone(strike)) {
                    evicted.push(old);
                }
            }
        }
        if retention == Retention::Sticky {
            let mut sticky = self.sticky.lock();
            if let Some(pool) = sticky.as_mut() {
                let entry = StickyEntry {
                    strike: Arc::clone(strike),
                    last_used: Instant::now(),
                };
                if let Some((_, old)) = pool.push(strike.id(), entry) {
                    evicted.push(old.strike);
                }
            }
        }
        drop(evicted);
    }

    /// Mark a strike handed out again without a registry lookup
    pub(crate) fn touch(&self, strike: &FontStrike) {
        if let Some(pool) = self.sticky.lock().as_mut() {
            if let Some(entry) = pool.get_mut(&strike.id()) {
                entry.last_used = Instant::now();
            }
        }
    }

    /// Drop sticky strikes that have sat unused past their age limit
    pub fn sweep(&self) -> usize {
        let Some(max_age) = self.config.sticky_max_age else {
            return 0;
        };
        let mut expired = Vec::new();
        {
            let mut sticky = self.sticky.lock();
            if let Some(pool) = sticky.as_mut() {
                while pool
                    .peek_lru()
                    .is_some_and(|(_, entry)| entry.last_used.elapsed() > max_age)
                {
                    if let Some((_, entry)) = pool.pop_lru() {
                        expired.push(entry.strike);
                    }
                }
            }
        }
        let count = expired.len();
        if count > 0 {
            log::debug!("Swept {} idle strikes", count);
        }
        count
    }

    /// Let every sticky strike go; recently used ones stay
    pub fn release_memory(&self) -> usize {
        let released: Vec<StickyEntry> = {
            let mut sticky = self.sticky.lock();
            match sticky.as_mut() {
                Some(pool) => {
                    let mut all = Vec::with_capacity(pool.len());
                    while let Some((_, entry)) = pool.pop_lru() {
                        all.push(entry);
                    }
                    all
                }
                None => Vec::new(),
            }
        };
        log::info!("Released {} sticky strikes", released.len());
        released.len()
    }

    /// Empty both pools
    pub fn clear(&self) {
        let mut dropped: Vec<Arc<FontStrike>> = Vec::new();
        if let Some(pool) = self.recent.lock().as_mut() {
            while let Some((_, strike)) = pool.pop_lru() {
                dropped.push(strike);
            }
        }
        if let Some(pool) = self.sticky.lock().as_mut() {
            while let Some((_, entry)) = pool.pop_lru() {
                dropped.push(entry.strike);
            }
        }
        log::debug!("Cleared {} strike references", dropped.len());
    }

    /// Process deferred disposals on this thread
    pub fn drain_disposals(&self) -> usize {
        self.disposer.drain()
    }

    /// Block until every disposal submitted so far has completed
    pub fn flush_disposals(&self) {
        self.disposer.flush();
    }

    pub fn stats(&self) -> StrikeCacheStats {
        StrikeCacheStats {
            recent: self.recent.lock().as_ref().map_or(0, LruCache::len),
            sticky: self.sticky.lock().as_ref().map_or(0, LruCache::len),
            pending_disposals: self.disposer.pending(),
            disposed: self.disposer.disposed(),
            images: self.arena.stats(),
        }
    }
}

impl std::fmt::Debug for StrikeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrikeCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
