//! Reference-counted cache of rasterized glyphs.
//!
//! Every distinct `(font, codepoint, point size)` is rasterized once and its
//! bitmap copied into the atlas. Callers hold [`GlyphHandle`]s: a slot index
//! plus a generation counter, so a handle that outlives its entry is
//! detected instead of silently aliasing whatever reused the slot.
//!
//! An entry whose reference count drops to zero stays resident (and can be
//! revived by the next `acquire`) until atlas pressure steals its space or
//! [`GlyphCache::flush_released_glyphs`] runs.

use std::mem;

use rustc_hash::FxHashMap;

use crate::atlas::{AtlasAllocator, AtlasConfig, AtlasRange};
use crate::diagnostics::{LogSeverity, SharedLogListener};
use crate::error::{AtlasError, BackendError};

/// Index into the caller's font table.
pub type FontId = u16;

/// Cache key. `pt_size` is 26.6 fixed point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub font: FontId,
    pub codepoint: u32,
    pub pt_size: u32,
}

/// Stable reference to a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphHandle {
    index: u32,
    generation: u32,
}

/// One rasterized glyph resident in the atlas.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedGlyph {
    pub key: GlyphKey,
    pub bearing_x: i32,
    pub bearing_y: i32,
    pub width: u16,
    pub height: u16,
    /// Byte offset of the `width * height` bitmap inside the atlas.
    pub atlas_offset: usize,
    /// Line height the glyph asks for, in pixels.
    pub newline_size: f32,
    ref_count: u32,
}

impl CachedGlyph {
    pub fn size_bytes(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Output of a [`Rasterizer`]: one 8-bit coverage channel, tightly packed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RasterizedGlyph {
    pub bitmap: Vec<u8>,
    pub width: u16,
    pub height: u16,
    pub bearing_x: i32,
    pub bearing_y: i32,
    pub newline_size: f32,
}

impl RasterizedGlyph {
    /// A glyph with no ink (spaces, newlines, failed loads).
    pub fn empty(newline_size: f32) -> Self {
        Self {
            newline_size,
            ..Default::default()
        }
    }
}

/// External glyph rasterizer.
pub trait Rasterizer {
    fn rasterize(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, BackendError>;

    /// The cache deleted `key`. Backends drop whatever they kept to
    /// rasterize it.
    fn forget(&mut self, _key: GlyphKey) {}
}

/// Atlas bytes that changed since the last upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtlasUpload {
    /// The buffer was reallocated; re-create the GPU copy and upload it whole.
    pub resized: bool,
    pub ranges: Vec<AtlasRange>,
}

impl AtlasUpload {
    pub fn is_empty(&self) -> bool {
        !self.resized && self.ranges.is_empty()
    }
}

struct Slot {
    generation: u32,
    glyph: Option<CachedGlyph>,
}

/// Glyph cache and owner of the atlas memory.
pub struct GlyphCache {
    atlas: AtlasAllocator,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    lookup: FxHashMap<GlyphKey, u32>,
    pending: AtlasUpload,
    /// Keys deleted since the last `take_evicted`.
    evicted: Vec<GlyphKey>,
    log: SharedLogListener,
}

impl GlyphCache {
    pub fn new(config: &AtlasConfig, log: SharedLogListener) -> Self {
        Self {
            atlas: AtlasAllocator::new(config),
            slots: Vec::new(),
            vacant: Vec::new(),
            lookup: FxHashMap::default(),
            pending: AtlasUpload::default(),
            evicted: Vec::new(),
            log,
        }
    }

    /// Number of resident entries, referenced or not.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn atlas(&self) -> &AtlasAllocator {
        &self.atlas
    }

    /// Look up a live entry. `None` for stale handles.
    pub fn get(&self, handle: GlyphHandle) -> Option<&CachedGlyph> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.glyph.as_ref())
    }

    /// Resident entry for `key`, if any.
    pub fn find(&self, key: GlyphKey) -> Option<GlyphHandle> {
        self.lookup.get(&key).map(|&index| GlyphHandle {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Get a counted reference to the glyph for `key`, rasterizing it on a miss.
    ///
    /// Rasterizer failures are logged and produce an empty glyph. Only atlas
    /// exhaustion is returned as an error.
    pub fn acquire<R: Rasterizer + ?Sized>(
        &mut self,
        rasterizer: &mut R,
        key: GlyphKey,
    ) -> Result<GlyphHandle, AtlasError> {
        if let Some(handle) = self.find(key) {
            if let Some(glyph) = self.entry_mut(handle) {
                glyph.ref_count += 1;
            }
            return Ok(handle);
        }
        self.create_glyph(rasterizer, key)
    }

    /// Add a reference to an existing entry (sharing a shaped sequence verbatim).
    pub fn add_ref(&mut self, handle: GlyphHandle) {
        match self.entry_mut(handle) {
            Some(glyph) => glyph.ref_count += 1,
            None => {
                debug_assert!(false, "invalid glyph handle {handle:?}; use-after-free?");
                self.log.log(
                    "[GlyphCache::add_ref] invalid glyph handle. Use-after-free perhaps?",
                    LogSeverity::Warning,
                );
            }
        }
    }

    /// Drop one reference. Over-release asserts in debug builds; release
    /// builds report it and keep the count at zero.
    pub fn release(&mut self, handle: GlyphHandle) {
        let over_release = match self.entry_mut(handle) {
            Some(glyph) if glyph.ref_count > 0 => {
                glyph.ref_count -= 1;
                false
            }
            Some(_) => true,
            None => {
                debug_assert!(false, "invalid glyph handle {handle:?}; use-after-free?");
                self.log.log(
                    "[GlyphCache::release] invalid glyph handle. Use-after-free perhaps?",
                    LogSeverity::Warning,
                );
                return;
            }
        };

        if over_release {
            self.log.log(
                "[GlyphCache::release] glyph released more times than it was acquired",
                LogSeverity::Warning,
            );
            debug_assert!(false, "glyph {handle:?} released more times than it was acquired");
        }
    }

    /// Delete every entry nobody references. Returns how many were deleted.
    pub fn flush_released_glyphs(&mut self) -> usize {
        let mut unused: Vec<(usize, u32)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.glyph {
                Some(glyph) if glyph.ref_count == 0 => Some((glyph.atlas_offset, index as u32)),
                _ => None,
            })
            .collect();

        // Highest offsets first so tail blocks retract the bump pointer.
        unused.sort_unstable_by(|a, b| b.cmp(a));
        for &(_, index) in &unused {
            self.destroy_glyph(index);
        }

        if !unused.is_empty() {
            log::debug!("flushed {} released glyphs", unused.len());
        }
        unused.len()
    }

    /// Take the dirty ranges accumulated since the last call.
    pub fn take_pending_upload(&mut self) -> AtlasUpload {
        mem::take(&mut self.pending)
    }

    pub fn pending_upload(&self) -> &AtlasUpload {
        &self.pending
    }

    /// Take the keys of every entry deleted since the last call.
    pub fn take_evicted(&mut self) -> Vec<GlyphKey> {
        mem::take(&mut self.evicted)
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn entry_mut(&mut self, handle: GlyphHandle) -> Option<&mut CachedGlyph> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.glyph.as_mut())
    }

    fn create_glyph<R: Rasterizer + ?Sized>(
        &mut self,
        rasterizer: &mut R,
        key: GlyphKey,
    ) -> Result<GlyphHandle, AtlasError> {
        let mut raster = match rasterizer.rasterize(key) {
            Ok(raster) => raster,
            Err(err) => {
                self.log.log(
                    &format!(
                        "[{} error] Could not load glyph for codepoint {} errorCode: {} Desc: {}",
                        err.library, key.codepoint, err.code, err.description
                    ),
                    LogSeverity::Warning,
                );
                RasterizedGlyph::empty(0.0)
            }
        };

        let size_bytes = raster.width as usize * raster.height as usize;
        if raster.bitmap.len() < size_bytes {
            self.log.log(
                &format!(
                    "[GlyphCache] bitmap for codepoint {} is {} bytes, expected {}",
                    key.codepoint,
                    raster.bitmap.len(),
                    size_bytes
                ),
                LogSeverity::Warning,
            );
            raster = RasterizedGlyph::empty(raster.newline_size);
        }
        let size_bytes = raster.width as usize * raster.height as usize;

        let atlas_offset = self.reserve(size_bytes)?;
        if size_bytes > 0 {
            self.atlas.write(atlas_offset, &raster.bitmap[..size_bytes]);
            self.pending.ranges.push(AtlasRange {
                offset: atlas_offset,
                size: size_bytes,
            });
        }

        let glyph = CachedGlyph {
            key,
            bearing_x: raster.bearing_x,
            bearing_y: raster.bearing_y,
            width: raster.width,
            height: raster.height,
            atlas_offset,
            newline_size: raster.newline_size,
            ref_count: 1,
        };

        let index = match self.vacant.pop() {
            Some(index) => {
                self.slots[index as usize].glyph = Some(glyph);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    glyph: Some(glyph),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.lookup.insert(key, index);

        Ok(GlyphHandle {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Find atlas space, evicting unused glyphs before growing.
    fn reserve(&mut self, size: usize) -> Result<usize, AtlasError> {
        if let Some(offset) = self.atlas.try_allocate(size) {
            return Ok(offset);
        }

        // Steal the smallest unused glyph that is big enough on its own.
        while let Some(index) = self.best_unused_glyph(size) {
            self.destroy_glyph(index);
            if let Some(offset) = self.atlas.try_allocate(size) {
                return Ok(offset);
            }
        }

        // Two contiguous unused glyphs may be big enough together.
        if self.flush_released_glyphs() > 0 {
            if let Some(offset) = self.atlas.try_allocate(size) {
                return Ok(offset);
            }
        }

        let offset = self.atlas.allocate_growing(size)?;
        self.pending.resized = true;
        Ok(offset)
    }

    fn best_unused_glyph(&self, size: usize) -> Option<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.glyph.as_ref().map(|glyph| (index, glyph)))
            .filter(|(_, glyph)| glyph.ref_count == 0 && glyph.size_bytes() >= size)
            .min_by_key(|(_, glyph)| glyph.size_bytes())
            .map(|(index, _)| index as u32)
    }

    fn destroy_glyph(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        let Some(glyph) = slot.glyph.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);

        self.atlas.free(glyph.atlas_offset, glyph.size_bytes());
        self.lookup.remove(&glyph.key);
        self.vacant.push(index);
        self.evicted.push(glyph.key);
    }
}

// ===================================================================
// Tests
// ===================================================================
