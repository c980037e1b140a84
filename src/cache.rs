use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use image::RgbaImage;

use crate::{
    context::{ChannelMode, Orientation, SourceId},
    diff::DiffMode,
    geom::CropBox,
    mask::CircularMaskCache,
    sample::Interpolation,
};

/// Exact-match key for one sampled lens patch. Fractional bounds are keyed
/// by their bit patterns; equality is equality of the tuple, never of pixel
/// data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchKey {
    pub source: SourceId,
    pub src_w: u32,
    pub src_h: u32,
    pub crop_bits: [u64; 4],
    pub target: u32,
    pub method: Interpolation,
    pub subpixel: bool,
}

impl PatchKey {
    pub fn new(
        source: SourceId,
        src_size: (u32, u32),
        crop: &CropBox,
        target: u32,
        method: Interpolation,
        subpixel: bool,
    ) -> Self {
        Self {
            source,
            src_w: src_size.0,
            src_h: src_size.1,
            crop_bits: [
                crop.left.to_bits(),
                crop.top.to_bits(),
                crop.right.to_bits(),
                crop.bottom.to_bits(),
            ],
            target,
            method,
            subpixel,
        }
    }
}

/// Exact-match key for the composed base image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BaseKey {
    pub id_a: SourceId,
    pub id_b: SourceId,
    pub ratio_bits: u64,
    pub orientation: Orientation,
    pub diff_mode: DiffMode,
    pub channel_mode: ChannelMode,
    pub divider_color: [u8; 4],
    pub divider_thickness_bits: u32,
}

impl BaseKey {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id_a: SourceId,
        id_b: SourceId,
        visual_ratio: f64,
        orientation: Orientation,
        diff_mode: DiffMode,
        channel_mode: ChannelMode,
        divider_color: [u8; 4],
        divider_thickness: f32,
    ) -> Self {
        Self {
            id_a,
            id_b,
            ratio_bits: visual_ratio.to_bits(),
            orientation,
            diff_mode,
            channel_mode,
            divider_color,
            divider_thickness_bits: divider_thickness.to_bits(),
        }
    }
}

const DEFAULT_PATCH_CAPACITY: usize = 128;

/// Per-session memoization for the expensive stages: sampled lens patches
/// (LRU-bounded) and the single most recent base image, plus the circular
/// masks. Owned by the caller and passed into every render; never shared
/// across threads without a lock.
#[derive(Debug)]
pub struct RenderCache {
    patches: HashMap<PatchKey, Arc<RgbaImage>>,
    lru: VecDeque<PatchKey>,
    capacity: usize,
    base: Option<(BaseKey, Arc<RgbaImage>)>,
    pub masks: CircularMaskCache,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PATCH_CAPACITY)
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            patches: HashMap::new(),
            lru: VecDeque::new(),
            capacity: capacity.max(1),
            base: None,
            masks: CircularMaskCache::new(),
        }
    }

    /// Drop everything. Call on source content changes or resolution-limit
    /// changes; key mismatches handle ordinary parameter drift on their own.
    pub fn clear(&mut self) {
        self.patches.clear();
        self.lru.clear();
        self.base = None;
        self.masks.clear();
    }

    pub fn patch(&mut self, key: &PatchKey) -> Option<Arc<RgbaImage>> {
        let hit = self.patches.get(key).cloned();
        if hit.is_some() {
            self.touch(*key);
        }
        hit
    }

    pub fn insert_patch(&mut self, key: PatchKey, patch: RgbaImage) -> Arc<RgbaImage> {
        let patch = Arc::new(patch);
        self.patches.insert(key, patch.clone());
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.patches.remove(&old);
            }
        }
        patch
    }

    fn touch(&mut self, key: PatchKey) {
        if let Some(pos) = self.lru.iter().position(|k| *k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }

    pub fn base(&self, key: &BaseKey) -> Option<Arc<RgbaImage>> {
        match &self.base {
            Some((k, img)) if k == key => Some(img.clone()),
            _ => None,
        }
    }

    pub fn set_base(&mut self, key: BaseKey, base: RgbaImage) -> Arc<RgbaImage> {
        let base = Arc::new(base);
        self.base = Some((key, base.clone()));
        base
    }

    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }
}
