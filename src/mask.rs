use std::collections::HashMap;
use std::sync::Arc;

use image::GrayImage;

use crate::error::{PeekError, PeekResult};

/// Anti-aliased circular alpha masks, one per diameter, shared via `Arc`.
///
/// Every lens and the capture ring reuse the same handful of diameters per
/// session, so masks are built once and handed out by reference.
#[derive(Debug, Default)]
pub struct CircularMaskCache {
    masks: HashMap<u32, Arc<GrayImage>>,
}

impl CircularMaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&mut self, diameter: u32) -> PeekResult<Arc<GrayImage>> {
        if diameter == 0 {
            return Err(PeekError::compositing("mask diameter must be > 0"));
        }
        if let Some(mask) = self.masks.get(&diameter) {
            return Ok(mask.clone());
        }
        let mask = Arc::new(render_circle_mask(diameter));
        self.masks.insert(diameter, mask.clone());
        Ok(mask)
    }

    pub fn clear(&mut self) {
        self.masks.clear();
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// Coverage-based edge: alpha ramps over one pixel across the circle
/// boundary, which is enough to hide staircasing at lens sizes.
fn render_circle_mask(diameter: u32) -> GrayImage {
    let radius = f64::from(diameter) / 2.0;
    let center = radius;
    GrayImage::from_fn(diameter, diameter, |x, y| {
        let dx = f64::from(x) + 0.5 - center;
        let dy = f64::from(y) + 0.5 - center;
        let dist = (dx * dx + dy * dy).sqrt();
        let coverage = (radius - dist + 0.5).clamp(0.0, 1.0);
        image::Luma([(coverage * 255.0).round() as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_diameter_is_rejected() {
        let mut cache = CircularMaskCache::new();
        assert!(matches!(
            cache.mask(0),
            Err(PeekError::Compositing(_))
        ));
    }

    #[test]
    fn center_is_opaque_and_corners_transparent() {
        let mut cache = CircularMaskCache::new();
        let m = cache.mask(64).unwrap();
        assert_eq!(m.get_pixel(32, 32).0[0], 255);
        assert_eq!(m.get_pixel(0, 0).0[0], 0);
        assert_eq!(m.get_pixel(63, 63).0[0], 0);
    }

    #[test]
    fn edge_is_antialiased() {
        let mut cache = CircularMaskCache::new();
        let m = cache.mask(64).unwrap();
        let partial = m
            .pixels()
            .filter(|p| p.0[0] > 0 && p.0[0] < 255)
            .count();
        assert!(partial > 0, "expected a soft edge band");
    }

    #[test]
    fn repeated_requests_share_one_allocation() {
        let mut cache = CircularMaskCache::new();
        let a = cache.mask(48).unwrap();
        let b = cache.mask(48).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
