use std::sync::Arc;

use image::RgbaImage;
use pixelpeek::{
    AbsDiff, DiffMode, LensVisibility, NullOverlay, Orientation, RenderCache, RenderContext,
    RelPoint, SourceId, SourcePair, SplitState, render_frame,
};

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Arc<RgbaImage> {
    Arc::new(RgbaImage::from_pixel(w, h, image::Rgba(rgba)))
}

fn gradient(w: u32, h: u32, seed: u32) -> Arc<RgbaImage> {
    Arc::new(RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            ((x * 7 + seed) % 256) as u8,
            ((y * 13 + seed * 3) % 256) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    }))
}

fn pair(a: Arc<RgbaImage>, b: Arc<RgbaImage>) -> SourcePair {
    SourcePair {
        unified_a: a.clone(),
        unified_b: b.clone(),
        full_a: a,
        full_b: b,
        id_a: SourceId(1),
        id_b: SourceId(2),
    }
}

fn red_blue_ctx() -> RenderContext {
    let a = solid(100, 100, [255, 0, 0, 255]);
    let b = solid(100, 100, [0, 0, 255, 255]);
    RenderContext::new(pair(a, b), SplitState::new(0.5, Orientation::Vertical))
}

#[test]
fn half_split_renders_red_blue_with_centered_divider() {
    let ctx = red_blue_ctx();
    let mut cache = RenderCache::new();
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();

    assert_eq!(frame.canvas.dimensions(), (100, 100));
    assert_eq!(frame.pad_left, 0);
    assert_eq!(frame.pad_top, 0);
    assert_eq!(frame.canvas.get_pixel(25, 50).0, [255, 0, 0, 255]);
    assert_eq!(frame.canvas.get_pixel(75, 50).0, [0, 0, 255, 255]);
    // Default 2px divider straddles x=50.
    assert_eq!(frame.canvas.get_pixel(49, 10).0, [255, 255, 255, 255]);
    assert_eq!(frame.canvas.get_pixel(50, 10).0, [255, 255, 255, 255]);
    assert_eq!(frame.canvas.get_pixel(48, 10).0, [255, 0, 0, 255]);
    assert_eq!(frame.canvas.get_pixel(51, 10).0, [0, 0, 255, 255]);
}

#[test]
fn rendering_the_same_context_twice_is_byte_identical() {
    let a = gradient(120, 90, 1);
    let b = gradient(120, 90, 77);
    let mut ctx = RenderContext::new(pair(a, b), SplitState::new(0.4, Orientation::Vertical));
    ctx.magnifier.enabled = true;
    ctx.magnifier.position = RelPoint::new(0.6, 0.45);

    let mut cache = RenderCache::new();
    let first = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    let second = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    assert_eq!(first.canvas.as_raw(), second.canvas.as_raw());

    // A cold cache must agree with the warm one.
    let mut fresh = RenderCache::new();
    let third = render_frame(&ctx, &mut fresh, &AbsDiff::default(), &NullOverlay).unwrap();
    assert_eq!(first.canvas.as_raw(), third.canvas.as_raw());
}

#[test]
fn spacing_below_threshold_merges_regardless_of_visibility() {
    let mut ctx = red_blue_ctx();
    ctx.magnifier.enabled = true;
    ctx.magnifier.spacing_frac = 0.01;
    ctx.magnifier.merge_threshold = 0.02;
    ctx.magnifier.visibility = LensVisibility {
        left: true,
        center: false,
        right: false,
    };

    let mut cache = RenderCache::new();
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    // The merged lens reports its drag hotspot.
    assert!(frame.combined_center.is_some());

    ctx.magnifier.spacing_frac = 0.03;
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    assert!(frame.combined_center.is_none());
}

#[test]
fn edge_diff_triptych_center_lens_shows_first_images_edges() {
    // Image 1 has a hard vertical boundary under the capture point; image 2
    // is featureless. The center lens must respond to image 1 only.
    let mut a = RgbaImage::from_pixel(200, 200, image::Rgba([0, 0, 0, 255]));
    for y in 0..200 {
        for x in 100..200 {
            a.put_pixel(x, y, image::Rgba([255, 255, 255, 255]));
        }
    }
    let a = Arc::new(a);
    let b = solid(200, 200, [0, 0, 0, 255]);

    let mut ctx = RenderContext::new(pair(a, b), SplitState::new(0.5, Orientation::Vertical));
    ctx.diff_mode = DiffMode::Edges;
    ctx.magnifier.enabled = true;
    ctx.magnifier.position = RelPoint::new(0.5, 0.5);
    ctx.magnifier.spacing_frac = 0.05;
    ctx.magnifier.show_guides = false;

    let mut cache = RenderCache::new();
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    // Triptych, not merged: no combined hotspot, but a lens group exists.
    assert!(frame.combined_center.is_none());
    let bounds = frame.lens_bounds.expect("triptych lens group");

    // The center lens sits at the capture point; its content contains the
    // edge response of image 1 (bright pixels off the ring).
    let cx = 100 + i64::from(frame.pad_left);
    let cy = 100 + i64::from(frame.pad_top);
    let mut bright = 0usize;
    for dy in -10i64..=10 {
        for dx in -10i64..=10 {
            let p = frame
                .canvas
                .get_pixel((cx + dx) as u32, (cy + dy) as u32)
                .0;
            if p[0] > 100 && p[1] > 100 && p[2] > 100 {
                bright += 1;
            }
        }
    }
    assert!(bright > 0, "expected edge response in the center lens");
    assert!(bounds.width() > 0.0);
}

#[test]
fn offscreen_lens_pads_the_canvas() {
    let mut ctx = red_blue_ctx();
    ctx.magnifier.enabled = true;
    ctx.magnifier.position = RelPoint::new(0.02, 0.02);
    ctx.magnifier.size_frac = 0.5;
    ctx.magnifier.spacing_frac = 0.0; // merged single lens at the marker

    let mut cache = RenderCache::new();
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    assert!(frame.pad_left > 0 || frame.pad_top > 0);
    assert!(frame.canvas.width() > 100 || frame.canvas.height() > 100);
    // Base image still sits at the padding offset.
    let inside = frame
        .canvas
        .get_pixel(frame.pad_left + 99, frame.pad_top + 99)
        .0;
    assert_eq!(inside, [0, 0, 255, 255]);
}

#[test]
fn interactive_settle_re_renders_with_the_primary_method() {
    let a = gradient(160, 160, 5);
    let b = gradient(160, 160, 91);
    let mut ctx = RenderContext::new(pair(a, b), SplitState::new(0.5, Orientation::Vertical));
    ctx.magnifier.enabled = true;
    ctx.magnifier.position = RelPoint::new(0.47, 0.53);
    ctx.interactive = true;

    let mut cache = RenderCache::new();
    let quick = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    let patches_after_interactive = cache.patch_count();

    ctx.interactive = false;
    let settled = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();

    // The settled pass cannot reuse optimized-method patches: new keys.
    assert!(cache.patch_count() > patches_after_interactive);
    assert_ne!(quick.canvas.as_raw(), settled.canvas.as_raw());
    assert!(quick.interactive);
    assert!(!settled.interactive);
}

#[test]
fn full_diff_mode_replaces_base_and_skips_divider() {
    let mut ctx = red_blue_ctx();
    ctx.diff_mode = DiffMode::Highlight;

    let mut cache = RenderCache::new();
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    // Red vs blue amplifies to magenta everywhere; no white divider column.
    assert_eq!(frame.canvas.get_pixel(50, 50).0, [255, 0, 255, 255]);
    assert_eq!(frame.canvas.get_pixel(49, 10).0, [255, 0, 255, 255]);
}

#[test]
fn lenses_sample_full_resolution_sources() {
    // Full-res originals are 2x the unified rasters; rendering must stay
    // consistent and deterministic across the scale boundary.
    let full_a = gradient(200, 200, 3);
    let full_b = gradient(200, 200, 49);
    let unify = |img: &RgbaImage| {
        Arc::new(image::imageops::resize(
            img,
            100,
            100,
            image::imageops::FilterType::Triangle,
        ))
    };
    let sources = SourcePair {
        unified_a: unify(full_a.as_ref()),
        unified_b: unify(full_b.as_ref()),
        full_a,
        full_b,
        id_a: SourceId(1),
        id_b: SourceId(2),
    };
    let mut ctx = RenderContext::new(sources, SplitState::new(0.5, Orientation::Vertical));
    ctx.magnifier.enabled = true;
    ctx.magnifier.position = RelPoint::new(0.5, 0.5);

    let mut cache = RenderCache::new();
    let first = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    let second = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    assert_eq!(first.canvas.as_raw(), second.canvas.as_raw());
    assert!(first.lens_bounds.is_some());
}

#[test]
fn tiny_capture_omits_lenses_but_keeps_the_frame() {
    let mut ctx = red_blue_ctx();
    ctx.magnifier.enabled = true;
    ctx.magnifier.capture_frac = 0.01; // 1px capture: degenerate crop

    let mut cache = RenderCache::new();
    let frame = render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).unwrap();
    assert_eq!(frame.canvas.get_pixel(25, 50).0, [255, 0, 0, 255]);
}

#[test]
fn mismatched_unified_sources_discard_the_frame() {
    let a = solid(100, 100, [255, 0, 0, 255]);
    let b = solid(90, 100, [0, 0, 255, 255]);
    let sources = SourcePair {
        unified_a: a.clone(),
        unified_b: b,
        full_a: a.clone(),
        full_b: a,
        id_a: SourceId(1),
        id_b: SourceId(2),
    };
    let ctx = RenderContext::new(sources, SplitState::new(0.5, Orientation::Vertical));
    let mut cache = RenderCache::new();
    assert!(render_frame(&ctx, &mut cache, &AbsDiff::default(), &NullOverlay).is_err());
}
