use std::sync::Arc;

use image::RgbaImage;
use kurbo::{Point, Rect};

use crate::{
    cache::{BaseKey, PatchKey, RenderCache},
    context::{InterpUsage, Orientation, RelPoint, RenderContext, SourceId},
    diff::{DiffMode, DiffProvider},
    error::{PeekError, PeekResult},
    geom::{
        CanvasPadding, CropBox, LayoutDecision, LensCenters, canvas_padding,
        capture_ring_thickness, clamp_capture_position, compute_crop_box, compute_lens_centers,
        lens_group_bounds, resolve_layout, split_pixel_position,
    },
    guides, lens,
    overlay::Overlay,
    raster,
    sample::{self, Interpolation, crop_areas_diverge},
    split,
};

/// Diff-lens inputs always use this method so analysis results do not
/// depend on display quality settings.
const ANALYSIS_INTERPOLATION: Interpolation = Interpolation::Bilinear;

/// Allocation guard for the padded canvas.
const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// One rendered frame plus the metadata the interaction layer needs.
///
/// `seq` and `interactive` echo the inputs so a receiver can judge
/// staleness without re-reading shared state that may have moved on.
#[derive(Clone, Debug)]
pub struct RenderedFrame {
    pub canvas: RgbaImage,
    /// How far the canvas extends left/up beyond the base image to fit an
    /// off-canvas lens; place the canvas at `(-pad_left, -pad_top)`.
    pub pad_left: u32,
    pub pad_top: u32,
    /// Bounding box of the lens group in canvas coordinates (hit testing).
    pub lens_bounds: Option<Rect>,
    /// Center of the combined lens in canvas coordinates, when one was
    /// drawn; the drag hotspot for a merged lens.
    pub combined_center: Option<Point>,
    pub interactive: bool,
    pub seq: u64,
}

/// Render one frame from an immutable context.
///
/// Stage order: base image (cached) → canvas allocation with padding →
/// paste → divider → capture ring → lenses → guides → overlay. Lens-local
/// failures degrade to an omitted lens; anything else discards the frame.
#[tracing::instrument(skip_all, fields(seq = ctx.seq, interactive = ctx.interactive))]
pub fn render_frame(
    ctx: &RenderContext,
    cache: &mut RenderCache,
    diff: &dyn DiffProvider,
    overlay: &dyn Overlay,
) -> PeekResult<RenderedFrame> {
    let result = render_frame_inner(ctx, cache, diff, overlay);
    if let Err(e) = &result {
        tracing::error!(error = %e, seq = ctx.seq, "frame discarded");
    }
    result
}

fn render_frame_inner(
    ctx: &RenderContext,
    cache: &mut RenderCache,
    diff: &dyn DiffProvider,
    overlay: &dyn Overlay,
) -> PeekResult<RenderedFrame> {
    ctx.validate()?;
    let (base_w, base_h) = ctx.sources.canvas_size();

    let base = base_image(ctx, cache, diff)?;

    let plan = match plan_magnifier(ctx, base_w, base_h) {
        Ok(plan) => plan,
        Err(e) if e.is_lens_recoverable() => {
            tracing::warn!(error = %e, "magnifier omitted");
            None
        }
        Err(e) => return Err(e),
    };

    let padding = plan.as_ref().map(|p| p.padding).unwrap_or_default();
    let canvas_w = base_w + padding.left + padding.right;
    let canvas_h = base_h + padding.top + padding.bottom;
    if u64::from(canvas_w) * u64::from(canvas_h) > MAX_CANVAS_PIXELS {
        return Err(PeekError::fatal(format!(
            "padded canvas {canvas_w}x{canvas_h} exceeds the allocation limit"
        )));
    }
    let mut canvas = RgbaImage::new(canvas_w, canvas_h);
    let (off_x, off_y) = (i64::from(padding.left), i64::from(padding.top));

    raster::paste(&mut canvas, &base, off_x, off_y);

    if ctx.diff_mode == DiffMode::Off {
        split::draw_divider(
            &mut canvas,
            off_x,
            off_y,
            base_w,
            base_h,
            ctx.split.visual_ratio,
            ctx.split.orientation,
            ctx.style.divider_color,
            ctx.style.divider_thickness,
        );
    }

    let mut lens_bounds = None;
    let mut combined_center = None;

    if let Some(plan) = &plan {
        let pad_vec = kurbo::Vec2::new(off_x as f64, off_y as f64);
        draw_capture_ring(
            &mut canvas,
            plan.marker + pad_vec,
            plan.capture_d,
            plan.ring_t,
            ctx.style.capture_ring_color,
        );

        let drawn = draw_lenses(ctx, plan, cache, diff, &mut canvas, off_x, off_y)?;
        combined_center = drawn.combined_center;
        lens_bounds =
            lens_group_bounds(&plan.centers, f64::from(plan.size_px)).map(|r| r + pad_vec);

        if ctx.magnifier.show_guides {
            let marker = plan.marker + pad_vec;
            let smoothing = ctx
                .quality
                .resolve(InterpUsage::GuideSmoothing, ctx.interactive);
            for (center, radius) in &drawn.circles {
                guides::draw_guide(
                    &mut canvas,
                    marker,
                    plan.capture_d / 2.0,
                    *center,
                    *radius,
                    ctx.style.guide_color,
                    ctx.style.guide_thickness,
                    smoothing,
                    ctx.interactive,
                );
            }
        }
    }

    if let Some((name_a, name_b)) = &ctx.filenames {
        let image_rect = Rect::new(
            off_x as f64,
            off_y as f64,
            off_x as f64 + f64::from(base_w),
            off_y as f64 + f64::from(base_h),
        );
        let split_px = match ctx.split.orientation {
            Orientation::Vertical => split_pixel_position(ctx.split.visual_ratio, base_w),
            Orientation::Horizontal => split_pixel_position(ctx.split.visual_ratio, base_h),
        };
        overlay.draw_filenames(
            &mut canvas,
            image_rect,
            split_px,
            ctx.style.divider_thickness,
            name_a,
            name_b,
        )?;
    }

    Ok(RenderedFrame {
        canvas,
        pad_left: padding.left,
        pad_top: padding.top,
        lens_bounds,
        combined_center,
        interactive: ctx.interactive,
        seq: ctx.seq,
    })
}

fn base_image(
    ctx: &RenderContext,
    cache: &mut RenderCache,
    diff: &dyn DiffProvider,
) -> PeekResult<Arc<RgbaImage>> {
    let key = base_key(ctx);
    if let Some(hit) = cache.base(&key) {
        return Ok(hit);
    }
    let composed = split::compose_base(
        &ctx.sources.unified_a,
        &ctx.sources.unified_b,
        ctx.split.visual_ratio,
        ctx.split.orientation,
        ctx.diff_mode,
        ctx.channel_mode,
        diff,
    )?;
    Ok(cache.set_base(key, composed))
}

fn base_key(ctx: &RenderContext) -> BaseKey {
    BaseKey::new(
        ctx.sources.id_a,
        ctx.sources.id_b,
        ctx.split.visual_ratio,
        ctx.split.orientation,
        ctx.diff_mode,
        ctx.channel_mode,
        ctx.style.divider_color,
        ctx.style.divider_thickness,
    )
}

/// Everything lens geometry resolves to before any pixel work.
#[derive(Debug)]
struct MagnifierPlan {
    size_px: u32,
    content_d: u32,
    capture_d: f64,
    ring_t: f64,
    rel: RelPoint,
    /// Marker center in base-image pixels.
    marker: Point,
    decision: LayoutDecision,
    centers: LensCenters,
    padding: CanvasPadding,
}

fn plan_magnifier(
    ctx: &RenderContext,
    base_w: u32,
    base_h: u32,
) -> PeekResult<Option<MagnifierPlan>> {
    if !ctx.magnifier.enabled {
        return Ok(None);
    }
    let m = &ctx.magnifier;
    let shorter = f64::from(base_w.min(base_h));

    let size_px = (m.size_frac * shorter).round() as u32;
    let content_d = lens::content_diameter(size_px)?;
    let capture_d = m.capture_frac * shorter;
    let ring_t = capture_ring_thickness(capture_d);

    let rel = clamp_capture_position(m.position, base_w, base_h, m.capture_frac);
    let marker = rel.to_pixels(base_w, base_h);

    let decision = resolve_layout(
        ctx.diff_mode.is_active(),
        m.spacing_frac,
        m.merge_threshold,
        m.visibility,
    );
    let centers = compute_lens_centers(
        marker,
        f64::from(size_px),
        m.spacing_frac * shorter,
        ctx.split.orientation,
        &decision,
    );
    let padding = canvas_padding(
        lens_group_bounds(&centers, f64::from(size_px)),
        base_w,
        base_h,
    );

    Ok(Some(MagnifierPlan {
        size_px,
        content_d,
        capture_d,
        ring_t,
        rel,
        marker,
        decision,
        centers,
        padding,
    }))
}

struct DrawnLenses {
    /// Canvas-space center + radius of every lens actually composited.
    circles: Vec<(Point, f64)>,
    combined_center: Option<Point>,
}

fn draw_lenses(
    ctx: &RenderContext,
    plan: &MagnifierPlan,
    cache: &mut RenderCache,
    diff: &dyn DiffProvider,
    canvas: &mut RgbaImage,
    off_x: i64,
    off_y: i64,
) -> PeekResult<DrawnLenses> {
    let method = ctx.quality.resolve(InterpUsage::LensMovement, ctx.interactive);
    let base_w = ctx.sources.canvas_size().0;

    let crop_a = source_crop(plan, &ctx.sources.full_a, base_w);
    let crop_b = source_crop(plan, &ctx.sources.full_b, base_w);
    let force_subpixel = match (&crop_a, &crop_b) {
        (Ok(a), Ok(b)) => crop_areas_diverge(a, b),
        _ => false,
    };

    let mut drawn = DrawnLenses {
        circles: Vec::new(),
        combined_center: None,
    };

    // Each slot fails independently; a recoverable error omits that lens
    // and the frame carries on.
    let finish_slot = |canvas: &mut RgbaImage,
                           drawn: &mut DrawnLenses,
                           slot: &str,
                           center: Option<Point>,
                           result: PeekResult<RgbaImage>,
                           is_combined: bool|
     -> PeekResult<()> {
        let Some(center) = center else {
            return Ok(());
        };
        match result {
            Ok(bitmap) => {
                let half = f64::from(plan.size_px) / 2.0;
                let left = off_x + (center.x - half).round() as i64;
                let top = off_y + (center.y - half).round() as i64;
                raster::paste(canvas, &bitmap, left, top);
                let canvas_center = Point::new(center.x + off_x as f64, center.y + off_y as f64);
                drawn.circles.push((canvas_center, half));
                if is_combined {
                    drawn.combined_center = Some(canvas_center);
                }
                Ok(())
            }
            Err(e) if e.is_lens_recoverable() => {
                tracing::warn!(slot, error = %e, "lens omitted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    if plan.decision.left {
        let result = crop_a.as_ref().map_err(clone_err).and_then(|crop| {
            let patch = sampled_patch(
                cache,
                &ctx.sources.full_a,
                ctx.sources.id_a,
                crop,
                plan.content_d,
                method,
                force_subpixel,
            )?;
            lens::compose_single(
                &patch,
                plan.size_px,
                ctx.style.lens_border_color,
                &mut cache.masks,
            )
        });
        finish_slot(canvas, &mut drawn, "left", plan.centers.left, result, false)?;
    }

    if plan.decision.right {
        let result = crop_b.as_ref().map_err(clone_err).and_then(|crop| {
            let patch = sampled_patch(
                cache,
                &ctx.sources.full_b,
                ctx.sources.id_b,
                crop,
                plan.content_d,
                method,
                force_subpixel,
            )?;
            lens::compose_single(
                &patch,
                plan.size_px,
                ctx.style.lens_border_color,
                &mut cache.masks,
            )
        });
        finish_slot(canvas, &mut drawn, "right", plan.centers.right, result, false)?;
    }

    if plan.decision.center {
        let result =
            center_lens_content(ctx, plan, cache, diff, &crop_a, &crop_b).and_then(|content| {
                lens::compose_single(
                    &content,
                    plan.size_px,
                    ctx.style.lens_border_color,
                    &mut cache.masks,
                )
            });
        finish_slot(canvas, &mut drawn, "center", plan.centers.center, result, false)?;
    }

    if plan.decision.combined {
        let result = match (&crop_a, &crop_b) {
            (Ok(ca), Ok(cb)) => sampled_patch(
                cache,
                &ctx.sources.full_a,
                ctx.sources.id_a,
                ca,
                plan.content_d,
                method,
                force_subpixel,
            )
            .and_then(|pa| {
                let pb = sampled_patch(
                    cache,
                    &ctx.sources.full_b,
                    ctx.sources.id_b,
                    cb,
                    plan.content_d,
                    method,
                    force_subpixel,
                )?;
                lens::compose_combined(
                    &pa,
                    &pb,
                    plan.size_px,
                    ctx.magnifier.combined_ratio,
                    ctx.magnifier.combined_orientation,
                    &ctx.style,
                    &mut cache.masks,
                )
            }),
            (Err(e), _) | (_, Err(e)) => Err(clone_err(e)),
        };
        finish_slot(
            canvas,
            &mut drawn,
            "combined",
            plan.centers.combined,
            result,
            true,
        )?;
    }

    Ok(drawn)
}

/// Crop box for one full-resolution source: the capture geometry is defined
/// in base-canvas pixels and rescaled into the source's own pixel space.
fn source_crop(plan: &MagnifierPlan, source: &RgbaImage, base_w: u32) -> PeekResult<CropBox> {
    let scale = f64::from(source.width()) / f64::from(base_w);
    compute_crop_box(
        plan.rel,
        source.width(),
        source.height(),
        plan.capture_d * scale,
        plan.ring_t * scale,
    )
}

fn clone_err(e: &PeekError) -> PeekError {
    match e {
        PeekError::Geometry(m) => PeekError::Geometry(m.clone()),
        PeekError::Sampling(m) => PeekError::Sampling(m.clone()),
        PeekError::Compositing(m) => PeekError::Compositing(m.clone()),
        PeekError::Fatal(m) => PeekError::Fatal(m.clone()),
        PeekError::Other(e) => PeekError::Fatal(e.to_string()),
    }
}

fn sampled_patch(
    cache: &mut RenderCache,
    source: &RgbaImage,
    id: SourceId,
    crop: &CropBox,
    target: u32,
    method: Interpolation,
    force_subpixel: bool,
) -> PeekResult<Arc<RgbaImage>> {
    let key = PatchKey::new(id, source.dimensions(), crop, target, method, force_subpixel);
    if let Some(hit) = cache.patch(&key) {
        return Ok(hit);
    }
    let sampled = if force_subpixel {
        sample::sample_subpixel(source, crop, target, method)?
    } else {
        sample::sample(source, crop, target, method)?
    };
    Ok(cache.insert_patch(key, sampled))
}

/// Content for the diff lens.
///
/// Full-comparison modes resample the already-rendered diff map (the base
/// image) at the capture point; edge mode, and any resample failure, fall
/// back to running the diff function on freshly sampled analysis patches.
fn center_lens_content(
    ctx: &RenderContext,
    plan: &MagnifierPlan,
    cache: &mut RenderCache,
    diff: &dyn DiffProvider,
    crop_a: &PeekResult<CropBox>,
    crop_b: &PeekResult<CropBox>,
) -> PeekResult<RgbaImage> {
    let (base_w, base_h) = ctx.sources.canvas_size();

    if ctx.diff_mode.replaces_base()
        && let Some(map) = cache.base(&base_key(ctx))
    {
        // The base *is* the full-image diff map in these modes.
        let crop = compute_crop_box(plan.rel, base_w, base_h, plan.capture_d, plan.ring_t)?;
        if let Ok(content) = sample::sample(&map, &crop, plan.content_d, ANALYSIS_INTERPOLATION) {
            return Ok(content);
        }
    }

    let ca = crop_a.as_ref().map_err(clone_err)?;
    let pa = sample::sample_subpixel(
        &ctx.sources.full_a,
        ca,
        plan.content_d,
        ANALYSIS_INTERPOLATION,
    )?;

    if ctx.diff_mode.splits_edge_maps() {
        return diff
            .diff(&pa, None, DiffMode::Edges)
            .ok_or_else(|| PeekError::sampling("diff provider declined the lens edge map"));
    }

    let cb = crop_b.as_ref().map_err(clone_err)?;
    let pb = sample::sample_subpixel(
        &ctx.sources.full_b,
        cb,
        plan.content_d,
        ANALYSIS_INTERPOLATION,
    )?;
    diff.diff(&pa, Some(&pb), ctx.diff_mode)
        .ok_or_else(|| PeekError::sampling("diff provider declined the lens diff"))
}

/// Anti-aliased annulus marking the sampled source location.
fn draw_capture_ring(
    canvas: &mut RgbaImage,
    center: Point,
    diameter: f64,
    thickness: f64,
    color: [u8; 4],
) {
    let radius = diameter / 2.0;
    if radius <= 0.0 {
        return;
    }
    let inner = (radius - thickness).max(0.0);
    let x0 = (center.x - radius - 1.0).floor() as i64;
    let y0 = (center.y - radius - 1.0).floor() as i64;
    let x1 = (center.x + radius + 1.0).ceil() as i64;
    let y1 = (center.y + radius + 1.0).ceil() as i64;
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - center.x;
            let dy = y as f64 + 0.5 - center.y;
            let dist = (dx * dx + dy * dy).sqrt();
            let outer_cov = (radius - dist + 0.5).clamp(0.0, 1.0);
            let inner_cov = (dist - inner + 0.5).clamp(0.0, 1.0);
            let coverage = (outer_cov * inner_cov) as f32;
            if coverage > 0.0 {
                raster::blend_pixel(canvas, x, y, raster::with_alpha(color, coverage));
            }
        }
    }
}
