use kurbo::{Point, Rect, Vec2};

use crate::{
    context::{LensVisibility, Orientation, RelPoint},
    error::{PeekError, PeekResult},
};

/// Capture-ring stroke width for a given capture diameter, in pixels.
pub fn capture_ring_thickness(diameter_px: f64) -> f64 {
    (0.1 * diameter_px.sqrt()).clamp(2.0, 8.0)
}

/// Rounded (not truncated) split position, so a 0.5 ratio lands on the true
/// center instead of biasing one pixel low.
pub fn split_pixel_position(ratio: f64, extent: u32) -> u32 {
    ((ratio.clamp(0.0, 1.0) * f64::from(extent)).round() as u32).min(extent)
}

/// Keeps the capture circle fully inside the canvas.
///
/// The radius is computed against the shorter dimension, then converted to
/// per-axis relative radii so non-square canvases clamp correctly.
pub fn clamp_capture_position(
    rel: RelPoint,
    canvas_w: u32,
    canvas_h: u32,
    capture_frac: f64,
) -> RelPoint {
    let w = f64::from(canvas_w.max(1));
    let h = f64::from(canvas_h.max(1));
    let radius_px = capture_frac.clamp(0.0, 1.0) * w.min(h) / 2.0;
    let rx = (radius_px / w).min(0.5);
    let ry = (radius_px / h).min(0.5);
    RelPoint::new(rel.x.clamp(rx, 1.0 - rx), rel.y.clamp(ry, 1.0 - ry))
}

/// A sampling region in source-pixel space. Bounds are fractional; square
/// except when clamping against the source extent forced a shrink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl CropBox {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// True when all four bounds sit exactly on pixel edges, enabling the
    /// plain crop+resize fast path.
    pub fn is_integer_aligned(&self) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.fract() == 0.0)
    }
}

/// Source-space sampling box for the capture circle.
///
/// The inner square is the capture diameter minus the ring stroke on both
/// sides, centered at `rel`. The box is translated fully inside the source
/// first and only shrunk when it is larger than the source itself, so it
/// stays square in every reachable case.
pub fn compute_crop_box(
    rel: RelPoint,
    src_w: u32,
    src_h: u32,
    capture_diameter_px: f64,
    thickness_px: f64,
) -> PeekResult<CropBox> {
    let inner = capture_diameter_px - 2.0 * thickness_px;
    if !(inner >= 1.0) {
        return Err(PeekError::geometry(format!(
            "capture interior collapsed ({inner:.2}px across)"
        )));
    }
    let (w, h) = (f64::from(src_w), f64::from(src_h));
    if w < 1.0 || h < 1.0 {
        return Err(PeekError::geometry("source raster is empty"));
    }

    let half = inner / 2.0;
    let cx = rel.x * w;
    let cy = rel.y * h;

    let (mut left, mut right) = shift_span(cx - half, cx + half, w);
    let (mut top, mut bottom) = shift_span(cy - half, cy + half, h);

    // Larger than the source on an axis: clamp to the full extent.
    left = left.max(0.0);
    top = top.max(0.0);
    right = right.min(w);
    bottom = bottom.min(h);

    let cropped = CropBox {
        left,
        top,
        right,
        bottom,
    };
    if cropped.width() < 1.0 || cropped.height() < 1.0 {
        return Err(PeekError::geometry("crop box degenerated after clamping"));
    }
    Ok(cropped)
}

/// Translate `[lo, hi]` to lie inside `[0, extent]` without changing its
/// length, favoring the low edge when the span is longer than the extent.
fn shift_span(lo: f64, hi: f64, extent: f64) -> (f64, f64) {
    let len = hi - lo;
    if len >= extent {
        return (lo, hi);
    }
    if lo < 0.0 {
        (0.0, len)
    } else if hi > extent {
        (extent - len, extent)
    } else {
        (lo, hi)
    }
}

/// The four lens arrangements, resolved once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LensLayout {
    TwoSeparate,
    OneCombined,
    DiffTriptych,
    DiffPlusCombined,
}

/// Layout plus the lens slots that actually get drawn. The diff layouts
/// force the center lens on; merging discards the separate flanks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutDecision {
    pub layout: LensLayout,
    pub left: bool,
    pub center: bool,
    pub right: bool,
    pub combined: bool,
}

pub fn resolve_layout(
    diff_active: bool,
    spacing_frac: f64,
    merge_threshold: f64,
    requested: LensVisibility,
) -> LayoutDecision {
    let merged = spacing_frac < merge_threshold;
    match (diff_active, merged) {
        (true, true) => LayoutDecision {
            layout: LensLayout::DiffPlusCombined,
            left: false,
            center: true,
            right: false,
            combined: true,
        },
        (true, false) => LayoutDecision {
            layout: LensLayout::DiffTriptych,
            left: requested.left,
            center: true,
            right: requested.right,
            combined: false,
        },
        (false, true) => LayoutDecision {
            layout: LensLayout::OneCombined,
            left: false,
            center: false,
            right: false,
            combined: true,
        },
        (false, false) => LayoutDecision {
            layout: LensLayout::TwoSeparate,
            left: requested.left,
            center: false,
            right: requested.right,
            combined: false,
        },
    }
}

/// Pixel centers for each enabled lens slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LensCenters {
    pub left: Option<Point>,
    pub center: Option<Point>,
    pub right: Option<Point>,
    pub combined: Option<Point>,
}

impl LensCenters {
    pub fn iter(&self) -> impl Iterator<Item = Point> {
        [self.left, self.center, self.right, self.combined]
            .into_iter()
            .flatten()
    }
}

/// Offset from the merged position to the combined lens in the
/// diff-plus-combined arrangement.
const COMBINED_LENS_GAP_PX: f64 = 8.0;

pub fn compute_lens_centers(
    midpoint: Point,
    size_px: f64,
    spacing_px: f64,
    orientation: Orientation,
    decision: &LayoutDecision,
) -> LensCenters {
    let axis = orientation.split_axis();
    let mut centers = LensCenters::default();
    match decision.layout {
        LensLayout::TwoSeparate => {
            let offset = axis * (size_px / 2.0 + spacing_px / 2.0);
            centers.left = decision.left.then(|| midpoint - offset);
            centers.right = decision.right.then(|| midpoint + offset);
        }
        LensLayout::OneCombined => {
            centers.combined = Some(midpoint);
        }
        LensLayout::DiffTriptych => {
            let flank = axis * size_px.max(size_px + spacing_px);
            centers.center = Some(midpoint);
            centers.left = decision.left.then(|| midpoint - flank);
            centers.right = decision.right.then(|| midpoint + flank);
        }
        LensLayout::DiffPlusCombined => {
            let perp = orientation.perpendicular().split_axis();
            centers.center = Some(midpoint);
            centers.combined = Some(midpoint + perp * (size_px + COMBINED_LENS_GAP_PX));
        }
    }
    centers
}

/// Bounding box of all enabled lens circles; drives canvas padding and the
/// drag hit test.
pub fn lens_group_bounds(centers: &LensCenters, size_px: f64) -> Option<Rect> {
    let half = size_px / 2.0;
    let mut bounds: Option<Rect> = None;
    for c in centers.iter() {
        let r = Rect::new(c.x - half, c.y - half, c.x + half, c.y + half);
        bounds = Some(match bounds {
            Some(b) => b.union(r),
            None => r,
        });
    }
    bounds
}

/// How far a lens bounding box spills past the base image on each side.
/// Canvas size = base size + these paddings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanvasPadding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

pub fn canvas_padding(bounds: Option<Rect>, base_w: u32, base_h: u32) -> CanvasPadding {
    let Some(b) = bounds else {
        return CanvasPadding::default();
    };
    let overflow = |v: f64| (v.max(0.0).ceil()) as u32;
    CanvasPadding {
        left: overflow(-b.x0),
        top: overflow(-b.y0),
        right: overflow(b.x1 - f64::from(base_w)),
        bottom: overflow(b.y1 - f64::from(base_h)),
    }
}

pub fn unit_towards(from: Point, to: Point) -> Option<Vec2> {
    let d = to - from;
    let len = d.hypot();
    (len > f64::EPSILON).then(|| d / len)
}
