use image::{RgbaImage, imageops};
use kurbo::Point;

use crate::{geom::unit_towards, raster, sample::Interpolation};

/// Supersampling factor for settled-quality guide strokes.
const FINAL_SCALE: u32 = 4;

/// Draw the connector between the capture marker and one lens.
///
/// The stroke covers only the segment strictly outside both circles; if the
/// circles touch or overlap there is nothing to connect and nothing is
/// drawn. Returns whether a stroke was emitted.
///
/// Interactive frames get a single-pass opaque stroke. Final frames render
/// the same segment at 4x into a small buffer, downsample it with the
/// configured smoothing filter and alpha-composite the result, which
/// anti-aliases without supersampling the whole canvas.
pub fn draw_guide(
    canvas: &mut RgbaImage,
    marker_center: Point,
    marker_radius: f64,
    lens_center: Point,
    lens_radius: f64,
    color: [u8; 4],
    thickness: f32,
    smoothing: Interpolation,
    interactive: bool,
) -> bool {
    let Some(unit) = unit_towards(marker_center, lens_center) else {
        return false;
    };
    let gap = (lens_center - marker_center).hypot() - marker_radius - lens_radius;
    if gap <= 0.0 {
        return false;
    }

    let start = marker_center + unit * marker_radius;
    let end = lens_center - unit * lens_radius;
    let thickness = f64::from(thickness.max(0.5));

    if interactive {
        stroke_segment(canvas, start, end, thickness, color);
        return true;
    }

    // Tight buffer around the segment, rendered at FINAL_SCALE.
    let pad = thickness / 2.0 + 1.0;
    let x0 = (start.x.min(end.x) - pad).floor() as i64;
    let y0 = (start.y.min(end.y) - pad).floor() as i64;
    let x1 = (start.x.max(end.x) + pad).ceil() as i64;
    let y1 = (start.y.max(end.y) + pad).ceil() as i64;
    let (bw, bh) = ((x1 - x0).max(1) as u32, (y1 - y0).max(1) as u32);

    let mut hi = RgbaImage::new(bw * FINAL_SCALE, bh * FINAL_SCALE);
    let scale = f64::from(FINAL_SCALE);
    let local = |p: Point| Point::new((p.x - x0 as f64) * scale, (p.y - y0 as f64) * scale);
    stroke_segment(&mut hi, local(start), local(end), thickness * scale, color);

    let smooth = imageops::resize(&hi, bw, bh, smoothing.filter());
    raster::paste(canvas, &smooth, x0, y0);
    true
}

/// Hard-edged stroke: every pixel within `thickness / 2` of the segment is
/// written with the color's own alpha, no edge ramp.
fn stroke_segment(img: &mut RgbaImage, a: Point, b: Point, thickness: f64, color: [u8; 4]) {
    let half = thickness / 2.0;
    let x0 = ((a.x.min(b.x) - half).floor() as i64).max(0);
    let y0 = ((a.y.min(b.y) - half).floor() as i64).max(0);
    let x1 = ((a.x.max(b.x) + half).ceil() as i64).min(i64::from(img.width()));
    let y1 = ((a.y.max(b.y) + half).ceil() as i64).min(i64::from(img.height()));

    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            if dist_to_segment(p, a, b) <= half {
                raster::blend_pixel(img, x, y, color);
            }
        }
    }
}

fn dist_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 <= f64::EPSILON {
        return (p - a).hypot();
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot()
}
