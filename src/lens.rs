use image::RgbaImage;

use crate::{
    context::{Orientation, Style},
    error::{PeekError, PeekResult},
    geom::split_pixel_position,
    mask::CircularMaskCache,
    raster,
};

/// Border ring stroke for a lens of the given diameter.
pub fn border_width(size: u32) -> u32 {
    ((0.015 * f64::from(size)).round() as u32).max(2)
}

/// Diameter of the content circle inside the border ring.
pub fn content_diameter(size: u32) -> PeekResult<u32> {
    let bw = border_width(size);
    size.checked_sub(2 * bw)
        .filter(|&d| d >= 1)
        .ok_or_else(|| {
            PeekError::compositing(format!("lens of {size}px leaves no room for content"))
        })
}

/// One circular lens: opaque border ring, then the content patch masked to
/// the inner circle and inset by the border width. The patch must already
/// be sampled at [`content_diameter`].
pub fn compose_single(
    patch: &RgbaImage,
    size: u32,
    border_color: [u8; 4],
    masks: &mut CircularMaskCache,
) -> PeekResult<RgbaImage> {
    ring_and_content(patch, size, border_color, masks)
}

/// One circular lens whose content is split between two patches along the
/// combined lens's own ratio/orientation (independent of the main split).
/// The divider is drawn inside the content circle only.
pub fn compose_combined(
    patch_a: &RgbaImage,
    patch_b: &RgbaImage,
    size: u32,
    inner_ratio: f64,
    inner_orientation: Orientation,
    style: &Style,
    masks: &mut CircularMaskCache,
) -> PeekResult<RgbaImage> {
    let content_d = content_diameter(size)?;
    if patch_a.dimensions() != (content_d, content_d)
        || patch_b.dimensions() != (content_d, content_d)
    {
        return Err(PeekError::compositing(format!(
            "combined lens patches must be {content_d}px square (got {:?} and {:?})",
            patch_a.dimensions(),
            patch_b.dimensions()
        )));
    }

    let split_px = split_pixel_position(inner_ratio, content_d);
    let mut content = patch_a.clone();
    match inner_orientation {
        Orientation::Vertical => {
            for y in 0..content_d {
                for x in split_px..content_d {
                    content.put_pixel(x, y, *patch_b.get_pixel(x, y));
                }
            }
        }
        Orientation::Horizontal => {
            for y in split_px..content_d {
                for x in 0..content_d {
                    content.put_pixel(x, y, *patch_b.get_pixel(x, y));
                }
            }
        }
    }

    draw_inner_divider(&mut content, split_px, inner_orientation, style);
    ring_and_content(&content, size, style.lens_border_color, masks)
}

fn draw_inner_divider(
    content: &mut RgbaImage,
    split_px: u32,
    orientation: Orientation,
    style: &Style,
) {
    let t = f64::from(style.lens_divider_thickness.max(0.0));
    if t <= 0.0 {
        return;
    }
    let lo = (f64::from(split_px) - t / 2.0).round() as i64;
    let hi = (f64::from(split_px) + t / 2.0).round() as i64;
    let extent = i64::from(content.width());
    match orientation {
        Orientation::Vertical => {
            raster::fill_rect(content, lo, 0, hi, extent, style.lens_divider_color);
        }
        Orientation::Horizontal => {
            raster::fill_rect(content, 0, lo, extent, hi, style.lens_divider_color);
        }
    }
}

fn ring_and_content(
    content: &RgbaImage,
    size: u32,
    border_color: [u8; 4],
    masks: &mut CircularMaskCache,
) -> PeekResult<RgbaImage> {
    let bw = border_width(size);
    let content_d = content_diameter(size)?;
    if content.dimensions() != (content_d, content_d) {
        return Err(PeekError::compositing(format!(
            "lens patch must be {content_d}px square (got {:?})",
            content.dimensions()
        )));
    }

    let full_mask = masks.mask(size)?;
    let inner_mask = masks.mask(content_d)?;

    let mut out = RgbaImage::new(size, size);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let m = full_mask.get_pixel(x, y).0[0];
        if m > 0 {
            px.0 = raster::with_alpha(border_color, f32::from(m) / 255.0);
        }
    }

    for (x, y, p) in content.enumerate_pixels() {
        let m = inner_mask.get_pixel(x, y).0[0];
        if m == 0 {
            continue;
        }
        let src = raster::with_alpha(p.0, f32::from(m) / 255.0);
        raster::blend_pixel(&mut out, i64::from(x + bw), i64::from(y + bw), src);
    }

    Ok(out)
}
