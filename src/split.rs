use image::RgbaImage;

use crate::{
    context::{ChannelMode, Orientation},
    diff::{DiffMode, DiffProvider},
    error::{PeekError, PeekResult},
    geom::split_pixel_position,
    raster,
};

/// Build the pre-lens base image from the two unified sources.
///
/// Full-comparison diff modes replace the base entirely with the diff map
/// (no split). Edge mode swaps both channel-filtered sides for their edge
/// maps and then splits. Everything else is a plain channel-filtered split
/// pasted at the rounded pixel position.
pub fn compose_base(
    a: &RgbaImage,
    b: &RgbaImage,
    visual_ratio: f64,
    orientation: Orientation,
    diff_mode: DiffMode,
    channel_mode: ChannelMode,
    diff: &dyn DiffProvider,
) -> PeekResult<RgbaImage> {
    if a.dimensions() != b.dimensions() {
        return Err(PeekError::fatal("unified sources differ in size"));
    }

    if diff_mode.replaces_base() {
        return diff
            .diff(a, Some(b), diff_mode)
            .ok_or_else(|| PeekError::fatal(format!("diff provider declined {diff_mode:?}")));
    }

    let (left, right);
    let (side_a, side_b) = if diff_mode.splits_edge_maps() {
        left = diff
            .diff(&apply_channel(a, channel_mode), None, DiffMode::Edges)
            .ok_or_else(|| PeekError::fatal("diff provider declined edge map for image 1"))?;
        right = diff
            .diff(&apply_channel(b, channel_mode), None, DiffMode::Edges)
            .ok_or_else(|| PeekError::fatal("diff provider declined edge map for image 2"))?;
        (&left, &right)
    } else if channel_mode == ChannelMode::All {
        (a, b)
    } else {
        left = apply_channel(a, channel_mode);
        right = apply_channel(b, channel_mode);
        (&left, &right)
    };

    Ok(split_paste(side_a, side_b, visual_ratio, orientation))
}

/// Isolate one channel as a grayscale view; `All` passes through.
pub fn apply_channel(img: &RgbaImage, mode: ChannelMode) -> RgbaImage {
    let pick: fn([u8; 4]) -> u8 = match mode {
        ChannelMode::All => return img.clone(),
        ChannelMode::Red => |p| p[0],
        ChannelMode::Green => |p| p[1],
        ChannelMode::Blue => |p| p[2],
        ChannelMode::Luma => {
            |p| (0.2126 * p[0] as f32 + 0.7152 * p[1] as f32 + 0.0722 * p[2] as f32) as u8
        }
    };
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let v = pick(px.0);
        px.0 = [v, v, v, px.0[3]];
    }
    out
}

fn split_paste(a: &RgbaImage, b: &RgbaImage, ratio: f64, orientation: Orientation) -> RgbaImage {
    let (w, h) = a.dimensions();
    match orientation {
        Orientation::Vertical => {
            let split = split_pixel_position(ratio, w);
            RgbaImage::from_fn(w, h, |x, y| {
                if x < split {
                    *a.get_pixel(x, y)
                } else {
                    *b.get_pixel(x, y)
                }
            })
        }
        Orientation::Horizontal => {
            let split = split_pixel_position(ratio, h);
            RgbaImage::from_fn(w, h, |x, y| {
                if y < split {
                    *a.get_pixel(x, y)
                } else {
                    *b.get_pixel(x, y)
                }
            })
        }
    }
}

/// Divider stroke over the pasted base, centered on the split position.
/// `(base_left, base_top)` locate the base image inside the padded canvas.
pub fn draw_divider(
    canvas: &mut RgbaImage,
    base_left: i64,
    base_top: i64,
    base_w: u32,
    base_h: u32,
    visual_ratio: f64,
    orientation: Orientation,
    color: [u8; 4],
    thickness: f32,
) {
    let t = f64::from(thickness.max(0.0));
    if t <= 0.0 {
        return;
    }
    match orientation {
        Orientation::Vertical => {
            let split = i64::from(split_pixel_position(visual_ratio, base_w));
            let x0 = base_left + split - (t / 2.0).round() as i64;
            let x1 = x0 + t.round().max(1.0) as i64;
            raster::fill_rect(canvas, x0, base_top, x1, base_top + i64::from(base_h), color);
        }
        Orientation::Horizontal => {
            let split = i64::from(split_pixel_position(visual_ratio, base_h));
            let y0 = base_top + split - (t / 2.0).round() as i64;
            let y1 = y0 + t.round().max(1.0) as i64;
            raster::fill_rect(canvas, base_left, y0, base_left + i64::from(base_w), y1, color);
        }
    }
}
