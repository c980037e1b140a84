//! Straight-alpha RGBA8 pixel helpers shared by the compositing stages.

use image::RgbaImage;

/// Source-over for straight (non-premultiplied) alpha.
pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let sc = f32::from(src[c]);
        let dc = f32::from(dst[c]);
        let v = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

/// Scale a color's alpha by `factor` in `[0, 1]`.
pub fn with_alpha(color: [u8; 4], factor: f32) -> [u8; 4] {
    let a = (f32::from(color[3]) * factor.clamp(0.0, 1.0))
        .round()
        .clamp(0.0, 255.0) as u8;
    [color[0], color[1], color[2], a]
}

/// Blend one pixel; coordinates outside the image are ignored.
pub fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, src: [u8; 4]) {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let dst = img.get_pixel(x, y).0;
    img.put_pixel(x, y, image::Rgba(over(dst, src)));
}

/// Alpha-composite `src` over `dst` with its top-left corner at
/// `(left, top)`; the overlap is clipped to `dst`.
pub fn paste(dst: &mut RgbaImage, src: &RgbaImage, left: i64, top: i64) {
    for (sx, sy, px) in src.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        blend_pixel(dst, left + i64::from(sx), top + i64::from(sy), px.0);
    }
}

/// Blended axis-aligned fill, clipped to the image.
pub fn fill_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 4]) {
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(i64::from(img.width()));
    let y1 = y1.min(i64::from(img.height()));
    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(img, x, y, color);
        }
    }
}
