use image::{RgbaImage, imageops};

use crate::{
    error::{PeekError, PeekResult},
    geom::CropBox,
};

/// Resampling methods ordered as a speed ladder. Quality resolution
/// compares ranks, never filter identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
    HighQualityLanczos,
}

impl Interpolation {
    pub fn speed_rank(self) -> u8 {
        match self {
            Self::Nearest => 0,
            Self::Bilinear => 1,
            Self::Bicubic => 2,
            Self::Lanczos => 3,
            Self::HighQualityLanczos => 4,
        }
    }

    /// The faster of the two by rank; ties keep the primary.
    pub fn faster_of(primary: Self, optimized: Self) -> Self {
        if optimized.speed_rank() < primary.speed_rank() {
            optimized
        } else {
            primary
        }
    }

    pub fn filter(self) -> imageops::FilterType {
        match self {
            Self::Nearest => imageops::FilterType::Nearest,
            Self::Bilinear => imageops::FilterType::Triangle,
            Self::Bicubic => imageops::FilterType::CatmullRom,
            Self::Lanczos | Self::HighQualityLanczos => imageops::FilterType::Lanczos3,
        }
    }
}

/// Whether two crop areas differ enough (>1%) that left/right patches must
/// take the sub-pixel path to stay visually in register.
pub fn crop_areas_diverge(a: &CropBox, b: &CropBox) -> bool {
    let (aa, ab) = (a.area(), b.area());
    let max = aa.max(ab);
    if max <= 0.0 {
        return false;
    }
    (aa - ab).abs() / max > 0.01
}

/// Extract `crop` from `src` and resample it to a `target x target` square.
///
/// Integer-aligned boxes crop and resize directly; fractional boxes are
/// resampled against their exact fractional bounds so a smoothly panning
/// capture point does not snap pixel to pixel.
pub fn sample(
    src: &RgbaImage,
    crop: &CropBox,
    target: u32,
    method: Interpolation,
) -> PeekResult<RgbaImage> {
    sample_inner(src, crop, target, method, crop.is_integer_aligned())
}

/// As [`sample`], but callers that already know the left/right crop areas
/// diverge can force the sub-pixel path for integer boxes too.
pub fn sample_subpixel(
    src: &RgbaImage,
    crop: &CropBox,
    target: u32,
    method: Interpolation,
) -> PeekResult<RgbaImage> {
    sample_inner(src, crop, target, method, false)
}

fn sample_inner(
    src: &RgbaImage,
    crop: &CropBox,
    target: u32,
    method: Interpolation,
    fast_path: bool,
) -> PeekResult<RgbaImage> {
    if target == 0 {
        return Err(PeekError::sampling("target size must be > 0"));
    }
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Err(PeekError::sampling("source raster is empty"));
    }
    if crop.width() < 1.0 || crop.height() < 1.0 {
        return Err(PeekError::sampling("crop box is degenerate"));
    }
    if crop.left < 0.0 || crop.top < 0.0 || crop.right > f64::from(w) || crop.bottom > f64::from(h)
    {
        return Err(PeekError::sampling("crop box exceeds source bounds"));
    }

    if fast_path {
        let cw = crop.width() as u32;
        let ch = crop.height() as u32;
        let cropped = imageops::crop_imm(src, crop.left as u32, crop.top as u32, cw, ch).to_image();
        if cw == target && ch == target {
            return Ok(cropped);
        }
        return Ok(resize_with(&cropped, target, method));
    }

    match method {
        Interpolation::Nearest => Ok(resample_fractional(src, crop, target, TapKind::Nearest)),
        Interpolation::Bilinear => Ok(resample_fractional(src, crop, target, TapKind::Bilinear)),
        // No fractional-box variant exists for the separable filters, so
        // tap bilinearly at 2x and hand the reduction to the filter.
        _ => {
            let over = target
                .checked_mul(2)
                .ok_or_else(|| PeekError::sampling("oversample size overflow"))?;
            let coarse = resample_fractional(src, crop, over, TapKind::Bilinear);
            Ok(resize_with(&coarse, target, method))
        }
    }
}

fn resize_with(img: &RgbaImage, target: u32, method: Interpolation) -> RgbaImage {
    if method == Interpolation::HighQualityLanczos {
        // Large reductions ring less when pre-shrunk once before the final
        // Lanczos pass.
        let (w, h) = img.dimensions();
        if w.min(h) > target * 2 {
            let mid = imageops::resize(img, target * 2, target * 2, imageops::FilterType::CatmullRom);
            return imageops::resize(&mid, target, target, imageops::FilterType::Lanczos3);
        }
    }
    imageops::resize(img, target, target, method.filter())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TapKind {
    Nearest,
    Bilinear,
}

fn resample_fractional(src: &RgbaImage, crop: &CropBox, target: u32, tap: TapKind) -> RgbaImage {
    let sx_step = crop.width() / f64::from(target);
    let sy_step = crop.height() / f64::from(target);
    RgbaImage::from_fn(target, target, |x, y| {
        let sx = crop.left + (f64::from(x) + 0.5) * sx_step;
        let sy = crop.top + (f64::from(y) + 0.5) * sy_step;
        let px = match tap {
            TapKind::Nearest => nearest_tap(src, sx, sy),
            TapKind::Bilinear => bilinear_tap(src, sx, sy),
        };
        image::Rgba(px)
    })
}

fn clamp_pixel(src: &RgbaImage, x: i64, y: i64) -> [u8; 4] {
    let x = x.clamp(0, i64::from(src.width()) - 1) as u32;
    let y = y.clamp(0, i64::from(src.height()) - 1) as u32;
    src.get_pixel(x, y).0
}

fn nearest_tap(src: &RgbaImage, sx: f64, sy: f64) -> [u8; 4] {
    clamp_pixel(src, sx.floor() as i64, sy.floor() as i64)
}

/// Bilinear blend of the four pixels around the continuous coordinate
/// `(sx, sy)`, where pixel `(i, j)` has its center at `(i + 0.5, j + 0.5)`.
fn bilinear_tap(src: &RgbaImage, sx: f64, sy: f64) -> [u8; 4] {
    let gx = sx - 0.5;
    let gy = sy - 0.5;
    let x0 = gx.floor();
    let y0 = gy.floor();
    let fx = gx - x0;
    let fy = gy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = clamp_pixel(src, x0, y0);
    let p10 = clamp_pixel(src, x0 + 1, y0);
    let p01 = clamp_pixel(src, x0, y0 + 1);
    let p11 = clamp_pixel(src, x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]) * (1.0 - fx) + f64::from(p10[c]) * fx;
        let bot = f64::from(p01[c]) * (1.0 - fx) + f64::from(p11[c]) * fx;
        out[c] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}
