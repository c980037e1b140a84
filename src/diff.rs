use image::RgbaImage;

/// Per-pixel analysis mode for the base image and the center diff lens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    #[default]
    Off,
    Highlight,
    Grayscale,
    Ssim,
    Edges,
}

impl DiffMode {
    pub fn is_active(self) -> bool {
        self != Self::Off
    }

    /// Full-comparison modes replace the base image entirely (no split line).
    pub fn replaces_base(self) -> bool {
        matches!(self, Self::Highlight | Self::Grayscale | Self::Ssim)
    }

    /// Edge mode keeps the split but swaps both sides for their edge maps.
    pub fn splits_edge_maps(self) -> bool {
        self == Self::Edges
    }
}

/// The consumed difference function: pure, may decline by returning `None`
/// (mismatched sizes, unsupported mode). Edge maps are requested per side
/// with `b = None`.
pub trait DiffProvider: Send + Sync {
    fn diff(&self, a: &RgbaImage, b: Option<&RgbaImage>, mode: DiffMode) -> Option<RgbaImage>;
}

/// Minimal reference provider so the CLI and tests run without an external
/// metric package. Real SSIM/edge implementations plug in through
/// [`DiffProvider`]; this one trades accuracy for zero dependencies.
#[derive(Clone, Copy, Debug)]
pub struct AbsDiff {
    /// Per-channel difference gain in highlight mode.
    pub amplify: u8,
    /// Channel differences below this show the darkened original instead.
    pub context_floor: u8,
}

impl Default for AbsDiff {
    fn default() -> Self {
        Self {
            amplify: 3,
            context_floor: 30,
        }
    }
}

impl DiffProvider for AbsDiff {
    fn diff(&self, a: &RgbaImage, b: Option<&RgbaImage>, mode: DiffMode) -> Option<RgbaImage> {
        match mode {
            DiffMode::Off => None,
            DiffMode::Edges => Some(sobel_magnitude(a)),
            DiffMode::Highlight => {
                let b = require_same_size(a, b)?;
                Some(self.highlight(a, b))
            }
            DiffMode::Grayscale => {
                let b = require_same_size(a, b)?;
                Some(luma_distance(a, b, false))
            }
            DiffMode::Ssim => {
                let b = require_same_size(a, b)?;
                Some(luma_distance(a, b, true))
            }
        }
    }
}

impl AbsDiff {
    fn highlight(&self, a: &RgbaImage, b: &RgbaImage) -> RgbaImage {
        let mut out = RgbaImage::new(a.width(), a.height());
        for (x, y, px) in out.enumerate_pixels_mut() {
            let pa = a.get_pixel(x, y).0;
            let pb = b.get_pixel(x, y).0;
            let d = [
                pa[0].abs_diff(pb[0]),
                pa[1].abs_diff(pb[1]),
                pa[2].abs_diff(pb[2]),
            ];
            px.0 = if d.iter().all(|&c| c < self.context_floor) {
                [pa[0] / 4, pa[1] / 4, pa[2] / 4, 255]
            } else {
                [
                    d[0].saturating_mul(self.amplify),
                    d[1].saturating_mul(self.amplify),
                    d[2].saturating_mul(self.amplify),
                    255,
                ]
            };
        }
        out
    }
}

fn require_same_size<'b>(a: &RgbaImage, b: Option<&'b RgbaImage>) -> Option<&'b RgbaImage> {
    let b = b?;
    (a.dimensions() == b.dimensions()).then_some(b)
}

fn luma(px: [u8; 4]) -> f32 {
    0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32
}

/// Per-pixel luma distance; `inverted` renders similarity (white = equal)
/// the way similarity-index maps are usually presented.
fn luma_distance(a: &RgbaImage, b: &RgbaImage, inverted: bool) -> RgbaImage {
    let mut out = RgbaImage::new(a.width(), a.height());
    for (x, y, px) in out.enumerate_pixels_mut() {
        let d = (luma(a.get_pixel(x, y).0) - luma(b.get_pixel(x, y).0))
            .abs()
            .min(255.0) as u8;
        let v = if inverted { 255 - d } else { d };
        px.0 = [v, v, v, 255];
    }
    out
}

fn sobel_magnitude(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }
    let at = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, w as i64 - 1) as u32;
        let y = y.clamp(0, h as i64 - 1) as u32;
        luma(src.get_pixel(x, y).0)
    };
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x - 1, y)
                - at(x - 1, y + 1);
            let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x, y - 1)
                - at(x + 1, y - 1);
            let mag = (gx * gx + gy * gy).sqrt().min(255.0) as u8;
            out.put_pixel(x as u32, y as u32, image::Rgba([mag, mag, mag, 255]));
        }
    }
    out
}
