use std::sync::Arc;

use image::RgbaImage;

use crate::{
    diff::DiffMode,
    error::{PeekError, PeekResult},
    sample::Interpolation,
};

/// Identity of a source raster's *content*. Bumped by the owner whenever the
/// pixels change; caches compare ids, never pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceId(pub u64);

/// The two images under comparison.
///
/// `unified_*` are the equal-size rasters the base split is built from;
/// `full_*` are the untouched originals the lenses sample, which may each
/// have a different resolution.
#[derive(Clone, Debug)]
pub struct SourcePair {
    pub unified_a: Arc<RgbaImage>,
    pub unified_b: Arc<RgbaImage>,
    pub full_a: Arc<RgbaImage>,
    pub full_b: Arc<RgbaImage>,
    pub id_a: SourceId,
    pub id_b: SourceId,
}

impl SourcePair {
    /// Both unified rasters share one size; that size is the base canvas.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.unified_a.dimensions()
    }

    pub fn validate(&self) -> PeekResult<()> {
        let (w, h) = self.unified_a.dimensions();
        if w == 0 || h == 0 {
            return Err(PeekError::fatal("unified sources must be non-empty"));
        }
        if self.unified_b.dimensions() != (w, h) {
            return Err(PeekError::fatal(
                "unified sources must have identical dimensions",
            ));
        }
        if self.full_a.width() == 0
            || self.full_a.height() == 0
            || self.full_b.width() == 0
            || self.full_b.height() == 0
        {
            return Err(PeekError::fatal("full-resolution sources must be non-empty"));
        }
        Ok(())
    }
}

/// A point in relative canvas/source coordinates, both axes in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RelPoint {
    pub x: f64,
    pub y: f64,
}

impl RelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_pixels(self, w: u32, h: u32) -> kurbo::Point {
        kurbo::Point::new(self.x * f64::from(w), self.y * f64::from(h))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Split line runs vertically; the ratio moves it left/right.
    #[default]
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn perpendicular(self) -> Self {
        match self {
            Self::Vertical => Self::Horizontal,
            Self::Horizontal => Self::Vertical,
        }
    }

    /// Unit vector along which side-by-side lenses spread for this split.
    pub fn split_axis(self) -> kurbo::Vec2 {
        match self {
            Self::Vertical => kurbo::Vec2::new(1.0, 0.0),
            Self::Horizontal => kurbo::Vec2::new(0.0, 1.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitState {
    /// Authoritative split ratio in `[0, 1]`.
    pub ratio: f64,
    /// Animated value actually drawn this frame; trails `ratio` during drags.
    pub visual_ratio: f64,
    pub orientation: Orientation,
}

impl SplitState {
    pub fn new(ratio: f64, orientation: Orientation) -> Self {
        Self {
            ratio,
            visual_ratio: ratio,
            orientation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LensVisibility {
    pub left: bool,
    pub center: bool,
    pub right: bool,
}

impl Default for LensVisibility {
    fn default() -> Self {
        Self {
            left: true,
            center: false,
            right: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MagnifierState {
    pub enabled: bool,
    /// Capture-marker position, relative to the unified canvas.
    pub position: RelPoint,
    /// Lens diameter as a fraction of the shorter canvas dimension.
    pub size_frac: f64,
    /// Capture-circle diameter as a fraction of the shorter canvas dimension.
    pub capture_frac: f64,
    pub visibility: LensVisibility,
    /// Gap between side-by-side lenses as a fraction of the shorter canvas
    /// dimension. Below `merge_threshold` the lenses merge into one.
    pub spacing_frac: f64,
    pub merge_threshold: f64,
    pub show_guides: bool,
    /// Internal split of the combined lens, independent of the main split.
    pub combined_ratio: f64,
    pub combined_orientation: Orientation,
}

impl Default for MagnifierState {
    fn default() -> Self {
        Self {
            enabled: false,
            position: RelPoint::new(0.5, 0.5),
            size_frac: 0.25,
            capture_frac: 0.08,
            visibility: LensVisibility::default(),
            spacing_frac: 0.05,
            merge_threshold: 0.02,
            show_guides: true,
            combined_ratio: 0.5,
            combined_orientation: Orientation::Vertical,
        }
    }
}

/// Which channel the split sides show when no diff mode is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    #[default]
    All,
    Red,
    Green,
    Blue,
    Luma,
}

/// Stroke colors and widths, RGBA8 straight alpha.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Style {
    pub divider_color: [u8; 4],
    pub divider_thickness: f32,
    pub lens_border_color: [u8; 4],
    pub lens_divider_color: [u8; 4],
    pub lens_divider_thickness: f32,
    /// Ring stroke width adapts to the capture diameter; only the color is
    /// styled here.
    pub capture_ring_color: [u8; 4],
    pub guide_color: [u8; 4],
    pub guide_thickness: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            divider_color: [255, 255, 255, 255],
            divider_thickness: 2.0,
            lens_border_color: [32, 32, 32, 255],
            lens_divider_color: [255, 255, 255, 255],
            lens_divider_thickness: 2.0,
            capture_ring_color: [255, 255, 255, 220],
            guide_color: [255, 255, 255, 160],
            guide_thickness: 1.5,
        }
    }
}

/// What an interpolation choice is being resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpUsage {
    Main,
    LensMovement,
    GuideSmoothing,
}

/// Primary + optional optimization interpolation per usage.
///
/// While interactive, the faster of the pair (by speed rank) always
/// governs; settled frames use the primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QualityProfile {
    pub main: Interpolation,
    pub main_optimized: Option<Interpolation>,
    pub lens: Interpolation,
    pub lens_optimized: Option<Interpolation>,
    pub guide: Interpolation,
    pub guide_optimized: Option<Interpolation>,
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self {
            main: Interpolation::Lanczos,
            main_optimized: Some(Interpolation::Bilinear),
            lens: Interpolation::Lanczos,
            lens_optimized: Some(Interpolation::Nearest),
            guide: Interpolation::Bilinear,
            guide_optimized: None,
        }
    }
}

impl QualityProfile {
    pub fn resolve(&self, usage: InterpUsage, interactive: bool) -> Interpolation {
        let (primary, optimized) = match usage {
            InterpUsage::Main => (self.main, self.main_optimized),
            InterpUsage::LensMovement => (self.lens, self.lens_optimized),
            InterpUsage::GuideSmoothing => (self.guide, self.guide_optimized),
        };
        if interactive {
            match optimized {
                Some(opt) => Interpolation::faster_of(primary, opt),
                None => primary,
            }
        } else {
            primary
        }
    }
}

/// Immutable per-frame snapshot of everything the pipeline needs.
///
/// Constructed fresh each frame from longer-lived application state; the
/// pipeline never reads that state again, so a completed frame can be
/// judged stale purely from the echoed `seq`/`interactive` fields.
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub sources: SourcePair,
    pub split: SplitState,
    pub magnifier: MagnifierState,
    pub diff_mode: DiffMode,
    pub channel_mode: ChannelMode,
    pub style: Style,
    pub quality: QualityProfile,
    pub interactive: bool,
    pub seq: u64,
    pub filenames: Option<(String, String)>,
}

impl RenderContext {
    pub fn new(sources: SourcePair, split: SplitState) -> Self {
        Self {
            sources,
            split,
            magnifier: MagnifierState::default(),
            diff_mode: DiffMode::Off,
            channel_mode: ChannelMode::All,
            style: Style::default(),
            quality: QualityProfile::default(),
            interactive: false,
            seq: 0,
            filenames: None,
        }
    }

    pub fn validate(&self) -> PeekResult<()> {
        self.sources.validate()?;
        for (name, v) in [
            ("split ratio", self.split.ratio),
            ("visual split ratio", self.split.visual_ratio),
            ("combined lens ratio", self.magnifier.combined_ratio),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(PeekError::fatal(format!("{name} must be within [0, 1]")));
            }
        }
        if self.magnifier.enabled {
            if !(self.magnifier.size_frac > 0.0 && self.magnifier.size_frac <= 1.0) {
                return Err(PeekError::fatal("magnifier size must be within (0, 1]"));
            }
            if !(self.magnifier.capture_frac > 0.0 && self.magnifier.capture_frac <= 1.0) {
                return Err(PeekError::fatal("capture size must be within (0, 1]"));
            }
            if self.magnifier.spacing_frac < 0.0 || self.magnifier.merge_threshold < 0.0 {
                return Err(PeekError::fatal("lens spacing must be non-negative"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(w: u32, h: u32) -> SourcePair {
        let img = Arc::new(RgbaImage::new(w, h));
        SourcePair {
            unified_a: img.clone(),
            unified_b: img.clone(),
            full_a: img.clone(),
            full_b: img,
            id_a: SourceId(1),
            id_b: SourceId(2),
        }
    }

    #[test]
    fn validate_rejects_out_of_range_ratio() {
        let mut ctx = RenderContext::new(pair(8, 8), SplitState::new(1.5, Orientation::Vertical));
        assert!(ctx.validate().is_err());
        ctx.split = SplitState::new(0.5, Orientation::Vertical);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_unified_sizes() {
        let mut p = pair(8, 8);
        p.unified_b = Arc::new(RgbaImage::new(9, 8));
        let ctx = RenderContext::new(p, SplitState::new(0.5, Orientation::Vertical));
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn validate_checks_magnifier_fractions_only_when_enabled() {
        let mut ctx = RenderContext::new(pair(8, 8), SplitState::new(0.5, Orientation::Vertical));
        ctx.magnifier.size_frac = 0.0;
        assert!(ctx.validate().is_ok());
        ctx.magnifier.enabled = true;
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn interactive_resolution_prefers_the_faster_method() {
        let q = QualityProfile {
            main: Interpolation::Bilinear,
            main_optimized: Some(Interpolation::Lanczos),
            ..QualityProfile::default()
        };
        // The optimization override is slower here; the faster primary wins.
        assert_eq!(q.resolve(InterpUsage::Main, true), Interpolation::Bilinear);
        assert_eq!(q.resolve(InterpUsage::Main, false), Interpolation::Bilinear);

        let q = QualityProfile::default();
        assert_eq!(
            q.resolve(InterpUsage::LensMovement, true),
            Interpolation::Nearest
        );
        assert_eq!(
            q.resolve(InterpUsage::LensMovement, false),
            Interpolation::Lanczos
        );
    }
}
