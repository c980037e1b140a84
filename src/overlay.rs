use image::RgbaImage;
use kurbo::Rect;

use crate::error::PeekResult;

/// Consumed filename-label hook. Invoked as the last stage of a frame, only
/// when names are enabled; rendering text is not this crate's business.
pub trait Overlay: Send + Sync {
    fn draw_filenames(
        &self,
        canvas: &mut RgbaImage,
        image_rect: Rect,
        split_px: u32,
        divider_thickness: f32,
        name_a: &str,
        name_b: &str,
    ) -> PeekResult<()>;
}

/// Default no-op overlay.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOverlay;

impl Overlay for NullOverlay {
    fn draw_filenames(
        &self,
        _canvas: &mut RgbaImage,
        _image_rect: Rect,
        _split_px: u32,
        _divider_thickness: f32,
        _name_a: &str,
        _name_b: &str,
    ) -> PeekResult<()> {
        Ok(())
    }
}
