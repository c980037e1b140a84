#![forbid(unsafe_code)]

pub mod cache;
pub mod context;
pub mod diff;
pub mod error;
pub mod geom;
pub mod guides;
pub mod lens;
pub mod mask;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod sample;
pub mod scheduler;
pub mod split;

pub use cache::{BaseKey, PatchKey, RenderCache};
pub use context::{
    ChannelMode, InterpUsage, LensVisibility, MagnifierState, Orientation, QualityProfile,
    RelPoint, RenderContext, SourceId, SourcePair, SplitState, Style,
};
pub use diff::{AbsDiff, DiffMode, DiffProvider};
pub use error::{PeekError, PeekResult};
pub use geom::{CropBox, LayoutDecision, LensLayout};
pub use mask::CircularMaskCache;
pub use overlay::{NullOverlay, Overlay};
pub use pipeline::{RenderedFrame, render_frame};
pub use sample::Interpolation;
pub use scheduler::FrameScheduler;
