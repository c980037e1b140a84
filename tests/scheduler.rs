use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use pixelpeek::{
    AbsDiff, FrameScheduler, NullOverlay, Orientation, RenderContext, SourceId, SourcePair,
    SplitState,
};

fn test_ctx(w: u32, h: u32) -> RenderContext {
    let a = Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255])));
    let b = Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([0, 0, 255, 255])));
    let sources = SourcePair {
        unified_a: a.clone(),
        unified_b: b.clone(),
        full_a: a,
        full_b: b,
        id_a: SourceId(1),
        id_b: SourceId(2),
    };
    RenderContext::new(sources, SplitState::new(0.5, Orientation::Vertical))
}

#[test]
fn final_frame_supersedes_earlier_interactive_burst() {
    let mut sched =
        FrameScheduler::new(Arc::new(AbsDiff::default()), Arc::new(NullOverlay), Some(2)).unwrap();

    // A burst of drag frames, then the settled one.
    let mut ctx = test_ctx(48, 48);
    ctx.interactive = true;
    for ratio in [0.41, 0.42, 0.43] {
        ctx.split.visual_ratio = ratio;
        sched.submit(ctx.clone());
    }
    ctx.interactive = false;
    ctx.split.visual_ratio = 0.5;
    let final_seq = sched.submit(ctx);

    // Whatever the completion order, the final submission is the only frame
    // the receiver may hand out once the mode switched to final.
    let start = Instant::now();
    let mut delivered = Vec::new();
    while start.elapsed() < Duration::from_secs(5) {
        if let Some(frame) = sched.poll() {
            delivered.push((frame.seq, frame.interactive));
            if frame.seq == final_seq {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(delivered, vec![(final_seq, false)]);
}

#[test]
fn sequence_numbers_increase_monotonically() {
    let mut sched =
        FrameScheduler::new(Arc::new(AbsDiff::default()), Arc::new(NullOverlay), Some(1)).unwrap();
    let ctx = test_ctx(16, 16);
    let s1 = sched.submit(ctx.clone());
    let s2 = sched.submit(ctx.clone());
    let s3 = sched.submit(ctx);
    assert!(s1 < s2 && s2 < s3);
}
