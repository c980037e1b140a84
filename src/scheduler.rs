use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
    mpsc::{Receiver, Sender, channel},
};

use crate::{
    cache::RenderCache,
    context::RenderContext,
    diff::DiffProvider,
    error::{PeekError, PeekResult},
    overlay::Overlay,
    pipeline::{RenderedFrame, render_frame},
};

/// Latest-wins acceptance over out-of-order completions.
///
/// A completed frame is delivered iff it is newer than the last delivered
/// frame AND its interactive/final flag matches the mode wanted now. Both
/// checks read the frame's own echoed inputs, never shared state.
#[derive(Debug)]
struct LatestWins {
    last_accepted: u64,
    want_interactive: bool,
}

impl LatestWins {
    fn offer(&mut self, frame: RenderedFrame) -> Option<RenderedFrame> {
        if frame.seq <= self.last_accepted || frame.interactive != self.want_interactive {
            return None;
        }
        self.last_accepted = frame.seq;
        Some(frame)
    }
}

/// Renders frames off the interaction thread on a rayon pool.
///
/// Every submission gets a monotonically increasing sequence number. A
/// superseded interactive task that has not started yet skips its work
/// (queue-level cooperative cancellation); one that already started runs to
/// completion and is dropped by [`FrameScheduler::poll`]. The session cache
/// is mutex-guarded because tasks may run concurrently.
pub struct FrameScheduler {
    pool: rayon::ThreadPool,
    tx: Sender<RenderedFrame>,
    rx: Receiver<RenderedFrame>,
    next_seq: u64,
    latest_interactive: Arc<AtomicU64>,
    acceptance: LatestWins,
    cache: Arc<Mutex<RenderCache>>,
    diff: Arc<dyn DiffProvider>,
    overlay: Arc<dyn Overlay>,
}

impl FrameScheduler {
    pub fn new(
        diff: Arc<dyn DiffProvider>,
        overlay: Arc<dyn Overlay>,
        threads: Option<usize>,
    ) -> PeekResult<Self> {
        let pool = build_thread_pool(threads)?;
        let (tx, rx) = channel();
        Ok(Self {
            pool,
            tx,
            rx,
            next_seq: 0,
            latest_interactive: Arc::new(AtomicU64::new(0)),
            acceptance: LatestWins {
                last_accepted: 0,
                want_interactive: false,
            },
            cache: Arc::new(Mutex::new(RenderCache::new())),
            diff,
            overlay,
        })
    }

    /// Queue one frame; returns its assigned sequence number.
    pub fn submit(&mut self, mut ctx: RenderContext) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        ctx.seq = seq;
        self.acceptance.want_interactive = ctx.interactive;
        if ctx.interactive {
            self.latest_interactive.store(seq, Ordering::SeqCst);
        }

        let tx = self.tx.clone();
        let cache = self.cache.clone();
        let diff = self.diff.clone();
        let overlay = self.overlay.clone();
        let latest_interactive = self.latest_interactive.clone();
        self.pool.spawn(move || {
            // Coalesce: an interactive request superseded before it started
            // is not worth rendering.
            if ctx.interactive && latest_interactive.load(Ordering::SeqCst) > ctx.seq {
                return;
            }
            let Ok(mut cache) = cache.lock() else {
                return;
            };
            match render_frame(&ctx, &mut cache, diff.as_ref(), overlay.as_ref()) {
                Ok(frame) => {
                    // Receiver judges staleness; a closed channel means the
                    // scheduler is gone and the frame is moot.
                    let _ = tx.send(frame);
                }
                Err(_) => {
                    // Already logged by the pipeline; the caller keeps its
                    // previous frame.
                }
            }
        });
        seq
    }

    /// Drain completed frames, returning the newest acceptable one.
    pub fn poll(&mut self) -> Option<RenderedFrame> {
        let mut newest = None;
        while let Ok(frame) = self.rx.try_recv() {
            if let Some(frame) = self.acceptance.offer(frame) {
                newest = Some(frame);
            }
        }
        newest
    }

    /// Drop all cached intermediates (source content changed).
    pub fn clear_cache(&mut self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> PeekResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(PeekError::fatal("scheduler 'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PeekError::fatal(format!("failed to build render thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Orientation, SourceId, SourcePair, SplitState};
    use crate::diff::AbsDiff;
    use crate::overlay::NullOverlay;
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    fn frame(seq: u64, interactive: bool) -> RenderedFrame {
        RenderedFrame {
            canvas: RgbaImage::new(1, 1),
            pad_left: 0,
            pad_top: 0,
            lens_bounds: None,
            combined_center: None,
            interactive,
            seq,
        }
    }

    #[test]
    fn stale_final_overtaken_by_newer_final_is_dropped() {
        let mut acc = LatestWins {
            last_accepted: 0,
            want_interactive: false,
        };
        // seq 2 completes first, then the older seq 1 arrives late.
        assert!(acc.offer(frame(2, false)).is_some());
        assert!(acc.offer(frame(1, false)).is_none());
    }

    #[test]
    fn interactive_result_after_switch_to_final_is_dropped() {
        let mut acc = LatestWins {
            last_accepted: 0,
            want_interactive: false,
        };
        assert!(acc.offer(frame(3, true)).is_none());
        assert!(acc.offer(frame(4, false)).is_some());
    }

    #[test]
    fn mode_match_accepts_newer_interactive_frames() {
        let mut acc = LatestWins {
            last_accepted: 5,
            want_interactive: true,
        };
        assert!(acc.offer(frame(5, true)).is_none());
        assert!(acc.offer(frame(6, true)).is_some());
        assert_eq!(acc.last_accepted, 6);
    }

    fn test_ctx() -> RenderContext {
        let img = std::sync::Arc::new(RgbaImage::from_pixel(
            32,
            32,
            image::Rgba([200, 10, 10, 255]),
        ));
        let sources = SourcePair {
            unified_a: img.clone(),
            unified_b: img.clone(),
            full_a: img.clone(),
            full_b: img,
            id_a: SourceId(1),
            id_b: SourceId(2),
        };
        RenderContext::new(sources, SplitState::new(0.5, Orientation::Vertical))
    }

    fn poll_until(sched: &mut FrameScheduler, deadline: Duration) -> Option<RenderedFrame> {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if let Some(frame) = sched.poll() {
                return Some(frame);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn scheduler_delivers_the_newest_submission() {
        let mut sched = FrameScheduler::new(
            Arc::new(AbsDiff::default()),
            Arc::new(NullOverlay),
            Some(2),
        )
        .unwrap();

        let mut ctx = test_ctx();
        ctx.interactive = false;
        sched.submit(ctx.clone());
        ctx.split.visual_ratio = 0.75;
        let last = sched.submit(ctx);

        // Eventually the newest frame lands; once delivered, nothing older
        // ever surfaces.
        let mut newest = None;
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if let Some(frame) = sched.poll() {
                newest = Some(frame.seq);
                if frame.seq == last {
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(newest, Some(last));
        assert!(sched.poll().is_none());
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(
            FrameScheduler::new(
                Arc::new(AbsDiff::default()),
                Arc::new(NullOverlay),
                Some(0)
            )
            .is_err()
        );
    }

    #[test]
    fn cache_clear_does_not_disturb_delivery() {
        let mut sched = FrameScheduler::new(
            Arc::new(AbsDiff::default()),
            Arc::new(NullOverlay),
            Some(1),
        )
        .unwrap();
        let mut ctx = test_ctx();
        ctx.interactive = false;
        sched.submit(ctx);
        sched.clear_cache();
        assert!(poll_until(&mut sched, Duration::from_secs(5)).is_some());
    }
}
