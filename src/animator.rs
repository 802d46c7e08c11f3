//! Frame selection for multi-frame picture data.
//!
//! An [`Animator`] holds one entry and a timeline and advances the current
//! frame when the caller ticks it. It never schedules anything itself: the
//! host calls [`Animator::idle`] (or [`Animator::idle_at`] with its own
//! clock) from its timer and redraws when a tick reports a frame change.
//!
//! # Example
//!
//! ```
//! use pictura::animator::Animator;
//! use pictura::data::PictureData;
//! use std::sync::Arc;
//!
//! # let data = Arc::new(PictureData::blob(pictura::config::PictureConfig::global(), "x/y", Default::default()));
//! let mut animator = Animator::new();
//! animator.attach_with(data, 3, 100, 0);
//! animator.start();
//! animator.idle_at(0);
//! assert!(animator.idle_at(250));
//! assert_eq!(animator.current_frame(), 2);
//! ```

use crate::codec::Timeline;
use crate::common::error::Result;
use crate::common::geometry::Rect;
use crate::data::PictureData;
use crate::draw::{DrawSettings, DrawingSurface};
use std::sync::Arc;
use std::time::Instant;

/// Frame delay used when the data has no timeline of its own.
const DEFAULT_DELAY_MS: u32 = 100;

/// Drives the current frame of an attached entry.
#[derive(Debug)]
pub struct Animator {
    data: Option<Arc<PictureData>>,
    timeline: Timeline,
    frame: usize,
    loops_done: u32,
    playing: bool,
    /// Time spent on the current frame
    elapsed_ms: u64,
    last_tick: Option<u64>,
    clock: Instant,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub fn new() -> Self {
        Self {
            data: None,
            timeline: Timeline::default(),
            frame: 0,
            loops_done: 0,
            playing: false,
            elapsed_ms: 0,
            last_tick: None,
            clock: Instant::now(),
        }
    }

    /// Attach `data` using its own timeline. Data without one (a still
    /// image) gets one frame per decoded frame at a default delay.
    pub fn attach(&mut self, data: Arc<PictureData>) {
        let timeline = data
            .timeline()
            .unwrap_or_else(|| Timeline::uniform(data.frame_count(), DEFAULT_DELAY_MS, 0));
        self.attach_timeline(data, timeline);
    }

    /// Attach `data` with an explicit uniform timeline. A `loop_count` of
    /// 0 or less loops forever.
    pub fn attach_with(&mut self, data: Arc<PictureData>, frame_count: usize, delay_ms: u32, loop_count: i32) {
        self.attach_timeline(data, Timeline::uniform(frame_count, delay_ms, loop_count));
    }

    fn attach_timeline(&mut self, data: Arc<PictureData>, timeline: Timeline) {
        log::debug!(
            "Animator attached to {}: {} frames, loop count {}",
            data.key(),
            timeline.frame_count(),
            timeline.loop_count
        );
        self.data = Some(data);
        self.timeline = timeline;
        self.rewind();
    }

    /// Release the attached data and stop.
    pub fn detach(&mut self) -> Option<Arc<PictureData>> {
        self.playing = false;
        self.timeline = Timeline::default();
        self.rewind();
        self.data.take()
    }

    fn rewind(&mut self) {
        self.frame = 0;
        self.loops_done = 0;
        self.elapsed_ms = 0;
        self.last_tick = None;
    }

    pub fn data(&self) -> Option<&Arc<PictureData>> {
        self.data.as_ref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Resume playing from the current frame. An animation that already
    /// ran all its loops starts over.
    pub fn start(&mut self) {
        if self.is_finished() {
            self.rewind();
        }
        self.playing = true;
        self.last_tick = None;
    }

    /// Pause on the current frame.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_frame(&self) -> usize {
        self.frame
    }

    /// Completed passes through the timeline.
    pub fn loops_done(&self) -> u32 {
        self.loops_done
    }

    fn is_finished(&self) -> bool {
        !self.timeline.loops_forever() && self.loops_done >= self.timeline.loop_count as u32
    }

    /// Advance using the animator's monotonic clock.
    pub fn idle(&mut self) -> bool {
        let now = u64::try_from(self.clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.idle_at(now)
    }

    /// Advance to time `now_ms` (any monotonic millisecond clock). Returns
    /// whether the current frame changed.
    ///
    /// The first tick after [`start`](Self::start) only records the time.
    /// Time left over after a frame change carries into the next frame.
    pub fn idle_at(&mut self, now_ms: u64) -> bool {
        let previous = self.last_tick.replace(now_ms);
        if !self.playing || self.timeline.frame_count() == 0 {
            return false;
        }
        let Some(previous) = previous else {
            return false;
        };
        self.elapsed_ms += now_ms.saturating_sub(previous);

        let cycle = self.timeline.cycle_ms();
        if self.timeline.loops_forever() && cycle > 0 && self.elapsed_ms >= cycle {
            // Whole cycles land on the same frame
            self.loops_done = self
                .loops_done
                .saturating_add(u32::try_from(self.elapsed_ms / cycle).unwrap_or(u32::MAX));
            self.elapsed_ms %= cycle;
        }

        let start_frame = self.frame;
        let count = self.timeline.frame_count();
        loop {
            let delay = self.timeline.delays_ms[self.frame].max(1) as u64;
            if self.elapsed_ms < delay {
                break;
            }
            self.elapsed_ms -= delay;
            if self.frame + 1 < count {
                self.frame += 1;
                continue;
            }
            self.loops_done = self.loops_done.saturating_add(1);
            if self.is_finished() {
                self.playing = false;
                self.elapsed_ms = 0;
                log::trace!("Animation finished after {} loops", self.loops_done);
                break;
            }
            self.frame = 0;
        }
        self.frame != start_frame
    }

    /// Draw the attached data at the current frame.
    pub fn draw(&self, surface: &mut dyn DrawingSurface, dest: Rect, settings: &DrawSettings) -> Result<()> {
        match &self.data {
            Some(data) => data.draw(surface, dest, &settings.clone().with_frame(self.frame)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::gif::tests::animated_gif;
    use crate::config::PictureConfig;
    use crate::draw::tests::{Call, RecordingSurface};
    use bytes::Bytes;

    fn blob() -> Arc<PictureData> {
        Arc::new(PictureData::blob(Arc::new(PictureConfig::default()), "x/y", Bytes::new()))
    }

    fn gif(delays_cs: &[u16], loops: Option<u16>) -> Arc<PictureData> {
        Arc::new(PictureData::from_bytes(animated_gif(delays_cs, loops)).unwrap())
    }

    #[test]
    fn test_stopped_animator_does_not_advance() {
        let mut animator = Animator::new();
        animator.attach_with(blob(), 3, 10, 0);
        animator.idle_at(0);
        assert!(!animator.idle_at(1000));
        assert_eq!(animator.current_frame(), 0);
    }

    #[test]
    fn test_residual_time_carries_over() {
        let mut animator = Animator::new();
        animator.attach_with(blob(), 4, 100, 0);
        animator.start();
        assert!(!animator.idle_at(1_000));
        assert!(!animator.idle_at(1_060));
        assert!(animator.idle_at(1_120));
        assert_eq!(animator.current_frame(), 1);
        // 20 ms left over from the first frame
        assert!(animator.idle_at(1_200));
        assert_eq!(animator.current_frame(), 2);
    }

    #[test]
    fn test_infinite_loop_wraps() {
        let mut animator = Animator::new();
        animator.attach_with(blob(), 3, 100, 0);
        animator.start();
        animator.idle_at(0);
        animator.idle_at(350);
        assert_eq!(animator.current_frame(), 0);
        assert_eq!(animator.loops_done(), 1);
        assert!(animator.is_playing());

        // Long gaps skip whole cycles
        animator.idle_at(350 + 3_000 * 100 + 100);
        assert_eq!(animator.current_frame(), 1);
        assert_eq!(animator.loops_done(), 1_001);
    }

    #[test]
    fn test_finite_loops_stop_on_last_frame() {
        let mut animator = Animator::new();
        animator.attach_with(blob(), 2, 50, 2);
        animator.start();
        animator.idle_at(0);
        animator.idle_at(10_000);
        assert!(!animator.is_playing());
        assert_eq!(animator.current_frame(), 1);
        assert_eq!(animator.loops_done(), 2);

        // Starting again replays from the first frame
        animator.start();
        assert!(animator.is_playing());
        assert_eq!(animator.current_frame(), 0);
        assert_eq!(animator.loops_done(), 0);
    }

    #[test]
    fn test_stop_keeps_position() {
        let mut animator = Animator::new();
        animator.attach_with(blob(), 5, 10, 0);
        animator.start();
        animator.idle_at(0);
        animator.idle_at(25);
        assert_eq!(animator.current_frame(), 2);
        animator.stop();
        animator.start();
        // First tick after a restart only records the time
        assert!(!animator.idle_at(500));
        assert_eq!(animator.current_frame(), 2);
    }

    #[test]
    fn test_attach_uses_gif_timeline() {
        let mut animator = Animator::new();
        animator.attach(gif(&[10, 30], Some(3)));
        assert_eq!(animator.timeline().delays_ms, vec![100, 300]);
        assert_eq!(animator.timeline().loop_count, 3);
        animator.start();
        animator.idle_at(0);
        assert!(animator.idle_at(100));
        assert_eq!(animator.current_frame(), 1);

        let mut surface = RecordingSurface::default();
        animator
            .draw(&mut surface, Rect::new(0.0, 0.0, 4.0, 3.0), &DrawSettings::default())
            .unwrap();
        assert!(matches!(surface.calls.as_slice(), [Call::Raster { frame: 1, .. }]));

        assert!(animator.detach().is_some());
        assert!(!animator.is_playing());
        assert_eq!(animator.timeline().frame_count(), 0);
    }
}
