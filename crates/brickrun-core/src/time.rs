use std::time::Instant;

use tracing::debug;

use crate::config::TimingConfig;

/// The two callbacks a frame drives.
pub trait Simulation {
    /// Called once per accepted render frame with the real (unclamped) delta.
    fn update(&mut self, dt: f32);

    /// Called zero or more times per frame, once per elapsed fixed tick.
    fn fixed_update(&mut self) {}
}

/// Host hook that schedules the next frame (e.g. `requestAnimationFrame`).
pub trait FrameRequester {
    fn request_frame(&mut self);
}

/// Requester for hosts that drive `frame` in their own loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequester;

impl FrameRequester for NoopRequester {
    fn request_frame(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Very first frame: only records the timestamp.
    First,
    Normal,
    /// Delta exceeded `1 / min_fps`: accumulated, nothing run.
    Degenerate,
    /// First frame after regaining focus: timestamp resynchronized.
    Resumed,
    /// Window unfocused: frame skipped entirely.
    Blurred,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub kind: FrameKind,
    pub fixed_ticks: u32,
    pub dt: f64,
}

/// Fixed-timestep accumulator driving a [`Simulation`] from a variable-rate
/// render callback.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    tick: f64,
    max_frame_delta: f64,
    accumulator: f64,
    last: Option<f64>,
    focused: bool,
    resume_pending: bool,
    frames: u64,
}

impl FrameScheduler {
    pub fn new(config: &TimingConfig) -> Self {
        let min_fps = if config.min_fps > 0.0 {
            config.min_fps
        } else {
            crate::config::MIN_FPS
        };
        Self {
            tick: config.tick_secs(),
            max_frame_delta: 1.0 / min_fps,
            accumulator: 0.0,
            last: None,
            focused: true,
            resume_pending: false,
            frames: 0,
        }
    }

    pub fn tick_secs(&self) -> f64 {
        self.tick
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Window lost focus: subsequent frames are skipped.
    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Window regained focus: the next frame only resynchronizes the clock.
    pub fn focus(&mut self) {
        if !self.focused {
            self.focused = true;
            self.resume_pending = true;
        }
    }

    /// Run one render frame at wall-clock time `now` (seconds).
    pub fn frame<S: Simulation + ?Sized>(
        &mut self,
        now: f64,
        sim: &mut S,
        requester: &mut dyn FrameRequester,
    ) -> FrameReport {
        let report = self.advance(now, sim);
        self.frames += 1;
        requester.request_frame();
        report
    }

    fn advance<S: Simulation + ?Sized>(&mut self, now: f64, sim: &mut S) -> FrameReport {
        let quiet = |kind, dt| FrameReport {
            kind,
            fixed_ticks: 0,
            dt,
        };

        if !self.focused {
            return quiet(FrameKind::Blurred, 0.0);
        }
        let Some(last) = self.last else {
            self.last = Some(now);
            return quiet(FrameKind::First, 0.0);
        };
        if self.resume_pending {
            self.resume_pending = false;
            self.last = Some(now);
            return quiet(FrameKind::Resumed, 0.0);
        }

        let dt = now - last;
        self.last = Some(now);
        self.accumulator += dt;

        if dt > self.max_frame_delta {
            debug!(dt, accumulator = self.accumulator, "degenerate frame absorbed");
            return quiet(FrameKind::Degenerate, dt);
        }

        let mut fixed_ticks = 0;
        while self.accumulator >= self.tick {
            sim.fixed_update();
            self.accumulator -= self.tick;
            fixed_ticks += 1;
        }
        sim.update(dt as f32);

        FrameReport {
            kind: FrameKind::Normal,
            fixed_ticks,
            dt,
        }
    }
}

/// Seconds since construction, for hosts without their own frame timestamps.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingRequester, RecordingSim};

    const TICK: f64 = 1.0 / 60.0;

    fn scheduler() -> FrameScheduler {
        FrameScheduler::new(&TimingConfig::default())
    }

    #[test]
    fn first_frame_only_sets_timestamp() {
        let mut sched = scheduler();
        let mut sim = RecordingSim::default();
        let mut req = CountingRequester::default();

        let report = sched.frame(10.0, &mut sim, &mut req);
        assert_eq!(report.kind, FrameKind::First);
        assert_eq!(sim.fixed_ticks, 0);
        assert!(sim.updates.is_empty());
        assert_eq!(req.requests, 1);
    }

    #[test]
    fn normal_frame_runs_ticks_then_one_update() {
        let mut sched = scheduler();
        let mut sim = RecordingSim::default();
        let mut req = CountingRequester::default();

        sched.frame(0.0, &mut sim, &mut req);
        let report = sched.frame(0.06, &mut sim, &mut req);
        assert_eq!(report.kind, FrameKind::Normal);
        assert_eq!(report.fixed_ticks, 3);
        assert_eq!(sim.fixed_ticks, 3);
        assert_eq!(sim.updates.len(), 1);
        assert!((sim.updates[0] - 0.06).abs() < 1e-6);
        assert_eq!(req.requests, 2);
    }

    #[test]
    fn degenerate_frame_accumulates_without_running() {
        let mut sched = scheduler();
        let mut sim = RecordingSim::default();
        let mut req = CountingRequester::default();

        sched.frame(0.0, &mut sim, &mut req);
        let report = sched.frame(2.0, &mut sim, &mut req);
        assert_eq!(report.kind, FrameKind::Degenerate);
        assert_eq!(sim.fixed_ticks, 0);
        assert!(sim.updates.is_empty());
        assert!((sched.accumulator() - 2.0).abs() < 1e-9);

        // the next sane frame pays the debt down
        let report = sched.frame(2.0 + TICK, &mut sim, &mut req);
        assert_eq!(report.kind, FrameKind::Normal);
        assert!((120..=121).contains(&report.fixed_ticks));
    }

    #[test]
    fn blur_skips_and_focus_resyncs() {
        let mut sched = scheduler();
        let mut sim = RecordingSim::default();
        let mut req = CountingRequester::default();

        sched.frame(0.0, &mut sim, &mut req);
        sched.blur();
        assert_eq!(sched.frame(5.0, &mut sim, &mut req).kind, FrameKind::Blurred);
        sched.focus();
        assert_eq!(sched.frame(30.0, &mut sim, &mut req).kind, FrameKind::Resumed);
        assert_eq!(sim.fixed_ticks, 0);

        let report = sched.frame(30.0 + 2.5 * TICK, &mut sim, &mut req);
        assert_eq!(report.kind, FrameKind::Normal);
        assert_eq!(report.fixed_ticks, 2);
        assert_eq!(req.requests, 4);
    }

    #[test]
    fn focus_while_focused_is_noop() {
        let mut sched = scheduler();
        let mut sim = RecordingSim::default();
        let mut req = NoopRequester;
        sched.frame(0.0, &mut sim, &mut req);
        sched.focus();
        assert_eq!(sched.frame(TICK, &mut sim, &mut req).kind, FrameKind::Normal);
    }

    #[test]
    fn monotonic_clock_drives_a_first_frame() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(a >= 0.0 && b >= a);

        let mut sched = scheduler();
        let mut sim = RecordingSim::default();
        let report = sched.frame(clock.now(), &mut sim, &mut NoopRequester);
        assert_eq!(report.kind, FrameKind::First);
    }

    // ================================================================
    // Property tests
    // ================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ticks_match_accumulated_time(deltas in prop::collection::vec(0.0f64..0.2, 1..60)) {
                let mut sched = scheduler();
                let mut sim = RecordingSim::default();
                let mut req = NoopRequester;

                let mut now = 0.0;
                sched.frame(now, &mut sim, &mut req);
                let mut total = 0.0;
                for dt in &deltas {
                    now += dt;
                    total += dt;
                    let report = sched.frame(now, &mut sim, &mut req);
                    prop_assert_eq!(report.kind, FrameKind::Normal);
                }

                let expected = total / TICK;
                prop_assert!((sim.fixed_ticks as f64 - expected.floor()).abs() <= 1.0);
                prop_assert!(sched.accumulator() >= -1e-9);
                prop_assert!(sched.accumulator() < TICK + 1e-9);
                prop_assert_eq!(sim.updates.len(), deltas.len());
            }
        }
    }
}
