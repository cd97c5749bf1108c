//! Frame rate and timing measurement.
//!
//! [`FrameRate`] produces the per-frame FPS value that gets drawn onto the output image.
//! [`Timer`] and [`FpsCounter`] are profiling aids that periodically log how long the individual
//! stages of the pipeline take.

use std::{
    cell::Cell,
    fmt::{self, Arguments},
    mem,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Smoothing factor of the exponential moving average computed by [`Timer`].
const EMA_ALPHA: f32 = 0.3;

/// Computes the frame rate implied by the time between two frames.
///
/// Returns [`None`] for a zero `delta`, since no rate can be derived from it.
pub fn instantaneous_fps(delta: Duration) -> Option<f32> {
    if delta.is_zero() {
        None
    } else {
        Some(1.0 / delta.as_secs_f32())
    }
}

/// Tracks the instantaneous frame rate of a capture loop.
///
/// Every call to [`FrameRate::tick`] marks the start of a new frame and returns `1 / Δt`, where `Δt`
/// is the wall-clock time since the previous tick. The very first tick has no previous timestamp to
/// compare against, so it yields [`None`].
#[derive(Debug, Default, Clone)]
pub struct FrameRate {
    last: Option<Instant>,
}

impl FrameRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at the current time and returns the frame rate, if one is known.
    pub fn tick(&mut self) -> Option<f32> {
        self.tick_at(Instant::now())
    }

    /// Records a frame at `now` and returns the frame rate, if one is known.
    pub fn tick_at(&mut self, now: Instant) -> Option<f32> {
        let last = self.last.replace(now)?;
        instantaneous_fps(now.saturating_duration_since(last))
    }

    /// Forgets the previous timestamp, so that the next tick is treated as the first one.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Measures and averages the time an operation takes.
///
/// Displaying the timer with `{}` prints the average and resets it.
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

struct State {
    avg: f32,
    count: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State { avg: 0.0, count: 0 }),
        }
    }

    /// Invokes `timee` and records how long it took.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation; the measurement ends when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&self, start: Instant) {
        let secs = start.elapsed().as_secs_f32();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.avg = match state.count {
            0 => secs,
            _ => EMA_ALPHA * secs + (1.0 - EMA_ALPHA) * state.avg,
        };
        state.count += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let avg_ms = mem::replace(&mut state.avg, 0.0) * 1000.0;
        let count = mem::replace(&mut state.count, 0);

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs the number of frames processed per second, once a second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame.
    pub fn tick(&mut self) {
        self.tick_impl(format_args!(""));
    }

    /// Counts a frame, appending `extra` (typically a list of [`Timer`]s) to the log line.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        struct List<I>(Cell<Option<I>>);

        impl<D: fmt::Display, I: Iterator<Item = D>> fmt::Display for List<I> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let Some(mut iter) = self.0.take() else {
                    return Ok(());
                };
                if let Some(first) = iter.next() {
                    write!(f, " ({first}")?;
                    for item in iter {
                        write!(f, ", {item}")?;
                    }
                    f.write_str(")")?;
                }
                Ok(())
            }
        }

        self.tick_impl(format_args!("{}", List(Cell::new(Some(extra.into_iter())))));
    }

    fn tick_impl(&mut self, extra: Arguments<'_>) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            log::debug!("{}: {} FPS{}", self.name, self.frames, extra);

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn fps_is_reciprocal_of_delta() {
        let fps = instantaneous_fps(Duration::from_millis(100)).unwrap();
        assert_relative_eq!(fps, 10.0, max_relative = 1e-5);

        let fps = instantaneous_fps(Duration::from_millis(40)).unwrap();
        assert_relative_eq!(fps, 25.0, max_relative = 1e-5);

        assert_eq!(instantaneous_fps(Duration::ZERO), None);
    }

    #[test]
    fn first_frame_has_no_rate() {
        let t0 = Instant::now();
        let mut rate = FrameRate::new();
        assert_eq!(rate.tick_at(t0), None);

        let fps = rate.tick_at(t0 + Duration::from_millis(100)).unwrap();
        assert_relative_eq!(fps, 10.0, max_relative = 1e-5);

        let fps = rate.tick_at(t0 + Duration::from_millis(150)).unwrap();
        assert_relative_eq!(fps, 20.0, max_relative = 1e-5);

        rate.reset();
        assert_eq!(rate.tick_at(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn repeated_timestamp_has_no_rate() {
        let t0 = Instant::now();
        let mut rate = FrameRate::new();
        rate.tick_at(t0);
        assert_eq!(rate.tick_at(t0), None);
    }

    #[test]
    fn timer_display_resets() {
        let timer = Timer::new("decode");
        timer.time(|| ());
        timer.time(|| ());
        let first = timer.to_string();
        assert!(first.starts_with("decode: 2x"), "{first}");
        assert_eq!(timer.to_string(), "decode: 0x0.0ms");
    }
}
