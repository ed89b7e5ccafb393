//! Frame-paced animation time
//!
//! [`AnimationClock`] maps wall-clock frame timestamps onto a looping cursor inside a
//! data time range, so that one full pass over the range takes `loop_period_ms`.
//! [`FpsMeter`] samples the same timestamps to report frames per second.

use crate::{EngineError, Result};
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closed interval of data time in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// No time can elapse inside the range
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.end.partial_cmp(&self.start) != Some(Ordering::Greater)
    }

    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlaybackState {
    #[default]
    Paused,
    Playing,
}

/// Looping time cursor driven by frame timestamps
#[derive(Debug, Clone)]
pub struct AnimationClock {
    range: TimeRange,
    loop_period_ms: f64,
    cursor: f64,
    state: PlaybackState,
    /// Timestamp of the previous tick, `None` until a reference is established
    last_tick: Option<f64>,
}

impl AnimationClock {
    /// Paused clock with the cursor at the start of `range`
    pub fn new(range: TimeRange, loop_period_ms: f64) -> Result<Self> {
        if !loop_period_ms.is_finite() || loop_period_ms <= 0.0 {
            return Err(EngineError::config(
                "loop_period_ms",
                format!("must be a positive number, got {loop_period_ms}"),
            ));
        }
        if !range.start.is_finite() || !range.end.is_finite() {
            return Err(EngineError::config("range", "bounds must be finite"));
        }
        if range.is_degenerate() {
            tracing::debug!(
                "Animation range {}..{} is degenerate, the clock will not advance",
                range.start,
                range.end
            );
        }
        Ok(Self {
            range,
            loop_period_ms,
            cursor: range.start,
            state: PlaybackState::Paused,
            last_tick: None,
        })
    }

    /// Feed a frame timestamp; advances by the time since the previous tick when playing
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        if !now_ms.is_finite() {
            return self.cursor;
        }
        if let Some(previous) = self.last_tick.replace(now_ms) {
            self.advance(now_ms - previous);
        }
        self.cursor
    }

    /// Advance by an explicit amount of wall-clock time
    ///
    /// Paused clocks, degenerate ranges and negative or non-finite deltas leave the
    /// cursor untouched.
    pub fn advance(&mut self, elapsed_ms: f64) -> f64 {
        if self.state != PlaybackState::Playing
            || self.range.is_degenerate()
            || !elapsed_ms.is_finite()
            || elapsed_ms <= 0.0
        {
            return self.cursor;
        }

        let length = self.range.length();
        let next = self.cursor + elapsed_ms * length / self.loop_period_ms;
        self.cursor = if next >= self.range.end {
            self.range.start + (next - self.range.start) % length
        } else {
            next
        };
        self.cursor
    }

    /// Start or stop playback; resuming waits for a fresh reference tick
    pub fn set_playing(&mut self, playing: bool) {
        let state = if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        if state == PlaybackState::Playing && self.state == PlaybackState::Paused {
            self.last_tick = None;
        }
        self.state = state;
    }

    /// Move the cursor; the value is not range-checked
    pub fn seek(&mut self, value: f64) {
        if value.is_finite() {
            self.cursor = value;
        } else {
            tracing::trace!("Ignoring seek to non-finite time {}", value);
        }
    }

    #[inline]
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn loop_period_ms(&self) -> f64 {
        self.loop_period_ms
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position of the cursor inside the range in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.range.is_degenerate() {
            return 0.0;
        }
        ((self.cursor - self.range.start) / self.range.length()).clamp(0.0, 1.0)
    }
}

/// Frames-per-second counter over a fixed sample window
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_ms: f64,
    window_start: Option<f64>,
    frames: u32,
    fps: u32,
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self {
            window_ms: 1000.0,
            window_start: None,
            frames: 0,
            fps: 0,
        }
    }
}

impl FpsMeter {
    pub fn new(window_ms: f64) -> Result<Self> {
        if !window_ms.is_finite() || window_ms <= 0.0 {
            return Err(EngineError::config(
                "fps_window_ms",
                format!("must be a positive number, got {window_ms}"),
            ));
        }
        Ok(Self {
            window_ms,
            ..Default::default()
        })
    }

    /// Count a frame; the first call only opens the sample window
    pub fn record_frame(&mut self, now_ms: f64) -> u32 {
        if !now_ms.is_finite() {
            return self.fps;
        }
        let Some(start) = self.window_start else {
            self.window_start = Some(now_ms);
            return self.fps;
        };

        self.frames += 1;
        let elapsed = now_ms - start;
        if elapsed >= self.window_ms {
            self.fps = (self.frames as f64 * self.window_ms / elapsed).round() as u32;
            self.frames = 0;
            self.window_start = Some(now_ms);
        } else if elapsed < 0.0 {
            self.frames = 0;
            self.window_start = Some(now_ms);
        }
        self.fps
    }

    /// Last sampled rate, 0 before the first full window
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }
}
