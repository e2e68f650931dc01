//! Simulated playback clock
//!
//! Drives the playhead for backends that have no real decoder behind
//! them: a tokio task ticks at a fixed cadence, advances the position
//! by elapsed-time-times-rate, and reports ticks and end-of-media to
//! the owning renderer. Doubles as the polling synthesizer for
//! backends whose upstream player exposes no native time events.
//!
//! Without an async runtime on the current thread the clock stays
//! frozen; position only moves through explicit seeks.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

struct ClockState {
    position: f64,
    rate: f64,
    duration: Option<f64>,
    looping: bool,
    playing: bool,
    /// Incremented on every play/pause edge; a ticking task exits when
    /// its epoch is stale
    epoch: u64,
}

struct ClockInner {
    state: Mutex<ClockState>,
    tick: Duration,
    on_timeupdate: Box<dyn Fn(f64) + Send + Sync>,
    on_ended: Box<dyn Fn() + Send + Sync>,
}

/// Tokio-driven position clock with rate, loop, and duration clamping
pub struct PlaybackClock {
    inner: Arc<ClockInner>,
}

impl PlaybackClock {
    pub fn new<T, E>(tick: Duration, on_timeupdate: T, on_ended: E) -> Self
    where
        T: Fn(f64) + Send + Sync + 'static,
        E: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ClockInner {
                state: Mutex::new(ClockState {
                    position: 0.0,
                    rate: 1.0,
                    duration: None,
                    looping: false,
                    playing: false,
                    epoch: 0,
                }),
                tick,
                on_timeupdate: Box::new(on_timeupdate),
                on_ended: Box::new(on_ended),
            }),
        }
    }

    pub fn position(&self) -> f64 {
        self.inner.state.lock().position
    }

    pub fn duration(&self) -> Option<f64> {
        self.inner.state.lock().duration
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.inner.state.lock().duration = duration;
    }

    pub fn rate(&self) -> f64 {
        self.inner.state.lock().rate
    }

    pub fn set_rate(&self, rate: f64) {
        self.inner.state.lock().rate = rate;
    }

    pub fn looping(&self) -> bool {
        self.inner.state.lock().looping
    }

    pub fn set_looping(&self, looping: bool) {
        self.inner.state.lock().looping = looping;
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().playing
    }

    /// Seek to `position`, clamped to `[0, duration]`; returns the
    /// clamped value
    pub fn seek(&self, position: f64) -> f64 {
        let mut state = self.inner.state.lock();
        let clamped = match state.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };
        state.position = clamped;
        clamped
    }

    /// Start the ticking task. A second call while already playing is a
    /// no-op.
    pub fn play(&self) {
        let epoch = {
            let mut state = self.inner.state.lock();
            if state.playing {
                return;
            }
            state.playing = true;
            state.epoch += 1;
            state.epoch
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, clock stays frozen");
            return;
        };

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            loop {
                tokio::time::sleep(inner.tick).await;

                let (position, ended) = {
                    let mut state = inner.state.lock();
                    if !state.playing || state.epoch != epoch {
                        return;
                    }
                    state.position += inner.tick.as_secs_f64() * state.rate;

                    let mut ended = false;
                    if let Some(duration) = state.duration {
                        if state.position >= duration {
                            if state.looping {
                                state.position = 0.0;
                            } else {
                                state.position = duration;
                                state.playing = false;
                                ended = true;
                            }
                        }
                    }
                    (state.position, ended)
                };

                (inner.on_timeupdate)(position);
                if ended {
                    (inner.on_ended)();
                    return;
                }
            }
        });
    }

    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        state.playing = false;
        state.epoch += 1;
    }

    /// Pause and rewind to the start
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.playing = false;
        state.epoch += 1;
        state.position = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_clock(tick_ms: u64) -> (PlaybackClock, Arc<Mutex<Vec<f64>>>, Arc<Mutex<u32>>) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let ends = Arc::new(Mutex::new(0u32));
        let ticks_sink = Arc::clone(&ticks);
        let ends_sink = Arc::clone(&ends);
        let clock = PlaybackClock::new(
            Duration::from_millis(tick_ms),
            move |pos| ticks_sink.lock().push(pos),
            move || *ends_sink.lock() += 1,
        );
        (clock, ticks, ends)
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_while_playing() {
        let (clock, ticks, _) = counting_clock(250);
        clock.play();

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        clock.pause();

        let positions = ticks.lock().clone();
        assert_eq!(positions.len(), 4);
        assert!((clock.position() - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_respects_rate() {
        let (clock, _, _) = counting_clock(250);
        clock.set_rate(2.0);
        clock.play();

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!((clock.position() - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ends_at_duration() {
        let (clock, _, ends) = counting_clock(250);
        clock.set_duration(Some(1.0));
        clock.play();

        tokio::time::sleep(Duration::from_millis(2_000)).await;

        assert_eq!(*ends.lock(), 1);
        assert!(!clock.is_playing());
        assert!((clock.position() - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_loops_instead_of_ending() {
        let (clock, _, ends) = counting_clock(250);
        clock.set_duration(Some(0.5));
        clock.set_looping(true);
        clock.play();

        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert_eq!(*ends.lock(), 0);
        assert!(clock.is_playing());
        clock.pause();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_ticking() {
        let (clock, ticks, _) = counting_clock(250);
        clock.play();
        tokio::time::sleep(Duration::from_millis(600)).await;
        clock.pause();
        let seen = ticks.lock().len();

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(ticks.lock().len(), seen);
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let (clock, _, _) = counting_clock(250);
        clock.set_duration(Some(10.0));
        assert_eq!(clock.seek(25.0), 10.0);
        assert_eq!(clock.seek(-5.0), 0.0);
        clock.set_duration(None);
        assert_eq!(clock.seek(1e6), 1e6);
    }
}
