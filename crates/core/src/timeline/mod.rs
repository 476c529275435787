use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Outcome of advancing the playhead by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Nothing changed; not playing.
    Stalled,
    Continue,
    /// The playhead reached the end of the media and playback went idle.
    Ended,
}

/// Play/pause/seek state over a media of known duration.
#[derive(Debug, Default, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
    current_time: f64,
    duration: f64,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Resets the transport for newly loaded media.
    pub fn load(&mut self, duration: f64) {
        self.state = PlaybackState::Idle;
        self.current_time = 0.0;
        self.duration = duration.max(0.0);
    }

    /// Starts or resumes playback. Playing from the end rewinds first.
    pub fn play(&mut self) -> bool {
        if self.duration <= 0.0 {
            return false;
        }
        if self.current_time >= self.duration {
            self.current_time = 0.0;
        }
        self.state = PlaybackState::Playing;
        true
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn seek(&mut self, seconds: f64) -> f64 {
        self.current_time = seconds.clamp(0.0, self.duration);
        self.current_time
    }

    pub fn advance(&mut self, delta: f64) -> PlaybackEvent {
        if self.state != PlaybackState::Playing {
            return PlaybackEvent::Stalled;
        }
        self.current_time = (self.current_time + delta.max(0.0)).min(self.duration);
        if self.current_time >= self.duration {
            self.state = PlaybackState::Idle;
            PlaybackEvent::Ended
        } else {
            PlaybackEvent::Continue
        }
    }
}

/// Cooperative tick loop state: one tick runs at a time and the loop keeps
/// going while `running` is set.
#[derive(Debug, Default)]
pub struct Scheduler {
    running: bool,
    ticks: u64,
    elapsed: f64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Wall-clock seconds covered by completed ticks.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn record_tick(&mut self, delta: f64) {
        self.ticks += 1;
        self.elapsed += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_runs_to_the_end_and_goes_idle() {
        let mut playback = PlaybackController::new();
        assert!(!playback.play());

        playback.load(1.0);
        assert!(playback.play());
        assert_eq!(playback.advance(0.6), PlaybackEvent::Continue);
        assert_eq!(playback.advance(0.6), PlaybackEvent::Ended);
        assert_eq!(playback.state(), PlaybackState::Idle);
        assert_eq!(playback.current_time(), 1.0);
        assert_eq!(playback.advance(0.1), PlaybackEvent::Stalled);

        assert!(playback.play());
        assert_eq!(playback.current_time(), 0.0);
    }

    #[test]
    fn pause_freezes_the_playhead() {
        let mut playback = PlaybackController::new();
        playback.load(2.0);
        playback.play();
        playback.advance(0.5);
        playback.pause();

        assert_eq!(playback.advance(0.5), PlaybackEvent::Stalled);
        assert_eq!(playback.current_time(), 0.5);
        assert_eq!(playback.state(), PlaybackState::Paused);
    }

    #[test]
    fn seek_is_clamped_to_media() {
        let mut playback = PlaybackController::new();
        playback.load(3.0);
        assert_eq!(playback.seek(-1.0), 0.0);
        assert_eq!(playback.seek(7.0), 3.0);
        assert_eq!(playback.seek(1.25), 1.25);
    }

    #[test]
    fn scheduler_counts_ticks() {
        let mut scheduler = Scheduler::new();
        assert!(!scheduler.is_running());
        scheduler.start();
        scheduler.record_tick(0.5);
        scheduler.record_tick(0.25);
        scheduler.stop();

        assert_eq!(scheduler.ticks(), 2);
        assert_eq!(scheduler.elapsed(), 0.75);
        assert!(!scheduler.is_running());
    }
}
