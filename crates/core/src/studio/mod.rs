//! Process-level owner of every subsystem and the cooperative tick loop.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    audio::{AudioEngine, MediaTrack, SpectrumHandle},
    config::{AppConfig, ParamValue},
    engine::VisualizationEngine,
    record::{DirectorySink, EncodingProfile, FileSink, Recorder, RecordingBlob, RecordingState},
    render::{Renderer, SoftwareRenderer},
    timeline::{PlaybackController, PlaybackEvent, Scheduler},
    waveform::WaveformKind,
    Result, SpectrumSource, VisualiserError,
};

/// Waveform shown before the user picks one.
pub const DEFAULT_WAVEFORM: WaveformKind = WaveformKind::ParticleMorph;

pub struct Studio {
    audio: AudioEngine,
    engine: VisualizationEngine,
    playback: PlaybackController,
    scheduler: Scheduler,
    renderer: Box<dyn Renderer>,
    recorder: Recorder,
    sink: Box<dyn FileSink>,
    spectrum: Option<SpectrumHandle>,
    last_recording: Option<(RecordingBlob, PathBuf)>,
}

impl Studio {
    /// Builds a studio with the software renderer, the built-in encoder and
    /// a sink writing into the configured output directory.
    pub fn new(config: AppConfig) -> Result<Self> {
        let renderer = SoftwareRenderer::new(config.render.clone())?;
        let sink = DirectorySink::new(config.recording.output_dir.clone());
        let recorder = Recorder::with_default_encoder(config.recording.clone());
        Ok(Self::with_parts(config, Box::new(renderer), recorder, Box::new(sink)))
    }

    pub fn with_parts(
        config: AppConfig,
        renderer: Box<dyn Renderer>,
        recorder: Recorder,
        sink: Box<dyn FileSink>,
    ) -> Self {
        let mut engine = VisualizationEngine::new();
        engine.set_bloom(config.render.bloom);
        engine.set_waveform(DEFAULT_WAVEFORM);

        Self {
            audio: AudioEngine::new(config.audio),
            engine,
            playback: PlaybackController::new(),
            scheduler: Scheduler::new(),
            renderer,
            recorder,
            sink,
            spectrum: None,
            last_recording: None,
        }
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    pub fn engine(&self) -> &VisualizationEngine {
        &self.engine
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Most recent finalized recording and where it was saved.
    pub fn last_recording(&self) -> Option<&(RecordingBlob, PathBuf)> {
        self.last_recording.as_ref()
    }

    /// Decodes and loads a WAV file, replacing the current media.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<f64> {
        self.ensure_not_recording()?;
        self.unload();
        let duration = self.audio.load_file(path)?;
        self.attach_media(duration)
    }

    pub fn load_track(&mut self, track: MediaTrack) -> Result<f64> {
        self.ensure_not_recording()?;
        self.unload();
        let duration = self.audio.load_track(track)?;
        self.attach_media(duration)
    }

    fn ensure_not_recording(&self) -> Result<()> {
        if self.recorder.is_recording() {
            return Err(VisualiserError::RecordingInProgress);
        }
        Ok(())
    }

    fn unload(&mut self) {
        self.scheduler.stop();
        self.playback.load(0.0);
        self.spectrum = None;
        self.audio.teardown_media();
    }

    fn attach_media(&mut self, duration: f64) -> Result<f64> {
        self.spectrum = Some(self.audio.spectrum()?);
        self.playback.load(duration);
        Ok(duration)
    }

    pub fn set_waveform(&mut self, kind: WaveformKind) {
        self.engine.set_waveform(kind);
    }

    pub fn set_config_value(&mut self, name: &str, value: ParamValue) -> Result<ParamValue> {
        self.engine.set_config_value(name, value)
    }

    pub fn set_config_text(&mut self, name: &str, input: &str) -> Result<ParamValue> {
        self.engine.set_config_text(name, input)
    }

    /// Starts playback and the tick loop. Returns `false` without media.
    pub fn play(&mut self) -> bool {
        if !self.playback.play() {
            return false;
        }
        self.audio.seek(self.playback.current_time());
        self.scheduler.start();
        true
    }

    pub fn pause(&mut self) {
        self.playback.pause();
        self.scheduler.stop();
    }

    /// Moves the playhead. A running recording keeps capturing whatever is
    /// played, so its audio jumps with the seek while video time runs on.
    pub fn seek(&mut self, seconds: f64) -> f64 {
        let from = self.playback.current_time();
        let position = self.playback.seek(seconds);
        if self.recorder.is_recording() {
            debug!(from, to = position, "seeking while recording");
        }
        self.audio.seek(position);
        position
    }

    /// Begins capturing the presented frames together with a tap on the
    /// current audio graph. Playback is started if it was not running.
    pub fn start_recording(&mut self) -> Result<EncodingProfile> {
        let video = self.renderer.capture_stream(self.recorder.settings().fps);
        let audio = self.audio.tap().ok();
        let opened = video.clone();
        let profile = match self.recorder.start(video, audio, self.scheduler.elapsed()) {
            Ok(profile) => profile,
            Err(err) => {
                if let Some(stream) = opened {
                    stream.stop_tracks();
                }
                return Err(err);
            }
        };

        if !self.playback.is_playing() {
            self.play();
        }
        Ok(profile)
    }

    /// Stops and finalizes the active recording. Returns `None` when nothing
    /// was being recorded. After a failed save, calling this again retries
    /// saving the same recording.
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>> {
        if self.recorder.state() == RecordingState::Idle {
            return Ok(None);
        }

        let (blob, path) = self
            .recorder
            .finalize(self.sink.as_mut(), self.scheduler.elapsed())?;
        info!(
            path = %path.display(),
            bytes = blob.len(),
            chunks = blob.chunk_count(),
            "recording finalized"
        );
        self.last_recording = Some((blob, path.clone()));
        Ok(Some(path))
    }

    /// Gives up on a recording whose save failed.
    pub fn discard_recording(&mut self) -> Option<RecordingBlob> {
        self.recorder.discard()
    }

    /// Runs one frame: advances playback, renders the audio up to the new
    /// playhead, updates the waveform, presents it and feeds the recorder.
    pub fn tick(&mut self, delta: f64) -> Result<PlaybackEvent> {
        if !self.playback.is_playing() {
            return Ok(PlaybackEvent::Stalled);
        }

        let event = self.playback.advance(delta);
        self.audio.render_until(self.playback.current_time())?;
        if let Some(spectrum) = &self.spectrum {
            let frame = spectrum.latest_frame()?;
            self.engine.update(&frame);
        }
        let frame = self.engine.render(self.renderer.as_mut())?;

        self.scheduler.record_tick(delta);
        let now = self.scheduler.elapsed();
        if self.recorder.is_recording() {
            self.recorder.capture_frame(&frame, now)?;
            self.recorder.poll(now)?;
        }

        if event == PlaybackEvent::Ended {
            self.scheduler.stop();
            info!(time = self.playback.current_time(), "playback ended");
            self.stop_recording()?;
        }
        Ok(event)
    }

    /// Ticks with a fixed step until playback stops. Returns the number of
    /// ticks run.
    pub fn run(&mut self, delta: f64) -> Result<u64> {
        if delta <= 0.0 {
            return Err(VisualiserError::InvalidInput("tick interval must be positive"));
        }

        let mut ticks = 0;
        while self.scheduler.is_running() {
            match self.tick(delta)? {
                PlaybackEvent::Continue => ticks += 1,
                PlaybackEvent::Ended => {
                    ticks += 1;
                    break;
                }
                PlaybackEvent::Stalled => {
                    warn!("tick loop running without active playback");
                    self.scheduler.stop();
                }
            }
        }
        Ok(ticks)
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("audio", &self.audio)
            .field("engine", &self.engine)
            .field("playback", &self.playback)
            .field("recorder", &self.recorder)
            .finish()
    }
}
