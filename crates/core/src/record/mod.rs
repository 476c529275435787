use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    audio::AudioTap,
    render::{VideoFrame, VideoStream},
    Result, VisualiserError,
};

mod encoder;
mod sink;

pub use encoder::{
    inspect_interleaved, CaptureEncoder, EncodingProfile, InterleavedEncoder, InterleavedSummary,
    StreamFormat,
};
pub use sink::{DirectorySink, FileSink, RecordingBlob};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Wall-clock interval between emitted chunks.
    pub chunk_interval_ms: u64,
    /// Upper bound on captured video frames per second.
    pub fps: u32,
    pub output_dir: PathBuf,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 1000,
            fps: 30,
            output_dir: PathBuf::from("recordings"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Recording,
    /// Stopped, or sealed but not yet saved; waiting for
    /// [`Recorder::finalize`].
    Finalizing,
}

/// Live capture: the paired streams and the chunks emitted so far.
#[derive(Debug)]
struct RecordingSession {
    video: VideoStream,
    audio: AudioTap,
    profile: EncodingProfile,
    started_at: f64,
    last_frame_at: Option<f64>,
    last_emit_at: f64,
    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    fn timestamp_ms(&self, now: f64) -> u64 {
        ((now - self.started_at).max(0.0) * 1000.0).round() as u64
    }
}

/// Owns at most one recording session and drives its encoder.
///
/// Time is passed in explicitly as seconds on the caller's clock so chunk
/// emission stays in step with the tick loop. A recording whose save failed
/// is held as `unsaved` until a later [`Recorder::finalize`] stores it or
/// [`Recorder::discard`] drops it.
pub struct Recorder {
    settings: RecordingSettings,
    encoder: Box<dyn CaptureEncoder>,
    state: RecordingState,
    session: Option<RecordingSession>,
    unsaved: Option<RecordingBlob>,
}

impl Recorder {
    pub fn new(settings: RecordingSettings, encoder: Box<dyn CaptureEncoder>) -> Self {
        Self {
            settings,
            encoder,
            state: RecordingState::Idle,
            session: None,
            unsaved: None,
        }
    }

    /// Recorder backed by the built-in [`InterleavedEncoder`].
    pub fn with_default_encoder(settings: RecordingSettings) -> Self {
        Self::new(settings, Box::new(InterleavedEncoder::new()))
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Profile negotiated for the current session.
    pub fn profile(&self) -> Option<EncodingProfile> {
        self.session.as_ref().map(|session| session.profile)
    }

    /// Sealed recording kept after a failed save.
    pub fn unsaved(&self) -> Option<&RecordingBlob> {
        self.unsaved.as_ref()
    }

    pub fn chunk_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.chunks.len())
            .unwrap_or(0)
    }

    /// Pairs the capture stream with an audio tap and begins a session.
    ///
    /// Fails without side effects when either input is missing or when a
    /// session is still held.
    pub fn start(
        &mut self,
        video: Option<VideoStream>,
        audio: Option<AudioTap>,
        now: f64,
    ) -> Result<EncodingProfile> {
        if self.state != RecordingState::Idle {
            return Err(VisualiserError::RecordingInProgress);
        }
        let video = video.ok_or(VisualiserError::RecordingUnavailable(
            "no renderable surface to capture",
        ))?;
        let audio = audio.ok_or(VisualiserError::RecordingUnavailable("no audio graph to tap"))?;

        let format = StreamFormat {
            width: video.width(),
            height: video.height(),
            fps: video.fps(),
            sample_rate: audio.sample_rate(),
        };
        let profile = self.negotiate(format)?;

        info!(%profile, fps = format.fps, "recording started");
        self.session = Some(RecordingSession {
            video,
            audio,
            profile,
            started_at: now,
            last_frame_at: None,
            last_emit_at: now,
            chunks: Vec::new(),
        });
        self.state = RecordingState::Recording;
        Ok(profile)
    }

    fn negotiate(&mut self, format: StreamFormat) -> Result<EncodingProfile> {
        match self.encoder.configure(EncodingProfile::PREFERRED, format) {
            Ok(()) => Ok(EncodingProfile::PREFERRED),
            Err(VisualiserError::EncodingUnsupported(mime)) => {
                warn!(
                    %mime,
                    fallback = %EncodingProfile::DEFAULT,
                    "preferred encoding unavailable"
                );
                self.encoder.configure(EncodingProfile::DEFAULT, format)?;
                Ok(EncodingProfile::DEFAULT)
            }
            Err(err) => Err(err),
        }
    }

    /// Encodes a presented frame unless the capture rate says it is too
    /// early. Returns whether the frame was taken.
    pub fn capture_frame(&mut self, frame: &VideoFrame, now: f64) -> Result<bool> {
        if self.state != RecordingState::Recording {
            return Ok(false);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };

        let period = 1.0 / session.video.fps().max(1) as f64;
        if let Some(last) = session.last_frame_at {
            if now - last + 1e-9 < period {
                return Ok(false);
            }
        }

        self.encoder.encode_frame(frame, session.timestamp_ms(now))?;
        session.last_frame_at = Some(now);
        Ok(true)
    }

    /// Moves tapped audio into the encoder and emits a chunk when the
    /// interval has elapsed.
    pub fn poll(&mut self, now: f64) -> Result<()> {
        if self.state != RecordingState::Recording {
            return Ok(());
        }
        self.pump_audio(now)?;

        let interval = self.settings.chunk_interval_ms as f64 / 1000.0;
        let due = self
            .session
            .as_ref()
            .map(|session| now - session.last_emit_at >= interval)
            .unwrap_or(false);
        if due {
            self.emit_chunk(now);
        }
        Ok(())
    }

    /// Stops capturing and emits whatever is buffered. Returns `false` when
    /// there was nothing to stop.
    pub fn stop(&mut self, now: f64) -> Result<bool> {
        if self.state != RecordingState::Recording {
            return Ok(false);
        }
        self.pump_audio(now)?;
        self.emit_chunk(now);
        self.state = RecordingState::Finalizing;
        info!(chunks = self.chunk_count(), "recording stopped");
        Ok(true)
    }

    /// Concatenates the chunks, releases the capture streams and saves the
    /// result through `sink`. A live session is stopped first.
    ///
    /// When the sink fails the sealed recording is kept and the recorder
    /// stays in [`RecordingState::Finalizing`], so calling this again with a
    /// working sink retries the save.
    pub fn finalize(
        &mut self,
        sink: &mut dyn FileSink,
        now: f64,
    ) -> Result<(RecordingBlob, PathBuf)> {
        self.stop(now)?;
        let blob = match self.unsaved.take() {
            Some(blob) => blob,
            None => self.seal()?,
        };

        match sink.save(&blob.suggested_name(), &blob) {
            Ok(path) => {
                self.state = RecordingState::Idle;
                Ok((blob, path))
            }
            Err(err) => {
                warn!(error = %err, bytes = blob.len(), "saving recording failed, keeping it");
                self.unsaved = Some(blob);
                Err(err)
            }
        }
    }

    /// Drops a recording that could not be saved and returns it.
    pub fn discard(&mut self) -> Option<RecordingBlob> {
        let blob = self.unsaved.take()?;
        self.state = RecordingState::Idle;
        info!(bytes = blob.len(), "discarded unsaved recording");
        Some(blob)
    }

    /// Ends the session and joins its chunks.
    fn seal(&mut self) -> Result<RecordingBlob> {
        let session = self
            .session
            .take()
            .ok_or(VisualiserError::RecordingUnavailable("no recording to finalize"))?;

        session.video.stop_tracks();
        let RecordingSession {
            audio,
            profile,
            chunks,
            ..
        } = session;
        drop(audio);

        if chunks.is_empty() {
            self.state = RecordingState::Idle;
            warn!("recording captured no data");
            return Err(VisualiserError::EmptyCapture);
        }

        let chunk_count = chunks.len();
        Ok(RecordingBlob::new(chunks.concat(), profile, chunk_count))
    }

    fn pump_audio(&mut self, now: f64) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let samples = session.audio.drain()?;
        self.encoder.encode_audio(&samples, session.timestamp_ms(now))
    }

    fn emit_chunk(&mut self, now: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.last_emit_at = now;

        let chunk = self.encoder.take_chunk();
        if chunk.is_empty() {
            return;
        }
        debug!(
            index = session.chunks.len(),
            bytes = chunk.len(),
            "emitted recording chunk"
        );
        session.chunks.push(chunk);
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("chunks", &self.chunk_count())
            .field("unsaved", &self.unsaved.as_ref().map(RecordingBlob::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::MediaTrack, AudioConfig, AudioEngine};

    fn capture_pair(engine: &mut AudioEngine) -> (VideoStream, AudioTap) {
        use crate::render::{Renderer, SoftwareRenderer};
        let mut renderer = SoftwareRenderer::new(crate::config::RenderConfig {
            width: 16,
            height: 8,
            ..Default::default()
        })
        .unwrap();
        (renderer.capture_stream(30).unwrap(), engine.tap().unwrap())
    }

    fn loaded_engine() -> AudioEngine {
        let mut engine = AudioEngine::new(AudioConfig::default());
        engine
            .load_track(MediaTrack::tone(440.0, 2.0, 8000).unwrap())
            .unwrap();
        engine
    }

    fn frame() -> VideoFrame {
        VideoFrame {
            width: 16,
            height: 8,
            pixels: vec![0; 16 * 8 * 4],
        }
    }

    #[test]
    fn start_requires_both_streams() {
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());

        let err = recorder.start(None, Some(audio), 0.0).unwrap_err();
        assert!(matches!(err, VisualiserError::RecordingUnavailable(_)));
        let err = recorder.start(Some(video), None, 0.0).unwrap_err();
        assert!(matches!(err, VisualiserError::RecordingUnavailable(_)));
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn falls_back_to_default_profile() {
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());

        let profile = recorder.start(Some(video), Some(audio), 0.0).unwrap();
        assert_eq!(profile, EncodingProfile::DEFAULT);
        assert_eq!(recorder.profile(), Some(EncodingProfile::DEFAULT));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let (video2, audio2) = capture_pair(&mut engine);
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());

        recorder.start(Some(video), Some(audio), 0.0).unwrap();
        let err = recorder.start(Some(video2), Some(audio2), 0.1).unwrap_err();
        assert!(matches!(err, VisualiserError::RecordingInProgress));

        recorder.stop(0.2).unwrap();
        let err = recorder
            .start(
                Some(capture_pair(&mut engine).0),
                Some(engine.tap().unwrap()),
                0.3,
            )
            .unwrap_err();
        assert!(matches!(err, VisualiserError::RecordingInProgress));
    }

    #[test]
    fn frames_are_throttled_to_capture_rate() {
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());
        recorder.start(Some(video), Some(audio), 0.0).unwrap();

        let taken = (0..60)
            .map(|tick| tick as f64 / 60.0)
            .filter(|&now| recorder.capture_frame(&frame(), now).unwrap())
            .count();
        assert_eq!(taken, 30);
    }

    #[test]
    fn chunks_follow_the_interval_and_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let watcher = video.clone();
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());
        recorder.start(Some(video), Some(audio), 0.0).unwrap();

        for tick in 1..=150 {
            let now = tick as f64 / 60.0;
            engine.render_until(now).unwrap();
            recorder.capture_frame(&frame(), now).unwrap();
            recorder.poll(now).unwrap();
        }
        assert_eq!(recorder.chunk_count(), 2);

        assert!(recorder.stop(2.5).unwrap());
        assert!(!recorder.stop(2.6).unwrap());
        assert_eq!(recorder.state(), RecordingState::Finalizing);

        let (blob, path) = recorder.finalize(&mut sink, 2.6).unwrap();
        assert_eq!(blob.chunk_count(), 3);
        assert!(path.exists());
        assert!(!watcher.is_live());
        assert_eq!(engine.live_taps(), 0);
        assert_eq!(recorder.state(), RecordingState::Idle);

        let summary = inspect_interleaved(blob.bytes()).unwrap();
        assert_eq!(summary.sample_rate, 8000);
        assert_eq!(summary.audio_samples, 16_000);
        assert_eq!(summary.video_packets, 75);
    }

    #[test]
    fn empty_capture_produces_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("out"));
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());

        recorder.start(Some(video), Some(audio), 0.0).unwrap();
        let err = recorder.finalize(&mut sink, 0.5).unwrap_err();

        assert!(matches!(err, VisualiserError::EmptyCapture));
        assert!(!dir.path().join("out").exists());
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn failed_save_keeps_the_recording_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let mut broken = DirectorySink::new(blocker.clone());
        let mut sink = DirectorySink::new(dir.path().join("out"));
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let watcher = video.clone();
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());
        recorder.start(Some(video), Some(audio), 0.0).unwrap();

        for tick in 1..=60 {
            let now = tick as f64 / 60.0;
            engine.render_until(now).unwrap();
            recorder.capture_frame(&frame(), now).unwrap();
            recorder.poll(now).unwrap();
        }

        let err = recorder.finalize(&mut broken, 1.0).unwrap_err();
        assert!(matches!(err, VisualiserError::Io(_)));
        assert_eq!(recorder.state(), RecordingState::Finalizing);
        assert!(!watcher.is_live());
        let kept = recorder.unsaved().unwrap().clone();
        assert!(!kept.is_empty());
        assert!(matches!(
            recorder.start(None, None, 1.1),
            Err(VisualiserError::RecordingInProgress)
        ));

        let (blob, path) = recorder.finalize(&mut sink, 1.2).unwrap();
        assert_eq!(blob.bytes(), kept.bytes());
        assert_eq!(std::fs::read(path).unwrap(), blob.bytes());
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(recorder.unsaved().is_none());
    }

    #[test]
    fn discarding_an_unsaved_recording_frees_the_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let mut broken = DirectorySink::new(blocker);
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let mut recorder = Recorder::with_default_encoder(RecordingSettings::default());
        recorder.start(Some(video), Some(audio), 0.0).unwrap();
        engine.render_until(0.5).unwrap();
        recorder.capture_frame(&frame(), 0.5).unwrap();

        assert!(recorder.finalize(&mut broken, 0.5).is_err());
        let blob = recorder.discard().unwrap();
        assert_eq!(blob.chunk_count(), 1);
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(recorder.discard().is_none());

        let (video, audio) = capture_pair(&mut engine);
        assert!(recorder.start(Some(video), Some(audio), 0.6).is_ok());
    }

    /// Accepts only the preferred profile; writes one marker byte per packet.
    #[derive(Default)]
    struct WebmEncoder {
        pending: Vec<u8>,
    }

    impl CaptureEncoder for WebmEncoder {
        fn configure(&mut self, profile: EncodingProfile, _format: StreamFormat) -> Result<()> {
            if profile != EncodingProfile::PREFERRED {
                return Err(VisualiserError::EncodingUnsupported(profile.mime_type.to_string()));
            }
            Ok(())
        }

        fn encode_frame(&mut self, _frame: &VideoFrame, _timestamp_ms: u64) -> Result<()> {
            self.pending.push(b'V');
            Ok(())
        }

        fn encode_audio(&mut self, samples: &[f32], _timestamp_ms: u64) -> Result<()> {
            if !samples.is_empty() {
                self.pending.push(b'A');
            }
            Ok(())
        }

        fn take_chunk(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.pending)
        }
    }

    /// Fails every configuration with an I/O error.
    struct BrokenEncoder;

    impl CaptureEncoder for BrokenEncoder {
        fn configure(&mut self, _profile: EncodingProfile, _format: StreamFormat) -> Result<()> {
            Err(std::io::Error::other("capture device busy").into())
        }

        fn encode_frame(&mut self, _frame: &VideoFrame, _timestamp_ms: u64) -> Result<()> {
            Ok(())
        }

        fn encode_audio(&mut self, _samples: &[f32], _timestamp_ms: u64) -> Result<()> {
            Ok(())
        }

        fn take_chunk(&mut self) -> Vec<u8> {
            Vec::new()
        }
    }

    #[test]
    fn preferred_profile_is_kept_when_supported() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let mut recorder =
            Recorder::new(RecordingSettings::default(), Box::<WebmEncoder>::default());

        let profile = recorder.start(Some(video), Some(audio), 0.0).unwrap();
        assert_eq!(profile, EncodingProfile::PREFERRED);

        engine.render_until(0.5).unwrap();
        recorder.capture_frame(&frame(), 0.5).unwrap();
        let (blob, path) = recorder.finalize(&mut sink, 0.5).unwrap();

        assert_eq!(blob.profile(), EncodingProfile::PREFERRED);
        assert_eq!(blob.bytes(), b"VA");
        assert!(blob.suggested_name().ends_with(".webm"));
        assert_eq!(path.extension().unwrap(), "webm");
    }

    #[test]
    fn configure_errors_other_than_unsupported_abort_start() {
        let mut engine = loaded_engine();
        let (video, audio) = capture_pair(&mut engine);
        let watcher = video.clone();
        let mut recorder = Recorder::new(RecordingSettings::default(), Box::new(BrokenEncoder));

        let err = recorder.start(Some(video), Some(audio), 0.0).unwrap_err();
        assert!(matches!(err, VisualiserError::Io(_)));
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert_eq!(recorder.profile(), None);
        assert_eq!(engine.live_taps(), 0);
        assert!(watcher.is_live());
    }
}
