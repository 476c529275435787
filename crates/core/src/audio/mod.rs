use std::{
    f32::consts::TAU,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use hound::{SampleFormat, WavReader};

use crate::{AudioConfig, Result, SpectrumAnalyser, SpectrumFrame, SpectrumSource, VisualiserError};

/// Decoded mono PCM ready for playback.
#[derive(Clone)]
pub struct MediaTrack {
    name: String,
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl MediaTrack {
    pub fn new(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        let name = name.into();
        if sample_rate == 0 {
            return Err(VisualiserError::media_load(name, "sample rate is zero"));
        }
        if samples.is_empty() {
            return Err(VisualiserError::media_load(name, "track contains no samples"));
        }

        Ok(Self {
            name,
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Decodes a WAV file, down-mixing every channel to mono.
    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let mut reader =
            WavReader::open(path).map_err(|err| VisualiserError::media_load(&name, err))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|err| VisualiserError::media_load(&name, err))?,
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|err| VisualiserError::media_load(&name, err))?
            }
        };

        let mono = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Self::new(name, mono, spec.sample_rate)
    }

    /// Synthesises a sine tone, mostly useful for demos and tests.
    pub fn tone(frequency: f32, seconds: f32, sample_rate: u32) -> Result<Self> {
        let len = (seconds.max(0.0) * sample_rate as f32).round() as usize;
        let samples = (0..len)
            .map(|n| 0.5 * (TAU * frequency * n as f32 / sample_rate as f32).sin())
            .collect();
        Self::new(format!("tone {frequency} Hz"), samples, sample_rate)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("name", &self.name)
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

type TapBuffer = Arc<Mutex<Vec<f32>>>;

/// Shared state created once and reused across media loads.
struct AudioContext {
    analyser: Arc<Mutex<SpectrumAnalyser>>,
    taps: Vec<Weak<Mutex<Vec<f32>>>>,
}

/// Routing for the currently loaded track.
struct MediaGraph {
    track: MediaTrack,
    cursor: usize,
}

/// High level audio engine façade.
///
/// Owns the audio context and the media graph of the loaded track.
/// Rendering playback pushes samples into the analyser and into every live
/// [`AudioTap`].
pub struct AudioEngine {
    config: AudioConfig,
    context: Option<AudioContext>,
    media: Option<MediaGraph>,
}

impl AudioEngine {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            context: None,
            media: None,
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Whether the shared context has been created.
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    pub fn track(&self) -> Option<&MediaTrack> {
        self.media.as_ref().map(|media| &media.track)
    }

    /// Decodes and loads a WAV file. The previous graph is torn down first,
    /// so on failure no track is loaded.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<f64> {
        self.teardown_media();
        let track = MediaTrack::from_wav(path)?;
        self.load_track(track)
    }

    /// Loads an already decoded track and returns its duration in seconds.
    pub fn load_track(&mut self, track: MediaTrack) -> Result<f64> {
        self.teardown_media();
        let context = self.ensure_context()?;
        lock(&*context.analyser)?.reset();

        let duration = track.duration_seconds();
        tracing::info!(track = track.name(), duration, "loaded media");
        self.media = Some(MediaGraph { track, cursor: 0 });
        Ok(duration)
    }

    /// Drops the loaded track and detaches every tap from its graph.
    pub fn teardown_media(&mut self) {
        if let Some(media) = self.media.take() {
            tracing::debug!(track = media.track.name(), "tearing down media graph");
        }
        if let Some(context) = self.context.as_mut() {
            context.taps.clear();
        }
    }

    pub fn position(&self) -> f64 {
        self.media
            .as_ref()
            .map(|media| media.cursor as f64 / media.track.sample_rate as f64)
            .unwrap_or(0.0)
    }

    pub fn is_finished(&self) -> bool {
        self.media
            .as_ref()
            .map(|media| media.cursor >= media.track.samples.len())
            .unwrap_or(true)
    }

    /// Moves the playhead without rendering the skipped samples.
    pub fn seek(&mut self, seconds: f64) {
        if let Some(media) = self.media.as_mut() {
            let target = (seconds.max(0.0) * media.track.sample_rate as f64).round() as usize;
            media.cursor = target.min(media.track.samples.len());
        }
    }

    /// Plays the track up to `seconds`, feeding the analyser and every live
    /// tap. Returns the number of samples rendered.
    pub fn render_until(&mut self, seconds: f64) -> Result<usize> {
        let (Some(context), Some(media)) = (self.context.as_mut(), self.media.as_mut()) else {
            return Ok(0);
        };

        let samples = &media.track.samples;
        let target = (seconds.max(0.0) * media.track.sample_rate as f64).round() as usize;
        let target = target.min(samples.len());
        if target <= media.cursor {
            return Ok(0);
        }

        let block = &samples[media.cursor..target];
        media.cursor = target;

        lock(&*context.analyser)?.push_samples(block);

        context.taps.retain(|tap| tap.strong_count() > 0);
        for tap in context.taps.iter().filter_map(Weak::upgrade) {
            lock(&*tap)?.extend_from_slice(block);
        }

        Ok(block.len())
    }

    /// Opens an additional branch off the current graph. Playback routing is
    /// unaffected; dropping the tap detaches it.
    pub fn tap(&mut self) -> Result<AudioTap> {
        let sample_rate = self
            .media
            .as_ref()
            .map(|media| media.track.sample_rate)
            .ok_or(VisualiserError::RecordingUnavailable("no audio graph is loaded"))?;
        let context = self
            .context
            .as_mut()
            .ok_or(VisualiserError::RecordingUnavailable("no audio context"))?;

        let buffer: TapBuffer = Arc::new(Mutex::new(Vec::new()));
        context.taps.push(Arc::downgrade(&buffer));
        Ok(AudioTap {
            buffer,
            sample_rate,
        })
    }

    /// Number of taps still attached to the graph.
    pub fn live_taps(&self) -> usize {
        let Some(context) = self.context.as_ref() else {
            return 0;
        };
        context
            .taps
            .iter()
            .filter(|tap| tap.strong_count() > 0)
            .count()
    }

    /// Handle to the analyser, available once a context exists.
    pub fn spectrum(&self) -> Result<SpectrumHandle> {
        self.context
            .as_ref()
            .map(|context| SpectrumHandle::new(context.analyser.clone()))
            .ok_or_else(|| VisualiserError::msg("audio context has not been created"))
    }

    fn ensure_context(&mut self) -> Result<&mut AudioContext> {
        if self.context.is_none() {
            tracing::debug!(fft_size = self.config.fft_size, "creating audio context");
            let analyser = SpectrumAnalyser::new(self.config.clone())?;
            self.context = Some(AudioContext {
                analyser: Arc::new(Mutex::new(analyser)),
                taps: Vec::new(),
            });
        }

        self.context
            .as_mut()
            .ok_or_else(|| VisualiserError::msg("audio context unavailable"))
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("config", &self.config)
            .field("has_context", &self.has_context())
            .field("track", &self.track())
            .field("position", &self.position())
            .finish()
    }
}

/// Recording branch of the audio graph. Accumulates every rendered sample
/// until drained.
pub struct AudioTap {
    buffer: TapBuffer,
    sample_rate: u32,
}

impl AudioTap {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Takes everything captured since the previous drain.
    pub fn drain(&self) -> Result<Vec<f32>> {
        Ok(std::mem::take(&mut *lock(&*self.buffer)?))
    }
}

impl std::fmt::Debug for AudioTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTap")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Shared view over the analyser managed by [`AudioEngine`].
#[derive(Clone)]
pub struct SpectrumHandle {
    shared: Arc<Mutex<SpectrumAnalyser>>,
}

impl SpectrumHandle {
    pub(crate) fn new(shared: Arc<Mutex<SpectrumAnalyser>>) -> Self {
        Self { shared }
    }

    pub fn bin_count(&self) -> Result<usize> {
        Ok(lock(&*self.shared)?.bin_count())
    }
}

impl SpectrumSource for SpectrumHandle {
    fn latest_frame(&self) -> Result<SpectrumFrame> {
        lock(&*self.shared)?.frame()
    }
}

impl std::fmt::Debug for SpectrumHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumHandle").finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| VisualiserError::msg("audio graph has been poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_tone(seconds: f32) -> AudioEngine {
        let mut audio = AudioEngine::new(AudioConfig::default());
        audio
            .load_track(MediaTrack::tone(440.0, seconds, 8_000).unwrap())
            .unwrap();
        audio
    }

    #[test]
    fn renders_into_analyser_and_taps() {
        let mut audio = engine_with_tone(1.0);
        let tap = audio.tap().unwrap();

        let rendered = audio.render_until(0.5).unwrap();
        assert_eq!(rendered, 4_000);
        assert_eq!(tap.drain().unwrap().len(), 4_000);
        assert!(tap.drain().unwrap().is_empty());

        let frame = audio.spectrum().unwrap().latest_frame().unwrap();
        assert_eq!(frame.len(), 256);
        assert!(frame.bins().iter().any(|&bin| bin > 0));
    }

    #[test]
    fn stops_at_end_of_track() {
        let mut audio = engine_with_tone(0.25);
        audio.render_until(10.0).unwrap();

        assert!(audio.is_finished());
        assert!((audio.position() - 0.25).abs() < 1e-9);
        assert_eq!(audio.render_until(11.0).unwrap(), 0);
    }

    #[test]
    fn dropped_taps_detach() {
        let mut audio = engine_with_tone(1.0);
        let tap = audio.tap().unwrap();
        assert_eq!(audio.live_taps(), 1);

        drop(tap);
        audio.render_until(0.1).unwrap();
        assert_eq!(audio.live_taps(), 0);
    }

    #[test]
    fn tap_requires_a_graph() {
        let mut audio = AudioEngine::new(AudioConfig::default());
        let err = audio.tap().unwrap_err();
        assert!(matches!(err, VisualiserError::RecordingUnavailable(_)));
    }

    #[test]
    fn failed_load_tears_down_previous_track() {
        let mut audio = engine_with_tone(1.0);
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("not-audio.wav");
        std::fs::write(&bogus, b"definitely not a wav file").unwrap();

        let err = audio.load_file(&bogus).unwrap_err();
        assert_eq!(err.classification(), "media load failure");
        assert!(!audio.has_media());
        // the context survives for the next attempt
        assert!(audio.has_context());
    }

    #[test]
    fn decodes_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(i16::MAX / 2).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let track = MediaTrack::from_wav(&path).unwrap();
        assert_eq!(track.samples().len(), 800);
        assert!((track.duration_seconds() - 0.1).abs() < 1e-9);
        assert!((track.samples()[0] - 0.25).abs() < 1e-3);
    }
}
