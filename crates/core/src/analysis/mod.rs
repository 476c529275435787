use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AudioConfig, Result, VisualiserError};

/// Share of the lowest bins treated as the bass band.
const BASS_BAND_FRACTION: f32 = 0.2;

/// One snapshot of per-bin magnitudes in `0..=255`.
///
/// Frames are immutable once produced and cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct SpectrumFrame {
    bins: Arc<[u8]>,
}

impl SpectrumFrame {
    pub fn new(bins: impl Into<Arc<[u8]>>) -> Self {
        Self { bins: bins.into() }
    }

    /// A frame of `len` zero bins.
    pub fn silent(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Bin that element `index` of `count` evenly spread elements reads from:
    /// `floor(index / count * len)`.
    pub fn bin_index(&self, index: usize, count: usize) -> usize {
        if count == 0 || self.bins.is_empty() {
            return 0;
        }
        let bin = (index as f64 / count as f64 * self.bins.len() as f64).floor() as usize;
        bin.min(self.bins.len() - 1)
    }

    /// Normalized amplitude in `[0, 1]` for element `index` of `count`.
    pub fn amplitude(&self, index: usize, count: usize) -> f32 {
        match self.bins.get(self.bin_index(index, count)) {
            Some(&value) => value as f32 / 255.0,
            None => 0.0,
        }
    }

    /// Full-band and bass-band averages, both normalized to `[0, 1]`.
    pub fn stats(&self) -> SpectrumStats {
        if self.bins.is_empty() {
            return SpectrumStats::default();
        }

        let bass_len = ((self.bins.len() as f32 * BASS_BAND_FRACTION) as usize).max(1);
        SpectrumStats {
            average: mean(&self.bins),
            bass_average: mean(&self.bins[..bass_len]),
        }
    }
}

fn mean(bins: &[u8]) -> f32 {
    let sum: u32 = bins.iter().map(|&value| value as u32).sum();
    sum as f32 / bins.len() as f32 / 255.0
}

impl fmt::Debug for SpectrumFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumFrame")
            .field("bins", &self.bins.len())
            .finish()
    }
}

/// Aggregates derived once per tick and offered to every waveform.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectrumStats {
    pub average: f32,
    pub bass_average: f32,
}

/// Anything that can hand out the most recent spectrum frame.
pub trait SpectrumSource {
    /// Returns the latest available frame; never blocks.
    fn latest_frame(&self) -> Result<SpectrumFrame>;
}

/// Streaming magnitude analyser.
///
/// Keeps the most recent `fft_size` samples, and on each [`frame`] call
/// applies a Blackman window, smooths magnitudes against the previous call,
/// converts them to decibels and maps the configured decibel window onto
/// `0..=255`.
///
/// [`frame`]: SpectrumAnalyser::frame
pub struct SpectrumAnalyser {
    config: AudioConfig,
    history: Vec<f32>,
    write_pos: usize,
    smoothed: Vec<f32>,
    window: Vec<f32>,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(config: AudioConfig) -> Result<Self> {
        if config.fft_size < 32 || !config.fft_size.is_power_of_two() {
            return Err(VisualiserError::InvalidInput(
                "fft size must be a power of two of at least 32",
            ));
        }
        if !(0.0..1.0).contains(&config.smoothing) {
            return Err(VisualiserError::InvalidInput("smoothing must lie in [0, 1)"));
        }
        if config.max_decibels <= config.min_decibels {
            return Err(VisualiserError::InvalidInput("decibel window must have max above min"));
        }

        let size = config.fft_size;
        Ok(Self {
            history: vec![0.0; size],
            write_pos: 0,
            smoothed: vec![0.0; config.bin_count()],
            window: (0..size).map(|index| blackman_value(index, size)).collect(),
            fft: FftResources::new(size),
            config,
        })
    }

    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }

    /// Appends samples to the analysis window, keeping only the newest
    /// `fft_size` of them.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let size = self.history.len();
        let samples = if samples.len() > size {
            &samples[samples.len() - size..]
        } else {
            samples
        };

        for &sample in samples {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    /// Clears both the sample history and the smoothing state.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }

    /// Analyses the current window and returns a byte spectrum.
    pub fn frame(&mut self) -> Result<SpectrumFrame> {
        let size = self.history.len();
        // oldest sample first
        for index in 0..size {
            let sample = self.history[(self.write_pos + index) % size];
            self.fft.input[index] = sample * self.window[index];
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let tau = self.config.smoothing;
        let min_db = self.config.min_decibels;
        let range_db = self.config.max_decibels - min_db;
        let mut bins = Vec::with_capacity(self.smoothed.len());

        for (smoothed, bin) in self.smoothed.iter_mut().zip(self.fft.spectrum.iter()) {
            let magnitude = bin.norm() / size as f32;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;

            let byte = if *smoothed <= f32::MIN_POSITIVE {
                0
            } else {
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - min_db) / range_db).clamp(0.0, 255.0) as u8
            };
            bins.push(byte);
        }

        Ok(SpectrumFrame::new(bins))
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn new(size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        Self {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.config.fft_size)
            .field("smoothing", &self.config.smoothing)
            .field("bins", &self.smoothed.len())
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;

    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser() -> SpectrumAnalyser {
        SpectrumAnalyser::new(AudioConfig::default()).unwrap()
    }

    fn sine(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| amplitude * (2.0 * PI * frequency * n as f32 / 48_000.0).sin())
            .collect()
    }

    #[test]
    fn silence_yields_zero_bins() {
        let mut analyser = analyser();
        analyser.push_samples(&[0.0; 512]);
        let frame = analyser.frame().unwrap();

        assert_eq!(frame.len(), 256);
        assert!(frame.bins().iter().all(|&bin| bin == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(AudioConfig {
            smoothing: 0.0,
            ..AudioConfig::default()
        })
        .unwrap();
        // 48 kHz / 512 = 93.75 Hz per bin; bin 20 sits at 1875 Hz. A quiet
        // tone keeps the main lobe below the top of the decibel window.
        analyser.push_samples(&sine(1875.0, 0.001, 2048));
        let frame = analyser.frame().unwrap();

        let peak = frame
            .bins()
            .iter()
            .enumerate()
            .max_by_key(|(_, value)| **value)
            .map(|(index, _)| index)
            .unwrap();
        assert_eq!(peak, 20);
        assert!(frame.bins()[20] > 60);
    }

    #[test]
    fn smoothing_decays_towards_silence() {
        let mut analyser = analyser();
        analyser.push_samples(&sine(1875.0, 0.001, 512));
        let loud = analyser.frame().unwrap().bins()[20];

        analyser.push_samples(&[0.0; 512]);
        let decayed = analyser.frame().unwrap().bins()[20];

        assert!(loud > 0);
        assert!(decayed < loud);
    }

    #[test]
    fn rejects_bad_configuration() {
        let config = AudioConfig {
            fft_size: 300,
            ..AudioConfig::default()
        };
        assert!(SpectrumAnalyser::new(config).is_err());
    }

    #[test]
    fn stats_cover_full_and_bass_bands() {
        let mut bins = vec![0u8; 10];
        bins[0] = 255;
        bins[1] = 255;
        let stats = SpectrumFrame::new(bins).stats();

        assert!((stats.bass_average - 1.0).abs() < 1e-6);
        assert!((stats.average - 0.2).abs() < 1e-6);
        assert_eq!(SpectrumFrame::silent(0).stats(), SpectrumStats::default());
    }

    #[test]
    fn amplitude_maps_elements_onto_bins() {
        let frame = SpectrumFrame::new((0..=255u8).collect::<Vec<_>>());
        assert_eq!(frame.bin_index(0, 8000), 0);
        assert_eq!(frame.bin_index(7999, 8000), 255);
        assert_eq!(frame.bin_index(4000, 8000), 128);
        assert!((frame.amplitude(7999, 8000) - 1.0).abs() < 1e-6);
    }
}
