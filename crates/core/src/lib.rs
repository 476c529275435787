//! Core library for the Waveform Visualiser.
//!
//! Each module owns one subsystem: spectrum analysis, audio playback,
//! parameter configuration, the draw registry and headless renderer, the
//! audio-reactive waveform variants, the engine that hosts the active
//! variant, capture/recording and playback transport. [`Studio`] wires them
//! into the cooperative tick loop used by the command line app.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod render;
pub mod scene;
pub mod studio;
pub mod timeline;
pub mod waveform;

pub use analysis::{SpectrumAnalyser, SpectrumFrame, SpectrumSource, SpectrumStats};
pub use audio::{AudioEngine, AudioTap, MediaTrack, SpectrumHandle};
pub use config::{
    AppConfig, AudioConfig, Color, NumericRange, ParamDescriptor, ParamEffect, ParamSpec,
    ParamValue, RenderConfig, VisualizationConfig,
};
pub use engine::VisualizationEngine;
pub use error::{Result, VisualiserError};
pub use record::{
    DirectorySink, EncodingProfile, FileSink, Recorder, RecordingBlob, RecordingSettings,
    RecordingState,
};
pub use render::{Renderer, SoftwareRenderer, VideoFrame, VideoStream};
pub use scene::{Mesh, MeshId, Primitive, Scene};
pub use studio::Studio;
pub use timeline::{PlaybackController, PlaybackEvent, PlaybackState, Scheduler};
pub use waveform::{Waveform, WaveformKind};
