//! Audio-reactive geometry variants.
//!
//! Every variant owns its meshes and a [`VisualizationConfig`], builds its
//! geometry exactly once in its constructor and deforms it once per
//! spectrum frame. The engine picks a variant through [`WaveformKind`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Mesh, NumericRange, ParamEffect, ParamSpec, Scene, SpectrumFrame, SpectrumStats,
    VisualiserError, VisualizationConfig,
};

mod bars;
pub mod geometry;
mod multi_wave;
mod particle_morph;
mod particle_ring;
mod particle_sphere;
mod pulse_circle;

pub use bars::Bars;
pub use multi_wave::MultiWave;
pub use particle_morph::ParticleMorph;
pub use particle_ring::ParticleRing;
pub use particle_sphere::ParticleSphere;
pub use pulse_circle::PulseCircle;

pub const SCALE: &str = "scale";
pub const OPACITY: &str = "opacity";
pub const BACKGROUND_COLOR: &str = "backgroundColor";
pub const USE_CUSTOM_COLORS: &str = "useCustomColors";
pub const COLOR_1: &str = "color1";
pub const COLOR_2: &str = "color2";

/// Capability set shared by all variants.
pub trait Waveform {
    fn kind(&self) -> WaveformKind;

    fn config(&self) -> &VisualizationConfig;

    fn config_mut(&mut self) -> &mut VisualizationConfig;

    /// Deforms the geometry for one spectrum frame.
    fn update(&mut self, frame: &SpectrumFrame, stats: &SpectrumStats);

    /// Re-applies scale, opacity and point size without touching geometry.
    fn update_config(&mut self);

    /// Recomputes colour buffers only.
    fn update_colors(&mut self);

    /// Throws the geometry away and builds it again from the current
    /// configuration. Used when a count-like parameter changes.
    fn rebuild(&mut self, scene: &mut Scene);

    fn meshes(&self) -> &[Mesh];

    /// Detaches every mesh from the scene and releases the buffers.
    fn dispose(&mut self, scene: &mut Scene);
}

/// Type tag used to select a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformKind {
    ParticleMorph,
    ParticleRing,
    MultiWave,
    Bars,
    ParticleSphere,
    PulseCircle,
}

impl WaveformKind {
    pub const ALL: [Self; 6] = [
        Self::ParticleMorph,
        Self::ParticleRing,
        Self::MultiWave,
        Self::Bars,
        Self::ParticleSphere,
        Self::PulseCircle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ParticleMorph => "particlemorph",
            Self::ParticleRing => "particlering",
            Self::MultiWave => "multiwave",
            Self::Bars => "bars",
            Self::ParticleSphere => "particlesphere",
            Self::PulseCircle => "pulsecircle",
        }
    }

    /// Builds the variant with its default configuration and attaches its
    /// meshes to `scene`.
    pub fn create(self, scene: &mut Scene) -> Box<dyn Waveform> {
        match self {
            Self::ParticleMorph => Box::new(ParticleMorph::new(scene)),
            Self::ParticleRing => Box::new(ParticleRing::new(scene)),
            Self::MultiWave => Box::new(MultiWave::new(scene)),
            Self::Bars => Box::new(Bars::new(scene)),
            Self::ParticleSphere => Box::new(ParticleSphere::new(scene)),
            Self::PulseCircle => Box::new(PulseCircle::new(scene)),
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveformKind {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| VisualiserError::msg(format!("unknown waveform `{s}`")))
    }
}

/// Parameters every variant exposes.
fn common_params() -> [ParamSpec; 3] {
    [
        ParamSpec::numeric(
            SCALE,
            1.0,
            NumericRange::new(0.1, 3.0, 0.1),
            ParamEffect::Material,
        ),
        ParamSpec::numeric(
            OPACITY,
            0.8,
            NumericRange::new(0.0, 1.0, 0.1),
            ParamEffect::Material,
        ),
        ParamSpec::color(BACKGROUND_COLOR, 0x000000, ParamEffect::Background),
    ]
}

/// The custom two-colour gradient toggle and its colours.
fn gradient_params() -> [ParamSpec; 3] {
    [
        ParamSpec::toggle(USE_CUSTOM_COLORS, false, ParamEffect::Colors),
        ParamSpec::color(COLOR_1, 0xff0066, ParamEffect::Colors),
        ParamSpec::color(COLOR_2, 0x00ccff, ParamEffect::Colors),
    ]
}

fn attach_all(scene: &mut Scene, meshes: &[Mesh]) {
    for mesh in meshes {
        scene.attach(mesh);
    }
}

fn detach_all(scene: &mut Scene, meshes: &mut Vec<Mesh>) {
    for mut mesh in meshes.drain(..) {
        scene.detach(&mesh);
        mesh.clear();
    }
}
