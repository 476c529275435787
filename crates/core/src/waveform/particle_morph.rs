use glam::Vec3;

use super::{
    attach_all, common_params, detach_all,
    geometry::{cycle_color, fibonacci_sphere, gradient_color},
    gradient_params, Waveform, WaveformKind, COLOR_1, COLOR_2, OPACITY, SCALE, USE_CUSTOM_COLORS,
};
use crate::{
    Color, Mesh, NumericRange, ParamEffect, ParamSpec, Primitive, Scene, SpectrumFrame,
    SpectrumStats, VisualizationConfig,
};

pub const PARTICLE_COUNT: &str = "particleCount";
pub const PARTICLE_SIZE: &str = "particleSize";
pub const MORPH_SPEED: &str = "morphSpeed";
pub const WAVE_INTENSITY: &str = "waveIntensity";
pub const COLOR_CYCLE: &str = "colorCycle";

const RADIUS: f32 = 1.2;

/// Shared by the two particle-cloud variants that morph around a rest pose.
pub(super) fn particle_cloud_params(default_count: f32) -> Vec<ParamSpec> {
    let mut specs = vec![
        ParamSpec::numeric(
            PARTICLE_COUNT,
            default_count,
            NumericRange::new(1000.0, 20000.0, 100.0),
            ParamEffect::Structure,
        ),
        ParamSpec::numeric(
            PARTICLE_SIZE,
            0.02,
            NumericRange::new(0.005, 0.1, 0.005),
            ParamEffect::Material,
        ),
        ParamSpec::numeric(
            MORPH_SPEED,
            1.0,
            NumericRange::new(0.0, 5.0, 0.1),
            ParamEffect::Motion,
        ),
        ParamSpec::numeric(
            WAVE_INTENSITY,
            1.0,
            NumericRange::new(0.0, 3.0, 0.1),
            ParamEffect::Motion,
        ),
        ParamSpec::numeric(
            COLOR_CYCLE,
            1.0,
            NumericRange::new(0.0, 5.0, 0.1),
            ParamEffect::Motion,
        ),
    ];
    specs.extend(gradient_params());
    specs.extend(common_params());
    specs
}

/// Writes per-point colours for a particle cloud.
pub(super) fn paint_cloud(
    config: &VisualizationConfig,
    colors: &mut [Color],
    amplitudes: &[f32],
    time: f32,
) {
    let count = colors.len();
    let custom = config.flag(USE_CUSTOM_COLORS);
    let (from, to) = (config.color(COLOR_1), config.color(COLOR_2));
    let cycle = config.number(COLOR_CYCLE);

    for (index, (color, &amplitude)) in colors.iter_mut().zip(amplitudes).enumerate() {
        *color = if custom {
            gradient_color(from, to, index as f32 / count as f32, amplitude)
        } else {
            cycle_color(index, count, time, cycle, amplitude)
        };
    }
}

/// Applies scale, opacity and scale-derived point size to a cloud mesh.
pub(super) fn apply_cloud_material(config: &VisualizationConfig, mesh: &mut Mesh) {
    let scale = config.number(SCALE);
    mesh.transform.scale = Vec3::splat(scale);
    mesh.material.opacity = config.number(OPACITY);
    mesh.material.size = config.number(PARTICLE_SIZE) * scale;
}

/// Fibonacci-sphere point cloud whose radius ripples with the spectrum.
#[derive(Debug)]
pub struct ParticleMorph {
    config: VisualizationConfig,
    meshes: Vec<Mesh>,
    rest: Vec<Vec3>,
    amplitudes: Vec<f32>,
    time: f32,
}

impl ParticleMorph {
    pub fn new(scene: &mut Scene) -> Self {
        let mut morph = Self {
            config: VisualizationConfig::new(particle_cloud_params(8000.0)),
            meshes: Vec::new(),
            rest: Vec::new(),
            amplitudes: Vec::new(),
            time: 0.0,
        };
        morph.create(scene);
        morph
    }

    /// Undeformed positions captured when the geometry was built.
    pub fn rest_pose(&self) -> &[Vec3] {
        &self.rest
    }

    fn create(&mut self, scene: &mut Scene) {
        let count = self.config.count(PARTICLE_COUNT);
        self.rest = fibonacci_sphere(count, RADIUS);
        self.amplitudes = vec![0.0; count];
        self.meshes = vec![Mesh::new(Primitive::Points, self.rest.clone()).with_vertex_colors()];
        attach_all(scene, &self.meshes);

        self.update_config();
        self.update_colors();
    }
}

impl Waveform for ParticleMorph {
    fn kind(&self) -> WaveformKind {
        WaveformKind::ParticleMorph
    }

    fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut VisualizationConfig {
        &mut self.config
    }

    fn update(&mut self, frame: &SpectrumFrame, _stats: &SpectrumStats) {
        self.time += 0.01 * self.config.number(MORPH_SPEED);
        let t = self.time;
        let intensity = self.config.number(WAVE_INTENSITY);
        let count = self.rest.len();

        let Some(mesh) = self.meshes.first_mut() else {
            return;
        };

        for (index, (position, rest)) in mesh.positions.iter_mut().zip(&self.rest).enumerate() {
            let amplitude = frame.amplitude(index, count);
            self.amplitudes[index] = amplitude;

            let angle = rest.y.atan2(rest.x);
            let wave1 = (3.0 * angle + 2.0 * t).sin() * amplitude * intensity;
            let wave2 = (5.0 * angle - 1.5 * t).cos() * amplitude * intensity;
            let deformation = 0.3 * (wave1 + wave2);

            let dist = rest.length();
            *position = if dist > f32::EPSILON {
                *rest * ((dist + deformation) / dist)
            } else {
                *rest
            };
        }

        self.update_colors();
    }

    fn update_config(&mut self) {
        if let Some(mesh) = self.meshes.first_mut() {
            apply_cloud_material(&self.config, mesh);
        }
    }

    fn update_colors(&mut self) {
        let cloud = self.meshes.first_mut();
        if let Some(colors) = cloud.and_then(|mesh| mesh.colors.as_mut()) {
            paint_cloud(&self.config, colors, &self.amplitudes, self.time);
        }
    }

    fn rebuild(&mut self, scene: &mut Scene) {
        self.dispose(scene);
        self.create(scene);
    }

    fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    fn dispose(&mut self, scene: &mut Scene) {
        detach_all(scene, &mut self.meshes);
        self.rest = Vec::new();
        self.amplitudes = Vec::new();
    }
}
