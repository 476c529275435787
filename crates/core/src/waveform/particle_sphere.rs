use glam::Vec3;

use super::{
    attach_all, common_params, detach_all, geometry::fibonacci_sphere,
    particle_morph::{apply_cloud_material, PARTICLE_COUNT, PARTICLE_SIZE},
    Waveform, WaveformKind,
};
use crate::{
    Mesh, NumericRange, ParamEffect, ParamSpec, Primitive, Scene, SpectrumFrame, SpectrumStats,
    VisualizationConfig,
};

pub const EXPANSION_INTENSITY: &str = "expansionIntensity";
pub const COLOR: &str = "color";

const RADIUS: f32 = 1.2;

fn schema() -> Vec<ParamSpec> {
    let mut specs = vec![
        ParamSpec::numeric(
            PARTICLE_COUNT,
            5000.0,
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
            EXPANSION_INTENSITY,
            1.0,
            NumericRange::new(0.0, 3.0, 0.1),
            ParamEffect::Motion,
        ),
        ParamSpec::color(COLOR, 0x00ffcc, ParamEffect::Colors),
    ];
    specs.extend(common_params());
    specs
}

/// Flat-coloured Fibonacci sphere that breathes outward with the bass.
#[derive(Debug)]
pub struct ParticleSphere {
    config: VisualizationConfig,
    meshes: Vec<Mesh>,
    rest: Vec<Vec3>,
}

impl ParticleSphere {
    pub fn new(scene: &mut Scene) -> Self {
        let mut sphere = Self {
            config: VisualizationConfig::new(schema()),
            meshes: Vec::new(),
            rest: Vec::new(),
        };
        sphere.create(scene);
        sphere
    }

    pub fn rest_pose(&self) -> &[Vec3] {
        &self.rest
    }

    fn create(&mut self, scene: &mut Scene) {
        self.rest = fibonacci_sphere(self.config.count(PARTICLE_COUNT), RADIUS);
        self.meshes = vec![Mesh::new(Primitive::Points, self.rest.clone())];
        attach_all(scene, &self.meshes);

        self.update_config();
        self.update_colors();
    }
}

impl Waveform for ParticleSphere {
    fn kind(&self) -> WaveformKind {
        WaveformKind::ParticleSphere
    }

    fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut VisualizationConfig {
        &mut self.config
    }

    fn update(&mut self, frame: &SpectrumFrame, stats: &SpectrumStats) {
        let intensity = self.config.number(EXPANSION_INTENSITY);
        let bass = stats.bass_average * 0.2;
        let count = self.rest.len();

        let Some(mesh) = self.meshes.first_mut() else {
            return;
        };

        for (index, (position, rest)) in mesh.positions.iter_mut().zip(&self.rest).enumerate() {
            let expansion = frame.amplitude(index, count) * intensity * 0.3 + bass;
            let dist = rest.length();
            *position = if dist > f32::EPSILON {
                *rest * ((dist + expansion) / dist)
            } else {
                *rest
            };
        }
    }

    fn update_config(&mut self) {
        if let Some(mesh) = self.meshes.first_mut() {
            apply_cloud_material(&self.config, mesh);
        }
    }

    fn update_colors(&mut self) {
        let color = self.config.color(COLOR);
        for mesh in &mut self.meshes {
            mesh.material.color = color;
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
    }
}
