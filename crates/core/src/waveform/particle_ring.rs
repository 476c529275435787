use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use super::{
    attach_all, detach_all,
    geometry::torus_point,
    particle_morph::{
        apply_cloud_material, paint_cloud, particle_cloud_params, MORPH_SPEED, PARTICLE_COUNT,
        WAVE_INTENSITY,
    },
    Waveform, WaveformKind,
};
use crate::{Mesh, Primitive, Scene, SpectrumFrame, SpectrumStats, VisualizationConfig};

const RING_RADIUS: f32 = 1.2;
const TUBE_RADIUS: f32 = 0.3;

/// Point cloud sampled on a torus; rings expand in the XZ plane, bob
/// vertically and the whole cloud slowly spins.
#[derive(Debug)]
pub struct ParticleRing {
    config: VisualizationConfig,
    meshes: Vec<Mesh>,
    rest: Vec<Vec3>,
    amplitudes: Vec<f32>,
    time: f32,
}

impl ParticleRing {
    pub fn new(scene: &mut Scene) -> Self {
        let mut ring = Self {
            config: VisualizationConfig::new(particle_cloud_params(6000.0)),
            meshes: Vec::new(),
            rest: Vec::new(),
            amplitudes: Vec::new(),
            time: 0.0,
        };
        ring.create(scene);
        ring
    }

    pub fn rest_pose(&self) -> &[Vec3] {
        &self.rest
    }

    fn create(&mut self, scene: &mut Scene) {
        let count = self.config.count(PARTICLE_COUNT);
        let mut rng = rand::rng();
        self.rest = (0..count)
            .map(|index| {
                let phi = index as f32 / count as f32 * TAU;
                let theta = rng.random_range(0.0..TAU);
                torus_point(phi, theta, RING_RADIUS, TUBE_RADIUS)
            })
            .collect();
        self.amplitudes = vec![0.0; count];
        self.meshes = vec![Mesh::new(Primitive::Points, self.rest.clone()).with_vertex_colors()];
        attach_all(scene, &self.meshes);

        self.update_config();
        self.update_colors();
    }
}

impl Waveform for ParticleRing {
    fn kind(&self) -> WaveformKind {
        WaveformKind::ParticleRing
    }

    fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut VisualizationConfig {
        &mut self.config
    }

    fn update(&mut self, frame: &SpectrumFrame, _stats: &SpectrumStats) {
        let speed = self.config.number(MORPH_SPEED);
        self.time += 0.01 * speed;
        let t = self.time;
        let intensity = self.config.number(WAVE_INTENSITY);
        let count = self.rest.len();

        let Some(mesh) = self.meshes.first_mut() else {
            return;
        };

        for (index, (position, rest)) in mesh.positions.iter_mut().zip(&self.rest).enumerate() {
            let amplitude = frame.amplitude(index, count);
            self.amplitudes[index] = amplitude;

            let angle = rest.z.atan2(rest.x);
            let wave1 = (5.0 * angle + 2.0 * t).sin() * amplitude * intensity;
            let wave2 = 0.5 * (8.0 * angle - 1.5 * t).cos() * amplitude * intensity;
            let expansion = 0.2 * (wave1 + wave2);

            let planar = (rest.x * rest.x + rest.z * rest.z).sqrt();
            let factor = if planar > f32::EPSILON {
                (planar + expansion) / planar
            } else {
                1.0
            };
            let bob = (t + 0.1 * index as f32).sin() * amplitude * 0.3;

            *position = Vec3::new(rest.x * factor, rest.y + bob, rest.z * factor);
        }

        mesh.transform.rotation_y = (mesh.transform.rotation_y + 0.002 * speed) % TAU;

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
