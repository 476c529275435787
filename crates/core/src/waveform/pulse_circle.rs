use std::f32::consts::TAU;

use glam::Vec3;

use super::{attach_all, common_params, detach_all, Waveform, WaveformKind, OPACITY, SCALE};
use crate::{
    Mesh, NumericRange, ParamEffect, ParamSpec, Primitive, Scene, SpectrumFrame, SpectrumStats,
    VisualizationConfig,
};

pub const RADIUS: &str = "radius";
pub const PULSE_INTENSITY: &str = "pulseIntensity";
pub const COLOR: &str = "color";

const RIM_SEGMENTS: usize = 64;

fn schema() -> Vec<ParamSpec> {
    let mut specs = vec![
        ParamSpec::numeric(
            RADIUS,
            1.0,
            NumericRange::new(0.2, 3.0, 0.1),
            ParamEffect::Structure,
        ),
        ParamSpec::numeric(
            PULSE_INTENSITY,
            1.0,
            NumericRange::new(0.0, 3.0, 0.1),
            ParamEffect::Motion,
        ),
        ParamSpec::color(COLOR, 0xff3366, ParamEffect::Colors),
    ];
    specs.extend(common_params());
    specs
}

/// Single flat disc facing the camera, pulsing with the bass band.
#[derive(Debug)]
pub struct PulseCircle {
    config: VisualizationConfig,
    meshes: Vec<Mesh>,
    pulse: f32,
}

impl PulseCircle {
    pub fn new(scene: &mut Scene) -> Self {
        let mut circle = Self {
            config: VisualizationConfig::new(schema()),
            meshes: Vec::new(),
            pulse: 1.0,
        };
        circle.create(scene);
        circle
    }

    /// Scale factor applied on top of the object scale by the last update.
    pub fn pulse(&self) -> f32 {
        self.pulse
    }

    fn create(&mut self, scene: &mut Scene) {
        let radius = self.config.number(RADIUS);
        let mut positions = Vec::with_capacity(RIM_SEGMENTS + 1);
        positions.push(Vec3::ZERO);
        positions.extend((0..RIM_SEGMENTS).map(|segment| {
            let angle = segment as f32 / RIM_SEGMENTS as f32 * TAU;
            Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
        }));

        self.meshes = vec![Mesh::new(Primitive::Disc, positions)];
        attach_all(scene, &self.meshes);

        self.update_config();
        self.update_colors();
    }

    fn apply_scale(&mut self) {
        let scale = self.config.number(SCALE);
        let planar = scale * self.pulse;
        for mesh in &mut self.meshes {
            mesh.transform.scale = Vec3::new(planar, planar, scale);
        }
    }
}

impl Waveform for PulseCircle {
    fn kind(&self) -> WaveformKind {
        WaveformKind::PulseCircle
    }

    fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut VisualizationConfig {
        &mut self.config
    }

    fn update(&mut self, _frame: &SpectrumFrame, stats: &SpectrumStats) {
        self.pulse = 1.0 + stats.bass_average * self.config.number(PULSE_INTENSITY) * 0.5;
        self.apply_scale();
    }

    fn update_config(&mut self) {
        let opacity = self.config.number(OPACITY);
        for mesh in &mut self.meshes {
            mesh.material.opacity = opacity;
        }
        self.apply_scale();
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
    }
}
