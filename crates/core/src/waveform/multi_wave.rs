use glam::Vec3;

use super::{
    attach_all, common_params, detach_all, geometry::gradient_color, gradient_params, Waveform,
    WaveformKind, COLOR_1, COLOR_2, OPACITY, SCALE, USE_CUSTOM_COLORS,
};
use crate::{
    Color, Mesh, NumericRange, ParamEffect, ParamSpec, Primitive, Scene, SpectrumFrame,
    SpectrumStats, VisualizationConfig,
};

pub const WAVE_COUNT: &str = "waveCount";
pub const WAVE_SPACING: &str = "waveSpacing";
pub const SPEED: &str = "speed";
pub const WAVE_INTENSITY: &str = "waveIntensity";

/// Samples per line.
const SEGMENTS: usize = 128;
/// Lines span `[-HALF_WIDTH, HALF_WIDTH]` horizontally.
const HALF_WIDTH: f32 = 2.0;

fn schema() -> Vec<ParamSpec> {
    let mut specs = vec![
        ParamSpec::numeric(
            WAVE_COUNT,
            12.0,
            NumericRange::new(1.0, 30.0, 1.0),
            ParamEffect::Structure,
        ),
        ParamSpec::numeric(
            WAVE_SPACING,
            0.3,
            NumericRange::new(0.05, 1.0, 0.05),
            ParamEffect::Structure,
        ),
        ParamSpec::numeric(
            SPEED,
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
    ];
    specs.extend(gradient_params());
    specs.extend(common_params());
    specs
}

/// Stack of horizontal line traces, each a sum of three travelling sines
/// modulated by the spectrum.
#[derive(Debug)]
pub struct MultiWave {
    config: VisualizationConfig,
    meshes: Vec<Mesh>,
    baselines: Vec<f32>,
    time: f32,
}

impl MultiWave {
    pub fn new(scene: &mut Scene) -> Self {
        let mut wave = Self {
            config: VisualizationConfig::new(schema()),
            meshes: Vec::new(),
            baselines: Vec::new(),
            time: 0.0,
        };
        wave.create(scene);
        wave
    }

    /// Vertical rest offset of each line.
    pub fn baselines(&self) -> &[f32] {
        &self.baselines
    }

    fn create(&mut self, scene: &mut Scene) {
        let count = self.config.count(WAVE_COUNT).max(1);
        let spacing = self.config.number(WAVE_SPACING);

        self.baselines = (0..count)
            .map(|index| (index as f32 - count as f32 / 2.0) * spacing)
            .collect();
        self.meshes = self
            .baselines
            .iter()
            .map(|&base_y| {
                let positions = (0..SEGMENTS)
                    .map(|sample| Vec3::new(sample_x(sample), base_y, 0.0))
                    .collect();
                Mesh::new(Primitive::LineStrip, positions)
            })
            .collect();
        attach_all(scene, &self.meshes);

        self.update_config();
        self.update_colors();
    }
}

fn sample_x(sample: usize) -> f32 {
    sample as f32 / (SEGMENTS - 1) as f32 * (2.0 * HALF_WIDTH) - HALF_WIDTH
}

impl Waveform for MultiWave {
    fn kind(&self) -> WaveformKind {
        WaveformKind::MultiWave
    }

    fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut VisualizationConfig {
        &mut self.config
    }

    fn update(&mut self, frame: &SpectrumFrame, _stats: &SpectrumStats) {
        self.time += 0.02 * self.config.number(SPEED);
        let t = self.time;
        let gain = 0.3 * self.config.number(WAVE_INTENSITY);

        for (line, (mesh, &base_y)) in self.meshes.iter_mut().zip(&self.baselines).enumerate() {
            let offset = line as f32;
            for (sample, position) in mesh.positions.iter_mut().enumerate() {
                let x = sample_x(sample);
                let amplitude = frame.amplitude(sample, SEGMENTS);

                let wave = (2.0 * x + t + 0.5 * offset).sin() * amplitude
                    + 0.5 * (3.0 * x - 0.7 * t + 0.3 * offset).sin() * amplitude
                    + 0.3 * (5.0 * x + 1.3 * t + 0.2 * offset).sin() * amplitude;

                *position = Vec3::new(x, base_y + gain * wave, 0.0);
            }
        }
    }

    fn update_config(&mut self) {
        let scale = Vec3::splat(self.config.number(SCALE));
        let opacity = self.config.number(OPACITY);
        for mesh in &mut self.meshes {
            mesh.transform.scale = scale;
            mesh.material.opacity = opacity;
        }
    }

    fn update_colors(&mut self) {
        let count = self.meshes.len();
        let custom = self.config.flag(USE_CUSTOM_COLORS);
        let (from, to) = (self.config.color(COLOR_1), self.config.color(COLOR_2));

        for (line, mesh) in self.meshes.iter_mut().enumerate() {
            mesh.material.color = if custom {
                let fraction = line as f32 / (count.max(2) - 1) as f32;
                gradient_color(from, to, fraction, 0.0)
            } else {
                Color::from_hsl(line as f32 / count as f32, 1.0, 0.5)
            };
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
        self.baselines = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamValue;

    #[test]
    fn lines_are_stacked_around_the_origin() {
        let mut scene = Scene::new();
        let wave = MultiWave::new(&mut scene);

        assert_eq!(wave.meshes().len(), 12);
        assert!((wave.baselines()[0] + 1.8).abs() < 1e-6);
        assert!((wave.baselines()[11] - 1.5).abs() < 1e-6);

        let line = &wave.meshes()[0].positions;
        assert_eq!(line.len(), SEGMENTS);
        assert!((line[0].x + 2.0).abs() < 1e-6);
        assert!((line[SEGMENTS - 1].x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn silence_keeps_lines_flat() {
        let mut scene = Scene::new();
        let mut wave = MultiWave::new(&mut scene);
        let silent = SpectrumFrame::silent(256);
        wave.update(&silent, &silent.stats());

        for (mesh, base_y) in wave.meshes().iter().zip(wave.baselines()) {
            assert!(mesh.positions.iter().all(|p| p.y == *base_y));
        }
    }

    #[test]
    fn displacement_is_bounded_by_intensity() {
        let mut scene = Scene::new();
        let mut wave = MultiWave::new(&mut scene);
        let loud = SpectrumFrame::new(vec![255u8; 256]);
        wave.update(&loud, &loud.stats());

        let mut moved = false;
        for (mesh, base_y) in wave.meshes().iter().zip(wave.baselines()) {
            for position in &mesh.positions {
                let offset = (position.y - base_y).abs();
                assert!(offset <= 0.3 * 1.8 + 1e-5);
                moved |= offset > 0.0;
            }
        }
        assert!(moved);
    }

    #[test]
    fn wave_count_change_recreates_lines() {
        let mut scene = Scene::new();
        let mut wave = MultiWave::new(&mut scene);

        wave.config_mut()
            .set(WAVE_COUNT, ParamValue::Numeric(5.0))
            .unwrap();
        wave.rebuild(&mut scene);

        assert_eq!(wave.meshes().len(), 5);
        assert_eq!(scene.attached_count(), 5);
    }

    #[test]
    fn lines_get_distinct_hues() {
        let mut scene = Scene::new();
        let wave = MultiWave::new(&mut scene);
        assert_ne!(
            wave.meshes()[0].material.color,
            wave.meshes()[6].material.color
        );
    }
}
