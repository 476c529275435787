use glam::Vec3;

use super::{
    attach_all, common_params, detach_all, geometry::gradient_color, gradient_params, Waveform,
    WaveformKind, COLOR_1, COLOR_2, OPACITY, SCALE, USE_CUSTOM_COLORS,
};
use crate::{
    Color, Mesh, NumericRange, ParamEffect, ParamSpec, Primitive, Scene, SpectrumFrame,
    SpectrumStats, VisualizationConfig,
};

pub const BAR_COUNT: &str = "barCount";
pub const BAR_WIDTH: &str = "barWidth";
pub const BAR_SPACING: &str = "barSpacing";
pub const BAR_INTENSITY: &str = "barIntensity";

/// Height of a bar at zero amplitude.
pub const BASE_HEIGHT: f32 = 0.1;

fn schema() -> Vec<ParamSpec> {
    let mut specs = vec![
        ParamSpec::numeric(
            BAR_COUNT,
            64.0,
            NumericRange::new(8.0, 256.0, 8.0),
            ParamEffect::Structure,
        ),
        ParamSpec::numeric(
            BAR_WIDTH,
            0.05,
            NumericRange::new(0.01, 0.2, 0.01),
            ParamEffect::Material,
        ),
        ParamSpec::numeric(
            BAR_SPACING,
            0.06,
            NumericRange::new(0.02, 0.3, 0.01),
            ParamEffect::Structure,
        ),
        ParamSpec::numeric(
            BAR_INTENSITY,
            1.0,
            NumericRange::new(0.0, 3.0, 0.1),
            ParamEffect::Motion,
        ),
    ];
    specs.extend(gradient_params());
    specs.extend(common_params());
    specs
}

/// Height of a bar for a normalized amplitude.
pub fn bar_height(amplitude: f32, intensity: f32) -> f32 {
    BASE_HEIGHT + amplitude * intensity * 2.0
}

/// Row of boxes on the X axis whose heights follow the spectrum.
///
/// Geometry is never deformed; each frame only rescales and repositions
/// the boxes so they stand on `y = 0`.
#[derive(Debug)]
pub struct Bars {
    config: VisualizationConfig,
    meshes: Vec<Mesh>,
    columns: Vec<f32>,
    heights: Vec<f32>,
}

impl Bars {
    pub fn new(scene: &mut Scene) -> Self {
        let mut bars = Self {
            config: VisualizationConfig::new(schema()),
            meshes: Vec::new(),
            columns: Vec::new(),
            heights: Vec::new(),
        };
        bars.create(scene);
        bars
    }

    /// Current unscaled bar heights.
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    fn create(&mut self, scene: &mut Scene) {
        let count = self.config.count(BAR_COUNT).max(1);
        let spacing = self.config.number(BAR_SPACING);
        let centre = (count - 1) as f32 / 2.0;

        self.columns = (0..count)
            .map(|index| (index as f32 - centre) * spacing)
            .collect();
        self.heights = vec![BASE_HEIGHT; count];
        self.meshes = (0..count).map(|_| Mesh::new(Primitive::Box, unit_box())).collect();
        attach_all(scene, &self.meshes);

        self.update_config();
        self.update_colors();
    }

    fn place(&mut self) {
        let scale = self.config.number(SCALE);
        let width = self.config.number(BAR_WIDTH) * scale;

        let columns = self.columns.iter().zip(&self.heights);
        for (mesh, (&column, &height)) in self.meshes.iter_mut().zip(columns) {
            let scaled = height * scale;
            mesh.transform.scale = Vec3::new(width, scaled, width);
            mesh.transform.translation = Vec3::new(column * scale, scaled / 2.0, 0.0);
        }
    }
}

fn unit_box() -> Vec<Vec3> {
    let mut corners = Vec::with_capacity(8);
    for x in [-0.5, 0.5] {
        for y in [-0.5, 0.5] {
            for z in [-0.5, 0.5] {
                corners.push(Vec3::new(x, y, z));
            }
        }
    }
    corners
}

impl Waveform for Bars {
    fn kind(&self) -> WaveformKind {
        WaveformKind::Bars
    }

    fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut VisualizationConfig {
        &mut self.config
    }

    fn update(&mut self, frame: &SpectrumFrame, _stats: &SpectrumStats) {
        let intensity = self.config.number(BAR_INTENSITY);
        let count = self.heights.len();
        for (index, height) in self.heights.iter_mut().enumerate() {
            *height = bar_height(frame.amplitude(index, count), intensity);
        }
        self.place();
    }

    fn update_config(&mut self) {
        let opacity = self.config.number(OPACITY);
        for mesh in &mut self.meshes {
            mesh.material.opacity = opacity;
        }
        self.place();
    }

    fn update_colors(&mut self) {
        let count = self.meshes.len();
        let custom = self.config.flag(USE_CUSTOM_COLORS);
        let (from, to) = (self.config.color(COLOR_1), self.config.color(COLOR_2));

        for (index, mesh) in self.meshes.iter_mut().enumerate() {
            mesh.material.color = if custom {
                gradient_color(from, to, index as f32 / (count.max(2) - 1) as f32, 0.0)
            } else {
                Color::from_hsl(index as f32 / count as f32, 1.0, 0.5)
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
        self.columns = Vec::new();
        self.heights = Vec::new();
    }
}
