//! Owner of the active waveform and the scene it draws into.

use tracing::{debug, info};

use crate::{
    config::{ParamDescriptor, ParamEffect, ParamValue},
    render::{Renderer, VideoFrame},
    waveform::{Waveform, WaveformKind, BACKGROUND_COLOR},
    Result, Scene, SpectrumFrame, VisualiserError,
};

/// Holds exactly one waveform at a time and routes frames and parameter
/// changes to it.
pub struct VisualizationEngine {
    scene: Scene,
    active: Option<Box<dyn Waveform>>,
}

impl Default for VisualizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualizationEngine {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            active: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn set_bloom(&mut self, enabled: bool) {
        self.scene.set_bloom(enabled);
    }

    pub fn active_kind(&self) -> Option<WaveformKind> {
        self.active.as_ref().map(|waveform| waveform.kind())
    }

    pub fn waveform(&self) -> Option<&dyn Waveform> {
        self.active.as_deref()
    }

    /// Disposes the current waveform, then builds `kind` with its default
    /// configuration.
    pub fn set_waveform(&mut self, kind: WaveformKind) {
        if let Some(mut previous) = self.active.take() {
            previous.dispose(&mut self.scene);
        }

        let waveform = kind.create(&mut self.scene);
        self.scene.set_background(waveform.config().color(BACKGROUND_COLOR));
        info!(waveform = %kind, meshes = waveform.meshes().len(), "switched waveform");
        self.active = Some(waveform);
    }

    /// Feeds one spectrum frame to the active waveform. Empty frames and a
    /// missing waveform are ignored.
    pub fn update(&mut self, frame: &SpectrumFrame) {
        let Some(waveform) = self.active.as_mut() else {
            return;
        };
        if frame.is_empty() {
            return;
        }
        let stats = frame.stats();
        waveform.update(frame, &stats);
    }

    /// Stores a parameter on the active waveform and runs the hook the
    /// parameter's effect calls for. Returns the value actually stored,
    /// which differs from `value` when a number had to be clamped.
    pub fn set_config_value(&mut self, name: &str, value: ParamValue) -> Result<ParamValue> {
        let waveform = self
            .active
            .as_mut()
            .ok_or_else(|| VisualiserError::msg("no active waveform"))?;

        let effect = waveform.config_mut().set(name, value)?;
        match effect {
            ParamEffect::Motion => {}
            ParamEffect::Material => waveform.update_config(),
            ParamEffect::Colors => waveform.update_colors(),
            ParamEffect::Structure => waveform.rebuild(&mut self.scene),
            ParamEffect::Background => {
                self.scene.set_background(waveform.config().color(name));
            }
        }

        let stored = waveform
            .config()
            .get(name)
            .ok_or_else(|| VisualiserError::UnknownParameter(name.to_string()))?;
        debug!(name, ?stored, ?effect, "parameter updated");
        Ok(stored)
    }

    /// Parses `input` against the parameter's schema, then sets it.
    pub fn set_config_text(&mut self, name: &str, input: &str) -> Result<ParamValue> {
        let value = self
            .active
            .as_ref()
            .ok_or_else(|| VisualiserError::msg("no active waveform"))?
            .config()
            .spec(name)
            .ok_or_else(|| VisualiserError::UnknownParameter(name.to_string()))?
            .parse_value(input)?;
        self.set_config_value(name, value)
    }

    /// Panel view of the active waveform's parameters.
    pub fn schema(&self) -> Vec<ParamDescriptor> {
        self.active
            .as_ref()
            .map(|waveform| waveform.config().describe())
            .unwrap_or_default()
    }

    /// Presents the current state through `renderer`.
    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<VideoFrame> {
        let meshes = self
            .active
            .as_ref()
            .map(|waveform| waveform.meshes())
            .unwrap_or(&[]);
        renderer.present(&self.scene, meshes)
    }
}

impl std::fmt::Debug for VisualizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizationEngine")
            .field("active", &self.active_kind())
            .field("attached", &self.scene.attached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        waveform::{OPACITY, SCALE},
        Color,
    };

    #[test]
    fn switching_leaves_one_geometry_owner() {
        let mut engine = VisualizationEngine::new();
        for kind in WaveformKind::ALL {
            engine.set_waveform(kind);
            let waveform = engine.waveform().unwrap();
            assert_eq!(engine.scene().attached_count(), waveform.meshes().len());
            assert!(waveform
                .meshes()
                .iter()
                .all(|mesh| engine.scene().is_attached(mesh.id())));
        }
    }

    #[test]
    fn update_without_waveform_or_data_is_a_no_op() {
        let mut engine = VisualizationEngine::new();
        engine.update(&SpectrumFrame::new(vec![255u8; 256]));

        engine.set_waveform(WaveformKind::Bars);
        let before: Vec<_> = engine.waveform().unwrap().meshes()[0..4]
            .iter()
            .map(|mesh| mesh.transform)
            .collect();
        engine.update(&SpectrumFrame::silent(0));
        let after: Vec<_> = engine.waveform().unwrap().meshes()[0..4]
            .iter()
            .map(|mesh| mesh.transform)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn numeric_values_are_clamped_to_bounds() {
        let mut engine = VisualizationEngine::new();
        for kind in WaveformKind::ALL {
            engine.set_waveform(kind);
            let numeric: Vec<_> = engine
                .waveform()
                .unwrap()
                .config()
                .specs()
                .filter_map(|spec| spec.range.map(|range| (spec.name, range)))
                .collect();

            for (name, range) in numeric {
                let low = engine
                    .set_config_value(name, (range.min - 1000.0).into())
                    .unwrap();
                assert_eq!(low, ParamValue::Numeric(range.min), "{kind} {name}");
                let high = engine
                    .set_config_value(name, (range.max + 1000.0).into())
                    .unwrap();
                assert_eq!(high, ParamValue::Numeric(range.max), "{kind} {name}");
            }
            assert_eq!(
                engine.scene().attached_count(),
                engine.waveform().unwrap().meshes().len()
            );
        }
    }

    #[test]
    fn type_mismatch_keeps_previous_value() {
        let mut engine = VisualizationEngine::new();
        engine.set_waveform(WaveformKind::ParticleMorph);

        let err = engine.set_config_value(SCALE, true.into()).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidParameter { .. }));
        assert_eq!(
            engine.waveform().unwrap().config().get(SCALE),
            Some(ParamValue::Numeric(1.0))
        );
        assert!(matches!(
            engine.set_config_value("nope", 1.0_f32.into()),
            Err(VisualiserError::UnknownParameter(_))
        ));
    }

    #[test]
    fn background_parameter_recolours_the_scene() {
        let mut engine = VisualizationEngine::new();
        engine.set_waveform(WaveformKind::PulseCircle);
        engine.set_config_text(BACKGROUND_COLOR, "#204060").unwrap();

        assert_eq!(engine.scene().background(), Color::from_u32(0x204060));
        assert_ne!(
            engine.waveform().unwrap().meshes()[0].material.color,
            Color::from_u32(0x204060)
        );
    }

    #[test]
    fn structural_change_recreates_geometry() {
        let mut engine = VisualizationEngine::new();
        engine.set_waveform(WaveformKind::Bars);
        engine.set_config_text("barCount", "16").unwrap();

        assert_eq!(engine.waveform().unwrap().meshes().len(), 16);
        assert_eq!(engine.scene().attached_count(), 16);
    }

    #[test]
    fn material_change_applies_without_rebuild() {
        let mut engine = VisualizationEngine::new();
        engine.set_waveform(WaveformKind::MultiWave);
        let ids: Vec<_> = engine
            .waveform()
            .unwrap()
            .meshes()
            .iter()
            .map(|mesh| mesh.id())
            .collect();

        engine.set_config_value(OPACITY, 0.3_f32.into()).unwrap();

        let waveform = engine.waveform().unwrap();
        assert!(waveform.meshes().iter().map(|mesh| mesh.id()).eq(ids));
        assert!(waveform
            .meshes()
            .iter()
            .all(|mesh| (mesh.material.opacity - 0.3).abs() < 1e-6));
    }

    #[test]
    fn bar_width_resizes_without_rebuild() {
        let mut engine = VisualizationEngine::new();
        engine.set_waveform(WaveformKind::Bars);
        let ids: Vec<_> = engine
            .waveform()
            .unwrap()
            .meshes()
            .iter()
            .map(|mesh| mesh.id())
            .collect();

        engine.set_config_text("barWidth", "0.1").unwrap();

        let waveform = engine.waveform().unwrap();
        assert!(waveform.meshes().iter().map(|mesh| mesh.id()).eq(ids));
        assert!(waveform
            .meshes()
            .iter()
            .all(|mesh| (mesh.transform.scale.x - 0.1).abs() < 1e-6));
    }

    #[test]
    fn schema_lists_active_parameters() {
        let mut engine = VisualizationEngine::new();
        assert!(engine.schema().is_empty());

        engine.set_waveform(WaveformKind::ParticleSphere);
        let names: Vec<_> = engine.schema().iter().map(|entry| entry.name).collect();
        assert!(names.contains(&"expansionIntensity"));
        assert!(names.contains(&"backgroundColor"));
    }
}
