use serde::{Deserialize, Serialize};

use crate::{RecordingSettings, Result, VisualiserError};

mod color;

pub use color::Color;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub render: RenderConfig,
    pub recording: RecordingSettings,
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Analysis window; the spectrum frame carries `fft_size / 2` bins.
    pub fft_size: usize,
    /// Exponential smoothing between consecutive spectra, in `[0, 1)`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Presentation surface and camera settings for the headless renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub bloom: bool,
    pub camera_distance: f32,
    pub fov_degrees: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            bloom: false,
            camera_distance: 5.0,
            fov_degrees: 75.0,
        }
    }
}

/// Tagged value stored for each waveform parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Bool(bool),
    Numeric(f32),
    Color(Color),
}

impl ParamValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Numeric(_) => "numeric",
            Self::Color(_) => "color",
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Numeric(value)
    }
}

impl From<Color> for ParamValue {
    fn from(value: Color) -> Self {
        Self::Color(value)
    }
}

/// Inclusive bounds and UI step for a numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl NumericRange {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Which recompute hook a parameter change has to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamEffect {
    /// Read by the next `update`; nothing to do immediately.
    Motion,
    /// Scale, opacity and point size.
    Material,
    /// Colour buffers only.
    Colors,
    /// Geometry has to be rebuilt (counts, spacing, radius).
    Structure,
    /// Scene background colour.
    Background,
}

/// Schema entry for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: ParamValue,
    pub range: Option<NumericRange>,
    pub effect: ParamEffect,
}

impl ParamSpec {
    pub const fn toggle(name: &'static str, default: bool, effect: ParamEffect) -> Self {
        Self {
            name,
            default: ParamValue::Bool(default),
            range: None,
            effect,
        }
    }

    pub const fn numeric(
        name: &'static str,
        default: f32,
        range: NumericRange,
        effect: ParamEffect,
    ) -> Self {
        Self {
            name,
            default: ParamValue::Numeric(default),
            range: Some(range),
            effect,
        }
    }

    pub fn color(name: &'static str, hex: u32, effect: ParamEffect) -> Self {
        Self {
            name,
            default: ParamValue::Color(Color::from_u32(hex)),
            range: None,
            effect,
        }
    }

    /// Parses textual input (CLI overrides, panel text fields) into a value
    /// of this parameter's kind.
    pub fn parse_value(&self, input: &str) -> Result<ParamValue> {
        let invalid = || VisualiserError::InvalidParameter {
            name: self.name.to_string(),
            expected: self.default.kind_name(),
        };

        match self.default {
            ParamValue::Bool(_) => match input.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(ParamValue::Bool(true)),
                "false" | "off" | "no" | "0" => Ok(ParamValue::Bool(false)),
                _ => Err(invalid()),
            },
            ParamValue::Numeric(_) => input
                .trim()
                .parse::<f32>()
                .map(ParamValue::Numeric)
                .map_err(|_| invalid()),
            ParamValue::Color(_) => input.parse().map(ParamValue::Color).map_err(|_| invalid()),
        }
    }
}

/// Panel-facing description of a parameter and its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    #[serde(flatten)]
    pub value: ParamValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
}

#[derive(Debug, Clone)]
struct ConfigEntry {
    spec: ParamSpec,
    value: ParamValue,
}

/// Live parameter set of one waveform instance.
///
/// The schema is fixed at construction; only values change afterwards.
#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    entries: Vec<ConfigEntry>,
}

impl VisualizationConfig {
    pub fn new(specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        Self {
            entries: specs
                .into_iter()
                .map(|spec| ConfigEntry {
                    value: spec.default,
                    spec,
                })
                .collect(),
        }
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.entry(name).map(|entry| &entry.spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ParamSpec> {
        self.entries.iter().map(|entry| &entry.spec)
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entry(name).map(|entry| entry.value)
    }

    /// Boolean value of `name`, `false` if the schema has no such toggle.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(ParamValue::Bool(true)))
    }

    /// Numeric value of `name`, `0.0` if the schema has no such number.
    pub fn number(&self, name: &str) -> f32 {
        match self.get(name) {
            Some(ParamValue::Numeric(value)) => value,
            _ => 0.0,
        }
    }

    /// Numeric value rounded to a non-negative count.
    pub fn count(&self, name: &str) -> usize {
        self.number(name).round().max(0.0) as usize
    }

    /// Colour value of `name`, black if the schema has no such colour.
    pub fn color(&self, name: &str) -> Color {
        match self.get(name) {
            Some(ParamValue::Color(value)) => value,
            _ => Color::BLACK,
        }
    }

    /// Stores a new value. Numbers are clamped into the schema range rather
    /// than rejected; a value of the wrong kind is an error and leaves the
    /// stored value untouched. Returns the effect the change requires.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<ParamEffect> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.spec.name == name)
            .ok_or_else(|| VisualiserError::UnknownParameter(name.to_string()))?;

        if !entry.spec.default.same_kind(&value) {
            return Err(VisualiserError::InvalidParameter {
                name: name.to_string(),
                expected: entry.spec.default.kind_name(),
            });
        }

        entry.value = match (value, entry.spec.range) {
            (ParamValue::Numeric(number), _) if !number.is_finite() => {
                return Err(VisualiserError::InvalidParameter {
                    name: name.to_string(),
                    expected: "finite numeric",
                });
            }
            (ParamValue::Numeric(number), Some(range)) => ParamValue::Numeric(range.clamp(number)),
            (other, _) => other,
        };

        Ok(entry.spec.effect)
    }

    pub fn describe(&self) -> Vec<ParamDescriptor> {
        self.entries
            .iter()
            .map(|entry| ParamDescriptor {
                name: entry.spec.name,
                value: entry.value,
                min: entry.spec.range.map(|range| range.min),
                max: entry.spec.range.map(|range| range.max),
                step: entry.spec.range.map(|range| range.step),
            })
            .collect()
    }

    fn entry(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.spec.name == name)
    }
}
