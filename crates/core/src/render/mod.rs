//! Headless presentation backend.
//!
//! [`SoftwareRenderer`] rasterises the attached meshes of a [`Scene`] into an
//! RGBA frame with a fixed perspective camera. Frames are what a recording
//! captures; nothing here touches a window system.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use tracing::debug;

use crate::{config::RenderConfig, Color, Mesh, Primitive, Result, Scene, VisualiserError};

const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;
const BLOOM_THRESHOLD: f32 = 0.6;
const BLOOM_STRENGTH: f32 = 0.8;

/// One presented frame, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(png)
    }
}

/// Capture handle over the presentation surface.
///
/// Clones share the same track state; stopping one stops them all.
#[derive(Debug, Clone)]
pub struct VideoStream {
    width: u32,
    height: u32,
    fps: u32,
    live: Arc<AtomicBool>,
}

impl VideoStream {
    fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Releases the capture tracks.
    pub fn stop_tracks(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Presentation backend driven once per tick.
pub trait Renderer {
    /// Draws every mesh in `meshes` that is attached to `scene`.
    fn present(&mut self, scene: &Scene, meshes: &[Mesh]) -> Result<VideoFrame>;

    /// Opens a capture stream on the surface, or `None` when the surface
    /// cannot be captured.
    fn capture_stream(&mut self, fps: u32) -> Option<VideoStream>;
}

/// CPU rasteriser with a perspective camera on the +Z axis.
#[derive(Debug)]
pub struct SoftwareRenderer {
    config: RenderConfig,
    view_projection: Mat4,
    accum: Vec<Vec3>,
    streams: Vec<VideoStream>,
}

impl SoftwareRenderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        if config.fov_degrees <= 0.0 || config.fov_degrees >= 180.0 {
            return Err(VisualiserError::InvalidInput(
                "field of view must lie between 0 and 180 degrees",
            ));
        }
        if config.camera_distance <= NEAR {
            return Err(VisualiserError::InvalidInput("camera must sit beyond the near plane"));
        }
        // The RGBA frame needs four bytes per pixel on top of the pixel count.
        let pixels = (config.width as usize)
            .checked_mul(config.height as usize)
            .filter(|pixels| pixels.checked_mul(4).is_some())
            .ok_or(VisualiserError::InvalidInput("surface size overflows the frame buffer"))?;

        let aspect = config.width.max(1) as f32 / config.height.max(1) as f32;
        let projection = Mat4::perspective_rh(config.fov_degrees.to_radians(), aspect, NEAR, FAR);
        let eye = Vec3::new(0.0, 0.0, config.camera_distance);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);

        Ok(Self {
            view_projection: projection * view,
            accum: vec![Vec3::ZERO; pixels],
            streams: Vec::new(),
            config,
        })
    }

    /// Capture streams handed out that have not been stopped yet.
    pub fn live_captures(&self) -> usize {
        self.streams
            .iter()
            .filter(|stream| stream.is_live())
            .count()
    }

    /// Pixels per world unit at clip depth `w`.
    fn focal(&self, w: f32) -> f32 {
        let half_fov = self.config.fov_degrees.to_radians() / 2.0;
        self.config.height as f32 / 2.0 / half_fov.tan() / w
    }

    /// Projects a world point to pixel coordinates and clip depth.
    fn project(&self, mvp: &Mat4, point: Vec3) -> Option<(Vec2, f32)> {
        let clip: Vec4 = *mvp * point.extend(1.0);
        if clip.w <= NEAR {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let screen = Vec2::new(
            (ndc.x + 1.0) / 2.0 * self.config.width as f32,
            (1.0 - ndc.y) / 2.0 * self.config.height as f32,
        );
        Some((screen, clip.w))
    }

    fn blend(&mut self, x: i64, y: i64, color: Color, opacity: f32) {
        let (width, height) = (self.config.width as i64, self.config.height as i64);
        if x < 0 || y < 0 || x >= width || y >= height {
            return;
        }
        let target = &mut self.accum[(y * width + x) as usize];
        let source = Vec3::new(color.r, color.g, color.b);
        *target = target.lerp(source, opacity.clamp(0.0, 1.0));
    }

    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Color, opacity: f32) {
        let (width, height) = (self.config.width as f32, self.config.height as f32);
        let x0 = min.x.max(0.0).floor() as i64;
        let y0 = min.y.max(0.0).floor() as i64;
        let x1 = max.x.min(width).ceil() as i64;
        let y1 = max.y.min(height).ceil() as i64;
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color, opacity);
            }
        }
    }

    fn draw_points(&mut self, mesh: &Mesh, mvp: &Mat4) {
        for (index, &position) in mesh.positions.iter().enumerate() {
            let Some((centre, depth)) = self.project(mvp, position) else {
                continue;
            };
            let radius = (mesh.material.size * self.focal(depth) / 2.0).max(0.5);
            let color = vertex_color(mesh, index);
            self.fill_rect(
                centre - Vec2::splat(radius),
                centre + Vec2::splat(radius),
                color,
                mesh.material.opacity,
            );
        }
    }

    fn draw_line_strip(&mut self, mesh: &Mesh, mvp: &Mat4) {
        let projected: Vec<Option<Vec2>> = mesh
            .positions
            .iter()
            .map(|&position| self.project(mvp, position).map(|(screen, _)| screen))
            .collect();

        for (index, pair) in projected.windows(2).enumerate() {
            let (Some(from), Some(to)) = (pair[0], pair[1]) else {
                continue;
            };
            let color = vertex_color(mesh, index);
            let steps = (to - from).abs().max_element().ceil().max(1.0) as usize;
            for step in 0..=steps {
                let point = from.lerp(to, step as f32 / steps as f32);
                self.blend(point.x as i64, point.y as i64, color, mesh.material.opacity);
            }
        }
    }

    fn draw_box(&mut self, mesh: &Mesh, mvp: &Mat4) {
        let corners: Vec<Vec2> = mesh
            .positions
            .iter()
            .filter_map(|&position| self.project(mvp, position).map(|(screen, _)| screen))
            .collect();
        if corners.is_empty() {
            return;
        }
        let min = corners.iter().copied().fold(Vec2::MAX, Vec2::min);
        let max = corners.iter().copied().fold(Vec2::MIN, Vec2::max);
        self.fill_rect(min, max, mesh.material.color, mesh.material.opacity);
    }

    fn draw_disc(&mut self, mesh: &Mesh, mvp: &Mat4) {
        let Some((&centre, rim)) = mesh.positions.split_first() else {
            return;
        };
        let Some((centre, _)) = self.project(mvp, centre) else {
            return;
        };
        let rim: Vec<Vec2> = rim
            .iter()
            .filter_map(|&position| self.project(mvp, position).map(|(screen, _)| screen))
            .collect();
        if rim.len() < 2 {
            return;
        }

        for index in 0..rim.len() {
            let (a, b) = (rim[index], rim[(index + 1) % rim.len()]);
            self.fill_triangle([centre, a, b], mesh.material.color, mesh.material.opacity);
        }
    }

    fn fill_triangle(&mut self, [a, b, c]: [Vec2; 3], color: Color, opacity: f32) {
        let area = edge(a, b, c);
        if area.abs() < f32::EPSILON {
            return;
        }
        let min = a.min(b).min(c).max(Vec2::ZERO).floor();
        let max = a
            .max(b)
            .max(c)
            .min(Vec2::new(self.config.width as f32, self.config.height as f32))
            .ceil();

        for y in min.y as i64..max.y as i64 {
            for x in min.x as i64..max.x as i64 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let (w0, w1, w2) = (edge(b, c, p), edge(c, a, p), edge(a, b, p));
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };
                if inside {
                    self.blend(x, y, color, opacity);
                }
            }
        }
    }

    fn apply_bloom(&mut self) {
        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let bright: Vec<Vec3> = self
            .accum
            .iter()
            .map(|&pixel| {
                let luma = pixel.dot(Vec3::new(0.2126, 0.7152, 0.0722));
                if luma > BLOOM_THRESHOLD {
                    pixel
                } else {
                    Vec3::ZERO
                }
            })
            .collect();

        for y in 0..height {
            for x in 0..width {
                let mut sum = Vec3::ZERO;
                let mut taps = 0.0;
                for ny in y.saturating_sub(1)..(y + 2).min(height) {
                    for nx in x.saturating_sub(1)..(x + 2).min(width) {
                        sum += bright[ny * width + nx];
                        taps += 1.0;
                    }
                }
                self.accum[y * width + x] += sum / taps * BLOOM_STRENGTH;
            }
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn vertex_color(mesh: &Mesh, index: usize) -> Color {
    mesh.colors
        .as_ref()
        .and_then(|colors| colors.get(index).copied())
        .unwrap_or(mesh.material.color)
}

fn model_matrix(mesh: &Mesh) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        mesh.transform.scale,
        Quat::from_rotation_y(mesh.transform.rotation_y),
        mesh.transform.translation,
    )
}

impl Renderer for SoftwareRenderer {
    fn present(&mut self, scene: &Scene, meshes: &[Mesh]) -> Result<VideoFrame> {
        let background = scene.background();
        self.accum.fill(Vec3::new(background.r, background.g, background.b));

        for mesh in meshes.iter().filter(|mesh| scene.is_attached(mesh.id())) {
            let mvp = self.view_projection * model_matrix(mesh);
            match mesh.primitive {
                Primitive::Points => self.draw_points(mesh, &mvp),
                Primitive::LineStrip => self.draw_line_strip(mesh, &mvp),
                Primitive::Box => self.draw_box(mesh, &mvp),
                Primitive::Disc => self.draw_disc(mesh, &mvp),
            }
        }

        if scene.bloom() {
            self.apply_bloom();
        }

        let mut pixels = Vec::with_capacity(self.accum.len() * 4);
        for pixel in &self.accum {
            let [r, g, b] = Color::rgb(pixel.x, pixel.y, pixel.z).to_bytes();
            pixels.extend_from_slice(&[r, g, b, 255]);
        }

        Ok(VideoFrame {
            width: self.config.width,
            height: self.config.height,
            pixels,
        })
    }

    fn capture_stream(&mut self, fps: u32) -> Option<VideoStream> {
        if self.config.width == 0 || self.config.height == 0 || fps == 0 {
            return None;
        }
        self.streams.retain(VideoStream::is_live);
        let stream = VideoStream::new(self.config.width, self.config.height, fps);
        self.streams.push(stream.clone());
        debug!(
            fps,
            width = self.config.width,
            height = self.config.height,
            "opened capture stream"
        );
        Some(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(width: u32, height: u32) -> SoftwareRenderer {
        SoftwareRenderer::new(RenderConfig {
            width,
            height,
            ..RenderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn empty_scene_is_background() {
        let mut scene = Scene::new();
        scene.set_background(Color::from_u32(0x336699));
        let frame = renderer(32, 16).present(&scene, &[]).unwrap();

        assert_eq!(frame.pixels.len(), 32 * 16 * 4);
        assert_eq!(frame.pixel(5, 5), Some([0x33, 0x66, 0x99, 255]));
        assert_eq!(frame.pixel(32, 0), None);
    }

    #[test]
    fn detached_meshes_are_not_drawn() {
        let scene = Scene::new();
        let mut disc = Mesh::new(
            Primitive::Disc,
            vec![
                Vec3::ZERO,
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(-1.0, 0.0, 0.0),
                Vec3::new(0.0, -1.0, 0.0),
            ],
        );
        disc.material.color = Color::WHITE;

        let frame = renderer(64, 64).present(&scene, &[disc]).unwrap();
        assert_eq!(frame.pixel(32, 32), Some([0, 0, 0, 255]));
    }

    #[test]
    fn attached_disc_covers_the_centre() {
        let mut scene = Scene::new();
        let mut disc = Mesh::new(
            Primitive::Disc,
            vec![
                Vec3::ZERO,
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(-1.0, 0.0, 0.0),
                Vec3::new(0.0, -1.0, 0.0),
            ],
        );
        disc.material.color = Color::from_u32(0xff0000);
        scene.attach(&disc);

        let frame = renderer(64, 64).present(&scene, &[disc]).unwrap();
        assert_eq!(frame.pixel(32, 32), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn bloom_spreads_bright_pixels() {
        let mut scene = Scene::new();
        let mut points = Mesh::new(Primitive::Points, vec![Vec3::ZERO]);
        points.material.size = 0.0;
        scene.attach(&points);

        let plain = renderer(33, 33).present(&scene, &[points.clone()]).unwrap();
        scene.set_bloom(true);
        let bloomed = renderer(33, 33).present(&scene, &[points]).unwrap();

        let lit = |frame: &VideoFrame| frame.pixels.chunks(4).filter(|px| px[0] > 0).count();
        assert!(lit(&bloomed) > lit(&plain));
    }

    #[test]
    fn frame_encodes_as_png() {
        let frame = renderer(8, 8).present(&Scene::new(), &[]).unwrap();
        let png = frame.encode_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn capture_requires_a_surface() {
        assert!(renderer(0, 0).capture_stream(30).is_none());

        let mut renderer = renderer(16, 16);
        let stream = renderer.capture_stream(30).unwrap();
        assert_eq!(renderer.live_captures(), 1);
        stream.stop_tracks();
        assert_eq!(renderer.live_captures(), 0);
    }

    #[test]
    fn oversized_surface_is_rejected() {
        let err = SoftwareRenderer::new(RenderConfig {
            width: u32::MAX,
            height: u32::MAX,
            ..RenderConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidInput(_)));
    }
}
