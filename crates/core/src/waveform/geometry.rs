//! Shape generators and palettes shared by the waveform variants.

use std::f64::consts::PI;

use glam::Vec3;

use crate::Color;

/// Polar and azimuthal angles of point `index` out of `count` on a
/// Fibonacci sphere.
pub fn fibonacci_angles(index: usize, count: usize) -> (f64, f64) {
    let n = count.max(1) as f64;
    let i = index as f64;
    let phi = (1.0 - 2.0 * (i + 0.5) / n).acos();
    let theta = PI * (1.0 + 5f64.sqrt()) * i;
    (phi, theta)
}

/// `count` points spread quasi-uniformly over a sphere of `radius`.
pub fn fibonacci_sphere(count: usize, radius: f32) -> Vec<Vec3> {
    let r = radius as f64;
    (0..count)
        .map(|index| {
            let (phi, theta) = fibonacci_angles(index, count);
            Vec3::new(
                (r * phi.sin() * theta.cos()) as f32,
                (r * phi.sin() * theta.sin()) as f32,
                (r * phi.cos()) as f32,
            )
        })
        .collect()
}

/// Point on a torus lying in the XZ plane.
///
/// `phi` runs around the ring, `theta` around the tube.
pub fn torus_point(phi: f32, theta: f32, ring_radius: f32, tube_radius: f32) -> Vec3 {
    let planar = ring_radius + tube_radius * theta.cos();
    Vec3::new(
        planar * phi.cos(),
        tube_radius * theta.sin(),
        planar * phi.sin(),
    )
}

/// Hue cycling with index, time and amplitude; louder points get lighter.
pub fn cycle_color(index: usize, count: usize, time: f32, cycle: f32, amplitude: f32) -> Color {
    let hue = index as f32 / count.max(1) as f32 + time * cycle * 0.1 + 0.2 * amplitude;
    Color::from_hsl(hue.rem_euclid(1.0), 1.0, 0.5 + 0.2 * amplitude)
}

/// Two-colour gradient at `fraction`, intensified by amplitude.
pub fn gradient_color(from: Color, to: Color, fraction: f32, amplitude: f32) -> Color {
    from.lerp(to, fraction).scaled(1.0 + 0.5 * amplitude)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn sphere_points_share_one_radius() {
        for point in fibonacci_sphere(8000, 1.2) {
            assert!((point.length() - 1.2).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_angles_are_distinct() {
        let count = 20_000;
        let pairs: HashSet<(u64, u64)> = (0..count)
            .map(|index| {
                let (phi, theta) = fibonacci_angles(index, count);
                (phi.to_bits(), theta.to_bits())
            })
            .collect();
        assert_eq!(pairs.len(), count);
    }

    #[test]
    fn torus_points_sit_on_the_tube() {
        let point = torus_point(0.7, 2.1, 1.2, 0.3);
        let planar = (point.x * point.x + point.z * point.z).sqrt();
        let tube = ((planar - 1.2).powi(2) + point.y * point.y).sqrt();
        assert!((tube - 0.3).abs() < 1e-5);
    }

    #[test]
    fn gradient_is_brightened_by_amplitude() {
        let color = gradient_color(Color::BLACK, Color::rgb(0.4, 0.4, 0.4), 1.0, 1.0);
        assert!((color.r - 0.6).abs() < 1e-6);
    }
}
