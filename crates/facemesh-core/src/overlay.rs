//! Landmark overlay rendering.
//!
//! The composed canvas is two frames wide: the live frame with the primary
//! face's points on the left, and the captured mesh as a filled silhouette
//! with its points on the right.

use crate::session::CapturedMesh;
use crate::topology::FACE_OUTLINE;
use crate::types::{Face, Landmark, Mesh, MeshError};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("frame buffer has {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },
}

/// Colors and point size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub live_point: Rgb<u8>,
    pub captured_fill: Rgb<u8>,
    pub captured_point: Rgb<u8>,
    pub background: Rgb<u8>,
    pub point_radius: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            live_point: Rgb([0, 255, 0]),
            captured_fill: Rgb([255, 200, 0]),
            captured_point: Rgb([100, 255, 255]),
            background: Rgb([30, 30, 30]),
            point_radius: 1,
        }
    }
}

/// Canvas position of a landmark shifted by `offset_x`.
///
/// `None` for non-finite coordinates. Positions far off the canvas are pulled
/// in to one canvas size beyond each edge, which keeps them off-screen and
/// inside `i32`.
fn to_pixel(p: &Landmark, offset_x: i32, canvas: &RgbImage) -> Option<(i32, i32)> {
    if !p.x.is_finite() || !p.y.is_finite() {
        return None;
    }
    let (w, h) = canvas.dimensions();
    let (w, h) = (f64::from(w), f64::from(h));
    let x = (p.x.round() + f64::from(offset_x)).clamp(-w, 2.0 * w);
    let y = p.y.round().clamp(-h, 2.0 * h);
    Some((x as i32, y as i32))
}

/// Draw every landmark of `mesh` as a dot, shifted by `offset_x`.
pub fn draw_points(canvas: &mut RgbImage, mesh: &Mesh, offset_x: i32, color: Rgb<u8>, radius: i32) {
    for p in mesh.points() {
        if let Some(center) = to_pixel(p, offset_x, canvas) {
            draw_filled_circle_mut(canvas, center, radius, color);
        }
    }
}

/// Fill the face silhouette of `mesh`, shifted by `offset_x`.
///
/// Fails if the mesh lacks any outline index. Outlines with a non-finite
/// corner or fewer than three distinct corners draw nothing.
pub fn fill_outline(
    canvas: &mut RgbImage,
    mesh: &Mesh,
    offset_x: i32,
    color: Rgb<u8>,
) -> Result<(), MeshError> {
    mesh.require(&FACE_OUTLINE)?;

    let mut polygon = Vec::with_capacity(FACE_OUTLINE.len());
    for &index in &FACE_OUTLINE {
        let Some((x, y)) = to_pixel(&mesh.point(index)?, offset_x, canvas) else {
            return Ok(());
        };
        let corner = Point::new(x, y);
        if polygon.last() != Some(&corner) {
            polygon.push(corner);
        }
    }
    // imageproc rejects polygons that close themselves explicitly.
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    if polygon.len() >= 3 {
        draw_polygon_mut(canvas, &polygon, color);
    }
    Ok(())
}

/// Compose the live frame and the captured mesh into one canvas.
///
/// With no face in view the live half is the bare frame; with no capture the
/// right half stays background. A captured mesh without the full outline is
/// drawn as points only.
pub fn compose(
    rgb: &[u8],
    width: u32,
    height: u32,
    live: Option<&Face>,
    captured: Option<&CapturedMesh>,
    style: &OverlayStyle,
) -> Result<RgbImage, OverlayError> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(OverlayError::InvalidFrame {
            expected,
            actual: rgb.len(),
        });
    }

    let mut canvas = RgbImage::from_pixel(width * 2, height, style.background);
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        if x < width {
            let i = (y as usize * width as usize + x as usize) * 3;
            *pixel = Rgb([rgb[i], rgb[i + 1], rgb[i + 2]]);
        }
    }

    if let Some(face) = live {
        draw_points(&mut canvas, &face.mesh, 0, style.live_point, style.point_radius);
    }

    if let Some(captured) = captured {
        let offset = i32::try_from(width).unwrap_or(i32::MAX);
        if let Err(err) = fill_outline(&mut canvas, captured.mesh(), offset, style.captured_fill) {
            tracing::trace!(error = %err, "captured mesh has no outline; drawing points only");
        }
        draw_points(
            &mut canvas,
            captured.mesh(),
            offset,
            style.captured_point,
            style.point_radius,
        );
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::MESH_POINT_COUNT;
    use crate::types::Landmark;

    /// Mesh whose outline is a circle of radius 20 around (50, 50).
    fn round_face() -> Mesh {
        let mut points = vec![Landmark::new(50.0, 50.0); MESH_POINT_COUNT];
        let n = FACE_OUTLINE.len() as f64;
        for (k, &index) in FACE_OUTLINE.iter().enumerate() {
            let angle = k as f64 / n * std::f64::consts::TAU;
            points[index] = Landmark::new(50.0 + 20.0 * angle.cos(), 50.0 + 20.0 * angle.sin());
        }
        Mesh::new(points)
    }

    #[test]
    fn test_draw_points_marks_pixels() {
        let mut canvas = RgbImage::new(20, 20);
        let mesh = Mesh::new(vec![Landmark::new(5.0, 5.0), Landmark::new(14.0, 3.0)]);
        draw_points(&mut canvas, &mesh, 0, Rgb([0, 255, 0]), 1);
        assert_eq!(*canvas.get_pixel(5, 5), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(14, 3), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(10, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_points_clips_offscreen() {
        let mut canvas = RgbImage::new(10, 10);
        let mesh = Mesh::new(vec![Landmark::new(-50.0, 500.0), Landmark::new(1e6, -1e6)]);
        draw_points(&mut canvas, &mesh, 0, Rgb([255, 0, 0]), 2);
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_fill_outline_center_and_outside() {
        let mut canvas = RgbImage::new(100, 100);
        fill_outline(&mut canvas, &round_face(), 0, Rgb([255, 200, 0])).unwrap();
        assert_eq!(*canvas.get_pixel(50, 50), Rgb([255, 200, 0]));
        assert_eq!(*canvas.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_fill_outline_degenerate_mesh() {
        let mut canvas = RgbImage::new(10, 10);
        let mesh = Mesh::new(vec![Landmark::new(0.0, 0.0); MESH_POINT_COUNT]);
        fill_outline(&mut canvas, &mesh, 0, Rgb([255, 0, 0])).unwrap();
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_fill_outline_short_mesh() {
        let mut canvas = RgbImage::new(10, 10);
        let mesh = Mesh::new(vec![Landmark::new(0.0, 0.0); 20]);
        assert!(matches!(
            fill_outline(&mut canvas, &mesh, 0, Rgb([255, 0, 0])),
            Err(MeshError::InvalidMesh { index: 338, len: 20 })
        ));
    }

    #[test]
    fn test_compose_layout() {
        let (w, h) = (100u32, 100u32);
        let rgb = vec![10u8; (w * h * 3) as usize];
        let face = Face { mesh: round_face(), confidence: Some(0.9) };
        let captured = CapturedMesh::new(round_face());
        let style = OverlayStyle::default();

        let canvas = compose(&rgb, w, h, Some(&face), Some(&captured), &style).unwrap();
        assert_eq!(canvas.dimensions(), (200, 100));
        // Live half: frame pixels, plus the point at the outline's first corner.
        assert_eq!(*canvas.get_pixel(5, 5), Rgb([10, 10, 10]));
        assert_eq!(*canvas.get_pixel(70, 50), style.live_point);
        // Captured half: silhouette interior and background outside it.
        assert_eq!(*canvas.get_pixel(140, 60), style.captured_fill);
        assert_eq!(*canvas.get_pixel(105, 5), style.background);
    }

    #[test]
    fn test_compose_without_face_or_capture() {
        let rgb = vec![10u8; 4 * 2 * 3];
        let canvas = compose(&rgb, 4, 2, None, None, &OverlayStyle::default()).unwrap();
        assert_eq!(canvas.dimensions(), (8, 2));
        assert_eq!(*canvas.get_pixel(3, 1), Rgb([10, 10, 10]));
        assert_eq!(*canvas.get_pixel(4, 0), OverlayStyle::default().background);
    }

    #[test]
    fn test_draw_points_skips_non_finite() {
        let mut canvas = RgbImage::new(10, 10);
        let mesh = Mesh::new(vec![
            Landmark::new(f64::NAN, 5.0),
            Landmark::new(5.0, f64::INFINITY),
            Landmark::new(3.0, 3.0),
        ]);
        draw_points(&mut canvas, &mesh, 0, Rgb([255, 0, 0]), 1);
        assert_eq!(*canvas.get_pixel(3, 3), Rgb([255, 0, 0]));
        for (x, y, p) in canvas.enumerate_pixels() {
            if *p == Rgb([255, 0, 0]) {
                assert!(x.abs_diff(3) <= 1 && y.abs_diff(3) <= 1, "stray dot at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_compose_with_huge_captured_coordinates() {
        let mut points = vec![Landmark::new(2.0, 2.0); MESH_POINT_COUNT];
        points[0] = Landmark::new(3e9, 2.0);
        points[FACE_OUTLINE[0]] = Landmark::new(-3e9, 1e12);
        let captured = CapturedMesh::new(Mesh::new(points));
        let rgb = vec![0u8; 10 * 10 * 3];
        let style = OverlayStyle::default();

        let canvas = compose(&rgb, 10, 10, None, Some(&captured), &style).unwrap();
        assert_eq!(*canvas.get_pixel(12, 2), style.captured_point);
    }

    #[test]
    fn test_compose_captured_mesh_without_outline() {
        let (w, h) = (100u32, 100u32);
        let rgb = vec![10u8; (w * h * 3) as usize];
        let live = Face { mesh: round_face(), confidence: None };
        // Enough points to classify, too few for the outline.
        let mut points = vec![Landmark::new(30.0, 30.0); 301];
        points[300] = Landmark::new(60.0, 40.0);
        let captured = CapturedMesh::new(Mesh::new(points));
        let style = OverlayStyle::default();

        let canvas = compose(&rgb, w, h, Some(&live), Some(&captured), &style).unwrap();
        assert_eq!(*canvas.get_pixel(70, 50), style.live_point);
        assert_eq!(*canvas.get_pixel(130, 30), style.captured_point);
        assert_eq!(*canvas.get_pixel(160, 40), style.captured_point);
        assert_eq!(*canvas.get_pixel(150, 80), style.background);
    }

    #[test]
    fn test_compose_rejects_short_frame() {
        let result = compose(&[0u8; 5], 4, 2, None, None, &OverlayStyle::default());
        assert!(matches!(result, Err(OverlayError::InvalidFrame { expected: 24, actual: 5 })));
    }
}
