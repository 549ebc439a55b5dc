use std::fs;
use std::path::Path;

use nalgebra as na;
use tracing::{info, warn};

use crate::error::Error;

/// Relative area below which three calibration corners count as collinear.
const DEGENERATE_EPS: f64 = 1e-6;

/// Corners used when no usable calibration is available, TL, TR, BR, BL.
pub const PLACEHOLDER_QUAD: [[f32; 2]; 4] = [
    [250.0, 400.0],
    [1100.0, 400.0],
    [1300.0, 900.0],
    [100.0, 900.0],
];

/// Fixed pixel to court-meters projective transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: na::Matrix3<f64>,
}

fn twice_area(a: &na::Point2<f64>, b: &na::Point2<f64>, c: &na::Point2<f64>) -> f64 {
    (b - a).perp(&(c - a))
}

fn check_quad(quad: &[na::Point2<f64>; 4]) -> Result<(), Error> {
    if quad.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::InvalidCalibration("non-finite corner".into()));
    }

    let extent = quad
        .iter()
        .flat_map(|p| quad.iter().map(move |q| na::distance_squared(p, q)))
        .fold(0.0, f64::max);

    if extent <= 0.0 {
        return Err(Error::InvalidCalibration("all corners coincide".into()));
    }

    for skip in 0..4 {
        let tri: Vec<_> = (0..4).filter(|&i| i != skip).map(|i| quad[i]).collect();
        if twice_area(&tri[0], &tri[1], &tri[2]).abs() <= DEGENERATE_EPS * extent {
            return Err(Error::InvalidCalibration(format!(
                "corners {:?} are collinear",
                tri.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()
            )));
        }
    }

    Ok(())
}

impl Homography {
    /// Maps the pixel quad (TL, TR, BR, BL) onto the court rectangle
    /// `(0,0) (L,0) (L,W) (0,W)` in meters.
    pub fn build(
        pixel_quad: &[na::Point2<f32>],
        court_width: f32,
        court_length: f32,
    ) -> Result<Self, Error> {
        let src: [na::Point2<f64>; 4] = match pixel_quad {
            [a, b, c, d] => [a, b, c, d].map(|p| na::Point2::new(p.x as f64, p.y as f64)),
            _ => {
                return Err(Error::InvalidCalibration(format!(
                    "expected 4 corners, got {}",
                    pixel_quad.len()
                )))
            }
        };

        if !(court_width > 0.0 && court_length > 0.0) {
            return Err(Error::InvalidCalibration(format!(
                "court must have positive size, got {}x{}",
                court_length, court_width
            )));
        }

        check_quad(&src)?;

        let (l, w) = (court_length as f64, court_width as f64);
        let dst = [
            na::Point2::new(0.0, 0.0),
            na::Point2::new(l, 0.0),
            na::Point2::new(l, w),
            na::Point2::new(0.0, w),
        ];

        // h33 fixed to 1, two equations per correspondence
        let mut a = na::SMatrix::<f64, 8, 8>::zeros();
        let mut b = na::SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let (x, y, u, v) = (s.x, s.y, d.x, d.y);
            let r = 2 * i;
            let rows = [
                [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y],
                [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y],
            ];

            for (k, row) in rows.iter().enumerate() {
                for (j, val) in row.iter().enumerate() {
                    a[(r + k, j)] = *val;
                }
            }

            b[r] = u;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| Error::InvalidCalibration("no projective solution".into()))?;

        let matrix = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

        if !matrix.iter().all(|v| v.is_finite()) || matrix.determinant().abs() <= f64::EPSILON {
            return Err(Error::InvalidCalibration("singular transform".into()));
        }

        Ok(Self { matrix })
    }

    #[inline]
    pub fn matrix(&self) -> &na::Matrix3<f64> {
        &self.matrix
    }

    /// Projects pixel points to court meters, no clamping.
    pub fn transform(&self, points: &[na::Point2<f32>]) -> Vec<na::Point2<f32>> {
        points
            .iter()
            .map(|p| {
                let v = self.matrix * na::Vector3::new(p.x as f64, p.y as f64, 1.0);
                let w = if v.z == 0.0 { f64::EPSILON } else { v.z };

                na::Point2::new((v.x / w) as f32, (v.y / w) as f32)
            })
            .collect()
    }
}

/// Reads the calibration tool's output: a JSON array of `[x, y]` pixel pairs.
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<Vec<na::Point2<f32>>, Error> {
    let raw: Vec<[f32; 2]> = serde_json::from_str(&fs::read_to_string(path)?)?;

    Ok(raw.into_iter().map(|[x, y]| na::Point2::new(x, y)).collect())
}

/// Writes a calibration file after checking the quad builds a valid transform.
pub fn save_calibration<P: AsRef<Path>>(
    path: P,
    quad: &[na::Point2<f32>],
    court_width: f32,
    court_length: f32,
) -> Result<(), Error> {
    Homography::build(quad, court_width, court_length)?;

    let raw: Vec<[f32; 2]> = quad.iter().map(|p| [p.x, p.y]).collect();
    fs::write(path, serde_json::to_string(&raw)?)?;

    Ok(())
}

/// Homography plus a record of whether it came from real calibration.
#[derive(Debug, Clone)]
pub struct ViewTransformer {
    homography: Homography,
    pixel_quad: [na::Point2<f32>; 4],
    fallback: Option<String>,
}

impl ViewTransformer {
    pub fn new(
        pixel_quad: &[na::Point2<f32>],
        court_width: f32,
        court_length: f32,
    ) -> Result<Self, Error> {
        let homography = Homography::build(pixel_quad, court_width, court_length)?;

        Ok(Self {
            homography,
            pixel_quad: [pixel_quad[0], pixel_quad[1], pixel_quad[2], pixel_quad[3]],
            fallback: None,
        })
    }

    /// Never fails: malformed or degenerate calibration degrades to the placeholder quad.
    pub fn from_calibration(
        calibration: Result<Vec<na::Point2<f32>>, Error>,
        court_width: f32,
        court_length: f32,
    ) -> Self {
        let reason = match calibration {
            Ok(quad) => match Self::new(&quad, court_width, court_length) {
                Ok(vt) => {
                    info!("view transformer: loaded court coordinates {:?}", vt.pixel_quad);
                    return vt;
                }
                Err(err) => err.to_string(),
            },
            Err(err) => err.to_string(),
        };

        warn!(
            "view transformer: using placeholder court coordinates, real-world positions are meaningless ({})",
            reason
        );

        Self::placeholder(court_width, court_length, reason)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, court_width: f32, court_length: f32) -> Self {
        Self::from_calibration(load_calibration(path), court_width, court_length)
    }

    fn placeholder(court_width: f32, court_length: f32, reason: String) -> Self {
        let quad = PLACEHOLDER_QUAD.map(|[x, y]| na::Point2::new(x, y));

        // identity when the court size itself is unusable
        let homography = match Homography::build(&quad, court_width, court_length) {
            Ok(h) => h,
            Err(_) => Homography {
                matrix: na::Matrix3::identity(),
            },
        };

        Self {
            homography,
            pixel_quad: quad,
            fallback: Some(reason),
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    #[inline]
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    #[inline]
    pub fn pixel_quad(&self) -> &[na::Point2<f32>; 4] {
        &self.pixel_quad
    }

    #[inline]
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    #[inline]
    pub fn transform_points(&self, points: &[na::Point2<f32>]) -> Vec<na::Point2<f32>> {
        self.homography.transform(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(raw: [[f32; 2]; 4]) -> Vec<na::Point2<f32>> {
        raw.iter().map(|[x, y]| na::Point2::new(*x, *y)).collect()
    }

    fn assert_close(p: &na::Point2<f32>, x: f32, y: f32) {
        assert!(
            (p.x - x).abs() < 1e-3 && (p.y - y).abs() < 1e-3,
            "({}, {}) != ({}, {})",
            p.x,
            p.y,
            x,
            y
        );
    }

    #[test]
    fn corners_map_to_court_rectangle() {
        for raw in [
            PLACEHOLDER_QUAD,
            [[412.0, 318.0], [1490.0, 305.0], [1780.0, 960.0], [130.0, 990.0]],
            [[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]],
        ] {
            let q = quad(raw);
            let h = Homography::build(&q, 9.0, 18.0).unwrap();
            let out = h.transform(&q);

            assert_close(&out[0], 0.0, 0.0);
            assert_close(&out[1], 18.0, 0.0);
            assert_close(&out[2], 18.0, 9.0);
            assert_close(&out[3], 0.0, 9.0);
        }
    }

    #[test]
    fn axis_aligned_rectangle_scales_linearly() {
        let q = quad([[0.0, 0.0], [180.0, 0.0], [180.0, 90.0], [0.0, 90.0]]);
        let h = Homography::build(&q, 9.0, 18.0).unwrap();
        let out = h.transform(&[na::Point2::new(90.0, 45.0), na::Point2::new(-10.0, 100.0)]);

        assert_close(&out[0], 9.0, 4.5);
        // off-court points are not clamped
        assert_close(&out[1], -1.0, 10.0);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let h = Homography::build(&quad(PLACEHOLDER_QUAD), 9.0, 18.0).unwrap();
        assert!(h.transform(&[]).is_empty());
    }

    #[test]
    fn collinear_quad_fails() {
        let q = quad([[0.0, 0.0], [100.0, 0.0], [200.0, 0.0], [0.0, 50.0]]);
        assert!(matches!(
            Homography::build(&q, 9.0, 18.0),
            Err(Error::InvalidCalibration(_))
        ));

        let q = quad([[5.0, 5.0]; 4]);
        assert!(Homography::build(&q, 9.0, 18.0).is_err());
    }

    #[test]
    fn wrong_point_count_fails() {
        let q = quad(PLACEHOLDER_QUAD);
        assert!(Homography::build(&q[..3], 9.0, 18.0).is_err());
    }

    #[test]
    fn transformer_falls_back_visibly() {
        let three = Ok(quad(PLACEHOLDER_QUAD)[..3].to_vec());
        let vt = ViewTransformer::from_calibration(three, 9.0, 18.0);

        assert!(vt.is_fallback());
        assert!(vt.fallback_reason().unwrap().contains("expected 4 corners"));
        assert_eq!(vt.pixel_quad()[0], na::Point2::new(250.0, 400.0));

        let missing = ViewTransformer::from_file("/nonexistent/court_config.json", 9.0, 18.0);
        assert!(missing.is_fallback());

        let good = quad([[10.0, 10.0], [300.0, 12.0], [320.0, 200.0], [5.0, 190.0]]);
        let vt = ViewTransformer::from_calibration(Ok(good), 9.0, 18.0);
        assert!(!vt.is_fallback());
    }

    #[test]
    fn placeholder_keeps_the_given_court_size() {
        let missing = || Err(Error::InvalidCalibration("no court config".into()));

        let vt = ViewTransformer::from_calibration(missing(), 8.0, 16.0);
        let far = vt.transform_points(&[na::Point2::new(1300.0, 900.0)]);
        assert!((far[0].x - 16.0).abs() < 1e-3 && (far[0].y - 8.0).abs() < 1e-3, "{:?}", far);

        let zero = ViewTransformer::from_calibration(missing(), 0.0, 18.0);
        assert!(zero.is_fallback());
        let p = na::Point2::new(250.0, 400.0);
        assert_eq!(zero.transform_points(&[p]), vec![p]);
    }

    #[test]
    fn calibration_file_round_trip() {
        let path = std::env::temp_dir().join(format!("courtmap-calib-{}.json", std::process::id()));
        let q = quad([[10.0, 10.0], [300.0, 12.0], [320.0, 200.0], [5.0, 190.0]]);

        save_calibration(&path, &q, 9.0, 18.0).unwrap();
        assert_eq!(load_calibration(&path).unwrap(), q);

        let vt = ViewTransformer::from_file(&path, 9.0, 18.0);
        assert!(!vt.is_fallback());
        let _ = fs::remove_file(&path);

        let bad = quad([[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        assert!(save_calibration(&path, &bad, 9.0, 18.0).is_err());
    }
}
