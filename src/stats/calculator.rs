//! Statistics Calculator Module
//! Means, fixed-width histograms and hexagon density binning.

use crate::data::GeoPoint;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use std::collections::HashMap;

/// Metres per degree of latitude (mean value).
const METERS_PER_DEGREE_LAT: f64 = 110_540.0;
/// Metres per degree of longitude at the equator.
const METERS_PER_DEGREE_LON: f64 = 111_320.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Six-step yellow to red colour ramp used for density bins.
pub const DENSITY_COLOR_RANGE: [[u8; 3]; 6] = [
    [255, 255, 178],
    [254, 217, 118],
    [254, 178, 76],
    [253, 141, 60],
    [240, 59, 32],
    [189, 0, 38],
];

/// A single hexagonal density cell.
#[derive(Debug, Clone, PartialEq)]
pub struct HexBin {
    /// Axial coordinates of the cell.
    pub q: i64,
    pub r: i64,
    pub center: GeoPoint,
    /// Corner vertices, counter-clockwise from the east-north-east corner.
    pub corners: [GeoPoint; 6],
    pub count: usize,
    /// Extrusion height in metres after scaling.
    pub elevation: f64,
    pub color: [u8; 3],
}

/// Scaling applied to hexagon bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexScale {
    pub radius_m: f64,
    pub elevation_range: (f64, f64),
    pub elevation_scale: f64,
}

/// Handles statistical calculations for the dashboard views.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Arithmetic mean, or `None` for an empty input.
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.mean())
    }

    /// Count `values` into `bins` equal-width buckets over `[low, high)`.
    ///
    /// The last bucket is closed on the right, matching NumPy. Values outside
    /// the range are ignored.
    pub fn histogram(values: &[f64], bins: usize, low: f64, high: f64) -> Vec<usize> {
        let mut counts = vec![0usize; bins];
        if bins == 0 || high <= low {
            return counts;
        }
        let width = (high - low) / bins as f64;

        for &v in values {
            if !(low..=high).contains(&v) {
                continue;
            }
            let idx = (((v - low) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }
        counts
    }

    /// Aggregate points into pointy-top hexagons of `scale.radius_m` metres
    /// around `origin`. Bins are returned sorted by axial coordinates.
    pub fn hexagon_bins(points: &[GeoPoint], origin: GeoPoint, scale: HexScale) -> Vec<HexBin> {
        if points.is_empty() || scale.radius_m <= 0.0 {
            return Vec::new();
        }
        let lon_scale = METERS_PER_DEGREE_LON * origin.latitude.to_radians().cos();

        let counts: HashMap<(i64, i64), usize> = points
            .par_iter()
            .filter(|p| p.is_finite())
            .fold(HashMap::new, |mut acc, p| {
                let (x, y) = Self::local_meters(*p, origin);
                *acc.entry(Self::hex_round(x, y, scale.radius_m)).or_insert(0) += 1;
                acc
            })
            .reduce(HashMap::new, |mut a, b| {
                for (k, v) in b {
                    *a.entry(k).or_insert(0) += v;
                }
                a
            });

        let min = counts.values().copied().min().unwrap_or(0);
        let max = counts.values().copied().max().unwrap_or(0);

        let mut bins: Vec<HexBin> = counts
            .into_iter()
            .map(|((q, r), count)| {
                let (cx, cy) = Self::hex_center(q, r, scale.radius_m);
                let to_geo = |x: f64, y: f64| {
                    GeoPoint::new(
                        origin.latitude + y / METERS_PER_DEGREE_LAT,
                        origin.longitude + x / lon_scale,
                    )
                };
                let corners = std::array::from_fn(|i| {
                    let angle = (60.0 * i as f64 + 30.0).to_radians();
                    to_geo(
                        cx + scale.radius_m * angle.cos(),
                        cy + scale.radius_m * angle.sin(),
                    )
                });
                HexBin {
                    q,
                    r,
                    center: to_geo(cx, cy),
                    corners,
                    count,
                    elevation: Self::scale_elevation(count, min, max, scale),
                    color: Self::quantize_color(count, min, max),
                }
            })
            .collect();

        bins.sort_by_key(|b| (b.q, b.r));
        bins
    }

    /// Equirectangular offset of `point` from `origin` in metres (east, north).
    pub fn local_meters(point: GeoPoint, origin: GeoPoint) -> (f64, f64) {
        let lon_scale = METERS_PER_DEGREE_LON * origin.latitude.to_radians().cos();
        (
            (point.longitude - origin.longitude) * lon_scale,
            (point.latitude - origin.latitude) * METERS_PER_DEGREE_LAT,
        )
    }

    /// Linear map of `count` from `[min, max]` onto the elevation range.
    pub fn scale_elevation(count: usize, min: usize, max: usize, scale: HexScale) -> f64 {
        let (low, high) = scale.elevation_range;
        let t = if max > min {
            (count - min) as f64 / (max - min) as f64
        } else {
            1.0
        };
        (low + t * (high - low)) * scale.elevation_scale
    }

    /// Quantize `count` over `[min, max]` into the density colour ramp.
    pub fn quantize_color(count: usize, min: usize, max: usize) -> [u8; 3] {
        let steps = DENSITY_COLOR_RANGE.len();
        if max <= min {
            return DENSITY_COLOR_RANGE[steps - 1];
        }
        let t = (count.saturating_sub(min)) as f64 / (max - min) as f64;
        let idx = ((t * steps as f64).floor() as usize).min(steps - 1);
        DENSITY_COLOR_RANGE[idx]
    }

    fn hex_center(q: i64, r: i64, radius: f64) -> (f64, f64) {
        let x = radius * SQRT_3 * (q as f64 + r as f64 / 2.0);
        let y = radius * 1.5 * r as f64;
        (x, y)
    }

    /// Axial coordinates of the hexagon containing `(x, y)`.
    fn hex_round(x: f64, y: f64, radius: f64) -> (i64, i64) {
        let qf = (SQRT_3 / 3.0 * x - y / 3.0) / radius;
        let rf = (2.0 / 3.0 * y) / radius;
        let sf = -qf - rf;

        let mut q = qf.round();
        let mut r = rf.round();
        let s = sf.round();

        let dq = (q - qf).abs();
        let dr = (r - rf).abs();
        let ds = (s - sf).abs();

        if dq > dr && dq > ds {
            q = -r - s;
        } else if dr > ds {
            r = -q - s;
        }
        (q as i64, r as i64)
    }
}
