use glam::DVec2;

/// Robinson table: relative parallel length and distance from equator, every 5° of latitude
const ROBINSON_X: [f64; 19] = [
    1.0000, 0.9986, 0.9954, 0.9900, 0.9822, 0.9730, 0.9600, 0.9427, 0.9216, 0.8962, 0.8679,
    0.8350, 0.7986, 0.7597, 0.7186, 0.6732, 0.6213, 0.5722, 0.5322,
];
const ROBINSON_Y: [f64; 19] = [
    0.0000, 0.0620, 0.1240, 0.1860, 0.2480, 0.3100, 0.3720, 0.4340, 0.4958, 0.5571, 0.6176,
    0.6769, 0.7346, 0.7903, 0.8435, 0.8936, 0.9394, 0.9761, 1.0000,
];
const ROBINSON_XSCALE: f64 = 0.8487;
const ROBINSON_YSCALE: f64 = 1.3523;

/// Half extents of the projected world on the unit sphere
pub const HALF_WIDTH: f64 = ROBINSON_XSCALE * std::f64::consts::PI;
pub const HALF_HEIGHT: f64 = ROBINSON_YSCALE;

/// Longitude relative to `central_lon`, in [-180, 180)
#[inline(always)]
pub fn relative_lon(lon: f64, central_lon: f64) -> f64 {
    (lon - central_lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Robinson projection of a longitude already relative to the central meridian.
/// Values outside [-180, 180] are clamped onto the map edge.
pub fn robinson(rel_lon: f64, lat: f64) -> DVec2 {
    let lat = lat.clamp(-90.0, 90.0);
    let abs_lat = lat.abs();
    let i = ((abs_lat / 5.0) as usize).min(17);
    let t = (abs_lat - i as f64 * 5.0) / 5.0;

    let x_factor = ROBINSON_X[i] + (ROBINSON_X[i + 1] - ROBINSON_X[i]) * t;
    let y_factor = ROBINSON_Y[i] + (ROBINSON_Y[i + 1] - ROBINSON_Y[i]) * t;

    DVec2::new(
        ROBINSON_XSCALE * x_factor * rel_lon.clamp(-180.0, 180.0).to_radians(),
        ROBINSON_YSCALE * y_factor * lat.signum(),
    )
}

/// Split a ring into drawable copies that do not cross the projection seam.
///
/// Longitudes are made continuous (no jump over 180°) relative to the central
/// meridian. A ring that then extends past either edge gets a second copy
/// shifted by 360°, and both are clamped onto the edge.
pub fn unwrap_ring(ring: &[(f64, f64)], central_lon: f64) -> Vec<Vec<(f64, f64)>> {
    let mut unwrapped: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
    let mut prev: Option<f64> = None;
    for &(lon, lat) in ring {
        let mut rel = relative_lon(lon, central_lon);
        if let Some(p) = prev {
            while rel - p > 180.0 {
                rel -= 360.0;
            }
            while p - rel > 180.0 {
                rel += 360.0;
            }
        }
        prev = Some(rel);
        unwrapped.push((rel, lat));
    }

    let (min, max) = unwrapped
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(lon, _)| {
            (lo.min(lon), hi.max(lon))
        });

    let mut copies = Vec::with_capacity(2);
    if unwrapped.is_empty() {
        return copies;
    }
    let mut push_shifted = |shift: f64| {
        copies.push(
            unwrapped
                .iter()
                .map(|&(lon, lat)| ((lon + shift).clamp(-180.0, 180.0), lat))
                .collect(),
        );
    };

    push_shifted(0.0);
    if min < -180.0 {
        push_shifted(360.0);
    }
    if max > 180.0 {
        push_shifted(-360.0);
    }
    copies
}

/// Pixel frame holding the whole Robinson world, centred and aspect-preserving
#[derive(Clone, Debug)]
pub struct Viewport {
    /// Central meridian in degrees
    pub central_lon: f64,
    /// Pixel position of (central_lon, 0°)
    center: DVec2,
    /// Pixels per projected unit
    scale: f64,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    /// Fit the world into the frame at (`left`, `top`) of size `width` x `height`
    pub fn fit(central_lon: f64, left: i32, top: i32, width: usize, height: usize) -> Self {
        let scale = (width as f64 / (2.0 * HALF_WIDTH)).min(height as f64 / (2.0 * HALF_HEIGHT));
        let center = DVec2::new(
            left as f64 + width as f64 / 2.0,
            top as f64 + height as f64 / 2.0,
        );
        Self {
            central_lon,
            center,
            scale,
            width,
            height,
        }
    }

    /// Projected map size in pixels
    pub fn map_size(&self) -> (f64, f64) {
        (2.0 * HALF_WIDTH * self.scale, 2.0 * HALF_HEIGHT * self.scale)
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        self.project_relative(relative_lon(lon, self.central_lon), lat)
    }

    /// Project with longitude already relative to the central meridian
    pub fn project_relative(&self, rel_lon: f64, lat: f64) -> (i32, i32) {
        let p = robinson(rel_lon, lat);
        let px = self.center.x + p.x * self.scale;
        let py = self.center.y - p.y * self.scale;
        (px.round() as i32, py.round() as i32)
    }

    /// Closed boundary of the projected world, sampled every degree of latitude
    pub fn outline(&self) -> Vec<(i32, i32)> {
        let east = (-90..=90).map(|lat| self.project_relative(180.0, lat as f64));
        let west = (-90..=90).rev().map(|lat| self.project_relative(-180.0, lat as f64));
        let mut points: Vec<(i32, i32)> = east.chain(west).collect();
        if let Some(&first) = points.first() {
            points.push(first);
        }
        points
    }
}
