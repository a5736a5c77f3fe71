use serde::{Deserialize, Serialize};

/// A direction on the unit sphere, in degrees.
///
/// Azimuth is measured in the horizontal plane and kept in `[0, 360)`.
/// Elevation is measured up from the horizontal plane and kept in `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalCoordinate {
    pub azimuth: f32,
    pub elevation: f32,
}

impl SphericalCoordinate {
    /// Sentinel used when a sample's ground truth cannot be found.
    pub const ORIGIN: SphericalCoordinate = SphericalCoordinate {
        azimuth: 0.0,
        elevation: 0.0,
    };

    pub fn new(azimuth: f32, elevation: f32) -> Self {
        Self {
            azimuth: normalize_azimuth(azimuth),
            elevation: elevation.clamp(-90.0, 90.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.azimuth.is_finite() && self.elevation.is_finite()
    }

    /// True when both angles already sit in their canonical ranges.
    pub fn is_normalized(&self) -> bool {
        self.is_finite()
            && (0.0..360.0).contains(&self.azimuth)
            && (-90.0..=90.0).contains(&self.elevation)
    }

    pub fn is_pole(&self) -> bool {
        self.elevation.abs() >= 90.0
    }

    pub fn to_cartesian(&self, radius: f32) -> [f32; 3] {
        spherical_to_cartesian(radius, self.azimuth, self.elevation)
    }
}

pub fn deg_to_rad(angle: f32) -> f32 {
    angle * (std::f32::consts::PI / 180.0)
}

pub fn rad_to_deg(angle: f32) -> f32 {
    angle * (180.0 / std::f32::consts::PI)
}

/// Wraps any finite azimuth into `[0, 360)`.
pub fn normalize_azimuth(azimuth: f32) -> f32 {
    let wrapped = azimuth.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// `x = r·cos(el)·cos(az)`, `y = r·sin(el)`, `z = r·cos(el)·sin(az)`.
///
/// `y` is up. The stage renders with this exact mapping and picking inverts
/// it with [`cartesian_to_spherical`], so the two must never diverge.
pub fn spherical_to_cartesian(radius: f32, azimuth_deg: f32, elevation_deg: f32) -> [f32; 3] {
    let azimuth = deg_to_rad(azimuth_deg);
    let elevation = deg_to_rad(elevation_deg);

    let horizontal = radius * elevation.cos();
    let y = radius * elevation.sin();

    let x = horizontal * azimuth.cos();
    let z = horizontal * azimuth.sin();

    [x, y, z]
}

/// Inverse of [`spherical_to_cartesian`].
///
/// Returns the radius and the normalized direction. On the vertical axis the
/// azimuth is undefined and reported as 0; the zero vector maps to
/// [`SphericalCoordinate::ORIGIN`] with radius 0.
pub fn cartesian_to_spherical(point: [f32; 3]) -> (f32, SphericalCoordinate) {
    let [x, y, z] = point;
    let radius = (x * x + y * y + z * z).sqrt();
    if radius < f32::MIN_POSITIVE {
        return (0.0, SphericalCoordinate::ORIGIN);
    }

    let horizontal = (x * x + z * z).sqrt();
    let elevation = rad_to_deg(y.atan2(horizontal));
    let azimuth = if horizontal <= radius * 1e-6 {
        0.0
    } else {
        rad_to_deg(z.atan2(x))
    };

    (radius, SphericalCoordinate::new(azimuth, elevation))
}

/// Great-circle distance between two directions, in degrees.
pub fn angular_distance(a: SphericalCoordinate, b: SphericalCoordinate) -> f32 {
    let [ax, ay, az] = a.to_cartesian(1.0);
    let [bx, by, bz] = b.to_cartesian(1.0);
    let dot = ax * bx + ay * by + az * bz;
    let cross = [ay * bz - az * by, az * bx - ax * bz, ax * by - ay * bx];
    let cross_len = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
    rad_to_deg(cross_len.atan2(dot))
}

/// The discrete set of directions a participant can pick on the stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGrid {
    pub azimuth_divisions: u32,
    pub elevation_divisions: u32,
}

impl Default for TargetGrid {
    fn default() -> Self {
        Self {
            azimuth_divisions: 24,
            elevation_divisions: 12,
        }
    }
}

impl TargetGrid {
    pub fn azimuth_step(&self) -> f32 {
        360.0 / self.azimuth_divisions.max(1) as f32
    }

    pub fn elevation_step(&self) -> f32 {
        180.0 / self.elevation_divisions.max(1) as f32
    }

    pub fn azimuth_angles(&self) -> impl Iterator<Item = f32> + '_ {
        let step = self.azimuth_step();
        (0..self.azimuth_divisions.max(1)).map(move |i| i as f32 * step)
    }

    pub fn elevation_angles(&self) -> impl Iterator<Item = f32> + '_ {
        let step = self.elevation_step();
        (0..=self.elevation_divisions.max(1)).map(move |i| i as f32 * step - 90.0)
    }

    /// Every pickable direction. The poles appear once, at azimuth 0.
    pub fn targets(&self) -> Vec<SphericalCoordinate> {
        let mut out = Vec::new();
        for azimuth in self.azimuth_angles() {
            for elevation in self.elevation_angles() {
                if elevation.abs() >= 90.0 && azimuth != 0.0 {
                    continue;
                }
                out.push(SphericalCoordinate { azimuth, elevation });
            }
        }
        out
    }

    /// Nearest grid target to `coord` on the sphere.
    pub fn snap(&self, coord: SphericalCoordinate) -> SphericalCoordinate {
        self.targets()
            .into_iter()
            .min_by(|a, b| {
                angular_distance(*a, coord).total_cmp(&angular_distance(*b, coord))
            })
            .unwrap_or(SphericalCoordinate::ORIGIN)
    }

    pub fn contains(&self, coord: SphericalCoordinate) -> bool {
        self.targets().iter().any(|t| {
            (t.azimuth - coord.azimuth).abs() < 1e-3 && (t.elevation - coord.elevation).abs() < 1e-3
        })
    }
}
