use locex_core::{cartesian_to_spherical, deg_to_rad, SphericalCoordinate, TargetGrid};

/// Stage azimuth 0 faces the viewer and 90 sits on their left.
pub const VIEW_AZIMUTH_OFFSET: f32 = 90.0;

pub const DEFAULT_YAW: f32 = 0.0;
pub const DEFAULT_PITCH: f32 = 20.0;

const MIN_ZOOM: f32 = 0.5;
const MAX_ZOOM: f32 = 3.0;
const MAX_PITCH: f32 = 89.0;

/// Fraction of the shorter window side covered by the sphere's radius at zoom 1.
const SPHERE_FILL: f32 = 0.38;

/// A point on screen plus its view-space depth. Positive depth faces the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

impl Projected {
    pub fn is_front(&self) -> bool {
        self.depth >= 0.0
    }
}

/// Orthographic orbit camera around the unit stage sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    yaw: f32,
    pitch: f32,
    zoom: f32,
    width: u32,
    height: u32,
}

impl OrbitCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            zoom: 1.0,
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Back to the viewing angle every trial starts from.
    pub fn reset(&mut self) {
        self.yaw = DEFAULT_YAW;
        self.pitch = DEFAULT_PITCH;
        self.zoom = 1.0;
    }

    /// Rotates the view by the given angles, in degrees.
    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        if !yaw_delta.is_finite() || !pitch_delta.is_finite() {
            return;
        }
        self.yaw = (self.yaw + yaw_delta).rem_euclid(360.0);
        self.pitch = (self.pitch + pitch_delta).clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn zoom_by(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 * 0.5, self.height as f32 * 0.5)
    }

    /// Screen pixels per world unit.
    pub fn scale(&self) -> f32 {
        self.width.min(self.height) as f32 * SPHERE_FILL * self.zoom
    }

    pub fn project_world(&self, point: [f32; 3]) -> Projected {
        let [x, y, z] = point;
        let (sy, cy) = deg_to_rad(self.yaw).sin_cos();
        let (sp, cp) = deg_to_rad(self.pitch).sin_cos();

        let x1 = x * cy + z * sy;
        let z1 = -x * sy + z * cy;
        let y2 = y * cp - z1 * sp;
        let z2 = y * sp + z1 * cp;

        let (cx, cyy) = self.center();
        let scale = self.scale();
        Projected {
            x: cx + x1 * scale,
            y: cyy - y2 * scale,
            depth: z2,
        }
    }

    /// Where a stage direction lands on screen, `radius` in world units.
    pub fn project(&self, coord: SphericalCoordinate, radius: f32) -> Projected {
        let shown = SphericalCoordinate::new(coord.azimuth + VIEW_AZIMUTH_OFFSET, coord.elevation);
        self.project_world(shown.to_cartesian(radius))
    }

    /// The stage direction under a screen point, if it hits the front of the sphere.
    pub fn unproject(&self, screen_x: f32, screen_y: f32) -> Option<SphericalCoordinate> {
        let (cx, cy) = self.center();
        let scale = self.scale();
        if scale <= 0.0 {
            return None;
        }
        let x1 = (screen_x - cx) / scale;
        let y2 = -(screen_y - cy) / scale;
        let planar = x1 * x1 + y2 * y2;
        if !planar.is_finite() || planar > 1.0 {
            return None;
        }
        let z2 = (1.0 - planar).sqrt();

        let (sy, cyaw) = deg_to_rad(self.yaw).sin_cos();
        let (sp, cp) = deg_to_rad(self.pitch).sin_cos();
        let y = y2 * cp + z2 * sp;
        let z1 = -y2 * sp + z2 * cp;
        let x = x1 * cyaw - z1 * sy;
        let z = x1 * sy + z1 * cyaw;

        let (_, shown) = cartesian_to_spherical([x, y, z]);
        if shown.is_pole() {
            return Some(shown);
        }
        Some(SphericalCoordinate::new(
            shown.azimuth - VIEW_AZIMUTH_OFFSET,
            shown.elevation,
        ))
    }

    /// Nearest front-facing grid target within `tolerance` pixels of the pointer.
    pub fn pick(
        &self,
        grid: &TargetGrid,
        screen_x: f32,
        screen_y: f32,
        tolerance: f32,
    ) -> Option<SphericalCoordinate> {
        let limit = tolerance * tolerance;
        grid.targets()
            .into_iter()
            .filter_map(|target| {
                let p = self.project(target, 1.0);
                if !p.is_front() {
                    return None;
                }
                let dx = p.x - screen_x;
                let dy = p.y - screen_y;
                let dist = dx * dx + dy * dy;
                (dist <= limit).then_some((target, dist))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(target, _)| target)
    }
}
