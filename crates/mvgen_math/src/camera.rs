use glam::{Mat4, Vec3};

/// Pinhole camera aimed at a target, used to project preview renders.
///
/// The scene is Z-up, matching the host the datasets are generated for.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Self::pick_up(position, target),
            fov_y: 45.0_f32.to_radians(),
            aspect,
            near: 0.01,
            far: 1000.0,
        }
    }

    /// Camera at `position` looking at the world origin.
    pub fn looking_at_origin(position: Vec3, aspect: f32) -> Self {
        Self::new(position, Vec3::ZERO, aspect)
    }

    // Z-up unless the view direction is (nearly) vertical.
    fn pick_up(position: Vec3, target: Vec3) -> Vec3 {
        let forward = (target - position).normalize_or_zero();
        if forward.cross(Vec3::Z).length_squared() < 1e-6 {
            Vec3::Y
        } else {
            Vec3::Z
        }
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project a world-space point to pixel coordinates.
    ///
    /// Returns `(x, y, depth)` with the origin at the top-left pixel, or
    /// `None` when the point is behind the camera or outside the frustum.
    pub fn project(&self, point: Vec3, width: u32, height: u32) -> Option<(f32, f32, f32)> {
        let clip = self.view_projection_matrix() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let x = (ndc.x * 0.5 + 0.5) * width as f32;
        let y = (1.0 - (ndc.y * 0.5 + 0.5)) * height as f32;
        Some((x, y, ndc.z))
    }
}
