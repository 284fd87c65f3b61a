// Re-export glam for convenience
pub use glam::*;

// mvgen math types
mod aabb;
mod camera;
mod interval;
pub use aabb::Aabb;
pub use camera::Camera;
pub use interval::Interval;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_vec3_from_array() {
        let v = Vec3::from([4.0, 5.0, 6.0]);
        assert_eq!(v.to_array(), [4.0, 5.0, 6.0]);
    }
}
