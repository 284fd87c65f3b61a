//! The scene-manipulation surface the generator drives.
//!
//! The generator never touches a scene itself. Everything that loads
//! assets, places cameras and lights, or produces images goes through a
//! [`RenderCapability`]. Handles returned by one call are passed back to
//! later calls; their meaning is private to the implementation.
//!
//! Implementations in this crate:
//!
//! - [`crate::HeadlessCapability`]: loads OBJ assets and writes preview PNGs
//! - [`crate::MockCapability`]: deterministic in-memory double for tests

use std::path::Path;

use mvgen_core::{Light, Material, MeshError, Object, Render, Viewpoint};
use mvgen_math::Vec3;
use thiserror::Error;

/// Lazily materialized camera positions of one viewpoint.
pub type Shots = Box<dyn Iterator<Item = Vec3> + Send>;

/// Errors raised by a capability call.
///
/// The generator never retries; any of these aborts the run.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("No object is loaded")]
    NoObjectLoaded,

    #[error("No camera has been placed")]
    NoCamera,

    #[error("Unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: usize },

    #[error("Render resolution {width}x{height} is too large")]
    ResolutionTooLarge { width: u32, height: u32 },

    #[error("Host error: {0}")]
    Host(String),

    #[error("Injected failure on {0}")]
    Injected(String),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Realized placement and color of a light, as recorded in the metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub location: Vec3,
    pub color: [u8; 3],
}

impl LightParams {
    pub fn new(location: Vec3, color: [u8; 3]) -> Self {
        Self { location, color }
    }

    /// `(x, y, z, r, g, b)` in metadata column order.
    pub fn to_row(&self) -> [f32; 6] {
        let [r, g, b] = self.color;
        [
            self.location.x,
            self.location.y,
            self.location.z,
            r as f32,
            g as f32,
            b as f32,
        ]
    }
}

/// Scene operations required by [`crate::DatasetsGenerator`].
///
/// The scene is one shared, mutable graph: calls are made strictly in
/// sequence from a single thread and never concurrently.
pub trait RenderCapability {
    /// A loaded asset
    type Object;
    /// A camera that can be moved between shots
    type Camera;
    /// An instantiated light with a queryable energy
    type Light;
    /// A texture applied when rendering
    type Texture;

    /// Load an asset into the scene, normalizing it into a cube of
    /// `environment_size` when `object.normalize` is set.
    fn load_object(
        &mut self,
        object: &Object,
        environment_size: u32,
    ) -> CapabilityResult<Self::Object>;

    /// Make a loaded object the active selection.
    fn select_object(&mut self, object: &Self::Object) -> CapabilityResult<()>;

    /// Apply a surface material to a loaded object.
    fn load_material(&mut self, object: &Self::Object, material: &Material)
        -> CapabilityResult<()>;

    /// Export the active (normalized) object to `path`.
    fn export_normalized_object(&mut self, path: &Path) -> CapabilityResult<()>;

    /// Texture to render `object` with, if any.
    fn define_texture(&mut self, object: &Object) -> CapabilityResult<Option<Self::Texture>>;

    fn create_camera(&mut self) -> CapabilityResult<Self::Camera>;

    /// One shot sequence per viewpoint, in order.
    ///
    /// With `preview` set every sequence yields exactly one position.
    fn create_viewpoints(
        &mut self,
        viewpoints: &[Viewpoint],
        preview: bool,
    ) -> CapabilityResult<Vec<Shots>>;

    fn move_camera_to(&mut self, camera: &Self::Camera, coords: Vec3) -> CapabilityResult<()>;

    /// Instantiate a light, materializing its location and color.
    fn create_light(&mut self, light: &Light) -> CapabilityResult<Self::Light>;

    fn set_light_energy(&mut self, light: &Self::Light, energy: f32) -> CapabilityResult<()>;

    fn light_energy(&self, light: &Self::Light) -> CapabilityResult<f32>;

    /// Realized location and color of an instantiated light.
    fn get_light_params(&self, light: &Self::Light) -> CapabilityResult<LightParams>;

    /// Remove every instantiated light. Idempotent.
    fn clear_lights(&mut self) -> CapabilityResult<()>;

    /// Remove every loaded object. Idempotent.
    fn clear_objects(&mut self) -> CapabilityResult<()>;

    fn set_render_resolution(&mut self, render: &Render) -> CapabilityResult<()>;

    /// Render the current scene into `output_dir` (one artifact).
    fn render(
        &mut self,
        output_dir: &Path,
        style: &str,
        texture: Option<&Self::Texture>,
        object: &Self::Object,
    ) -> CapabilityResult<()>;

    /// Show the finished dataset to the user. Best effort.
    fn reveal_output(&mut self, _output_dir: &Path) -> CapabilityResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_params_row_order() {
        let params = LightParams::new(Vec3::new(1.0, -2.0, 3.5), [255, 0, 7]);
        assert_eq!(params.to_row(), [1.0, -2.0, 3.5, 255.0, 0.0, 7.0]);
    }
}
