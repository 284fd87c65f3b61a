//! Host-free [`RenderCapability`] that works on OBJ assets.
//!
//! Meshes are loaded with `tobj`, normalized into the environment cube and
//! exported back to OBJ. Renders are point-splat previews: each triangle is
//! sampled on a barycentric grid finer than a pixel, projected through a
//! pinhole camera aimed at the origin, depth-tested and written as
//! `<style>.png`.
//!
//! Styles:
//! - `normal`: surface normal mapped to RGB
//! - `depth`: distance to the camera, near is bright
//! - anything else: Lambert shading from the scene lights

use std::collections::{BTreeMap, HashMap};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::process::Command;

use mvgen_core::{Light, Material, Mesh, Object, Render, Viewpoint};
use mvgen_math::{Camera, Interval, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::capability::{CapabilityError, CapabilityResult, LightParams, RenderCapability, Shots};
use crate::sampling::{materialize_light, materialize_viewpoints, RealizedLight};

/// Linear RGB
pub type Color = Vec3;

/// Resolution used until `set_render_resolution` is called.
pub const DEFAULT_RESOLUTION: (u32, u32) = (128, 128);

const AMBIENT: f32 = 0.05;

/// Barycentric subdivisions per triangle edge when a vertex falls
/// outside the frustum and the projected size is unknown.
const FALLBACK_SPLAT_STEPS: u32 = 16;

const MAX_SPLAT_STEPS: u32 = 512;

/// Largest framebuffer the preview renderer allocates (8192 x 8192).
pub const MAX_PIXELS: usize = 1 << 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(usize);

/// Handles are issued in increasing order, so iterating lights by handle
/// visits them in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightHandle(usize);

/// Flat surface color derived from an object's material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTint(pub Color);

struct LoadedObject {
    name: String,
    mesh: Mesh,
    tint: Color,
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

/// Convert sRGB byte value to linear float.
fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Color buffer with a depth buffer alongside.
struct Framebuffer {
    width: u32,
    height: u32,
    color: Vec<Color>,
    depth: Vec<f32>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> CapabilityResult<Self> {
        let size = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            color: vec![Color::ZERO; size],
            depth: vec![f32::INFINITY; size],
        })
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Write `color` at `(x, y)` if it is nearer than what is there.
    fn splat(&mut self, x: f32, y: f32, depth: f32, color: Color) {
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (px, py) = (x as u32, y as u32);
        if px >= self.width || py >= self.height {
            return;
        }
        let i = self.index(px, py);
        if depth < self.depth[i] {
            self.depth[i] = depth;
            self.color[i] = color;
        }
    }

    fn covered(&self) -> usize {
        self.depth.iter().filter(|d| d.is_finite()).count()
    }

    fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            image::Rgba(color_to_rgba(self.color[self.index(x, y)]))
        })
    }
}

fn pixel_count(width: u32, height: u32) -> CapabilityResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .filter(|&size| size <= MAX_PIXELS)
        .ok_or(CapabilityError::ResolutionTooLarge { width, height })
}

/// Subdivisions that put samples at most half a pixel apart, so every pixel
/// the triangle covers receives at least one sample.
fn splat_steps(camera: &Camera, corners: [Vec3; 3], width: u32, height: u32) -> u32 {
    let projected = corners.map(|p| camera.project(p, width, height));
    let [Some(a), Some(b), Some(c)] = projected else {
        return FALLBACK_SPLAT_STEPS;
    };
    let edge = |p: (f32, f32, f32), q: (f32, f32, f32)| (p.0 - q.0).hypot(p.1 - q.1);
    let longest = edge(a, b).max(edge(b, c)).max(edge(c, a));
    ((2.0 * longest).ceil() as u32 + 1).clamp(1, MAX_SPLAT_STEPS)
}

/// File name for a style's artifact.
fn artifact_name(style: &str) -> String {
    let stem: String = style
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "render.png".to_string()
    } else {
        format!("{stem}.png")
    }
}

/// OBJ-backed scene with a software preview renderer.
pub struct HeadlessCapability {
    rng: StdRng,
    asset_root: Option<PathBuf>,
    open_output: bool,

    next_id: usize,
    objects: HashMap<ObjectHandle, LoadedObject>,
    active: Option<ObjectHandle>,
    cameras: HashMap<CameraHandle, Vec3>,
    camera: Option<CameraHandle>,
    lights: BTreeMap<LightHandle, RealizedLight>,
    resolution: (u32, u32),
}

impl HeadlessCapability {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            asset_root: None,
            open_output: false,
            next_id: 0,
            objects: HashMap::new(),
            active: None,
            cameras: HashMap::new(),
            camera: None,
            lights: BTreeMap::new(),
            resolution: DEFAULT_RESOLUTION,
        }
    }

    /// Resolve relative asset and texture paths against `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Open the output directory in the file browser when the run ends.
    pub fn with_open_output(mut self, open: bool) -> Self {
        self.open_output = open;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.asset_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn object(&self, handle: ObjectHandle) -> CapabilityResult<&LoadedObject> {
        self.objects.get(&handle).ok_or(CapabilityError::UnknownHandle {
            kind: "object",
            id: handle.0,
        })
    }

    fn light(&self, handle: LightHandle) -> CapabilityResult<&RealizedLight> {
        self.lights.get(&handle).ok_or(CapabilityError::UnknownHandle {
            kind: "light",
            id: handle.0,
        })
    }

    /// Mean linear color of an image file.
    fn average_texture_color(&self, path: &str) -> CapabilityResult<Color> {
        let path = self.resolve(Path::new(path));
        let rgba = image::open(&path)?.to_rgba8();

        let mut sum = Color::ZERO;
        for p in rgba.pixels() {
            sum += Color::new(srgb_to_linear(p[0]), srgb_to_linear(p[1]), srgb_to_linear(p[2]));
        }
        let count = (rgba.width() as usize * rgba.height() as usize).max(1) as f32;
        Ok(sum / count)
    }

    fn shade(
        &self,
        style: &str,
        point: Vec3,
        normal: Vec3,
        eye: Vec3,
        tint: Color,
        depth_range: Interval,
    ) -> Color {
        match style {
            "normal" => normal * 0.5 + Vec3::splat(0.5),
            "depth" => {
                let t = (point.distance(eye) - depth_range.min) / depth_range.size().max(1e-6);
                Color::splat(1.0 - t.clamp(0.0, 1.0))
            }
            _ => {
                let mut color = tint * AMBIENT;
                for light in self.lights.values() {
                    let to_light = light.location - point;
                    let distance_sq = to_light.length_squared().max(1e-6);
                    let lambert = normal.dot(to_light.normalize()).max(0.0);
                    let intensity = (light.energy / (4.0 * PI * distance_sq)).min(1.0);
                    let light_color = Color::from_array(light.color.map(|c| c as f32 / 255.0));
                    color += tint * light_color * lambert * intensity;
                }
                color
            }
        }
    }
}

impl RenderCapability for HeadlessCapability {
    type Object = ObjectHandle;
    type Camera = CameraHandle;
    type Light = LightHandle;
    type Texture = SurfaceTint;

    fn load_object(
        &mut self,
        object: &Object,
        environment_size: u32,
    ) -> CapabilityResult<ObjectHandle> {
        let path = self.resolve(&object.path);
        let mut mesh = Mesh::load_obj(&path)?;
        if object.normalize {
            mesh.normalize_into_cube(environment_size as f32);
        }
        log::debug!(
            "Loaded {:?}: {} vertices, {} triangles",
            object.name,
            mesh.vertex_count(),
            mesh.triangle_count()
        );

        let handle = ObjectHandle(self.next_id());
        self.objects.insert(
            handle,
            LoadedObject {
                name: object.name.clone(),
                mesh,
                tint: Color::splat(0.8),
            },
        );
        Ok(handle)
    }

    fn select_object(&mut self, object: &ObjectHandle) -> CapabilityResult<()> {
        self.object(*object)?;
        self.active = Some(*object);
        Ok(())
    }

    fn load_material(&mut self, object: &ObjectHandle, material: &Material) -> CapabilityResult<()> {
        let loaded = self
            .objects
            .get_mut(object)
            .ok_or(CapabilityError::UnknownHandle {
                kind: "object",
                id: object.0,
            })?;
        if let Some(color) = material.diffuse_color() {
            loaded.tint = Color::from_array(color);
        }
        Ok(())
    }

    fn export_normalized_object(&mut self, path: &Path) -> CapabilityResult<()> {
        let active = self.active.ok_or(CapabilityError::NoObjectLoaded)?;
        let loaded = self.object(active)?;
        loaded.mesh.write_obj(path)?;
        log::debug!("Exported {:?} to {}", loaded.name, path.display());
        Ok(())
    }

    fn define_texture(&mut self, object: &Object) -> CapabilityResult<Option<SurfaceTint>> {
        let Some(material) = &object.material else {
            return Ok(None);
        };
        if let Some(texture) = material.texture() {
            return Ok(Some(SurfaceTint(self.average_texture_color(texture)?)));
        }
        Ok(material
            .diffuse_color()
            .map(|c| SurfaceTint(Color::from_array(c))))
    }

    fn create_camera(&mut self) -> CapabilityResult<CameraHandle> {
        let handle = CameraHandle(self.next_id());
        self.cameras.insert(handle, Vec3::new(0.0, -5.0, 0.0));
        self.camera = Some(handle);
        Ok(handle)
    }

    fn create_viewpoints(
        &mut self,
        viewpoints: &[Viewpoint],
        preview: bool,
    ) -> CapabilityResult<Vec<Shots>> {
        Ok(materialize_viewpoints(viewpoints, preview, &mut self.rng))
    }

    fn move_camera_to(&mut self, camera: &CameraHandle, coords: Vec3) -> CapabilityResult<()> {
        let position = self
            .cameras
            .get_mut(camera)
            .ok_or(CapabilityError::UnknownHandle {
                kind: "camera",
                id: camera.0,
            })?;
        *position = coords;
        Ok(())
    }

    fn create_light(&mut self, light: &Light) -> CapabilityResult<LightHandle> {
        let realized = materialize_light(light, &mut self.rng);
        let handle = LightHandle(self.next_id());
        self.lights.insert(handle, realized);
        Ok(handle)
    }

    fn set_light_energy(&mut self, light: &LightHandle, energy: f32) -> CapabilityResult<()> {
        let realized = self
            .lights
            .get_mut(light)
            .ok_or(CapabilityError::UnknownHandle {
                kind: "light",
                id: light.0,
            })?;
        realized.energy = energy;
        Ok(())
    }

    fn light_energy(&self, light: &LightHandle) -> CapabilityResult<f32> {
        Ok(self.light(*light)?.energy)
    }

    fn get_light_params(&self, light: &LightHandle) -> CapabilityResult<LightParams> {
        Ok(self.light(*light)?.params())
    }

    fn clear_lights(&mut self) -> CapabilityResult<()> {
        self.lights.clear();
        Ok(())
    }

    fn clear_objects(&mut self) -> CapabilityResult<()> {
        self.objects.clear();
        self.active = None;
        Ok(())
    }

    fn set_render_resolution(&mut self, render: &Render) -> CapabilityResult<()> {
        pixel_count(render.resolution_x, render.resolution_y)?;
        self.resolution = (render.resolution_x, render.resolution_y);
        Ok(())
    }

    fn render(
        &mut self,
        output_dir: &Path,
        style: &str,
        texture: Option<&SurfaceTint>,
        object: &ObjectHandle,
    ) -> CapabilityResult<()> {
        let loaded = self.objects.get(object).ok_or(CapabilityError::NoObjectLoaded)?;
        let eye = self
            .camera
            .and_then(|handle| self.cameras.get(&handle))
            .copied()
            .ok_or(CapabilityError::NoCamera)?;

        let (width, height) = self.resolution;
        let camera = Camera::looking_at_origin(eye, width as f32 / height as f32);
        let tint = texture.map_or(loaded.tint, |t| t.0);

        let mesh = &loaded.mesh;
        let radius = mesh.bounds.extent().length() / 2.0;
        let center_distance = mesh.center().distance(eye);
        let depth_range = Interval::new(center_distance - radius, center_distance + radius);

        let mut frame = Framebuffer::new(width, height)?;
        for face in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [face[0], face[1], face[2]].map(|i| mesh.positions[i as usize]);
            let mut normal = (b - a).cross(c - a).normalize_or_zero();
            // Two-sided: face the camera
            if normal.dot(eye - a) < 0.0 {
                normal = -normal;
            }

            let steps = splat_steps(&camera, [a, b, c], width, height);
            for i in 0..=steps {
                for j in 0..=(steps - i) {
                    let u = i as f32 / steps as f32;
                    let v = j as f32 / steps as f32;
                    let point = a + (b - a) * u + (c - a) * v;

                    if let Some((x, y, depth)) = camera.project(point, width, height) {
                        let color = self.shade(style, point, normal, eye, tint, depth_range);
                        frame.splat(x, y, depth, color);
                    }
                }
            }
        }

        let path = output_dir.join(artifact_name(style));
        frame.to_image().save(&path)?;
        log::debug!(
            "Rendered {:?} ({}) to {}: {} of {} pixels covered",
            loaded.name,
            style,
            path.display(),
            frame.covered(),
            width * height
        );
        Ok(())
    }

    fn reveal_output(&mut self, output_dir: &Path) -> CapabilityResult<()> {
        if !self.open_output {
            return Ok(());
        }
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        Command::new(opener).arg(output_dir).spawn()?;
        Ok(())
    }
}
