//! Deterministic in-memory [`RenderCapability`] for tests.
//!
//! Every call is recorded as a [`Call`]. Renders write a small text
//! artifact named `<style>.mock` so directory layouts can be checked, and
//! any call kind can be told to fail on its n-th invocation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use mvgen_core::{Light, Material, Mesh, Object, Render, Viewpoint};
use mvgen_math::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::capability::{CapabilityError, CapabilityResult, LightParams, RenderCapability, Shots};
use crate::sampling::{materialize_light, materialize_viewpoints, RealizedLight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub usize);

/// The kind of a recorded call, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    LoadObject,
    SelectObject,
    LoadMaterial,
    ExportNormalizedObject,
    DefineTexture,
    CreateCamera,
    CreateViewpoints,
    MoveCameraTo,
    CreateLight,
    SetLightEnergy,
    GetLightParams,
    ClearLights,
    ClearObjects,
    SetRenderResolution,
    Render,
    RevealOutput,
}

impl CallKind {
    pub fn name(self) -> &'static str {
        match self {
            CallKind::LoadObject => "load_object",
            CallKind::SelectObject => "select_object",
            CallKind::LoadMaterial => "load_material",
            CallKind::ExportNormalizedObject => "export_normalized_object",
            CallKind::DefineTexture => "define_texture",
            CallKind::CreateCamera => "create_camera",
            CallKind::CreateViewpoints => "create_viewpoints",
            CallKind::MoveCameraTo => "move_camera_to",
            CallKind::CreateLight => "create_light",
            CallKind::SetLightEnergy => "set_light_energy",
            CallKind::GetLightParams => "get_light_params",
            CallKind::ClearLights => "clear_lights",
            CallKind::ClearObjects => "clear_objects",
            CallKind::SetRenderResolution => "set_render_resolution",
            CallKind::Render => "render",
            CallKind::RevealOutput => "reveal_output",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded capability call and its salient arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    LoadObject { name: String, environment_size: u32 },
    SelectObject(ObjectId),
    LoadMaterial(ObjectId),
    ExportNormalizedObject(PathBuf),
    DefineTexture(String),
    CreateCamera,
    CreateViewpoints { count: usize, preview: bool },
    MoveCameraTo(Vec3),
    CreateLight,
    SetLightEnergy(f32),
    GetLightParams(LightId),
    ClearLights,
    ClearObjects,
    SetRenderResolution { x: u32, y: u32 },
    Render {
        dir: PathBuf,
        style: String,
        textured: bool,
    },
    RevealOutput(PathBuf),
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::LoadObject { .. } => CallKind::LoadObject,
            Call::SelectObject(_) => CallKind::SelectObject,
            Call::LoadMaterial(_) => CallKind::LoadMaterial,
            Call::ExportNormalizedObject(_) => CallKind::ExportNormalizedObject,
            Call::DefineTexture(_) => CallKind::DefineTexture,
            Call::CreateCamera => CallKind::CreateCamera,
            Call::CreateViewpoints { .. } => CallKind::CreateViewpoints,
            Call::MoveCameraTo(_) => CallKind::MoveCameraTo,
            Call::CreateLight => CallKind::CreateLight,
            Call::SetLightEnergy(_) => CallKind::SetLightEnergy,
            Call::GetLightParams(_) => CallKind::GetLightParams,
            Call::ClearLights => CallKind::ClearLights,
            Call::ClearObjects => CallKind::ClearObjects,
            Call::SetRenderResolution { .. } => CallKind::SetRenderResolution,
            Call::Render { .. } => CallKind::Render,
            Call::RevealOutput(_) => CallKind::RevealOutput,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

type RenderHook = Box<dyn FnMut(usize) + Send>;

/// Scripted scene double.
pub struct MockCapability {
    rng: StdRng,
    calls: RefCell<Vec<Call>>,
    counts: RefCell<HashMap<CallKind, usize>>,
    failures: HashMap<CallKind, usize>,
    render_hook: Option<RenderHook>,

    next_id: usize,
    objects: HashMap<ObjectId, (String, u32)>,
    active: Option<ObjectId>,
    cameras: HashMap<CameraId, Vec3>,
    last_camera: Option<CameraId>,
    lights: HashMap<LightId, RealizedLight>,
    resolution: Option<(u32, u32)>,
    renders: usize,
}

impl MockCapability {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            calls: RefCell::new(Vec::new()),
            counts: RefCell::new(HashMap::new()),
            failures: HashMap::new(),
            render_hook: None,
            next_id: 0,
            objects: HashMap::new(),
            active: None,
            cameras: HashMap::new(),
            last_camera: None,
            lights: HashMap::new(),
            resolution: None,
            renders: 0,
        }
    }

    /// Fail the `nth` call (1-based) of `kind` with [`CapabilityError::Injected`].
    pub fn fail_on(mut self, kind: CallKind, nth: usize) -> Self {
        self.failures.insert(kind, nth);
        self
    }

    /// Run `hook` after each successful render with the 0-based render count.
    pub fn with_render_hook(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.render_hook = Some(Box::new(hook));
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        self.counts.borrow().get(&kind).copied().unwrap_or(0)
    }

    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Lights instantiated and not yet cleared.
    pub fn live_lights(&self) -> usize {
        self.lights.len()
    }

    pub fn loaded_objects(&self) -> usize {
        self.objects.len()
    }

    fn record(&self, call: Call) -> CapabilityResult<()> {
        let kind = call.kind();
        self.calls.borrow_mut().push(call);

        let mut counts = self.counts.borrow_mut();
        let count = counts.entry(kind).or_insert(0);
        *count += 1;
        let count = *count;

        if self.failures.get(&kind) == Some(&count) {
            return Err(CapabilityError::Injected(format!("{kind} #{count}")));
        }
        Ok(())
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn object(&self, id: ObjectId) -> CapabilityResult<&(String, u32)> {
        self.objects.get(&id).ok_or(CapabilityError::UnknownHandle {
            kind: "object",
            id: id.0,
        })
    }

    fn light(&self, id: LightId) -> CapabilityResult<&RealizedLight> {
        self.lights.get(&id).ok_or(CapabilityError::UnknownHandle {
            kind: "light",
            id: id.0,
        })
    }
}

impl RenderCapability for MockCapability {
    type Object = ObjectId;
    type Camera = CameraId;
    type Light = LightId;
    type Texture = String;

    fn load_object(&mut self, object: &Object, environment_size: u32) -> CapabilityResult<ObjectId> {
        self.record(Call::LoadObject {
            name: object.name.clone(),
            environment_size,
        })?;
        let id = ObjectId(self.next_id());
        self.objects
            .insert(id, (object.name.clone(), environment_size));
        Ok(id)
    }

    fn select_object(&mut self, object: &ObjectId) -> CapabilityResult<()> {
        self.record(Call::SelectObject(*object))?;
        self.object(*object)?;
        self.active = Some(*object);
        Ok(())
    }

    fn load_material(&mut self, object: &ObjectId, _material: &Material) -> CapabilityResult<()> {
        self.record(Call::LoadMaterial(*object))?;
        self.object(*object)?;
        Ok(())
    }

    fn export_normalized_object(&mut self, path: &Path) -> CapabilityResult<()> {
        self.record(Call::ExportNormalizedObject(path.to_path_buf()))?;
        let active = self.active.ok_or(CapabilityError::NoObjectLoaded)?;
        let half = self.object(active)?.1 as f32 / 2.0;

        // Stand-in geometry spanning the environment cube
        let mesh = Mesh::new(
            vec![
                Vec3::new(-half, -half, -half),
                Vec3::new(half, -half, -half),
                Vec3::new(half, half, half),
            ],
            vec![0, 1, 2],
            None,
        );
        mesh.write_obj(path)?;
        Ok(())
    }

    fn define_texture(&mut self, object: &Object) -> CapabilityResult<Option<String>> {
        self.record(Call::DefineTexture(object.name.clone()))?;
        Ok(object
            .material
            .as_ref()
            .and_then(Material::texture)
            .map(str::to_string))
    }

    fn create_camera(&mut self) -> CapabilityResult<CameraId> {
        self.record(Call::CreateCamera)?;
        let id = CameraId(self.next_id());
        self.cameras.insert(id, Vec3::ZERO);
        self.last_camera = Some(id);
        Ok(id)
    }

    fn create_viewpoints(
        &mut self,
        viewpoints: &[Viewpoint],
        preview: bool,
    ) -> CapabilityResult<Vec<Shots>> {
        self.record(Call::CreateViewpoints {
            count: viewpoints.len(),
            preview,
        })?;
        Ok(materialize_viewpoints(viewpoints, preview, &mut self.rng))
    }

    fn move_camera_to(&mut self, camera: &CameraId, coords: Vec3) -> CapabilityResult<()> {
        self.record(Call::MoveCameraTo(coords))?;
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

    fn create_light(&mut self, light: &Light) -> CapabilityResult<LightId> {
        self.record(Call::CreateLight)?;
        let realized = materialize_light(light, &mut self.rng);
        let id = LightId(self.next_id());
        self.lights.insert(id, realized);
        Ok(id)
    }

    fn set_light_energy(&mut self, light: &LightId, energy: f32) -> CapabilityResult<()> {
        self.record(Call::SetLightEnergy(energy))?;
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

    fn light_energy(&self, light: &LightId) -> CapabilityResult<f32> {
        Ok(self.light(*light)?.energy)
    }

    fn get_light_params(&self, light: &LightId) -> CapabilityResult<LightParams> {
        self.record(Call::GetLightParams(*light))?;
        Ok(self.light(*light)?.params())
    }

    fn clear_lights(&mut self) -> CapabilityResult<()> {
        self.record(Call::ClearLights)?;
        self.lights.clear();
        Ok(())
    }

    fn clear_objects(&mut self) -> CapabilityResult<()> {
        self.record(Call::ClearObjects)?;
        self.objects.clear();
        self.active = None;
        Ok(())
    }

    fn set_render_resolution(&mut self, render: &Render) -> CapabilityResult<()> {
        self.record(Call::SetRenderResolution {
            x: render.resolution_x,
            y: render.resolution_y,
        })?;
        self.resolution = Some((render.resolution_x, render.resolution_y));
        Ok(())
    }

    fn render(
        &mut self,
        output_dir: &Path,
        style: &str,
        texture: Option<&String>,
        object: &ObjectId,
    ) -> CapabilityResult<()> {
        self.record(Call::Render {
            dir: output_dir.to_path_buf(),
            style: style.to_string(),
            textured: texture.is_some(),
        })?;
        let name = self
            .objects
            .get(object)
            .map(|(name, _)| name.clone())
            .ok_or(CapabilityError::NoObjectLoaded)?;
        let camera = self
            .last_camera
            .and_then(|id| self.cameras.get(&id))
            .ok_or(CapabilityError::NoCamera)?;
        let (width, height) = self.resolution.unwrap_or((0, 0));

        let artifact = format!(
            "object={}\ncamera={} {} {}\nlights={}\nresolution={}x{}\ntexture={}\n",
            name,
            camera.x,
            camera.y,
            camera.z,
            self.lights.len(),
            width,
            height,
            texture.map(String::as_str).unwrap_or("-"),
        );
        fs::write(output_dir.join(format!("{style}.mock")), artifact)?;

        let count = self.renders;
        self.renders += 1;
        if let Some(hook) = self.render_hook.as_mut() {
            hook(count);
        }
        Ok(())
    }

    fn reveal_output(&mut self, output_dir: &Path) -> CapabilityResult<()> {
        self.record(Call::RevealOutput(output_dir.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_failure_on_nth_call() {
        let mut mock = MockCapability::new(7).fail_on(CallKind::CreateCamera, 2);

        assert!(mock.create_camera().is_ok());
        let err = mock.create_camera().unwrap_err();
        assert!(matches!(err, CapabilityError::Injected(ref what) if what == "create_camera #2"));
        assert!(mock.create_camera().is_ok());
        assert_eq!(mock.call_count(CallKind::CreateCamera), 3);
    }

    #[test]
    fn test_stale_light_handle() {
        let mut mock = MockCapability::new(7);
        let light = mock
            .create_light(&Light::fixed([1.0, 0.0, 0.0], [0, 255, 0]))
            .unwrap();
        mock.set_light_energy(&light, 1500.0).unwrap();
        assert_eq!(mock.light_energy(&light).unwrap(), 1500.0);
        assert_eq!(
            mock.get_light_params(&light).unwrap(),
            LightParams::new(Vec3::X, [0, 255, 0])
        );

        mock.clear_lights().unwrap();
        mock.clear_lights().unwrap();
        assert_eq!(mock.live_lights(), 0);
        assert!(matches!(
            mock.get_light_params(&light),
            Err(CapabilityError::UnknownHandle { kind: "light", .. })
        ));
    }

    #[test]
    fn test_render_requires_object() {
        let mut mock = MockCapability::new(7);
        mock.create_camera().unwrap();
        let err = mock
            .render(Path::new("."), "normal", None, &ObjectId(99))
            .unwrap_err();
        assert!(matches!(err, CapabilityError::NoObjectLoaded));
    }

    #[test]
    fn test_texture_from_material() {
        let mut mock = MockCapability::new(7);
        let plain = Object::new("a", "a.obj");
        let textured = Object::new("b", "b.obj")
            .with_material(Material::new().with("texture", "wood.png"));

        assert_eq!(mock.define_texture(&plain).unwrap(), None);
        assert_eq!(
            mock.define_texture(&textured).unwrap(),
            Some("wood.png".to_string())
        );
    }

    #[test]
    fn test_viewpoints_are_seeded() {
        let viewpoints = [Viewpoint::dynamic(2.0, 3)];
        let a: Vec<Vec<Vec3>> = MockCapability::new(3)
            .create_viewpoints(&viewpoints, false)
            .unwrap()
            .into_iter()
            .map(Iterator::collect)
            .collect();
        let b: Vec<Vec<Vec3>> = MockCapability::new(3)
            .create_viewpoints(&viewpoints, false)
            .unwrap()
            .into_iter()
            .map(Iterator::collect)
            .collect();
        assert_eq!(a, b);
    }
}
