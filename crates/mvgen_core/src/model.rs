//! Value descriptors of a dataset-generation request.
//!
//! These types carry no behavior beyond construction helpers; sampling
//! lives with the generator and validation lives in [`crate::config`].
//! Field names double as the JSON keys of the persisted config file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize a nullable field that must still be present.
///
/// serde treats a missing `Option` field as `None`; routing it through
/// `deserialize_with` turns absence into a "missing field" error while
/// an explicit `null` still maps to `None`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Size of the cube objects are normalized into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    /// Edge length of the normalization cube
    pub dimension: u32,
}

impl Environment {
    pub fn new(dimension: u32) -> Self {
        Self { dimension }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self { dimension: 1 }
    }
}

/// Free-form surface attributes handed to the capability as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material {
    attributes: BTreeMap<String, Value>,
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The `color` attribute as linear RGB, if it is a three-number array.
    pub fn diffuse_color(&self) -> Option<[f32; 3]> {
        let values = self.get("color")?.as_array()?;
        if values.len() != 3 {
            return None;
        }
        let mut rgb = [0.0; 3];
        for (slot, value) in rgb.iter_mut().zip(values) {
            *slot = value.as_f64()? as f32;
        }
        Some(rgb)
    }

    /// The `texture` attribute, if it is a string.
    pub fn texture(&self) -> Option<&str> {
        self.get("texture")?.as_str()
    }
}

/// A 3D asset to load, optionally normalized into the environment cube.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Object {
    /// Unique within a config; also the name of the object's output folder
    pub name: String,

    /// Path to the asset file
    pub path: PathBuf,

    /// Surface material applied after loading
    #[serde(deserialize_with = "nullable")]
    pub material: Option<Material>,

    /// Scale and center the asset into the environment cube
    pub normalize: bool,
}

impl Object {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            material: None,
            normalize: true,
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

/// How a light picks its location and color for each shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightKind {
    /// Fixed location, fixed color
    #[serde(alias = "STATIC_LIGHT")]
    Static,
    /// Random location, fixed color
    #[serde(alias = "DYNAMIC_LIGHT")]
    Dynamic,
    /// Fixed location, random color
    #[serde(alias = "RAINBOW_STATIC_LIGHT")]
    RainbowStatic,
    /// Random location, random color
    #[serde(alias = "RAINBOW_DYNAMIC_LIGHT")]
    RainbowDynamic,
}

impl LightKind {
    pub fn has_fixed_location(self) -> bool {
        matches!(self, Self::Static | Self::RainbowStatic)
    }

    pub fn has_fixed_color(self) -> bool {
        matches!(self, Self::Static | Self::Dynamic)
    }
}

/// A light source added to the scene for every shot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Light {
    pub kind: LightKind,

    /// 8-bit RGB color; ignored by the rainbow kinds
    #[serde(deserialize_with = "nullable")]
    pub color: Option<[u8; 3]>,

    /// World-space location; ignored by the dynamic kinds
    #[serde(deserialize_with = "nullable")]
    pub location: Option<[f32; 3]>,

    /// Random locations are drawn from `[-max_range, max_range]` per axis
    pub max_range: f32,

    /// Upper bound of the sampled light energy
    pub max_energy: f32,
}

impl Light {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: None,
            location: None,
            max_range: 5.0,
            max_energy: 5.0,
        }
    }

    /// A light that never moves or changes color.
    pub fn fixed(location: [f32; 3], color: [u8; 3]) -> Self {
        Self::new(LightKind::Static)
            .with_location(location)
            .with_color(color)
    }

    /// A fixed-color light placed randomly within `range`.
    pub fn dynamic(range: f32, color: [u8; 3]) -> Self {
        Self::new(LightKind::Dynamic)
            .with_range(range)
            .with_color(color)
    }

    pub fn rainbow_static(location: [f32; 3]) -> Self {
        Self::new(LightKind::RainbowStatic).with_location(location)
    }

    pub fn rainbow_dynamic(range: f32) -> Self {
        Self::new(LightKind::RainbowDynamic).with_range(range)
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_location(mut self, location: [f32; 3]) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_range(mut self, max_range: f32) -> Self {
        self.max_range = max_range;
        self
    }

    pub fn with_max_energy(mut self, max_energy: f32) -> Self {
        self.max_energy = max_energy;
        self
    }
}

/// How a viewpoint lays out its camera positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewpointKind {
    /// Every shot from `location`
    #[serde(alias = "STATIC_CAMERA")]
    Static,
    /// Every shot from a random location within `max_range`
    #[serde(alias = "DYNAMIC_CAMERA")]
    Dynamic,
    /// Shots from the vertices of a UV sphere around the origin
    #[serde(alias = "OBJECT_PATH")]
    SpherePath,
}

/// A source of camera positions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Viewpoint {
    pub kind: ViewpointKind,

    /// Fixed camera location (STATIC only)
    #[serde(deserialize_with = "nullable")]
    pub location: Option<[f32; 3]>,

    /// Number of shots; SPHERE_PATH uses its divisions instead
    pub amount: u32,

    /// Sphere diameter (SPHERE_PATH only)
    pub size: f32,

    pub horizontal_divisions: u32,

    pub vertical_divisions: u32,

    /// Random locations are drawn from `[-max_range, max_range]` per axis
    pub max_range: f32,
}

impl Viewpoint {
    pub fn new(kind: ViewpointKind) -> Self {
        Self {
            kind,
            location: None,
            amount: 100,
            size: 2.0,
            horizontal_divisions: 10,
            vertical_divisions: 10,
            max_range: 5.0,
        }
    }

    pub fn fixed(location: [f32; 3], amount: u32) -> Self {
        Self {
            location: Some(location),
            amount,
            ..Self::new(ViewpointKind::Static)
        }
    }

    pub fn dynamic(max_range: f32, amount: u32) -> Self {
        Self {
            max_range,
            amount,
            ..Self::new(ViewpointKind::Dynamic)
        }
    }

    pub fn sphere_path(size: f32, horizontal_divisions: u32, vertical_divisions: u32) -> Self {
        Self {
            size,
            horizontal_divisions,
            vertical_divisions,
            ..Self::new(ViewpointKind::SpherePath)
        }
    }

    /// Number of shots this viewpoint produces outside preview mode.
    pub fn shot_count(&self) -> usize {
        match self.kind {
            ViewpointKind::SpherePath => {
                self.horizontal_divisions as usize * self.vertical_divisions as usize
            }
            ViewpointKind::Static | ViewpointKind::Dynamic => self.amount as usize,
        }
    }
}

/// Output settings. Without a `Render`, nothing is rendered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Render {
    pub resolution_x: u32,
    pub resolution_y: u32,

    /// Root of the generated dataset; must not exist yet
    pub output_dir_path: PathBuf,

    /// Render style tags; empty means export only
    pub styles: Vec<String>,
}

impl Render {
    pub fn new(resolution_x: u32, resolution_y: u32, output_dir_path: impl Into<PathBuf>) -> Self {
        Self {
            resolution_x,
            resolution_y,
            output_dir_path: output_dir_path.into(),
            styles: Vec::new(),
        }
    }

    pub fn with_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.styles = styles.into_iter().map(Into::into).collect();
        self
    }

    /// Style used for each shot. Only the first listed style is rendered.
    pub fn primary_style(&self) -> Option<&str> {
        self.styles.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_light_kind_legacy_alias() {
        let kind: LightKind = serde_json::from_value(json!("RAINBOW_DYNAMIC_LIGHT")).unwrap();
        assert_eq!(kind, LightKind::RainbowDynamic);

        let kind: ViewpointKind = serde_json::from_value(json!("OBJECT_PATH")).unwrap();
        assert_eq!(kind, ViewpointKind::SpherePath);
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_value(LightKind::RainbowStatic).unwrap(),
            json!("RAINBOW_STATIC")
        );
        assert_eq!(
            serde_json::to_value(ViewpointKind::SpherePath).unwrap(),
            json!("SPHERE_PATH")
        );
    }

    #[test]
    fn test_missing_nullable_field_is_error() {
        let err = serde_json::from_value::<Light>(json!({
            "kind": "STATIC",
            "location": [0.0, 0.0, 1.0],
            "max_range": 5.0,
            "max_energy": 5.0
        }))
        .unwrap_err();
        assert!(err.to_string().contains("color"), "{err}");
    }

    #[test]
    fn test_explicit_null_is_none() {
        let light: Light = serde_json::from_value(json!({
            "kind": "RAINBOW_DYNAMIC",
            "color": null,
            "location": null,
            "max_range": 2.5,
            "max_energy": 5.0
        }))
        .unwrap();
        assert_eq!(light, Light::rainbow_dynamic(2.5));
    }

    #[test]
    fn test_unknown_field_is_error() {
        let err = serde_json::from_value::<Environment>(json!({
            "dimension": 2,
            "gravity": 9.8
        }))
        .unwrap_err();
        assert!(err.to_string().contains("gravity"), "{err}");
    }

    #[test]
    fn test_material_accessors() {
        let material = Material::new()
            .with("color", json!([1.0, 0.5, 0.0]))
            .with("texture", "wood.png")
            .with("roughness", 0.4);

        assert_eq!(material.diffuse_color(), Some([1.0, 0.5, 0.0]));
        assert_eq!(material.texture(), Some("wood.png"));
        assert_eq!(material.attributes().len(), 3);
        assert!(Material::new().diffuse_color().is_none());
    }

    #[test]
    fn test_shot_count() {
        assert_eq!(Viewpoint::fixed([0.0, 0.0, 3.0], 7).shot_count(), 7);
        assert_eq!(Viewpoint::sphere_path(2.0, 4, 3).shot_count(), 12);
        let mut sphere = Viewpoint::sphere_path(2.0, 10, 10);
        sphere.amount = 1;
        assert_eq!(sphere.shot_count(), 100);
    }
}
