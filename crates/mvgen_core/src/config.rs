//! The validated generation request.
//!
//! [`Config::new`] is the only way to obtain a `Config`; once constructed
//! it satisfies every invariant below for as long as it lives.

use std::collections::HashSet;
use std::path::{Component, Path};

use thiserror::Error;

use crate::model::{Environment, Light, Object, Render, Viewpoint, ViewpointKind};

/// Invariant violations detected while building a [`Config`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("environment can't be empty")]
    MissingEnvironment,

    #[error("objects is empty")]
    NoObjects,

    #[error("lights is empty")]
    NoLights,

    #[error("viewpoints is empty")]
    NoViewpoints,

    #[error("output directory path not specified")]
    EmptyOutputPath,

    #[error("environment dimension must be positive")]
    InvalidDimension,

    #[error("object #{0} has an empty name")]
    EmptyObjectName(usize),

    #[error("object name {0:?} must be a single path component")]
    InvalidObjectName(String),

    #[error("object name {0:?} is used more than once")]
    DuplicateObjectName(String),

    #[error("render resolution must be positive, got {x}x{y}")]
    InvalidResolution { x: u32, y: u32 },

    #[error("{what} must be a non-negative number, got {value}")]
    NegativeRange { what: String, value: f32 },

    #[error("{what} needs a fixed location")]
    MissingLocation { what: String },

    #[error("light #{index} needs a fixed color")]
    MissingColor { index: usize },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A complete, validated dataset-generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    environment: Environment,
    objects: Vec<Object>,
    lights: Vec<Light>,
    viewpoints: Vec<Viewpoint>,
    render: Option<Render>,
}

impl Config {
    /// Validate and assemble a config.
    ///
    /// Checks run in a fixed order and the first violation is returned:
    /// environment, objects, lights, viewpoints, output path, then the
    /// per-entity checks.
    pub fn new(
        environment: Option<Environment>,
        render: Option<Render>,
        objects: Vec<Object>,
        lights: Vec<Light>,
        viewpoints: Vec<Viewpoint>,
    ) -> ConfigResult<Self> {
        let environment = environment.ok_or(ConfigError::MissingEnvironment)?;
        if objects.is_empty() {
            return Err(ConfigError::NoObjects);
        }
        if lights.is_empty() {
            return Err(ConfigError::NoLights);
        }
        if viewpoints.is_empty() {
            return Err(ConfigError::NoViewpoints);
        }
        if let Some(render) = &render {
            if render.output_dir_path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyOutputPath);
            }
        }

        if environment.dimension == 0 {
            return Err(ConfigError::InvalidDimension);
        }
        validate_objects(&objects)?;
        if let Some(render) = &render {
            if render.resolution_x == 0 || render.resolution_y == 0 {
                return Err(ConfigError::InvalidResolution {
                    x: render.resolution_x,
                    y: render.resolution_y,
                });
            }
        }
        for (index, light) in lights.iter().enumerate() {
            validate_light(index, light)?;
        }
        for (index, viewpoint) in viewpoints.iter().enumerate() {
            validate_viewpoint(index, viewpoint)?;
        }

        Ok(Self {
            environment,
            objects,
            lights,
            viewpoints,
            render,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn viewpoints(&self) -> &[Viewpoint] {
        &self.viewpoints
    }

    pub fn render(&self) -> Option<&Render> {
        self.render.as_ref()
    }

    /// Style tags to render; empty when there is no render section.
    pub fn styles(&self) -> &[String] {
        self.render
            .as_ref()
            .map(|r| r.styles.as_slice())
            .unwrap_or_default()
    }

    /// True when shots will be rendered (a render section with styles).
    pub fn renders_images(&self) -> bool {
        !self.styles().is_empty()
    }

    /// Shots produced per object outside preview mode.
    pub fn shots_per_object(&self) -> usize {
        self.viewpoints.iter().map(Viewpoint::shot_count).sum()
    }
}

fn validate_objects(objects: &[Object]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for (index, object) in objects.iter().enumerate() {
        if object.name.is_empty() {
            return Err(ConfigError::EmptyObjectName(index));
        }
        if !is_plain_component(&object.name) {
            return Err(ConfigError::InvalidObjectName(object.name.clone()));
        }
        if !seen.insert(object.name.as_str()) {
            return Err(ConfigError::DuplicateObjectName(object.name.clone()));
        }
    }
    Ok(())
}

/// Object names become directory names under the output directory.
fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}

fn check_range(what: impl FnOnce() -> String, value: f32) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeRange {
            what: what(),
            value,
        })
    }
}

fn validate_light(index: usize, light: &Light) -> ConfigResult<()> {
    check_range(|| format!("light #{index} max_range"), light.max_range)?;
    check_range(|| format!("light #{index} max_energy"), light.max_energy)?;
    if light.kind.has_fixed_location() && light.location.is_none() {
        return Err(ConfigError::MissingLocation {
            what: format!("light #{index}"),
        });
    }
    if light.kind.has_fixed_color() && light.color.is_none() {
        return Err(ConfigError::MissingColor { index });
    }
    Ok(())
}

fn validate_viewpoint(index: usize, viewpoint: &Viewpoint) -> ConfigResult<()> {
    check_range(|| format!("viewpoint #{index} max_range"), viewpoint.max_range)?;
    check_range(|| format!("viewpoint #{index} size"), viewpoint.size)?;
    if viewpoint.kind == ViewpointKind::Static && viewpoint.location.is_none() {
        return Err(ConfigError::MissingLocation {
            what: format!("viewpoint #{index}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LightKind;

    fn objects() -> Vec<Object> {
        vec![Object::new("cube", "cube.obj")]
    }

    fn lights() -> Vec<Light> {
        vec![Light::fixed([1.0, 1.0, 1.0], [255, 255, 255])]
    }

    fn viewpoints() -> Vec<Viewpoint> {
        vec![Viewpoint::fixed([0.0, -3.0, 0.0], 1)]
    }

    fn render() -> Option<Render> {
        Some(Render::new(64, 64, "/tmp/out").with_styles(["normal"]))
    }

    #[test]
    fn test_valid_config() {
        let config = Config::new(
            Some(Environment::new(2)),
            render(),
            objects(),
            lights(),
            viewpoints(),
        )
        .unwrap();

        assert_eq!(config.environment().dimension, 2);
        assert_eq!(config.objects().len(), 1);
        assert!(config.renders_images());
        assert_eq!(config.shots_per_object(), 1);
    }

    #[test]
    fn test_missing_environment() {
        let err = Config::new(None, render(), objects(), lights(), viewpoints()).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvironment);
    }

    #[test]
    fn test_empty_lists() {
        let env = Some(Environment::default());

        let err = Config::new(env, render(), vec![], lights(), viewpoints()).unwrap_err();
        assert_eq!(err, ConfigError::NoObjects);

        let err = Config::new(env, render(), objects(), vec![], viewpoints()).unwrap_err();
        assert_eq!(err, ConfigError::NoLights);

        let err = Config::new(env, render(), objects(), lights(), vec![]).unwrap_err();
        assert_eq!(err, ConfigError::NoViewpoints);
    }

    #[test]
    fn test_first_violation_wins() {
        let err = Config::new(None, None, vec![], vec![], vec![]).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvironment);

        let err = Config::new(Some(Environment::default()), None, vec![], vec![], vec![])
            .unwrap_err();
        assert_eq!(err, ConfigError::NoObjects);
    }

    #[test]
    fn test_empty_output_path_only_with_render() {
        let env = Some(Environment::default());
        let empty = Some(Render::new(64, 64, ""));

        let err = Config::new(env, empty, objects(), lights(), viewpoints()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyOutputPath);

        let config = Config::new(env, None, objects(), lights(), viewpoints()).unwrap();
        assert!(config.render().is_none());
        assert!(config.styles().is_empty());
        assert!(!config.renders_images());
    }

    #[test]
    fn test_duplicate_object_names() {
        let objects = vec![Object::new("cube", "a.obj"), Object::new("cube", "b.obj")];
        let err = Config::new(
            Some(Environment::default()),
            render(),
            objects,
            lights(),
            viewpoints(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateObjectName("cube".to_string()));
    }

    #[test]
    fn test_object_name_must_stay_inside_output() {
        for name in ["..", ".", "a/b", "/abs", "../escape", "cube/", "./cube"] {
            let err = Config::new(
                Some(Environment::default()),
                render(),
                vec![Object::new(name, "cube.obj")],
                lights(),
                viewpoints(),
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::InvalidObjectName(name.to_string()), "{name}");
        }

        for name in ["cube", "my cube", "cube.v2", "..cube"] {
            assert!(is_plain_component(name), "{name}");
        }
    }

    #[test]
    fn test_zero_dimension() {
        let err = Config::new(
            Some(Environment::new(0)),
            render(),
            objects(),
            lights(),
            viewpoints(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidDimension);
    }

    #[test]
    fn test_zero_resolution() {
        let render = Some(Render::new(0, 64, "/tmp/out"));
        let err = Config::new(
            Some(Environment::default()),
            render,
            objects(),
            lights(),
            viewpoints(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidResolution { x: 0, y: 64 });
    }

    #[test]
    fn test_negative_range() {
        let lights = vec![Light::dynamic(-1.0, [255, 0, 0])];
        let err = Config::new(
            Some(Environment::default()),
            render(),
            objects(),
            lights,
            viewpoints(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NegativeRange { value, .. } if value == -1.0));
    }

    #[test]
    fn test_fixed_kinds_need_values() {
        let env = Some(Environment::default());

        let lights = vec![Light::new(LightKind::Static).with_color([1, 2, 3])];
        let err = Config::new(env, render(), objects(), lights, viewpoints()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLocation { .. }));

        let lights = vec![Light::new(LightKind::Dynamic)];
        let err = Config::new(env, render(), objects(), lights, viewpoints()).unwrap_err();
        assert_eq!(err, ConfigError::MissingColor { index: 0 });

        let viewpoints = vec![Viewpoint::new(ViewpointKind::Static)];
        let err = Config::new(env, render(), objects(), self::lights(), viewpoints).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLocation { .. }));
    }
}
