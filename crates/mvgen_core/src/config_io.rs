//! JSON persistence for [`Config`].
//!
//! The document is a single object with the keys `environment`, `objects`,
//! `lights`, `viewpoints` and `render`. Each entity is written as a map of
//! its fields; an object's material is nested inline under `material` and
//! absent values are written as `null`.
//!
//! Loading is strict: unknown keys are rejected on every entity (materials
//! excepted, they are open maps) and every key must be present, including
//! nullable ones. The loaded entities go through [`Config::new`] so a
//! loaded config satisfies the same invariants as a hand-built one.
//!
//! # Example
//!
//! ```ignore
//! use mvgen_core::config_io::{json_dumps, json_loads};
//!
//! let config = json_loads("dataset.json")?;
//! json_dumps(&config, Some("dataset.copy.json".as_ref()))?;
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::model::{nullable, Environment, Light, Object, Render, Viewpoint};

/// Errors that can occur while reading or writing a config document.
#[derive(Error, Debug)]
pub enum ConfigIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

pub type ConfigIoResult<T> = Result<T, ConfigIoError>;

#[derive(Serialize)]
struct DocumentRef<'a> {
    environment: &'a Environment,
    objects: &'a [Object],
    lights: &'a [Light],
    viewpoints: &'a [Viewpoint],
    render: Option<&'a Render>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(deserialize_with = "nullable")]
    environment: Option<Environment>,
    objects: Vec<Object>,
    lights: Vec<Light>,
    viewpoints: Vec<Viewpoint>,
    #[serde(deserialize_with = "nullable")]
    render: Option<Render>,
}

/// Flatten a config into its JSON document.
///
/// Object keys come out sorted.
pub fn to_value(config: &Config) -> ConfigIoResult<Value> {
    let document = DocumentRef {
        environment: config.environment(),
        objects: config.objects(),
        lights: config.lights(),
        viewpoints: config.viewpoints(),
        render: config.render(),
    };
    Ok(serde_json::to_value(document)?)
}

/// Serialize a config as pretty JSON (sorted keys, 4-space indent).
///
/// The text is written to `path` when one is given; either way it is
/// returned so callers can log or inspect it.
pub fn json_dumps(config: &Config, path: Option<&Path>) -> ConfigIoResult<String> {
    let value = to_value(config)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    let text = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if let Some(path) = path {
        fs::write(path, &text)?;
        log::info!("Wrote config to {}", path.display());
    }
    log::debug!("Config document: {}", text);

    Ok(text)
}

/// Load and validate a config file.
pub fn json_loads<P: AsRef<Path>>(path: P) -> ConfigIoResult<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let config = json_loads_from_str(&text)?;
    log::info!(
        "Loaded config from {} ({} objects, {} lights, {} viewpoints)",
        path.display(),
        config.objects().len(),
        config.lights().len(),
        config.viewpoints().len()
    );
    Ok(config)
}

/// Parse and validate a config document held in memory.
pub fn json_loads_from_str(text: &str) -> ConfigIoResult<Config> {
    let document: Document = serde_json::from_str(text)?;
    from_document(document)
}

/// Validate a config document that has already been parsed.
pub fn from_value(value: Value) -> ConfigIoResult<Config> {
    let document: Document = serde_json::from_value(value)?;
    from_document(document)
}

fn from_document(document: Document) -> ConfigIoResult<Config> {
    Ok(Config::new(
        document.environment,
        document.render,
        document.objects,
        document.lights,
        document.viewpoints,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Material, ViewpointKind};
    use serde_json::json;

    fn sample_config() -> Config {
        let material = Material::new()
            .with("color", json!([0.8, 0.1, 0.1]))
            .with("layers", json!({"coat": true, "weights": [1, 2, 3]}))
            .with("note", Value::Null);

        Config::new(
            Some(Environment::new(3)),
            Some(Render::new(128, 96, "/tmp/dataset").with_styles(["normal", "shaded"])),
            vec![
                Object::new("cube", "assets/cube.obj").with_material(material),
                Object::new("bunny", "assets/bunny.obj").with_normalize(false),
            ],
            vec![
                Light::fixed([1.0, -2.0, 3.5], [255, 128, 0]),
                Light::dynamic(4.0, [10, 20, 30]).with_max_energy(12.5),
                Light::rainbow_static([0.0, 0.0, 5.0]),
                Light::rainbow_dynamic(0.25),
            ],
            vec![
                Viewpoint::fixed([0.0, -3.0, 1.0], 2),
                Viewpoint::dynamic(2.5, 10),
                Viewpoint::sphere_path(3.3, 8, 6),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let config = sample_config();
        let text = json_dumps(&config, None).unwrap();
        let loaded = json_loads_from_str(&text).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_roundtrip_preserves_full_precision_floats() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        let mut values = vec![0.23905199303700841, 0.1 + 0.2, 1e-300, 123456.78901234567];
        values.extend((0..500).map(|_| rng.gen::<f64>()));

        let material = values
            .iter()
            .enumerate()
            .fold(Material::new(), |m, (i, v)| m.with(format!("weight_{i}"), *v));
        let config = Config::new(
            Some(Environment::default()),
            None,
            vec![Object::new("cube", "cube.obj").with_material(material)],
            vec![Light::rainbow_dynamic(1.0)],
            vec![Viewpoint::new(ViewpointKind::Dynamic)],
        )
        .unwrap();

        let text = json_dumps(&config, None).unwrap();
        let loaded = json_loads_from_str(&text).unwrap();
        assert_eq!(loaded, config);

        let material = loaded.objects()[0].material.as_ref().unwrap();
        assert_eq!(
            material.get("weight_0").and_then(Value::as_f64),
            Some(0.23905199303700841)
        );
    }

    #[test]
    fn test_roundtrip_without_render() {
        let config = Config::new(
            Some(Environment::default()),
            None,
            vec![Object::new("cube", "cube.obj")],
            vec![Light::rainbow_dynamic(1.0)],
            vec![Viewpoint::new(ViewpointKind::Dynamic)],
        )
        .unwrap();

        let value = to_value(&config).unwrap();
        assert_eq!(value["render"], Value::Null);
        assert_eq!(from_value(value).unwrap(), config);
    }

    #[test]
    fn test_document_shape() {
        let value = to_value(&sample_config()).unwrap();

        assert_eq!(value["environment"], json!({"dimension": 3}));
        assert_eq!(value["objects"][0]["material"]["color"], json!([0.8, 0.1, 0.1]));
        assert_eq!(value["objects"][1]["material"], Value::Null);
        assert_eq!(value["lights"][3]["kind"], json!("RAINBOW_DYNAMIC"));
        assert_eq!(value["lights"][3]["color"], Value::Null);
        assert_eq!(value["viewpoints"][2]["kind"], json!("SPHERE_PATH"));
        assert_eq!(value["render"]["styles"], json!(["normal", "shaded"]));
    }

    #[test]
    fn test_dumps_sorted_and_indented() {
        let text = json_dumps(&sample_config(), None).unwrap();

        assert!(text.starts_with("{\n    \"environment\""));
        let environment = text.find("\"environment\"").unwrap();
        let lights = text.find("\"lights\"").unwrap();
        let objects = text.find("\"objects\"").unwrap();
        let render = text.find("\"render\"").unwrap();
        let viewpoints = text.find("\"viewpoints\"").unwrap();
        assert!(environment < lights && lights < objects);
        assert!(objects < render && render < viewpoints);
    }

    #[test]
    fn test_dumps_writes_only_with_path() {
        let dir = std::env::temp_dir().join(format!("mvgen_config_io_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = sample_config();
        let text = json_dumps(&config, Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
        assert_eq!(json_loads(&path).unwrap(), config);

        let other = dir.join("untouched.json");
        json_dumps(&config, None).unwrap();
        assert!(!other.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_top_level_key() {
        let mut value = to_value(&sample_config()).unwrap();
        value["seed"] = json!(7);

        let err = from_value(value).unwrap_err();
        assert!(matches!(err, ConfigIoError::Json(_)));
        assert!(err.to_string().contains("seed"), "{err}");
    }

    #[test]
    fn test_unknown_entity_key() {
        let mut value = to_value(&sample_config()).unwrap();
        value["viewpoints"][0]["fov"] = json!(45);

        let err = from_value(value).unwrap_err();
        assert!(err.to_string().contains("fov"), "{err}");
    }

    #[test]
    fn test_material_keys_are_open() {
        let mut value = to_value(&sample_config()).unwrap();
        value["objects"][0]["material"]["anything"] = json!("goes");

        let config = from_value(value).unwrap();
        let material = config.objects()[0].material.as_ref().unwrap();
        assert_eq!(material.get("anything"), Some(&json!("goes")));
    }

    #[test]
    fn test_missing_key() {
        let mut value = to_value(&sample_config()).unwrap();
        value.as_object_mut().unwrap().remove("render");

        let err = from_value(value).unwrap_err();
        assert!(err.to_string().contains("render"), "{err}");

        let mut value = to_value(&sample_config()).unwrap();
        value["objects"][1].as_object_mut().unwrap().remove("normalize");
        let err = from_value(value).unwrap_err();
        assert!(err.to_string().contains("normalize"), "{err}");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut value = to_value(&sample_config()).unwrap();
        value["lights"] = json!([]);

        let err = from_value(value).unwrap_err();
        assert!(matches!(err, ConfigIoError::Invalid(ConfigError::NoLights)));

        let mut value = to_value(&sample_config()).unwrap();
        value["environment"] = Value::Null;
        let err = from_value(value).unwrap_err();
        assert!(matches!(
            err,
            ConfigIoError::Invalid(ConfigError::MissingEnvironment)
        ));
    }

    #[test]
    fn test_traversing_object_name_is_rejected() {
        let mut value = to_value(&sample_config()).unwrap();
        value["objects"][0]["name"] = json!("../../escape");

        let err = from_value(value).unwrap_err();
        assert!(matches!(
            err,
            ConfigIoError::Invalid(ConfigError::InvalidObjectName(ref name)) if name == "../../escape"
        ));
    }

    #[test]
    fn test_malformed_json() {
        let err = json_loads_from_str("{ \"environment\": ").unwrap_err();
        assert!(matches!(err, ConfigIoError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = json_loads("/nonexistent/mvgen/config.json").unwrap_err();
        assert!(matches!(err, ConfigIoError::Io(_)));
    }
}
