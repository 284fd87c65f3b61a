//! mvgen core - the dataset-generation request and its assets.
//!
//! This crate provides:
//!
//! - **Domain model**: `Environment`, `Object`, `Material`, `Light`,
//!   `Viewpoint`, `Render`
//! - **Config**: the validated aggregate of the above
//! - **Config IO**: lossless JSON persistence of a `Config`
//! - **Mesh**: OBJ loading, cube normalization and OBJ export
//!
//! # Example
//!
//! ```ignore
//! use mvgen_core::config_io::json_loads;
//!
//! let config = json_loads("dataset.json")?;
//! println!("{} objects x {} shots each",
//!     config.objects().len(),
//!     config.shots_per_object());
//! ```

pub mod config;
pub mod config_io;
pub mod mesh;
pub mod model;

// Re-export commonly used types
pub use config::{Config, ConfigError, ConfigResult};
pub use config_io::{json_dumps, json_loads, json_loads_from_str, ConfigIoError, ConfigIoResult};
pub use mesh::{Mesh, MeshError, MeshResult};
pub use model::{Environment, Light, LightKind, Material, Object, Render, Viewpoint, ViewpointKind};
