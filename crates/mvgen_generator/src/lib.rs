//! mvgen generator - turns a validated `Config` into a dataset on disk.
//!
//! The generator walks every object, viewpoint shot and light, driving a
//! [`RenderCapability`] that owns the actual scene:
//!
//! - [`DatasetsGenerator`]: the control loop, blocking or on its own thread
//! - [`HeadlessCapability`]: OBJ assets with a software preview renderer
//! - [`MockCapability`]: recording double for tests
//!
//! # Example
//!
//! ```ignore
//! use mvgen_generator::{DatasetsGenerator, HeadlessCapability};
//!
//! let config = mvgen_core::json_loads("dataset.json")?;
//! let mut generator = DatasetsGenerator::new(config, HeadlessCapability::new(0), false);
//! let summary = generator.run()?;
//! println!("{} shots in {}", summary.shots, summary.output_dir.display());
//! ```

pub mod capability;
pub mod generator;
pub mod headless;
pub mod metadata;
pub mod mock;
pub mod sampling;

pub use capability::{CapabilityError, CapabilityResult, LightParams, RenderCapability, Shots};
pub use generator::{
    CancelToken, DatasetsGenerator, GenerateError, GenerateResult, GeneratorTask, Progress,
    Summary, DEFAULT_LIGHT_ENERGY, METADATA_FILE, NORMALIZED_OBJECT_FILE,
};
pub use headless::HeadlessCapability;
pub use metadata::{MetadataRow, MetadataTable};
pub use mock::{Call, CallKind, MockCapability};
