//! The dataset generation loop.
//!
//! A single forward pass over objects × viewpoint shots × lights. Every
//! scene mutation goes through the [`RenderCapability`]; this module owns
//! only the output directory layout and the metadata table.
//!
//! ```text
//! <out>/data.csv
//! <out>/<object>/normalized.obj
//! <out>/<object>/<index>/<artifact>
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mvgen_core::{Config, Render};
use thiserror::Error;

use crate::capability::{CapabilityError, RenderCapability};
use crate::metadata::{MetadataRow, MetadataTable};

/// Energy every light is set to before a shot is rendered.
pub const DEFAULT_LIGHT_ENERGY: f32 = 1500.0;

/// Name of the metadata table inside the output directory.
pub const METADATA_FILE: &str = "data.csv";

/// Name of the exported normalized mesh inside each object directory.
pub const NORMALIZED_OBJECT_FILE: &str = "normalized.obj";

/// Errors that end a generation run.
///
/// Output written before the failure stays on disk.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("No output directory: the config has no render section and no override was given")]
    NoOutputDirectory,

    #[error("Output directory {0} already exists")]
    OutputExists(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Cancelled after {shots} shots")]
    Cancelled { shots: usize },

    #[error("Generator thread panicked")]
    WorkerPanicked,

    #[error("Failed to spawn generator thread: {0}")]
    Spawn(#[source] io::Error),
}

pub type GenerateResult<T> = Result<T, GenerateError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> GenerateError + '_ {
    move |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Progress notifications emitted while a run advances.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started {
        output_dir: PathBuf,
        objects: usize,
    },
    ObjectStarted {
        name: String,
    },
    /// A shot was rendered and its row written.
    ShotRendered {
        index: usize,
        object: String,
    },
    ObjectFinished {
        name: String,
        shots: usize,
    },
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub output_dir: PathBuf,
    /// Objects processed
    pub objects: usize,
    /// Shots rendered across all objects
    pub shots: usize,
}

/// Shared flag polled by the generator before each shot.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a [`RenderCapability`] through a validated [`Config`].
pub struct DatasetsGenerator<C: RenderCapability> {
    config: Config,
    capability: C,
    preview: bool,
    light_energy: f32,
    output_dir: Option<PathBuf>,
    cancel: CancelToken,
    progress: Option<Sender<Progress>>,
}

impl<C: RenderCapability> DatasetsGenerator<C> {
    /// With `preview` set, each viewpoint contributes exactly one shot.
    pub fn new(config: Config, capability: C, preview: bool) -> Self {
        Self {
            config,
            capability,
            preview,
            light_energy: DEFAULT_LIGHT_ENERGY,
            output_dir: None,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_light_energy(mut self, energy: f32) -> Self {
        self.light_energy = energy;
        self
    }

    /// Write the dataset to `dir` instead of `render.output_dir_path`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, sender: Sender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    pub fn into_capability(self) -> C {
        self.capability
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Output directory this run writes to.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir
            .as_deref()
            .or_else(|| self.config.render().map(|r| r.output_dir_path.as_path()))
    }

    /// Generate the dataset on the calling thread.
    pub fn run(&mut self) -> GenerateResult<Summary> {
        let output_dir = self
            .output_dir()
            .map(Path::to_path_buf)
            .ok_or(GenerateError::NoOutputDirectory)?;
        create_output_dir(&output_dir)?;

        log::info!(
            "Generating dataset into {} ({} objects, {} lights, preview: {})",
            output_dir.display(),
            self.config.objects().len(),
            self.config.lights().len(),
            self.preview
        );
        self.emit(Progress::Started {
            output_dir: output_dir.clone(),
            objects: self.config.objects().len(),
        });

        let mut table = match self.config.render().and_then(Render::primary_style) {
            Some(_) => {
                let path = output_dir.join(METADATA_FILE);
                let table = MetadataTable::create(&path, self.config.lights().len())
                    .map_err(io_error(&path))?;
                Some(table)
            }
            None => None,
        };

        let outcome = self.generate(&output_dir, table.as_mut());

        if outcome.is_ok() {
            if let Err(err) = self.capability.reveal_output(&output_dir) {
                log::warn!("Could not reveal {}: {}", output_dir.display(), err);
            }
        }

        // Close the table on failure too so the rows written so far survive
        if let Some(table) = table {
            let path = output_dir.join(METADATA_FILE);
            let flushed = table.finish().map_err(io_error(&path));
            if outcome.is_ok() {
                flushed?;
            }
        }

        let shots = outcome?;
        log::info!(
            "Dataset complete: {} shots in {}",
            shots,
            output_dir.display()
        );

        Ok(Summary {
            output_dir,
            objects: self.config.objects().len(),
            shots,
        })
    }

    fn emit(&self, progress: Progress) {
        if let Some(sender) = &self.progress {
            // A dropped receiver just means nobody is listening
            let _ = sender.send(progress);
        }
    }

    /// Walk every object; returns the number of shots rendered.
    fn generate(
        &mut self,
        output_dir: &Path,
        mut table: Option<&mut MetadataTable>,
    ) -> GenerateResult<usize> {
        let Self {
            config,
            capability,
            preview,
            light_energy,
            cancel,
            progress,
            ..
        } = self;
        let emit = |event: Progress| {
            if let Some(sender) = progress.as_ref() {
                let _ = sender.send(event);
            }
        };
        let dimension = config.environment().dimension;
        let render = config
            .render()
            .and_then(|render| render.primary_style().map(|style| (render, style)));

        let mut index = 0;

        for object in config.objects() {
            log::info!("Object {:?} from {}", object.name, object.path.display());
            emit(Progress::ObjectStarted {
                name: object.name.clone(),
            });

            let handle = capability.load_object(object, dimension)?;
            capability.select_object(&handle)?;
            if let Some(material) = &object.material {
                capability.load_material(&handle, material)?;
            }

            let object_dir = output_dir.join(&object.name);
            fs::create_dir(&object_dir).map_err(io_error(&object_dir))?;

            if object.normalize {
                capability.export_normalized_object(&object_dir.join(NORMALIZED_OBJECT_FILE))?;
            }

            let Some((settings, style)) = render else {
                capability.clear_objects()?;
                continue;
            };

            let camera = capability.create_camera()?;
            let texture = capability.define_texture(object)?;
            let viewpoints = capability.create_viewpoints(config.viewpoints(), *preview)?;

            let first_index = index;
            for shots in viewpoints {
                for coords in shots {
                    if cancel.is_cancelled() {
                        log::info!("Cancelled after {} shots", index);
                        return Err(GenerateError::Cancelled { shots: index });
                    }

                    let mut row = MetadataRow::new(index, object.name.as_str(), coords);
                    capability.move_camera_to(&camera, coords)?;

                    for light in config.lights() {
                        let light = capability.create_light(light)?;
                        capability.set_light_energy(&light, *light_energy)?;
                        row.push_light(capability.get_light_params(&light)?);
                    }

                    let shot_dir = object_dir.join(index.to_string());
                    fs::create_dir(&shot_dir).map_err(io_error(&shot_dir))?;

                    capability.set_render_resolution(settings)?;
                    capability.render(&shot_dir, style, texture.as_ref(), &handle)?;
                    capability.clear_lights()?;

                    if let Some(table) = table.as_deref_mut() {
                        let path = output_dir.join(METADATA_FILE);
                        table.write_row(&row).map_err(io_error(&path))?;
                    }

                    log::debug!("Shot {} of {:?} at {:?}", index, object.name, coords);
                    emit(Progress::ShotRendered {
                        index,
                        object: object.name.clone(),
                    });
                    index += 1;
                }
            }

            capability.clear_objects()?;
            emit(Progress::ObjectFinished {
                name: object.name.clone(),
                shots: index - first_index,
            });
        }

        Ok(index)
    }
}

impl<C> DatasetsGenerator<C>
where
    C: RenderCapability + Send + 'static,
{
    /// Run the generator on a dedicated thread.
    ///
    /// Progress is delivered through [`GeneratorTask::progress`]; any sender
    /// installed with [`DatasetsGenerator::with_progress`] is replaced.
    pub fn spawn(mut self) -> GenerateResult<GeneratorTask> {
        let (sender, receiver) = mpsc::channel();
        self.progress = Some(sender);
        let cancel = self.cancel.clone();

        let handle = thread::Builder::new()
            .name("dataset-generator".to_string())
            .spawn(move || self.run())
            .map_err(GenerateError::Spawn)?;

        Ok(GeneratorTask {
            handle,
            progress: receiver,
            cancel,
        })
    }
}

/// A generator running on its own thread.
pub struct GeneratorTask {
    handle: JoinHandle<GenerateResult<Summary>>,
    progress: Receiver<Progress>,
    cancel: CancelToken,
}

impl GeneratorTask {
    /// Progress events; the channel closes when the run ends.
    pub fn progress(&self) -> &Receiver<Progress> {
        &self.progress
    }

    /// Ask the run to stop before its next shot.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end.
    pub fn join(self) -> GenerateResult<Summary> {
        self.handle
            .join()
            .map_err(|_| GenerateError::WorkerPanicked)?
    }
}

/// Create `dir`'s missing parents, then `dir` itself, which must not exist.
fn create_output_dir(dir: &Path) -> GenerateResult<()> {
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    match fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            Err(GenerateError::OutputExists(dir.to_path_buf()))
        }
        Err(err) => Err(io_error(dir)(err)),
    }
}
