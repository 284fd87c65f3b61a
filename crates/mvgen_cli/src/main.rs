//! `mvgen`: generate a multi-view dataset from a JSON config.
//!
//! Usage: `mvgen <config.json> [--preview] [--output <dir>] [--seed <n>] [--open]`
//!
//! Relative asset paths in the config are resolved against the config
//! file's directory.

use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use mvgen_core::json_loads;
use mvgen_generator::{DatasetsGenerator, HeadlessCapability, Progress};

const USAGE: &str = "Usage: mvgen <config.json> [--preview] [--output <dir>] [--seed <n>] [--open]";

#[derive(Debug, PartialEq)]
struct Args {
    config: PathBuf,
    preview: bool,
    output: Option<PathBuf>,
    seed: Option<u64>,
    open: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut config = None;
    let mut preview = false;
    let mut output = None;
    let mut seed = None;
    let mut open = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--preview" => preview = true,
            "--open" => open = true,
            "--output" => {
                let dir = args.next().context("--output needs a directory")?;
                output = Some(PathBuf::from(dir));
            }
            "--seed" => {
                let value = args.next().context("--seed needs a number")?;
                seed = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid seed {value:?}"))?,
                );
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            path => {
                if config.is_some() {
                    bail!("unexpected argument {path:?}\n{USAGE}");
                }
                config = Some(PathBuf::from(path));
            }
        }
    }

    Ok(Args {
        config: config.context(USAGE)?,
        preview,
        output,
        seed,
        open,
    })
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(env::args().skip(1))?;
    let config = json_loads(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let seed = args.seed.unwrap_or_else(time_seed);
    log::info!("Loaded {} (seed {})", args.config.display(), seed);

    let mut capability = HeadlessCapability::new(seed).with_open_output(args.open);
    if let Some(root) = args.config.parent().filter(|p| !p.as_os_str().is_empty()) {
        capability = capability.with_asset_root(root);
    }

    let mut generator = DatasetsGenerator::new(config, capability, args.preview);
    if let Some(output) = args.output {
        generator = generator.with_output_dir(output);
    }
    let total = generator.config().objects().len() * generator.config().shots_per_object();

    let task = generator.spawn()?;
    for event in task.progress() {
        match event {
            Progress::Started { output_dir, objects } => {
                log::info!("Writing {} objects to {}", objects, output_dir.display())
            }
            Progress::ObjectStarted { name } => log::info!("Processing {name}"),
            Progress::ShotRendered { index, object } => {
                if args.preview {
                    log::info!("Shot {index} ({object})");
                } else {
                    log::info!("Shot {}/{} ({object})", index + 1, total);
                }
            }
            Progress::ObjectFinished { name, shots } => log::info!("Finished {name}: {shots} shots"),
        }
    }

    let summary = task.join().context("Dataset generation failed")?;
    println!(
        "Generated {} shots for {} objects in {}",
        summary.shots,
        summary.objects,
        summary.output_dir.display()
    );
    Ok(())
}
