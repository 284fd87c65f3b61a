// Write a starter dataset config with the default settings.
// Run with: cargo run --bin mvgen_template -- <out.json>

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use mvgen_core::{json_dumps, Config, Environment, Light, Object, Render, Viewpoint, ViewpointKind};

fn default_config() -> Result<Config> {
    let config = Config::new(
        Some(Environment::new(1)),
        Some(Render::new(128, 128, "dataset").with_styles(["normal"])),
        vec![Object::new("object", "object.obj")],
        vec![Light::dynamic(5.0, [255, 255, 255])],
        vec![Viewpoint::new(ViewpointKind::Dynamic)],
    )?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <out.json>", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    let config = default_config()?;
    json_dumps(&config, Some(path))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote template config to {}", path.display());
    Ok(())
}
