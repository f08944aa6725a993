use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{bail, Context};
use clap::Parser;
use sketchpad_events::{encode_events, InputValue};
use sketchpad_logo::Logo;
use sketchpad_render::{format_events, OutputKind, Raster, Surface, SurfaceHandle};
use sketchpad_runner::{Driver, RunnerConfig};

#[derive(Parser, Debug)]
#[command(about = "Run a LOGO program, print its output and optionally save its drawings")]
struct Args {
    /// The program to run.
    file: PathBuf,

    /// Wall-clock limit in seconds. Defaults to the configured timeout.
    #[arg(long)]
    timeout: Option<f64>,

    /// An answer for the program to read, in order. `true` and `false` answer `confirm`,
    /// anything else answers `prompt`. A JSON object is passed on as an interaction.
    #[arg(long = "input", value_name = "VALUE")]
    inputs: Vec<String>,

    /// Runner settings, as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump the raw events as JSON instead of formatting them.
    #[arg(long)]
    events: bool,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Where to save the turtle drawing, as a PNG image.
    #[arg(long)]
    turtle_png: Option<PathBuf>,

    /// Where to save the canvas drawing, as a PNG image.
    #[arg(long)]
    canvas_png: Option<PathBuf>,
}

fn parse_input(s: &str) -> InputValue {
    match serde_json::from_str::<InputValue>(s) {
        Ok(InputValue::Prompt(_)) | Err(_) => InputValue::Prompt(s.to_owned()),
        Ok(v) => v,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunnerConfig> {
    let Some(path) = path else {
        return Ok(RunnerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("bad config {}", path.display()))
}

fn save_png(raster: &Raster, path: &Path) -> anyhow::Result<()> {
    raster
        .image()
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let mut driver = Driver::with_config(Logo::default(), load_config(args.config.as_deref())?);
    let timeout = args.timeout.unwrap_or(driver.config().default_timeout);
    let inputs = args.inputs.iter().map(|s| parse_input(s)).collect();

    let turtle = Rc::new(RefCell::new(Raster::new(args.width, args.height)));
    let canvas = Rc::new(RefCell::new(Raster::new(args.width, args.height)));
    let handle: SurfaceHandle = canvas.clone();

    let events = driver.run(&source, timeout, inputs, Some(handle))?;
    log::debug!("{} events", events.len());

    if args.events {
        println!("{}", encode_events(&events)?);
    }

    let out = format_events(
        &events,
        Some(&mut *turtle.borrow_mut() as &mut dyn Surface),
        Some(&mut *canvas.borrow_mut() as &mut dyn Surface),
    );
    if !args.events {
        for line in out.text.lines() {
            match out.kind {
                OutputKind::CompileError => println!("Error: {line}"),
                OutputKind::RuntimeError => println!("Runtime Error: {line}"),
                OutputKind::Normal => println!("{line}"),
            }
        }
        if out.timed_out {
            println!("Stopped: the program took longer than {timeout} seconds");
        }
    }

    if let Some(path) = &args.turtle_png {
        save_png(&turtle.borrow(), path)?;
    }
    if let Some(path) = &args.canvas_png {
        save_png(&canvas.borrow(), path)?;
    }

    match out.kind {
        OutputKind::CompileError => bail!("{} did not compile", args.file.display()),
        OutputKind::RuntimeError => bail!("{} failed", args.file.display()),
        OutputKind::Normal if out.failed => bail!("{} failed", args.file.display()),
        OutputKind::Normal if out.timed_out => bail!("{} timed out", args.file.display()),
        OutputKind::Normal => Ok(()),
    }
}
