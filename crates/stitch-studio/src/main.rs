use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use stitch_engine::host::HostConfig;
use stitch_engine::logging::{init_logging, LoggingConfig};
use stitch_engine::native::NativeModule;
use stitch_engine::worker::{StitchWorker, WorkerConfig};
use stitch_ui::prelude::*;

mod images;
#[cfg(feature = "window")]
mod window;

/// Stitch two overlapping screenshots into one image.
#[derive(Parser, Debug, Clone)]
#[command(name = "stitch-studio", version)]
struct Args {
    /// First screenshot.
    first: PathBuf,

    /// Second screenshot; placed over the first where they overlap.
    second: PathBuf,

    /// Where to write the merged PNG.
    #[arg(short, long, default_value = "stitched.png")]
    output: PathBuf,

    /// Upper bound for the compute module's linear memory.
    #[arg(long, env = "STITCH_MAX_MEMORY_MIB")]
    max_memory_mib: Option<usize>,

    /// Log filter in env_logger syntax, e.g. "debug" or "stitch::module=debug".
    #[arg(long, env = "STITCH_LOG")]
    log: Option<String>,

    /// Open an interactive pan/zoom window on the result.
    #[arg(long)]
    view: bool,
}

impl Args {
    fn worker_config(&self) -> WorkerConfig {
        let host = match self.max_memory_mib {
            Some(mib) => HostConfig::default().with_max_memory_mib(mib),
            None => HostConfig::default(),
        };
        WorkerConfig {
            host,
            ..WorkerConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig::with_filter(args.log.clone()));
    run(&args)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut collection = ImageCollection::new();
    for path in [&args.first, &args.second] {
        let image = images::load(path)?;
        log::info!("loaded {} ({}x{})", path.display(), image.width(), image.height());
        collection.add_input(image);
    }

    let worker = StitchWorker::spawn(args.worker_config(), NativeModule::instantiate)?;
    let mut coordinator = StitchCoordinator::new(worker);
    let mut view = ScrollZoom::new(Size::new(1024.0, 768.0), ViewportConfig::default());

    if !coordinator.stitch(&collection)? {
        bail!("need exactly two selected images");
    }
    let mut reported = 0u32;
    let index = coordinator
        .wait(&mut collection, &mut view, |f| {
            let tenth = (f * 10.0).floor() as u32;
            if tenth > reported {
                reported = tenth;
                log::info!("{:>3}%", tenth * 10);
            }
        })
        .context("stitching failed")?;

    let merged = collection
        .get(index)
        .map(SelectableImage::image)
        .context("stitched image missing from the collection")?;
    images::save_png(&args.output, merged)?;
    log::info!(
        "wrote {} ({}x{})",
        args.output.display(),
        merged.width(),
        merged.height()
    );

    if args.view {
        show(merged, view.config().clone())?;
    }
    Ok(())
}

#[cfg(feature = "window")]
fn show(image: &PixelImage, config: ViewportConfig) -> anyhow::Result<()> {
    window::show("stitch-studio", image, config)
}

#[cfg(not(feature = "window"))]
fn show(_image: &PixelImage, _config: ViewportConfig) -> anyhow::Result<()> {
    log::warn!("--view needs a build with the `window` feature");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["stitch-studio", "a.png", "b.png"]).unwrap();
        assert_eq!(args.output, PathBuf::from("stitched.png"));
        assert!(!args.view);
        assert_eq!(args.worker_config().host, HostConfig::default());
    }

    #[test]
    fn memory_cap_maps_to_pages() {
        let args =
            Args::try_parse_from(["stitch-studio", "a.png", "b.png", "--max-memory-mib", "64", "-o", "out.png"])
                .unwrap();
        assert_eq!(args.worker_config().host.max_pages, 1024);
        assert_eq!(args.output, PathBuf::from("out.png"));
    }

    #[test]
    fn two_inputs_are_required() {
        assert!(Args::try_parse_from(["stitch-studio", "a.png"]).is_err());
    }
}
