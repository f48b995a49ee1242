//! `tilelod render`: write the best available image for one tile.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tilelod::config::ConfigFile;
use tilelod::coord::TileCoord;
use tilelod::engine::{LodEngine, TileContent};
use tilelod::logging::init_logging;
use tilelod::provider::{ReqwestClient, TemplateUrlBuilder};
use tilelod::registry::TileRegistry;
use tracing::info;

use crate::error::CliError;

/// Arguments for `tilelod render`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Zoom level
    #[arg(long)]
    pub zoom: u8,

    /// Tile column (x)
    #[arg(long)]
    pub col: u32,

    /// Tile row (y)
    #[arg(long)]
    pub row: u32,

    /// Output image path (format from extension, e.g. .png)
    #[arg(long)]
    pub output: PathBuf,

    /// Wait for the exact tile and overwrite the output with it
    #[arg(long)]
    pub wait: bool,

    /// Print a JSON summary instead of text
    #[arg(long)]
    pub json: bool,

    /// Tile URL template, overriding [tiles] url_template
    #[arg(long)]
    pub url_template: Option<String>,

    /// Override [lod] level_of_detail
    #[arg(long)]
    pub level_of_detail: Option<u8>,

    /// Override [lod] max_oversample
    #[arg(long)]
    pub max_oversample: Option<u8>,

    /// Override [tiles] size
    #[arg(long)]
    pub tile_size: Option<u32>,
}

impl RenderArgs {
    /// Fold command-line overrides into the loaded file settings.
    fn apply_to(&self, config: &mut ConfigFile) {
        if let Some(template) = &self.url_template {
            config.tiles.url_template = Some(template.clone());
        }
        if let Some(level_of_detail) = self.level_of_detail {
            config.lod.level_of_detail = level_of_detail;
        }
        if let Some(max_oversample) = self.max_oversample {
            config.lod.max_oversample = max_oversample;
        }
        if let Some(tile_size) = self.tile_size {
            config.tiles.size = tile_size;
        }
    }
}

/// Run the render command.
pub async fn run(args: RenderArgs, config_path: &Path) -> Result<(), CliError> {
    let mut config = ConfigFile::load_from(config_path)?;
    args.apply_to(&mut config);

    let _logging = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let template = config.tiles.url_template.clone().ok_or_else(|| {
        CliError::Config(
            "no tile URL template. Set [tiles] url_template in config.ini or pass --url-template"
                .to_string(),
        )
    })?;
    let coord = TileCoord::try_new(args.row, args.col, args.zoom)?;

    let lod_config = config.lod_config();
    let urls = Arc::new(TemplateUrlBuilder::new(template, lod_config.tile_size));
    let client =
        Arc::new(ReqwestClient::with_timeout(config.fetch.timeout).map_err(CliError::Client)?);
    let engine = Arc::new(LodEngine::new(lod_config, urls, client)?);
    let mut registry = TileRegistry::new(Arc::clone(&engine));

    let handle = registry.display_tile(coord);
    let Some(content) = registry.content(handle).cloned() else {
        return Err(CliError::Config(format!("tile {} was not registered", coord)));
    };
    write_image(&content, &args.output)?;
    report(&content, &args.output, args.json)?;

    let pending = if args.wait {
        content.pending().cloned()
    } else {
        None
    };
    if let Some(pending) = pending {
        info!(tile = %coord, lod = pending.key().lod, "Waiting for exact tile");
        match pending.loaded().await {
            Some(_) => {
                registry.refresh_loaded(pending.key());
                if let Some(refreshed) = registry.content(handle) {
                    write_image(refreshed, &args.output)?;
                    report(refreshed, &args.output, args.json)?;
                }
            }
            None => {
                engine.shutdown();
                return Err(CliError::Fetch(format!(
                    "{} at LOD {} did not load",
                    coord,
                    pending.key().lod
                )));
            }
        }
    }

    info!(store = %engine.store().stats(), "Render finished");
    engine.shutdown();
    Ok(())
}

fn write_image(content: &TileContent, path: &Path) -> Result<(), CliError> {
    content
        .flatten()
        .save(path)
        .map_err(|error| CliError::ImageWrite {
            path: path.display().to_string(),
            error,
        })
}

fn report(content: &TileContent, output: &Path, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&content.summary())?);
        return Ok(());
    }

    let layers: Vec<String> = content
        .layer_kinds()
        .into_iter()
        .map(|kind| kind.to_string())
        .collect();

    println!("Tile {} at LOD {}", content.key.coord, content.key.lod);
    println!("  Source:   {}", content.source);
    println!("  Complete: {}", content.complete);
    println!("  Layers:   {}", layers.join(", "));
    println!("  Output:   {} ({}x{})", output.display(), content.size, content.size);
    Ok(())
}
