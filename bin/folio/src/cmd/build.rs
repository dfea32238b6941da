//! Build command - generates the static site

use std::{path::Path, sync::Arc, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use folio_content::ContentStore;
use folio_generator::{Builder, build::output_dir};

use super::{file_renderer, load_config, resolve_root};

/// Run the build command.
///
/// Renders every page and asset below `root` into the output directory.
pub async fn run(
    config_path: &Path,
    root: &Path,
    output: Option<&Path>,
    base_url: Option<&str>,
    no_sitemap: bool,
) -> Result<()> {
    let start = Instant::now();
    tracing::info!(?config_path, ?root, ?output, ?base_url, "Starting build");

    let mut config = load_config(config_path)?;
    let root = resolve_root(root)?;

    if let Some(url) = base_url {
        tracing::info!(base_url = url, "Overriding site base_url from CLI");
        config.site.base_url = url.to_string();
    }
    if no_sitemap {
        config.build.sitemap = false;
    }

    let output = match output {
        Some(dir) => dir.to_path_buf(),
        None => output_dir(&config, &root),
    };

    let store = Arc::new(ContentStore::new());
    let renderer = file_renderer(&config, &root, Arc::clone(&store));
    let builder = Builder::new(config, &root, &output, renderer).with_store(store);

    let stats = builder.build().await.wrap_err("Build failed")?;

    let duration = start.elapsed();

    println!();
    println!("  Build completed successfully!");
    println!();
    println!("  Routes:     {}", stats.routes);
    println!("  Pages:      {}", stats.pages);
    println!("  Failed:     {}", stats.failed);
    println!("  Assets:     {}", stats.assets);
    println!("  Public:     {}", stats.public_files);
    println!();
    println!("  Duration:   {:.2}s", duration.as_secs_f64());
    println!("  Output:     {}", output.display());
    println!();

    tracing::info!(?stats, ?duration, "Build completed successfully");

    Ok(())
}
