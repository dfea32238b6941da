//! Routes command - lists the routes a build would render

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use folio_core::Route;
use folio_generator::{Builder, build::output_dir};

use super::{file_renderer, load_config, prepare_store, resolve_root};

/// Run the routes command.
pub async fn run(config_path: &Path, root: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let root = resolve_root(root)?;

    let store = prepare_store(&config, &root).await?;
    let renderer = file_renderer(&config, &root, store.clone());
    let output = output_dir(&config, &root);
    let builder = Builder::new(config, &root, output, renderer).with_store(store);

    let routes = builder
        .collect_routes()
        .wrap_err("Failed to collect routes")?;

    for route in &routes {
        let route = Route::new(route.as_str());
        println!("  {:<6} /{}", route.resource_type, route.path);
    }
    println!();
    println!("  {} routes", routes.len());

    Ok(())
}
