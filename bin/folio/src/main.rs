//! Folio CLI
//!
//! Static site builder with queryable content and content-hashed assets.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Folio.
#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "A static site builder with queryable content"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "folio.toml")]
    config: PathBuf,

    /// Source root the configured directories are relative to
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the static site
    Build {
        /// Output directory (defaults to build.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override site base URL (e.g., https://example.com)
        #[arg(long)]
        base_url: Option<String>,
        /// Skip sitemap generation
        #[arg(long)]
        no_sitemap: bool,
    },
    /// Start development server with on-demand rendering and live reload
    Serve {
        /// Port to listen on (defaults to serve.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the routes a build would render
    Routes,
    /// Query a content table
    Query {
        /// Table name
        table: String,
        /// Filter as KEY=VALUE; keys accept _gt, _gte, _lt, _lte, _not,
        /// _like and _ilike suffixes
        #[arg(short = 'w', long = "where", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Sort fields with optional asc, desc, nulls first, nulls last
        #[arg(long)]
        order_by: Option<String>,
        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print the number of matching rows instead
        #[arg(long)]
        count: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    folio::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            output,
            base_url,
            no_sitemap,
        } => {
            folio::cmd::build::run(
                &cli.config,
                &cli.root,
                output.as_deref(),
                base_url.as_deref(),
                no_sitemap,
            )
            .await?;
        }
        Commands::Serve { port } => {
            folio::cmd::serve::run(&cli.config, &cli.root, port).await?;
        }
        Commands::Routes => {
            folio::cmd::routes::run(&cli.config, &cli.root).await?;
        }
        Commands::Query {
            table,
            filters,
            order_by,
            limit,
            count,
        } => {
            folio::cmd::query::run(
                &cli.config,
                &cli.root,
                &table,
                &filters,
                order_by.as_deref(),
                limit,
                count,
            )
            .await?;
        }
    }

    Ok(())
}
