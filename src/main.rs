mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;
use std::sync::Arc;

use depfetch::config::Config;
use depfetch::observability::init_tracing;
use depfetch::repos::HandlerRegistry;
use depfetch::resolver::{BuildConfig, DependencyResolver, ResolveOptions};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load settings and register handlers; only commands that fetch need this
fn build_resolver(workdir: Option<PathBuf>) -> Result<DependencyResolver, BoxError> {
    let config = Config::load()?;
    let registry = Arc::new(HandlerRegistry::with_defaults(&config));
    tracing::debug!(handlers = ?registry, "Handlers registered");

    let mut options = ResolveOptions::from(&config.resolver);
    if let Some(workdir) = workdir {
        options.workdir = workdir;
    }
    Ok(DependencyResolver::new(registry, options))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Handlers = cli.command {
        let config = Config::load()?;
        for name in HandlerRegistry::with_defaults(&config).names() {
            println!("{name}");
        }
        return Ok(());
    }

    let build = BuildConfig::load(&cli.buildconfig)?;

    match cli.command {
        Commands::Resolve(args) => {
            let resolver = build_resolver(cli.workdir)?;
            let resolution = resolver.resolve(&build).await?;
            if args.write_pinned {
                std::fs::write(&cli.buildconfig, resolution.pinned.to_json_pretty()?)?;
            }
            let snapshot = resolver.metrics().snapshot();
            tracing::info!(
                resolved = snapshot.resolved,
                unreproducible = snapshot.unreproducible,
                "Dependencies ready"
            );
            println!("{}", resolution.repro_string());
        }
        Commands::Get { name } => {
            let fragment = build_resolver(cli.workdir)?.get(&build, &name).await?;
            println!("{fragment}");
        }
        Commands::ReproArgs => {
            println!("{}", build_resolver(cli.workdir)?.repro_args(&build).await?);
        }
        Commands::Arg { optional, name } => {
            println!("{}", build.arg(&name, optional)?);
        }
        Commands::Clean => {
            let workdir = cli.workdir.unwrap_or_else(|| PathBuf::from("."));
            let removed = build.clean(&workdir)?;
            tracing::info!(removed = removed.len(), "Workspace cleaned");
        }
        Commands::Handlers => {}
    }

    Ok(())
}
