use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod errors;
mod formats;
mod projector;
mod query;
mod registry;
mod sampling;
mod similarity;
mod space;
mod typeahead;
mod web;

use cli::Command;
use config::Config;
use query::QueryFacade;
use registry::SpaceRegistry;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config_dir {
        Some(dir) => Config::load_with(dir)?,
        None => Config::load()?,
    };
    config.apply_env();

    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.data_path());
    let registry = SpaceRegistry::load_all(&data_dir, &config.extensions)
        .with_context(|| format!("couldnt read data dir {}", data_dir.display()))?;

    let facade = QueryFacade::new(
        Arc::new(registry),
        config.defaults.clone(),
        config.limits.clone(),
    );

    match args.command {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.listen.clone());
            web::start_daemon(facade, &listen, config.cors_allow_any_origin)
        }

        Command::Spaces {} => print_json(&facade.spaces()),

        Command::Typeahead { space, q } => print_json(&facade.typeahead(&space, &q)?),

        Command::Nearest { space, q, n } => print_json(&facade.nearest(&space, &q, n)?),

        Command::Dist { space, q } => print_json(&facade.distances(&space, &q)?),

        Command::Sim { space, q, n } => print_json(&facade.similarity(&space, &q, n)?),

        Command::SimMultiple { space, q } => {
            print_json(&facade.similarity_multiple(&space, &q)?)
        }

        Command::SimRandom { space, q, n, seed } => {
            let response = match seed {
                Some(seed) => facade.similarity_random_with(
                    &space,
                    &q,
                    n,
                    &mut StdRng::seed_from_u64(seed),
                )?,
                None => facade.similarity_random(&space, &q, n)?,
            };
            print_json(&response)
        }

        Command::Random { space, n, seed } => {
            let response = match seed {
                Some(seed) => {
                    facade.random_tokens_with(&space, n, &mut StdRng::seed_from_u64(seed))?
                }
                None => facade.random_tokens(&space, n)?,
            };
            print_json(&response)
        }
    }
}
