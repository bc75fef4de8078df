#[macro_use]
extern crate log;

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::path::PathBuf;

mod binding_from_str;

mod errors;

mod mixer_config;
#[cfg(test)]
mod mixer_config_tests;

mod mixer;

mod scopes_container;
#[cfg(test)]
mod scopes_container_tests;

mod service;

mod services_scope;

mod utils;


use errors::Error;
use mixer::{Destination, MixOutcome, Mixer, MixerOpts};

/// Compile docker-compose from several docker-compose.yml files
#[derive(Parser, Debug)]
#[command(name = "dc-mixer", version)]
#[command(after_help = "For more information read documentation: https://github.com/paunin/docker-compose-mixer")]
struct Cli {
    /// Enable verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Mixer file to read
    #[arg(short, long, value_name = "FILE", default_value = mixer::MIXER_FILE)]
    input: PathBuf,

    /// Compose file to write, `-` for stdout
    #[arg(short, long, value_name = "FILE", default_value = mixer::OUTPUT_FILE)]
    output: PathBuf,
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default()
        .filter_or("LOG_LEVEL", level)
        .write_style_or("LOG_STYLE", "auto");
    env_logger::init_from_env(env);
}

async fn run(cli: Cli) -> Result<MixOutcome> {
    let mut mixer = Mixer::new(MixerOpts {
        input_file: Some(cli.input),
        output_file: Some(cli.output),
    })?;

    let outcome = mixer
        .process()
        .await
        .with_context(|| format!("Failed to mix {}", mixer.input_file.display()))?;

    Ok(outcome)
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::ManifestNotFound(_)) => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli).await {
        Ok(MixOutcome::Skipped) => {}
        Ok(MixOutcome::Saved {
            destination,
            services,
            redefinitions,
        }) => {
            if let Destination::File(path) = destination {
                info!("Wrote {} services to {}", services, path.display());
            }
            if !redefinitions.is_empty() {
                info!("{} services had their host ports redefined", redefinitions.len());
            }
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(exit_code(&err));
        }
    }
}
