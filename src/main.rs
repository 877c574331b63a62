//! caforge - create a root CA on first use and issue a client certificate from it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use caforge::config::Config;
use caforge::prompt::ConsoleInput;

#[derive(Parser)]
#[command(name = "caforge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding the CA certificate and key
    #[arg(long, env = "CAFORGE_CA_DIR", default_value = caforge::store::DEFAULT_CA_DIR)]
    ca_dir: PathBuf,

    /// Directory receiving the issued certificate and key
    #[arg(long, env = "CAFORGE_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Issue even when the CA certificate has expired
    #[arg(long)]
    allow_expired_ca: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("caforge=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("caforge=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::builder()
        .ca_dir(cli.ca_dir)
        .out_dir(cli.out_dir)
        .enforce_ca_expiry(!cli.allow_expired_ca)
        .build();
    debug!(?config, "starting caforge");

    let mut workflow = config.workflow();
    let issued = workflow
        .run(&mut ConsoleInput)
        .with_context(|| format!("issuing from CA in {}", config.ca_dir.display()))?;

    println!("Certificate: {}", issued.artifacts.cert_path.display());
    println!("Private key: {}", issued.artifacts.key_path.display());
    Ok(())
}
