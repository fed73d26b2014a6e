use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing::info;
use tracing::level_filters::LevelFilter;

use embedded_ldap::config::Config;
use embedded_ldap::{EmbeddedLdapServer, Lifecycle};

#[derive(Debug, StructOpt)]
#[structopt(name = "embedded-ldap", about = "An in-memory LDAP server for tests and demos")]
pub struct Opt {
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u32,

    /// Configuration file, the built-in defaults are used if not given
    #[structopt(short, long)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match opt.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    tracing_log::LogTracer::init()
        .context("Failed to install log bridge")?;

    let config = match &opt.config {
        Some(path) => Config::load(path).await
            .with_context(|| format!("Failed to load config: {:?}", path))?,
        None => Config::default(),
    };

    let mut lifecycle = Lifecycle::new();
    lifecycle.register(EmbeddedLdapServer::new(config.ldap));

    lifecycle.start().await?;

    tokio::signal::ctrl_c().await
        .context("Failed to wait for shutdown signal")?;
    info!("Received shutdown signal");

    lifecycle.stop().await?;

    return Ok(());
}
