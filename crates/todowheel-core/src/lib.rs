pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod duration;
pub mod goals;
pub mod hosted;
pub mod mirror;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod task;
pub mod wheel;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::Command;
use crate::commands::Workspace;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre = cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting todowheel"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let command = cli
    .command
    .unwrap_or(Command::List {
      goal: None
    });
  if command == Command::Version {
    println!(
      "{}",
      env!("CARGO_PKG_VERSION")
    );
    return Ok(());
  }

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;
  let renderer =
    render::Renderer::new(&cfg)?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(async move {
    let mut ws = Workspace::open(
      cfg, data_dir, renderer
    )
    .await?;

    if command == Command::Shell {
      return commands::shell::run(
        &mut ws
      )
      .await;
    }

    let mut out = io::stdout().lock();
    let result =
      ws.execute(command, &mut out).await;
    let flushed = ws
      .flush()
      .await
      .context("failed to save changes");
    result?;
    flushed?;
    info!("done");
    Ok(())
  })
}
