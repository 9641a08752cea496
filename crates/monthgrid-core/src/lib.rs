pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod event;
pub mod feed;
pub mod grid;
pub mod render;

use std::ffi::OsString;
use std::path::Path;

use clap::Parser;
use tracing::{debug, info, warn};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting monthgrid CLI"
    );

    let mut cfg = config::Config::load(cli.gridrc.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));

    let events = load_feed(&cfg, cli.events.as_deref())?;
    let mut renderer = render::Renderer::new(&cfg)?;

    let command = cli.command.unwrap_or_else(|| {
        let name = cfg
            .get("default.command")
            .unwrap_or_else(|| "show".to_string());
        debug!(command = %name, "no explicit command, using default");
        cli::default_command(&name)
    });

    commands::dispatch(&cfg, &mut renderer, events, command)?;

    debug!("done");
    Ok(())
}

fn load_feed(
    cfg: &config::Config,
    override_path: Option<&Path>,
) -> anyhow::Result<Vec<event::Event>> {
    if let Some(path) = override_path {
        if path.as_os_str() == "-" {
            return feed::read_events_from_stdin();
        }
        return feed::load_events(path);
    }

    let path = cfg.events_location();
    if path.exists() {
        feed::load_events(&path)
    } else {
        warn!(feed = %path.display(), "event feed not found; starting with no events");
        Ok(Vec::new())
    }
}
