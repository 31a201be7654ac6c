use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use common::ContentKind;
use playback_controller::{ConfigManager, ControllerConfig, EnvConfigOverride};

use crate::script::Script;

/// Command line options of one simulator run
#[derive(Debug, Clone)]
pub struct Config {
    pub address: String,
    pub kind: ContentKind,
    pub script: Script,
    pub config_path: Option<PathBuf>,
    pub secure_context: bool,
    /// `None` runs until Ctrl+C
    pub run_for: Option<Duration>,
    pub json: bool,
}

pub fn command() -> Command {
    Command::new("stream-simulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drives the playback resilience controller against a scripted sink")
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .value_name("ADDRESS")
                .help("Canonical source address to play")
                .default_value("http://tv.example/live/user/pass/1001.ts"),
        )
        .arg(
            Arg::new("kind")
                .short('k')
                .long("kind")
                .value_name("KIND")
                .help("Content kind")
                .value_parser(["live", "movie", "series"])
                .default_value("live"),
        )
        .arg(
            Arg::new("script")
                .short('s')
                .long("script")
                .value_name("OUTCOMES")
                .help("Comma-separated per-attach outcomes; the last one repeats")
                .default_value("fail-other,fail-network,recover-network"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Controller configuration file (created with defaults if missing)"),
        )
        .arg(
            Arg::new("secure-context")
                .long("secure-context")
                .help("Host only allows secure transport")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("run-for")
                .short('t')
                .long("run-for")
                .value_name("SECS")
                .help("Seconds to run, 0 runs until Ctrl+C")
                .value_parser(clap::value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print snapshots as JSON lines")
                .action(ArgAction::SetTrue),
        )
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let address = matches
            .get_one::<String>("address")
            .cloned()
            .context("missing --address")?;

        let kind = match matches.get_one::<String>("kind").map(String::as_str) {
            Some("movie") => ContentKind::Movie,
            Some("series") => ContentKind::Series,
            _ => ContentKind::Live,
        };

        let script = matches
            .get_one::<String>("script")
            .context("missing --script")?
            .parse::<Script>()
            .context("invalid --script")?;

        let run_for = matches
            .get_one::<u64>("run-for")
            .copied()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            address,
            kind,
            script,
            config_path: matches.get_one::<String>("config").map(PathBuf::from),
            secure_context: matches.get_flag("secure-context"),
            run_for,
            json: matches.get_flag("json"),
        })
    }

    /// Controller configuration: file (if given), then `PLAYBACK_*`
    /// environment overrides, then command line flags
    pub async fn controller_config(&self) -> Result<ControllerConfig> {
        let mut config = match &self.config_path {
            Some(path) => {
                let mut manager = ConfigManager::new(path.clone());
                manager
                    .load()
                    .await
                    .with_context(|| format!("loading {}", path.display()))?;
                manager.get_config().clone()
            }
            None => ControllerConfig::default(),
        };

        EnvConfigOverride::apply_overrides(&mut config);
        if self.secure_context {
            config.environment.requires_secure_transport = true;
        }

        config.validate()?;
        Ok(config)
    }
}
