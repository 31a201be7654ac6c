mod config;
mod script;
mod scripted_sink;

use anyhow::Result;
use common::SessionSnapshot;
use playback_controller::logging::init_logging;
use playback_controller::{PlaybackService, SystemOpener};
use tracing::{info, warn};

use crate::scripted_sink::ScriptedSink;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = config::command().get_matches();
    let options = config::Config::from_matches(&matches)?;
    let controller_config = options.controller_config().await?;

    init_logging(&controller_config.logging)?;

    info!("Stream simulator starting");
    info!(address = %options.address, kind = %options.kind, script = %options.script, "Scenario loaded");
    if options.json {
        println!("{}", serde_json::to_string(&options.script)?);
    }

    let script = options.script.clone();
    let handle = PlaybackService::spawn(
        controller_config,
        move |signals| ScriptedSink::new(signals, script),
        SystemOpener,
    )?;

    let mut snapshots = handle.subscribe();
    handle.play(options.address.as_str(), options.kind).await?;

    let deadline = async {
        match options.run_for {
            Some(run_for) => tokio::time::sleep(run_for).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Run time elapsed");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Playback service stopped unexpectedly");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                report(&snapshot, options.json)?;
            }
        }
    }

    let last = handle.snapshot();
    handle.shutdown().await?;
    info!(
        cycles = last.retry_cycle_count,
        state = %last.state,
        "Stream simulator stopped"
    );
    Ok(())
}

fn report(snapshot: &SessionSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!("{}", snapshot.status_line());
    }
    Ok(())
}
