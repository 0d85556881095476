use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use traffic_monitor::cli::WatchArgs;
use traffic_monitor::config::TrafficConfig;
use traffic_monitor::poller::{HttpSnapshotSource, PollingClient};
use traffic_monitor::tile::{ImageLoader, ImageProbe, ImageState};
use traffic_monitor::view::Dashboard;
use url::Url;

fn init_tracing() -> Result<()> {
    // Logs go to stderr so they don't interleave with the redrawn dashboard.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,traffic_monitor=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn redraw(dashboard: &Dashboard) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "\x1b[2J\x1b[H{}", dashboard.render())?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = WatchArgs::parse();
    init_tracing()?;

    let config = TrafficConfig::from_env(None)?;
    let endpoint = Url::parse(&args.endpoint)
        .with_context(|| format!("invalid --endpoint {:?}", args.endpoint))?;
    let interval = Duration::from_secs(args.interval_seconds.max(1));
    let http = reqwest::Client::new();

    let poller =
        PollingClient::new(HttpSnapshotSource::new(http.clone(), endpoint.clone()), interval).mount();
    let mut updates = poller.subscribe();
    let image_timeout = Duration::from_secs(args.image_timeout_seconds.max(1));
    let (mut images, mut image_outcomes) = ImageLoader::new(ImageProbe::new(http, image_timeout));
    let probe_images = !args.no_image_probe;
    tracing::info!(endpoint = %endpoint, interval_seconds = interval.as_secs(), "watching traffic cameras");

    let mut dashboard = Dashboard::new(config.image_hosts, interval, Utc::now());
    redraw(&dashboard)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                dashboard.apply(state);
                if probe_images {
                    images.dispatch(dashboard.tiles());
                } else if dashboard.has_pending_images() {
                    for tile in dashboard.tiles_mut() {
                        if tile.state() == ImageState::Loading {
                            tile.on_image_loaded();
                        }
                    }
                }
                redraw(&dashboard)?;
            }
            Some(outcome) = image_outcomes.recv() => {
                images.settle(&outcome);
                dashboard.apply_image(&outcome);
                redraw(&dashboard)?;
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}
