use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use traffic_monitor::{cli, config, openapi, routes, state, static_assets};

/// Binds the proxy listener and reports the address actually bound, which
/// differs from the request when `--port 0` asks for an ephemeral port.
async fn bind_listener(host: &str, port: u16) -> Result<(TcpListener, SocketAddr)> {
    let addr = format!("{host}:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "traffic proxy cannot listen on {addr}: port {port} is taken. Pass --port with a free port and point traffic-watch --endpoint at it.",
            );
        }
        Err(err) if err.kind() == std::io::ErrorKind::AddrNotAvailable => {
            anyhow::bail!(
                "traffic proxy cannot listen on {addr}: {host} is not an address of this machine. Pass --host 127.0.0.1 or --host 0.0.0.0.",
            );
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to bind traffic proxy on {addr}"));
        }
    };
    let bound = listener
        .local_addr()
        .context("traffic proxy listener has no local address")?;
    Ok((listener, bound))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!("{}", serde_json::to_string_pretty(&openapi::openapi_json())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::TrafficConfig::from_env(args.static_root)?;
    tracing::info!(
        upstream = %config.upstream_url,
        image_hosts = ?config.image_hosts.hosts(),
        "traffic proxy configured"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("traffic-monitor/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let state = state::AppState::new(&config, http);

    let app = routes::router(state).fallback_service(static_assets::service(config.static_root)?);
    let (listener, bound) = bind_listener(&args.host, args.port).await?;
    tracing::info!(bind = %bound, endpoint = %format!("http://{bound}/api/traffic"), "traffic proxy listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
        }
    })
    .await?;
    Ok(())
}
