use crate::config::TrafficConfig;
use crate::state::AppState;
use axum::Router;
use std::net::SocketAddr;

pub fn test_config() -> TrafficConfig {
    // Nothing listens on port 9; requests fail fast if a test reaches upstream by accident.
    TrafficConfig::from_lookup(None, |key| {
        (key == "TRAFFIC_UPSTREAM_URL").then(|| "http://127.0.0.1:9/traffic-images".to_string())
    })
    .expect("test config")
}

pub fn test_state() -> AppState {
    AppState::new(&test_config(), reqwest::Client::new())
}

/// Serves `app` on an ephemeral loopback port. Returns `None` when the
/// sandbox refuses the bind.
pub async fn spawn_server(app: Router) -> Option<SocketAddr> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(err) => panic!("failed to bind test server: {err}"),
    };
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Some(addr)
}
