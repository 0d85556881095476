use crate::config::TrafficConfig;
use crate::services::traffic_images::TrafficImagesClient;
use reqwest::Client;

#[derive(Clone)]
pub struct AppState {
    pub traffic_images: TrafficImagesClient,
}

impl AppState {
    pub fn new(config: &TrafficConfig, http: Client) -> Self {
        Self {
            traffic_images: TrafficImagesClient::new(
                http,
                config.upstream_url.clone(),
                config.upstream_timeout,
            ),
        }
    }
}
