use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cameras::{self, ImageHostAllowlist};
use crate::snapshot::CameraReading;
use crate::time;

pub const IMAGE_FAILED_MESSAGE: &str = "Failed to load image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Loading,
    Ready,
    Failed,
}

/// One camera's panel on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTile {
    camera_id: String,
    label: String,
    image_url: String,
    timestamp: String,
    state: ImageState,
}

impl CameraTile {
    pub fn new(reading: &CameraReading, image_hosts: &ImageHostAllowlist) -> Self {
        let label = cameras::label_for(&reading.camera_id)
            .map(str::to_string)
            .unwrap_or_else(|| reading.camera_id.clone());
        let state = if image_hosts.allows(&reading.image) {
            ImageState::Loading
        } else {
            tracing::debug!(camera_id = %reading.camera_id, image = %reading.image, "image host not allowed");
            ImageState::Failed
        };
        Self {
            camera_id: reading.camera_id.clone(),
            label,
            image_url: reading.image.clone(),
            timestamp: reading.timestamp.clone(),
            state,
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Points the tile at a newer frame of the same camera. The image
    /// substate carries over unless the new frame's host is not allowed.
    pub fn refresh(&mut self, reading: &CameraReading, image_hosts: &ImageHostAllowlist) {
        self.image_url = reading.image.clone();
        self.timestamp = reading.timestamp.clone();
        if !image_hosts.allows(&self.image_url) {
            tracing::debug!(camera_id = %self.camera_id, image = %self.image_url, "image host not allowed");
            self.state = ImageState::Failed;
        }
    }

    pub fn on_image_loaded(&mut self) {
        if self.state == ImageState::Loading {
            self.state = ImageState::Ready;
        }
    }

    /// Failure is terminal for the tile.
    pub fn on_image_error(&mut self) {
        self.state = ImageState::Failed;
    }

    pub fn apply_image_result(&mut self, result: &Result<(), ImageLoadError>) {
        match result {
            Ok(()) => self.on_image_loaded(),
            Err(err) => {
                tracing::warn!(camera_id = %self.camera_id, "camera image failed: {err}");
                self.on_image_error();
            }
        }
    }

    pub fn last_updated(&self) -> String {
        time::format_time_of_day(&self.timestamp).unwrap_or_else(|_| self.timestamp.clone())
    }

    pub fn render(&self) -> Vec<String> {
        let image_line = match self.state {
            ImageState::Loading => "  [ loading image... ]".to_string(),
            ImageState::Ready => format!("  [ image ] {}", self.image_url),
            ImageState::Failed => format!("  [ {IMAGE_FAILED_MESSAGE} ]"),
        };
        vec![
            self.label.clone(),
            format!("  Camera ID: {}", self.camera_id),
            image_line,
            format!("  Last updated: {}", self.last_updated()),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("image request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image request returned HTTP {0}")]
    Status(StatusCode),
    #[error("unexpected image content type {0:?}")]
    NotAnImage(String),
}

/// Outcome of one image load, keyed by the camera it was started for.
#[derive(Debug)]
pub struct ImageOutcome {
    pub camera_id: String,
    pub result: Result<(), ImageLoadError>,
}

/// Loads camera images on behalf of tiles. The image is fetched as-is, with
/// no resizing or re-encoding.
#[derive(Debug, Clone)]
pub struct ImageProbe {
    http: Client,
    timeout: Duration,
}

impl ImageProbe {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub async fn load(&self, image_url: &str) -> Result<(), ImageLoadError> {
        let response = self
            .http
            .get(image_url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status(status));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ImageLoadError::NotAnImage(content_type));
        }
        response.bytes().await?;
        Ok(())
    }
}

/// Runs one load task per waiting tile and reports each outcome on its own
/// channel message, so a slow image never holds up the others.
pub struct ImageLoader {
    probe: ImageProbe,
    in_flight: HashSet<String>,
    tx: mpsc::UnboundedSender<ImageOutcome>,
}

impl ImageLoader {
    pub fn new(probe: ImageProbe) -> (Self, mpsc::UnboundedReceiver<ImageOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let loader = Self {
            probe,
            in_flight: HashSet::new(),
            tx,
        };
        (loader, rx)
    }

    /// Starts a load for every `Loading` tile that has none running yet.
    pub fn dispatch<'a>(&mut self, tiles: impl IntoIterator<Item = &'a CameraTile>) {
        for tile in tiles {
            if tile.state() != ImageState::Loading {
                continue;
            }
            if !self.in_flight.insert(tile.camera_id().to_string()) {
                continue;
            }
            let probe = self.probe.clone();
            let tx = self.tx.clone();
            let camera_id = tile.camera_id().to_string();
            let image_url = tile.image_url().to_string();
            tokio::spawn(async move {
                let result = probe.load(&image_url).await;
                // Receiver gone means the viewer is shutting down.
                let _ = tx.send(ImageOutcome { camera_id, result });
            });
        }
    }

    pub fn settle(&mut self, outcome: &ImageOutcome) {
        self.in_flight.remove(&outcome.camera_id);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
