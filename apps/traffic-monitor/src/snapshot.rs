use serde::{Deserialize, Serialize};

use crate::cameras;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CameraPosition {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ImageMetadata {
    pub height: u32,
    pub width: u32,
    pub md5: String,
}

/// One camera frame as reported upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CameraReading {
    pub camera_id: String,
    pub image: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<CameraPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_metadata: Option<ImageMetadata>,
}

/// The payload served by `GET /api/traffic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TrafficSnapshot {
    pub timestamp: String,
    pub cameras: Vec<CameraReading>,
}

impl TrafficSnapshot {
    pub fn camera(&self, camera_id: &str) -> Option<&CameraReading> {
        self.cameras
            .iter()
            .find(|camera| camera.camera_id == camera_id)
    }
}

/// Keeps allowlisted cameras in the order they arrived.
pub fn filter_allowlisted(cameras: Vec<CameraReading>) -> Vec<CameraReading> {
    cameras
        .into_iter()
        .filter(|camera| cameras::is_allowlisted(&camera.camera_id))
        .collect()
}

#[cfg(test)]
pub(crate) fn reading(camera_id: &str) -> CameraReading {
    CameraReading {
        camera_id: camera_id.to_string(),
        image: format!("https://images.data.gov.sg/api/traffic-images/2025/11/{camera_id}.jpg"),
        timestamp: "2025-11-06T23:29:52+08:00".to_string(),
        location: Some(CameraPosition {
            latitude: 1.4455,
            longitude: 103.7689,
        }),
        image_metadata: Some(ImageMetadata {
            height: 240,
            width: 320,
            md5: "0f3a".to_string(),
        }),
    }
}
