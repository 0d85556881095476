use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::cameras::{ImageHostAllowlist, DEFAULT_IMAGE_HOST};

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.data.gov.sg/v1/transport/traffic-images";

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub upstream_url: Url,
    /// `None` leaves the transport default in place.
    pub upstream_timeout: Option<Duration>,
    pub image_hosts: ImageHostAllowlist,
    pub static_root: Option<PathBuf>,
}

impl TrafficConfig {
    pub fn from_env(cli_static_root: Option<PathBuf>) -> Result<Self> {
        Self::from_lookup(cli_static_root, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(cli_static_root: Option<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let upstream_raw =
            optional("TRAFFIC_UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = Url::parse(&upstream_raw)
            .with_context(|| format!("invalid TRAFFIC_UPSTREAM_URL {upstream_raw:?}"))?;

        let upstream_timeout = match optional("TRAFFIC_UPSTREAM_TIMEOUT_SECONDS") {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .context("invalid TRAFFIC_UPSTREAM_TIMEOUT_SECONDS")?;
                Some(Duration::from_secs(secs)).filter(|timeout| !timeout.is_zero())
            }
            None => None,
        };

        let image_hosts = match optional("TRAFFIC_IMAGE_HOSTS") {
            Some(raw) => ImageHostAllowlist::new(raw.split(',')),
            None => ImageHostAllowlist::new([DEFAULT_IMAGE_HOST]),
        };
        if image_hosts.hosts().is_empty() {
            anyhow::bail!("TRAFFIC_IMAGE_HOSTS resolved to an empty host list");
        }

        let static_root =
            cli_static_root.or_else(|| optional("TRAFFIC_STATIC_ROOT").map(PathBuf::from));

        Ok(Self {
            upstream_url,
            upstream_timeout,
            image_hosts,
            static_root,
        })
    }
}
