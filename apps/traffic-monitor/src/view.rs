use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::time::Duration;

use crate::cameras::{Checkpoint, ImageHostAllowlist};
use crate::poller::ViewState;
use crate::snapshot::TrafficSnapshot;
use crate::tile::{CameraTile, ImageOutcome, ImageState};
use crate::time;

pub const TITLE: &str = "Singapore Traffic Monitor";
pub const SUBTITLE: &str = "Live traffic images from Woodlands and Tuas customs";
pub const LOADING_MESSAGE: &str = "Loading traffic data...";
pub const FOOTER: &str = "Data source: Data.gov.sg - Singapore Government Traffic Images API";

/// Text rendering of the two-checkpoint dashboard.
///
/// Tiles live as long as their camera stays in the snapshot, so an image
/// that failed once keeps showing the failure on later refreshes.
pub struct Dashboard {
    image_hosts: ImageHostAllowlist,
    refresh_interval: Duration,
    state: ViewState,
    tiles: Vec<CameraTile>,
    last_update: DateTime<Utc>,
}

impl Dashboard {
    pub fn new(image_hosts: ImageHostAllowlist, refresh_interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            image_hosts,
            refresh_interval,
            state: ViewState::Loading,
            tiles: Vec::new(),
            last_update: now,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn apply(&mut self, state: ViewState) {
        if let ViewState::Ready {
            snapshot,
            last_update,
        } = &state
        {
            self.last_update = *last_update;
            self.sync_tiles(snapshot);
        }
        self.state = state;
    }

    fn sync_tiles(&mut self, snapshot: &TrafficSnapshot) {
        let mut previous = std::mem::take(&mut self.tiles);
        for reading in &snapshot.cameras {
            let tile = match previous
                .iter()
                .position(|tile| tile.camera_id() == reading.camera_id)
            {
                Some(idx) => {
                    let mut tile = previous.swap_remove(idx);
                    tile.refresh(reading, &self.image_hosts);
                    tile
                }
                None => CameraTile::new(reading, &self.image_hosts),
            };
            self.tiles.push(tile);
        }
    }

    pub fn tile(&self, camera_id: &str) -> Option<&CameraTile> {
        self.tiles.iter().find(|tile| tile.camera_id() == camera_id)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &CameraTile> {
        self.tiles.iter()
    }

    /// Applies a finished image load. Outcomes for cameras no longer shown
    /// are dropped.
    pub fn apply_image(&mut self, outcome: &ImageOutcome) {
        if let Some(tile) = self
            .tiles
            .iter_mut()
            .find(|tile| tile.camera_id() == outcome.camera_id)
        {
            tile.apply_image_result(&outcome.result);
        }
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut CameraTile> {
        self.tiles.iter_mut()
    }

    pub fn has_pending_images(&self) -> bool {
        self.tiles
            .iter()
            .any(|tile| tile.state() == ImageState::Loading)
    }

    /// Tiles of one checkpoint in catalog order, skipping cameras absent
    /// from the snapshot.
    pub fn checkpoint_tiles(&self, checkpoint: Checkpoint) -> Vec<&CameraTile> {
        checkpoint
            .camera_ids()
            .filter_map(|id| self.tile(id))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{TITLE}");
        let _ = writeln!(out, "{SUBTITLE}");
        let _ = writeln!(
            out,
            "Auto-refresh every {}s | Last updated: {}",
            self.refresh_interval.as_secs(),
            time::format_instant(self.last_update)
        );
        let _ = writeln!(out);

        match &self.state {
            ViewState::Loading => {
                let _ = writeln!(out, "{LOADING_MESSAGE}");
            }
            ViewState::Error { message } => {
                let _ = writeln!(out, "! {message}");
            }
            ViewState::Ready { .. } => {
                for checkpoint in Checkpoint::ALL {
                    let _ = writeln!(out, "== {} ==", checkpoint.title());
                    let _ = writeln!(out, "{}", checkpoint.caption());
                    for tile in self.checkpoint_tiles(checkpoint) {
                        for line in tile.render() {
                            let _ = writeln!(out, "{line}");
                        }
                    }
                    let _ = writeln!(out);
                }
            }
        }

        let _ = writeln!(out, "{FOOTER}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::DEFAULT_REFRESH_INTERVAL;
    use crate::snapshot::reading;
    use chrono::TimeZone;

    fn started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 6, 15, 30, 0)
            .single()
            .expect("utc")
    }

    fn ready(ids: &[&str]) -> ViewState {
        ViewState::Ready {
            snapshot: TrafficSnapshot {
                timestamp: "2025-11-06T23:30:00+08:00".to_string(),
                cameras: ids.iter().copied().map(reading).collect(),
            },
            last_update: started_at(),
        }
    }

    fn dashboard() -> Dashboard {
        Dashboard::new(ImageHostAllowlist::default(), DEFAULT_REFRESH_INTERVAL, started_at())
    }

    #[test]
    fn loading_screen_before_first_snapshot() {
        let text = dashboard().render();
        assert!(text.contains(LOADING_MESSAGE));
        assert!(text.contains("Auto-refresh every 20s"));
        assert!(text.contains("Last updated: 06 Nov 2025, 11:30:00 pm"));
        assert!(!text.contains("== Woodlands Customs =="));
    }

    #[test]
    fn groups_follow_catalog_order_not_upstream_order() {
        let mut view = dashboard();
        view.apply(ready(&["4703", "2701", "4712", "2704"]));

        let woodlands: Vec<_> = view
            .checkpoint_tiles(Checkpoint::Woodlands)
            .into_iter()
            .map(|tile| tile.camera_id().to_string())
            .collect();
        let tuas: Vec<_> = view
            .checkpoint_tiles(Checkpoint::Tuas)
            .into_iter()
            .map(|tile| tile.camera_id().to_string())
            .collect();
        assert_eq!(woodlands, vec!["2704", "2701"]);
        assert_eq!(tuas, vec!["4712", "4703"]);

        let text = view.render();
        let woodlands_at = text.find("== Woodlands Customs ==").expect("woodlands");
        let tuas_at = text.find("== Tuas Customs ==").expect("tuas");
        assert!(woodlands_at < tuas_at);
        assert!(text.contains("Before Woodlands Customs"));
    }

    #[test]
    fn error_banner_replaces_tiles() {
        let mut view = dashboard();
        view.apply(ready(&["2704"]));
        view.apply(ViewState::Error {
            message: "Failed to fetch traffic data".to_string(),
        });
        let text = view.render();
        assert!(text.contains("! Failed to fetch traffic data"));
        assert!(!text.contains("Camera ID: 2704"));
    }

    #[test]
    fn failed_tile_stays_failed_across_refreshes() {
        let mut view = dashboard();
        view.apply(ready(&["2704", "2702"]));
        for tile in view.tiles_mut() {
            if tile.camera_id() == "2704" {
                tile.on_image_error();
            }
        }

        view.apply(ready(&["2704", "2702"]));
        assert_eq!(view.tile("2704").map(CameraTile::state), Some(ImageState::Failed));
        assert_eq!(view.tile("2702").map(CameraTile::state), Some(ImageState::Loading));
        assert!(view.has_pending_images());
    }

    #[test]
    fn image_outcomes_update_only_their_own_tile() {
        let mut view = dashboard();
        view.apply(ready(&["2704", "2702"]));
        view.apply_image(&ImageOutcome {
            camera_id: "2704".to_string(),
            result: Ok(()),
        });
        view.apply_image(&ImageOutcome {
            camera_id: "9999".to_string(),
            result: Ok(()),
        });
        assert_eq!(view.tile("2704").map(CameraTile::state), Some(ImageState::Ready));
        assert_eq!(view.tile("2702").map(CameraTile::state), Some(ImageState::Loading));
        assert!(view.render().contains("[ image ] https://images.data.gov.sg"));
    }

    #[test]
    fn cameras_missing_from_a_refresh_are_dropped() {
        let mut view = dashboard();
        view.apply(ready(&["2704", "4713"]));
        view.apply(ready(&["4713"]));
        assert!(view.tile("2704").is_none());
        assert!(view.tile("4713").is_some());
    }
}
