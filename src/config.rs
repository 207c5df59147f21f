//! Static configuration loaded once at process start.
//!
//! Tile sets and the OPERA burst/frame lookup tables ship as JSON files next
//! to the deployment; everything here is read-only for the process lifetime.

use crate::types::{PairError, PairResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const LANDSAT_COLLECTION: &str = "landsat-c2l1";
pub const SENTINEL2_COLLECTION: &str = "sentinel-2-l1c";

pub const LANDSAT_PRODUCT_PREFIX: &str = "velocity_image_pair/landsatOLI/v02/";
pub const SENTINEL2_PRODUCT_PREFIX: &str = "velocity_image_pair/sentinel2/v02/";
pub const PRODUCT_SUFFIX: &str = ".nc";

/// Landsat qualification and pairing thresholds
#[derive(Debug, Clone)]
pub struct LandsatConfig {
    pub max_pair_separation_days: i64,
    pub min_pair_separation_seconds: i64,
    pub max_cloud_cover: f64,
    /// WRS path+row concatenations that contain land-ice
    pub tiles: HashSet<String>,
}

impl Default for LandsatConfig {
    fn default() -> Self {
        Self {
            max_pair_separation_days: 544,
            min_pair_separation_seconds: 1,
            max_cloud_cover: 60.0,
            tiles: HashSet::new(),
        }
    }
}

/// Sentinel-2 qualification and pairing thresholds
#[derive(Debug, Clone)]
pub struct Sentinel2Config {
    pub max_pair_separation_days: i64,
    pub min_pair_separation_days: i64,
    pub max_cloud_cover: f64,
    pub min_data_coverage: f64,
    /// MGRS tiles that contain land-ice
    pub tiles: HashSet<String>,
    /// When set, only scenes from this relative orbit qualify
    pub reference_relative_orbit: Option<u32>,
}

impl Default for Sentinel2Config {
    fn default() -> Self {
        Self {
            max_pair_separation_days: 544,
            min_pair_separation_days: 5,
            max_cloud_cover: 70.0,
            min_data_coverage: 70.0,
            tiles: HashSet::new(),
            reference_relative_orbit: None,
        }
    }
}

/// Sentinel-1 qualification and frame-assembly thresholds
#[derive(Debug, Clone)]
pub struct Sentinel1Config {
    pub max_pair_separation_days: i64,
    pub min_pair_separation_days: i64,
    /// Absorbs sub-second timing jitter between bursts of the same pass
    pub frame_tolerance_minutes: i64,
    /// Minimum bursts a day-group must contain to stand in for its frame
    pub frame_quorum: usize,
    /// Full burst ids that overlap land-ice
    pub bursts: HashSet<String>,
}

impl Default for Sentinel1Config {
    fn default() -> Self {
        Self {
            max_pair_separation_days: 544,
            min_pair_separation_days: 5,
            frame_tolerance_minutes: 3,
            frame_quorum: 5,
            bursts: HashSet::new(),
        }
    }
}

/// OPERA frame membership tables, fixed for the process lifetime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BurstFrameMap {
    /// frame id -> member burst ids
    frame_to_bursts: HashMap<u32, Vec<String>>,
    /// burst id -> frame ids it belongs to (one or two)
    burst_to_frames: HashMap<String, Vec<u32>>,
}

impl BurstFrameMap {
    pub fn new(
        frame_to_bursts: HashMap<u32, Vec<String>>,
        burst_to_frames: HashMap<String, Vec<u32>>,
    ) -> Self {
        Self {
            frame_to_bursts,
            burst_to_frames,
        }
    }

    /// Load the two lookup tables from their JSON files.
    ///
    /// The frame table keys frames by decimal string, matching the shipped
    /// `opera_frame_to_burst_ids.json` format.
    pub fn from_json_files<P: AsRef<Path>>(frame_path: P, burst_path: P) -> PairResult<Self> {
        let frame_text = std::fs::read_to_string(frame_path)?;
        let burst_text = std::fs::read_to_string(burst_path)?;

        let raw_frames: HashMap<String, Vec<String>> = serde_json::from_str(&frame_text)?;
        let burst_to_frames: HashMap<String, Vec<u32>> = serde_json::from_str(&burst_text)?;

        let mut frame_to_bursts = HashMap::with_capacity(raw_frames.len());
        for (frame, bursts) in raw_frames {
            let frame_id: u32 = frame
                .parse()
                .map_err(|_| PairError::Config(format!("Invalid OPERA frame id: {}", frame)))?;
            frame_to_bursts.insert(frame_id, bursts);
        }

        Ok(Self {
            frame_to_bursts,
            burst_to_frames,
        })
    }

    pub fn frames_for_burst(&self, burst_id: &str) -> &[u32] {
        self.burst_to_frames
            .get(burst_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bursts_for_frame(&self, frame_id: u32) -> &[String] {
        self.frame_to_bursts
            .get(&frame_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Everything the pipeline needs beyond its collaborator handles.
#[derive(Debug, Clone)]
pub struct Config {
    pub landsat: LandsatConfig,
    pub sentinel2: Sentinel2Config,
    pub sentinel1: Sentinel1Config,
    pub burst_frame_map: BurstFrameMap,
    /// Identity used for job-store queries and submission
    pub job_user: String,
    /// Job type registered with the processing service
    pub job_type: String,
    /// Submission batch size
    pub submission_chunk_size: usize,
}

impl Config {
    pub fn new(job_user: impl Into<String>) -> Self {
        Self {
            landsat: LandsatConfig::default(),
            sentinel2: Sentinel2Config::default(),
            sentinel1: Sentinel1Config::default(),
            burst_frame_map: BurstFrameMap::default(),
            job_user: job_user.into(),
            job_type: "AUTORIFT".to_string(),
            submission_chunk_size: 200,
        }
    }
}

/// Read a JSON array of tile or burst ids into a set.
pub fn load_tile_set<P: AsRef<Path>>(path: P) -> PairResult<HashSet<String>> {
    let text = std::fs::read_to_string(path)?;
    let tiles: Vec<String> = serde_json::from_str(&text)?;
    Ok(tiles.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_tile_set() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["001005", "138041"]"#).unwrap();

        let tiles = load_tile_set(file.path()).unwrap();
        assert_eq!(tiles.len(), 2);
        assert!(tiles.contains("138041"));
    }

    #[test]
    fn test_burst_frame_map_from_json() {
        let mut frame_file = tempfile::NamedTempFile::new().unwrap();
        write!(
            frame_file,
            r#"{{"56": ["001_000443_IW1", "001_000444_IW1"]}}"#
        )
        .unwrap();
        let mut burst_file = tempfile::NamedTempFile::new().unwrap();
        write!(burst_file, r#"{{"001_000443_IW1": [56]}}"#).unwrap();

        let map = BurstFrameMap::from_json_files(frame_file.path(), burst_file.path()).unwrap();
        assert_eq!(map.frames_for_burst("001_000443_IW1"), &[56]);
        assert_eq!(map.bursts_for_frame(56).len(), 2);
        assert!(map.frames_for_burst("no_such_burst").is_empty());
    }

    #[test]
    fn test_defaults_match_mission_thresholds() {
        let config = Config::new("its-live-operator");
        assert_eq!(config.landsat.max_cloud_cover, 60.0);
        assert_eq!(config.sentinel2.max_cloud_cover, 70.0);
        assert_eq!(config.sentinel2.min_data_coverage, 70.0);
        assert_eq!(config.sentinel1.frame_quorum, 5);
        assert_eq!(config.submission_chunk_size, 200);
    }
}
