use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Missions supported by the pairing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mission {
    Landsat,
    Sentinel2,
    Sentinel1,
}

impl Mission {
    /// Classify a scene identifier into its mission.
    ///
    /// Landsat scene ids start with `L` (e.g. `LC08_...`), Sentinel-2 product
    /// ids with `S2`, and Sentinel-1 burst granules with `S1`.
    pub fn from_scene_id(scene_id: &str) -> PairResult<Mission> {
        if scene_id.starts_with("S2") {
            Ok(Mission::Sentinel2)
        } else if scene_id.starts_with("S1") {
            Ok(Mission::Sentinel1)
        } else if scene_id.starts_with('L') {
            Ok(Mission::Landsat)
        } else {
            Err(PairError::InvalidScene(format!(
                "Cannot determine mission for scene id: {}",
                scene_id
            )))
        }
    }
}

impl std::fmt::Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mission::Landsat => write!(f, "Landsat"),
            Mission::Sentinel2 => write!(f, "Sentinel-2"),
            Mission::Sentinel1 => write!(f, "Sentinel-1"),
        }
    }
}

/// Polarization modes for Sentinel-1 bursts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl Polarization {
    /// Co-polarized channels are the only ones processed for velocity pairs.
    pub fn is_co_polarized(&self) -> bool {
        matches!(self, Polarization::VV | Polarization::HH)
    }

    pub fn parse(s: &str) -> Option<Polarization> {
        match s.to_uppercase().as_str() {
            "VV" => Some(Polarization::VV),
            "VH" => Some(Polarization::VH),
            "HV" => Some(Polarization::HV),
            "HH" => Some(Polarization::HH),
            _ => None,
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Smallest box covering both operands.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }
}

/// Mission-specific metadata carried by a scene.
///
/// Only the fields relevant to a scene's mission are populated; the
/// qualification chains treat a missing field the same as a failing one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneProperties {
    /// Catalog collection the scene belongs to
    pub collection: String,
    /// Imaging instruments (e.g. ["OLI", "TIRS"])
    pub instruments: Vec<String>,
    /// Landsat collection category (T1, T2, RT)
    pub tier: Option<String>,
    /// Landsat WRS path, zero-padded
    pub wrs_path: Option<String>,
    /// Landsat WRS row, zero-padded
    pub wrs_row: Option<String>,
    /// Landsat off-nadir viewing angle (degrees)
    pub off_nadir: Option<f64>,
    /// Land cloud cover percentage; -1 when unknown upstream
    pub cloud_cover: Option<f64>,
    /// Sentinel-2 MGRS tile id (e.g. "13CES")
    pub mgrs_tile: Option<String>,
    /// Sentinel-2 grid code used as the catalog match key (e.g. "MGRS-13CES")
    pub grid_code: Option<String>,
    /// Sentinel-2 relative orbit number
    pub relative_orbit: Option<u32>,
    /// Sentinel-2 product URI (ends in .SAFE)
    pub product_uri: Option<String>,
    /// Sentinel-2 data coverage percentage from the tile metadata side-channel
    pub data_coverage: Option<f64>,
    /// Sentinel-1 burst polarization
    pub polarization: Option<Polarization>,
    /// Sentinel-1 full burst id (e.g. "116_247728_IW1")
    pub full_burst_id: Option<String>,
}

/// A single satellite acquisition product from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub mission: Mission,
    pub acquired: DateTime<Utc>,
    pub bbox: BoundingBox,
    pub properties: SceneProperties,
}

/// A reference/secondary grouping eligible for velocity processing.
///
/// `reference` and `secondary` hold a single scene id for Landsat and
/// Sentinel-2, and the ordered burst scene list of a whole OPERA frame for
/// Sentinel-1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub reference: Vec<String>,
    pub secondary: Vec<String>,
    pub reference_acquisition: DateTime<Utc>,
    pub job_name: String,
    pub bbox: BoundingBox,
}

impl CandidatePair {
    /// Identity key used to match this pair against in-flight jobs.
    pub fn key(&self) -> (String, String) {
        (self.reference.join(" "), self.secondary.join(" "))
    }
}

/// Handle for a job accepted by the submission API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub job_name: String,
}

/// Error types for the pairing engine
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error("Scene not found in catalog: {0}")]
    SceneNotFound(String),

    #[error("Incomplete OPERA frame: {0}")]
    IncompleteFrame(String),

    #[error("Scene not yet retrievable: {0}")]
    SceneNotRetrievable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pairing operations
pub type PairResult<T> = Result<T, PairError>;
