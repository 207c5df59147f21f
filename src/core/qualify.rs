//! Per-mission qualification predicate chains.
//!
//! Each check short-circuits with a logged disqualification reason; a scene
//! failing qualification is an expected outcome, never an error. The log
//! level is caller-supplied so the reference scene of an invocation can be
//! reported at INFO while bulk secondary filtering stays at DEBUG.

use crate::config::{
    Config, LandsatConfig, Sentinel1Config, Sentinel2Config, LANDSAT_COLLECTION,
    SENTINEL2_COLLECTION,
};
use crate::types::{Mission, Scene};
use log::{log, Level};

/// Dispatch a scene to its mission's predicate chain.
pub fn scene_qualifies(scene: &Scene, config: &Config, level: Level) -> bool {
    match scene.mission {
        Mission::Landsat => landsat_qualifies(scene, &config.landsat, level),
        Mission::Sentinel2 => sentinel2_qualifies(scene, &config.sentinel2, level),
        Mission::Sentinel1 => sentinel1_qualifies(scene, &config.sentinel1, level),
    }
}

/// Landsat predicate chain: collection, instrument, tier, land-ice tile,
/// and land cloud cover.
pub fn landsat_qualifies(scene: &Scene, config: &LandsatConfig, level: Level) -> bool {
    let props = &scene.properties;

    if props.collection != LANDSAT_COLLECTION {
        log!(level, "{} disqualifies: wrong collection", scene.id);
        return false;
    }

    if !props.instruments.iter().any(|i| i == "OLI") {
        log!(level, "{} disqualifies: not imaged with OLI", scene.id);
        return false;
    }

    match props.tier.as_deref() {
        Some("T1") | Some("T2") => {}
        _ => {
            log!(level, "{} disqualifies: wrong collection tier", scene.id);
            return false;
        }
    }

    let tile = match (&props.wrs_path, &props.wrs_row) {
        (Some(path), Some(row)) => format!("{}{}", path, row),
        _ => {
            log!(level, "{} disqualifies: missing WRS path/row", scene.id);
            return false;
        }
    };
    if !config.tiles.contains(&tile) {
        log!(
            level,
            "{} disqualifies: tile {} does not contain land-ice",
            scene.id,
            tile
        );
        return false;
    }

    let cloud_cover = props.cloud_cover.unwrap_or(-1.0);
    if cloud_cover < 0.0 {
        log!(level, "{} disqualifies: cloud coverage unknown", scene.id);
        return false;
    }
    if cloud_cover > config.max_cloud_cover {
        log!(level, "{} disqualifies: too much cloud cover", scene.id);
        return false;
    }

    log!(level, "{} qualifies for processing", scene.id);
    true
}

/// Sentinel-2 predicate chain: collection, optional relative orbit,
/// reprocessing baseline, product type, land-ice tile, cloud cover, and
/// data coverage.
pub fn sentinel2_qualifies(scene: &Scene, config: &Sentinel2Config, level: Level) -> bool {
    let props = &scene.properties;

    if props.collection != SENTINEL2_COLLECTION {
        log!(level, "{} disqualifies: wrong collection", scene.id);
        return false;
    }

    if let Some(orbit) = config.reference_relative_orbit {
        if props.relative_orbit != Some(orbit) {
            log!(
                level,
                "{} disqualifies: not from relative orbit {}",
                scene.id,
                orbit
            );
            return false;
        }
    }

    let uri = match props.product_uri.as_deref() {
        Some(uri) => uri,
        None => {
            log!(level, "{} disqualifies: missing product URI", scene.id);
            return false;
        }
    };
    let tokens: Vec<&str> = uri.split('_').collect();

    // N0500 marks the Collection-1 reprocessing campaign; those products
    // duplicate scenes already handled at their original baseline.
    if tokens.get(3) == Some(&"N0500") {
        log!(
            level,
            "{} disqualifies: processing baseline indicates a reprocessing activity",
            scene.id
        );
        return false;
    }

    let product_type = tokens.get(1).copied().unwrap_or("");
    if !product_type.ends_with("L1C") {
        log!(level, "{} disqualifies: wrong product type", scene.id);
        return false;
    }
    if !product_type.starts_with("MSI") {
        log!(
            level,
            "{} disqualifies: not imaged with the right instrument",
            scene.id
        );
        return false;
    }

    match props.mgrs_tile.as_deref() {
        Some(tile) if config.tiles.contains(tile) => {}
        _ => {
            log!(
                level,
                "{} disqualifies: not from a tile containing land-ice",
                scene.id
            );
            return false;
        }
    }

    let cloud_cover = props.cloud_cover.unwrap_or(-1.0);
    if cloud_cover < 0.0 {
        log!(level, "{} disqualifies: cloud coverage unknown", scene.id);
        return false;
    }
    if cloud_cover > config.max_cloud_cover {
        log!(level, "{} disqualifies: too much cloud cover", scene.id);
        return false;
    }

    let data_coverage = props.data_coverage.unwrap_or(-1.0);
    if data_coverage <= config.min_data_coverage {
        log!(level, "{} disqualifies: not enough data coverage", scene.id);
        return false;
    }

    log!(level, "{} qualifies for processing", scene.id);
    true
}

/// Sentinel-1 burst predicate chain: land-ice burst set and co-polarization.
pub fn sentinel1_qualifies(scene: &Scene, config: &Sentinel1Config, level: Level) -> bool {
    let props = &scene.properties;

    match props.full_burst_id.as_deref() {
        Some(burst_id) if config.bursts.contains(burst_id) => {}
        _ => {
            log!(
                level,
                "{} disqualifies: burst does not overlap land-ice",
                scene.id
            );
            return false;
        }
    }

    match props.polarization {
        Some(pol) if pol.is_co_polarized() => {}
        _ => {
            log!(level, "{} disqualifies: cross-polarized", scene.id);
            return false;
        }
    }

    log!(level, "{} qualifies for processing", scene.id);
    true
}
