//! Candidate-pair search for Landsat and Sentinel-2 reference scenes.
//!
//! The catalog query narrows by tile/orbit key and acquisition window; every
//! hit is then re-run through the qualification chain because the catalog
//! predicates are only a coarse pre-filter.

use crate::config::Config;
use crate::core::qualify;
use crate::io::catalog::{CatalogClient, CatalogQuery};
use crate::types::{CandidatePair, Mission, PairError, PairResult, Scene};
use chrono::Duration;
use log::Level;

/// The name a scene is known by in pairs and job parameters.
///
/// Sentinel-2 pairs use the product name (the `.SAFE` URI without its
/// extension) rather than the catalog item id; everything else uses the id.
pub fn scene_pair_name(scene: &Scene) -> String {
    match scene.properties.product_uri.as_deref() {
        Some(uri) => uri.trim_end_matches(".SAFE").to_string(),
        None => scene.id.clone(),
    }
}

/// Landsat pairs: same WRS path/row and off-nadir class, acquired within
/// `[ref - max_separation, ref - min_separation]`.
pub fn landsat_pairs_for_reference(
    catalog: &dyn CatalogClient,
    reference: &Scene,
    config: &Config,
) -> PairResult<Vec<CandidatePair>> {
    let props = &reference.properties;
    let (path, row) = match (&props.wrs_path, &props.wrs_row) {
        (Some(path), Some(row)) => (path.clone(), row.clone()),
        _ => {
            return Err(PairError::InvalidScene(format!(
                "{} has no WRS path/row",
                reference.id
            )))
        }
    };

    // Off-nadir acquisitions only pair with other off-nadir acquisitions.
    let off_nadir_class = if props.off_nadir.unwrap_or(0.0) > 0.0 {
        "positive"
    } else {
        "zero"
    };

    let query = CatalogQuery {
        mission: Mission::Landsat,
        match_keys: vec![
            ("landsat:wrs_path".to_string(), path),
            ("landsat:wrs_row".to_string(), row),
            ("off_nadir".to_string(), off_nadir_class.to_string()),
        ],
        start: reference.acquired - Duration::days(config.landsat.max_pair_separation_days),
        end: reference.acquired - Duration::seconds(config.landsat.min_pair_separation_seconds),
    };

    let secondaries: Vec<Scene> = catalog
        .search(&query)?
        .into_iter()
        .filter(|scene| scene.id != reference.id)
        .filter(|scene| scene.acquired < reference.acquired)
        .filter(|scene| qualify::landsat_qualifies(scene, &config.landsat, Level::Debug))
        .collect();

    log::debug!(
        "Found {} secondary scenes for {}",
        secondaries.len(),
        reference.id
    );

    Ok(emit_pairs(reference, &secondaries))
}

/// Sentinel-2 pairs: same grid code, acquired within
/// `[ref - max_separation, ref - min_separation]`.
pub fn sentinel2_pairs_for_reference(
    catalog: &dyn CatalogClient,
    reference: &Scene,
    config: &Config,
) -> PairResult<Vec<CandidatePair>> {
    let grid_code = reference
        .properties
        .grid_code
        .clone()
        .ok_or_else(|| PairError::InvalidScene(format!("{} has no grid code", reference.id)))?;

    let query = CatalogQuery {
        mission: Mission::Sentinel2,
        match_keys: vec![("grid:code".to_string(), grid_code)],
        start: reference.acquired - Duration::days(config.sentinel2.max_pair_separation_days),
        end: reference.acquired - Duration::days(config.sentinel2.min_pair_separation_days),
    };

    let secondaries: Vec<Scene> = catalog
        .search(&query)?
        .into_iter()
        .filter(|scene| scene.id != reference.id)
        .filter(|scene| scene.acquired < reference.acquired)
        // Neighboring MGRS tiles overlap; a geometry-backed search can leak
        // adjacent-tile results, so assert the tile explicitly.
        .filter(|scene| scene.properties.mgrs_tile == reference.properties.mgrs_tile)
        .filter(|scene| qualify::sentinel2_qualifies(scene, &config.sentinel2, Level::Debug))
        .collect();

    log::debug!(
        "Found {} secondary scenes for {}",
        secondaries.len(),
        reference.id
    );

    Ok(emit_pairs(reference, &secondaries))
}

fn emit_pairs(reference: &Scene, secondaries: &[Scene]) -> Vec<CandidatePair> {
    let reference_name = scene_pair_name(reference);
    secondaries
        .iter()
        .map(|secondary| CandidatePair {
            reference: vec![reference_name.clone()],
            secondary: vec![scene_pair_name(secondary)],
            reference_acquisition: reference.acquired,
            job_name: reference_name.clone(),
            bbox: reference.bbox.union(&secondary.bbox),
        })
        .collect()
}
