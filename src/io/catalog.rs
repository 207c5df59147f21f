//! Catalog collaborator: scene lookup and constrained search.
//!
//! The pairing engine only sees the [`CatalogClient`] trait; the concrete
//! client speaks STAC for Landsat/Sentinel-2 and the ASF search API for
//! Sentinel-1 bursts, draining pagination before returning.

use crate::types::{
    BoundingBox, Mission, PairError, PairResult, Polarization, Scene, SceneProperties,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A temporally and spatially constrained catalog query.
///
/// `match_keys` are exact-match property constraints (WRS path/row, grid
/// code, full burst id, polarization); the concrete client translates them
/// into its wire query language. The window is inclusive on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub mission: Mission,
    pub match_keys: Vec<(String, String)>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Abstract catalog contract consumed by the pairing engine.
pub trait CatalogClient {
    /// Fetch a single scene by id, `None` when the catalog has no entry.
    fn get_scene(&self, mission: Mission, scene_id: &str) -> PairResult<Option<Scene>>;

    /// Run a constrained search and drain all result pages.
    ///
    /// The catalog's own predicates are a coarse pre-filter; callers must
    /// re-qualify every returned scene.
    fn search(&self, query: &CatalogQuery) -> PairResult<Vec<Scene>>;

    /// Verify the scene's source data can be pulled by the processing
    /// service. The default succeeds; implementations backed by mirrors
    /// that lag catalog ingest fail with
    /// [`PairError::SceneNotRetrievable`](crate::types::PairError) so the
    /// caller retries the scene later.
    fn ensure_retrievable(&self, _scene: &Scene) -> PairResult<()> {
        Ok(())
    }
}

/// STAC + ASF catalog client over blocking HTTP.
pub struct HttpCatalogClient {
    landsat_api: String,
    sentinel2_api: String,
    sentinel1_api: String,
    /// Tile-metadata mirror serving `dataCoveragePercentage`
    tile_metadata_api: String,
    /// Public Sentinel-2 archive the processing service pulls inputs from
    sentinel2_mirror: String,
    http: reqwest::blocking::Client,
}

impl HttpCatalogClient {
    pub fn new() -> Self {
        Self {
            landsat_api: "https://landsatlook.usgs.gov/stac-server".to_string(),
            sentinel2_api: "https://earth-search.aws.element84.com/v1".to_string(),
            sentinel1_api: "https://api.daac.asf.alaska.edu/services/search/param".to_string(),
            tile_metadata_api: "https://roda.sentinel-hub.com".to_string(),
            sentinel2_mirror: "https://storage.googleapis.com/gcp-public-data-sentinel-2/tiles"
                .to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    pub fn with_endpoints(
        landsat_api: impl Into<String>,
        sentinel2_api: impl Into<String>,
        sentinel1_api: impl Into<String>,
    ) -> Self {
        Self {
            landsat_api: landsat_api.into(),
            sentinel2_api: sentinel2_api.into(),
            sentinel1_api: sentinel1_api.into(),
            ..Self::new()
        }
    }

    fn stac_api(&self, mission: Mission) -> &str {
        match mission {
            Mission::Landsat => &self.landsat_api,
            Mission::Sentinel2 => &self.sentinel2_api,
            Mission::Sentinel1 => &self.sentinel1_api,
        }
    }

    /// Drain a STAC item search, following `next` links.
    fn stac_search(&self, mission: Mission, url: String) -> PairResult<Vec<Scene>> {
        let mut scenes = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let page: Value = self.http.get(&url).send()?.error_for_status()?.json()?;

            for item in page["features"].as_array().into_iter().flatten() {
                let mut scene = scene_from_stac_item(mission, item)?;
                if mission == Mission::Sentinel2 && scene.properties.data_coverage.is_none() {
                    scene.properties.data_coverage = self.fetch_data_coverage(item)?;
                }
                scenes.push(scene);
            }

            next = page["links"]
                .as_array()
                .into_iter()
                .flatten()
                .find(|link| link["rel"].as_str() == Some("next"))
                .and_then(|link| link["href"].as_str())
                .map(String::from);
        }

        Ok(scenes)
    }

    /// Fetch `dataCoveragePercentage` from the tile-metadata side channel.
    ///
    /// earth-search Sentinel-2 items carry no data-coverage property; the
    /// tile metadata JSON the item's assets point at does.
    fn fetch_data_coverage(&self, item: &Value) -> PairResult<Option<f64>> {
        let path = match tile_metadata_path(item) {
            Some(path) => path,
            None => return Ok(None),
        };
        let info: Value = self
            .http
            .get(format!("{}/{}", self.tile_metadata_api, path))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(info["dataCoveragePercentage"].as_f64())
    }

    fn asf_search(&self, query: &CatalogQuery) -> PairResult<Vec<Scene>> {
        let mut request = self
            .http
            .get(&self.sentinel1_api)
            .query(&[("output", "umm_json"), ("platform", "S1")])
            .query(&[
                ("start", query.start.to_rfc3339()),
                ("end", query.end.to_rfc3339()),
            ]);
        for (key, value) in &query.match_keys {
            request = request.query(&[(key.as_str(), value.as_str())]);
        }

        let body: Value = request.send()?.error_for_status()?.json()?;
        let mut scenes = Vec::new();
        for product in body["results"].as_array().into_iter().flatten() {
            scenes.push(scene_from_asf_product(product)?);
        }
        Ok(scenes)
    }
}

impl Default for HttpCatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogClient for HttpCatalogClient {
    fn get_scene(&self, mission: Mission, scene_id: &str) -> PairResult<Option<Scene>> {
        match mission {
            Mission::Landsat => {
                let url = format!(
                    "{}/collections/landsat-c2l1/items/{}",
                    self.landsat_api, scene_id
                );
                let response = self.http.get(&url).send()?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let item: Value = response.error_for_status()?.json()?;
                Ok(Some(scene_from_stac_item(mission, &item)?))
            }
            Mission::Sentinel2 => {
                // Sentinel-2 ids arrive as product names; resolve via the
                // product URI rather than the catalog item id.
                let constraints =
                    serde_json::json!({"s2:product_uri": {"eq": format!("{}.SAFE", scene_id)}});
                let url = reqwest::Url::parse_with_params(
                    &format!("{}/search", self.sentinel2_api),
                    &[
                        ("collections", "sentinel-2-l1c"),
                        ("query", &constraints.to_string()),
                    ],
                )
                .map_err(|e| PairError::Catalog(format!("bad search URL: {}", e)))?;
                let mut scenes = self.stac_search(mission, url.to_string())?;
                match scenes.len() {
                    0 => Ok(None),
                    1 => Ok(Some(scenes.remove(0))),
                    n => Err(PairError::Catalog(format!(
                        "{} items found for Sentinel-2 scene {}",
                        n, scene_id
                    ))),
                }
            }
            Mission::Sentinel1 => {
                let body: Value = self
                    .http
                    .get(&self.sentinel1_api)
                    .query(&[("output", "umm_json"), ("granule_list", scene_id)])
                    .send()?
                    .error_for_status()?
                    .json()?;
                match body["results"].as_array().and_then(|r| r.first()) {
                    Some(product) => Ok(Some(scene_from_asf_product(product)?)),
                    None => Ok(None),
                }
            }
        }
    }

    fn search(&self, query: &CatalogQuery) -> PairResult<Vec<Scene>> {
        match query.mission {
            Mission::Sentinel1 => self.asf_search(query),
            mission => {
                let collection = match mission {
                    Mission::Landsat => "landsat-c2l1",
                    _ => "sentinel-2-l1c",
                };
                let mut constraints = serde_json::Map::new();
                for (key, value) in &query.match_keys {
                    constraints.insert(key.clone(), serde_json::json!({"eq": value}));
                }
                let url = reqwest::Url::parse_with_params(
                    &format!("{}/search", self.stac_api(mission)),
                    &[
                        ("collections", collection),
                        (
                            "datetime",
                            &format!("{}/{}", query.start.to_rfc3339(), query.end.to_rfc3339()),
                        ),
                        ("query", &Value::Object(constraints).to_string()),
                    ],
                )
                .map_err(|e| PairError::Catalog(format!("bad search URL: {}", e)))?;
                self.stac_search(mission, url.to_string())
            }
        }
    }

    /// Sentinel-2 inputs are pulled from the public mirror, which lags the
    /// catalog; a scene the mirror does not serve yet must be retried later
    /// rather than submitted.
    fn ensure_retrievable(&self, scene: &Scene) -> PairResult<()> {
        if scene.mission != Mission::Sentinel2 {
            return Ok(());
        }
        let name = scene
            .properties
            .product_uri
            .as_deref()
            .map(|uri| uri.trim_end_matches(".SAFE"))
            .unwrap_or(&scene.id);
        let url = format!("{}/{}", self.sentinel2_mirror, sentinel2_manifest_path(name)?);
        let response = self.http.head(&url).send()?;
        if !response.status().is_success() {
            return Err(PairError::SceneNotRetrievable(format!(
                "{} is not on the Sentinel-2 mirror yet ({})",
                name,
                response.status()
            )));
        }
        Ok(())
    }
}

/// The tile-metadata object key for a Sentinel-2 STAC item, relative to the
/// metadata mirror root.
fn tile_metadata_path(item: &Value) -> Option<String> {
    let href = item["assets"]["tileinfo_metadata"]["href"].as_str()?;
    Some(href.strip_prefix("s3://").unwrap_or(href).to_string())
}

/// The manifest key for a Sentinel-2 product on the public mirror, which
/// lays products out by MGRS tile components taken from the product name.
fn sentinel2_manifest_path(product_name: &str) -> PairResult<String> {
    if !product_name.is_ascii() || product_name.len() < 44 {
        return Err(PairError::InvalidScene(format!(
            "Not a Sentinel-2 product name: {}",
            product_name
        )));
    }
    Ok(format!(
        "{}/{}/{}/{}.SAFE/manifest.safe",
        &product_name[39..41],
        &product_name[41..42],
        &product_name[42..44],
        product_name
    ))
}

fn bbox_from_json(value: &Value) -> PairResult<BoundingBox> {
    let coords: Vec<f64> = value
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default();
    if coords.len() != 4 {
        return Err(PairError::Catalog(format!("Malformed bbox: {}", value)));
    }
    Ok(BoundingBox {
        min_lon: coords[0],
        min_lat: coords[1],
        max_lon: coords[2],
        max_lat: coords[3],
    })
}

/// Convert a STAC item into the engine's scene model.
pub fn scene_from_stac_item(mission: Mission, item: &Value) -> PairResult<Scene> {
    let id = item["id"]
        .as_str()
        .ok_or_else(|| PairError::Catalog("STAC item missing id".to_string()))?
        .to_string();
    let props = &item["properties"];

    let acquired = props["datetime"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| PairError::Catalog(format!("{}: missing or malformed datetime", id)))?;

    let instruments = props["instruments"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect();

    let mgrs_tile = match (
        props["mgrs:utm_zone"].as_u64(),
        props["mgrs:latitude_band"].as_str(),
        props["mgrs:grid_square"].as_str(),
    ) {
        (Some(zone), Some(band), Some(square)) => Some(format!("{:02}{}{}", zone, band, square)),
        _ => None,
    };

    let properties = SceneProperties {
        collection: item["collection"].as_str().unwrap_or_default().to_string(),
        instruments,
        tier: props["landsat:collection_category"].as_str().map(String::from),
        wrs_path: props["landsat:wrs_path"].as_str().map(String::from),
        wrs_row: props["landsat:wrs_row"].as_str().map(String::from),
        off_nadir: props["view:off_nadir"].as_f64(),
        cloud_cover: match mission {
            Mission::Landsat => props["landsat:cloud_cover_land"].as_f64(),
            _ => props["eo:cloud_cover"].as_f64(),
        },
        mgrs_tile,
        grid_code: props["grid:code"].as_str().map(String::from),
        relative_orbit: props["sat:relative_orbit"].as_u64().map(|o| o as u32),
        product_uri: props["s2:product_uri"].as_str().map(String::from),
        data_coverage: props["s2:data_coverage"].as_f64(),
        polarization: None,
        full_burst_id: None,
    };

    Ok(Scene {
        id,
        mission,
        acquired,
        bbox: bbox_from_json(&item["bbox"])?,
        properties,
    })
}

/// Convert an ASF search product into the engine's scene model.
pub fn scene_from_asf_product(product: &Value) -> PairResult<Scene> {
    let props = &product["properties"];
    let id = props["sceneName"]
        .as_str()
        .ok_or_else(|| PairError::Catalog("ASF product missing sceneName".to_string()))?
        .to_string();

    let acquired = props["startTime"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| PairError::Catalog(format!("{}: missing or malformed startTime", id)))?;

    let properties = SceneProperties {
        polarization: props["polarization"].as_str().and_then(Polarization::parse),
        full_burst_id: props["burst"]["fullBurstID"].as_str().map(String::from),
        ..Default::default()
    };

    Ok(Scene {
        id,
        mission: Mission::Sentinel1,
        acquired,
        bbox: bbox_from_json(&product["bbox"])?,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_from_stac_item_landsat() {
        let item: Value = serde_json::from_str(
            r#"{
                "id": "LC08_L1TP_138041_20240128_20240207_02_T1",
                "collection": "landsat-c2l1",
                "bbox": [88.0, 26.0, 90.5, 28.2],
                "properties": {
                    "datetime": "2024-01-28T04:29:49.361022Z",
                    "instruments": ["OLI", "TIRS"],
                    "landsat:collection_category": "T1",
                    "landsat:wrs_path": "138",
                    "landsat:wrs_row": "041",
                    "landsat:cloud_cover_land": 50,
                    "view:off_nadir": 0
                }
            }"#,
        )
        .unwrap();

        let scene = scene_from_stac_item(Mission::Landsat, &item).unwrap();
        assert_eq!(scene.id, "LC08_L1TP_138041_20240128_20240207_02_T1");
        assert_eq!(scene.properties.tier.as_deref(), Some("T1"));
        assert_eq!(scene.properties.wrs_path.as_deref(), Some("138"));
        assert_eq!(scene.properties.cloud_cover, Some(50.0));
        assert_eq!(scene.properties.off_nadir, Some(0.0));
        assert_eq!(scene.bbox.min_lon, 88.0);
    }

    #[test]
    fn test_scene_from_stac_item_sentinel2() {
        let item: Value = serde_json::from_str(
            r#"{
                "id": "S2B_13CES_20200315_0_L1C",
                "collection": "sentinel-2-l1c",
                "bbox": [-106.9, -75.0, -105.5, -74.1],
                "properties": {
                    "datetime": "2020-03-15T15:24:29.455Z",
                    "instruments": ["msi"],
                    "eo:cloud_cover": 28.1884,
                    "mgrs:utm_zone": 13,
                    "mgrs:latitude_band": "C",
                    "mgrs:grid_square": "ES",
                    "grid:code": "MGRS-13CES",
                    "sat:relative_orbit": 39,
                    "s2:product_uri": "S2B_MSIL1C_20200315T152259_N0209_R039_T13CES_20200315T181115.SAFE"
                }
            }"#,
        )
        .unwrap();

        let scene = scene_from_stac_item(Mission::Sentinel2, &item).unwrap();
        assert_eq!(scene.properties.mgrs_tile.as_deref(), Some("13CES"));
        assert_eq!(scene.properties.grid_code.as_deref(), Some("MGRS-13CES"));
        assert_eq!(scene.properties.relative_orbit, Some(39));
        assert_eq!(scene.properties.cloud_cover, Some(28.1884));
        assert!(scene.properties.data_coverage.is_none());
    }

    #[test]
    fn test_scene_from_stac_item_rejects_missing_datetime() {
        let item: Value = serde_json::from_str(
            r#"{"id": "x", "collection": "landsat-c2l1", "bbox": [0,0,1,1], "properties": {}}"#,
        )
        .unwrap();
        assert!(scene_from_stac_item(Mission::Landsat, &item).is_err());
    }

    #[test]
    fn test_tile_metadata_path_strips_scheme() {
        let item: Value = serde_json::from_str(
            r#"{"assets": {"tileinfo_metadata": {"href": "s3://sentinel-s2-l1c/tiles/13/C/ES/2020/3/15/0/tileInfo.json"}}}"#,
        )
        .unwrap();
        assert_eq!(
            tile_metadata_path(&item).as_deref(),
            Some("sentinel-s2-l1c/tiles/13/C/ES/2020/3/15/0/tileInfo.json")
        );
        assert!(tile_metadata_path(&serde_json::json!({})).is_none());
    }

    #[test]
    fn test_sentinel2_manifest_path() {
        let name = "S2B_MSIL1C_20200315T152259_N0209_R039_T13CES_20200315T181115";
        assert_eq!(
            sentinel2_manifest_path(name).unwrap(),
            format!("13/C/ES/{}.SAFE/manifest.safe", name)
        );
        assert!(sentinel2_manifest_path("S2B_MSIL1C").is_err());
    }

    #[test]
    fn test_scene_from_asf_product() {
        let product: Value = serde_json::from_str(
            r#"{
                "bbox": [-48.6, 60.1, -47.3, 61.0],
                "properties": {
                    "sceneName": "S1_247728_IW1_20251003T154900_VV_657C-BURST",
                    "startTime": "2025-10-03T15:49:00+00:00",
                    "polarization": "VV",
                    "burst": {"fullBurstID": "116_247728_IW1"}
                }
            }"#,
        )
        .unwrap();

        let scene = scene_from_asf_product(&product).unwrap();
        assert_eq!(scene.id, "S1_247728_IW1_20251003T154900_VV_657C-BURST");
        assert_eq!(scene.properties.polarization, Some(Polarization::VV));
        assert_eq!(
            scene.properties.full_burst_id.as_deref(),
            Some("116_247728_IW1")
        );
    }
}
