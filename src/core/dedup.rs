//! Two-stage candidate-pair deduplication.
//!
//! Stage one drops pairs already represented by an unfinished job in the job
//! store; stage two drops pairs whose product already exists in the published
//! bucket, bounded by the coarse region tiling. Both stages are best-effort,
//! point-in-time snapshots; nothing here prevents a concurrent invocation
//! from submitting the same pair between query and submission.

use crate::config::{
    Config, LANDSAT_PRODUCT_PREFIX, PRODUCT_SUFFIX, SENTINEL2_PRODUCT_PREFIX,
};
use crate::core::region::regions_from_bounds;
use crate::io::job_api::{JobApi, JobStatus};
use crate::io::object_store::ObjectStore;
use crate::types::{CandidatePair, Mission, PairResult};
use std::collections::{BTreeSet, HashSet};

pub struct Deduplicator<'a> {
    job_api: &'a dyn JobApi,
    object_store: &'a dyn ObjectStore,
    config: &'a Config,
}

impl<'a> Deduplicator<'a> {
    pub fn new(
        job_api: &'a dyn JobApi,
        object_store: &'a dyn ObjectStore,
        config: &'a Config,
    ) -> Self {
        Self {
            job_api,
            object_store,
            config,
        }
    }

    /// Run both stages in order: the in-flight check first since it is
    /// cheaper and mission-agnostic in shape.
    pub fn deduplicate(
        &self,
        mission: Mission,
        pairs: Vec<CandidatePair>,
    ) -> PairResult<Vec<CandidatePair>> {
        let pairs = self.drop_in_flight(pairs)?;
        self.drop_published(mission, pairs)
    }

    /// Drop pairs already represented by a PENDING or RUNNING job.
    ///
    /// The job store indexes by a single status value, so the two statuses
    /// are queried separately and unioned.
    pub fn drop_in_flight(&self, pairs: Vec<CandidatePair>) -> PairResult<Vec<CandidatePair>> {
        if pairs.is_empty() {
            return Ok(pairs);
        }

        let mut in_flight: HashSet<(String, String)> = HashSet::new();
        let mut queried_names: HashSet<String> = HashSet::new();

        for pair in &pairs {
            if !queried_names.insert(pair.job_name.clone()) {
                continue;
            }
            for status in [JobStatus::Pending, JobStatus::Running] {
                let records = self.job_api.find_jobs(
                    &self.config.job_type,
                    &self.config.job_user,
                    &pair.job_name,
                    pair.reference_acquisition,
                    status,
                )?;
                in_flight.extend(
                    records
                        .into_iter()
                        .map(|r| (r.reference.join(" "), r.secondary.join(" "))),
                );
            }
        }

        let before = pairs.len();
        let kept: Vec<CandidatePair> = pairs
            .into_iter()
            .filter(|pair| !in_flight.contains(&pair.key()))
            .collect();
        log::debug!("In-flight dedup: {} of {} pairs remain", kept.len(), before);
        Ok(kept)
    }

    /// Drop pairs whose product already exists in the published bucket.
    ///
    /// Skipped for Sentinel-1: OPERA product filenames are not predictable
    /// from the burst inputs, so published products cannot be searched for.
    pub fn drop_published(
        &self,
        mission: Mission,
        pairs: Vec<CandidatePair>,
    ) -> PairResult<Vec<CandidatePair>> {
        if pairs.is_empty() {
            return Ok(pairs);
        }
        let product_prefix = match mission {
            Mission::Landsat => LANDSAT_PRODUCT_PREFIX,
            Mission::Sentinel2 => SENTINEL2_PRODUCT_PREFIX,
            Mission::Sentinel1 => {
                log::debug!("Skipping published-product dedup for Sentinel-1");
                return Ok(pairs);
            }
        };

        let combined = pairs
            .iter()
            .map(|pair| pair.bbox)
            .reduce(|a, b| a.union(&b))
            .expect("non-empty pair set");
        let regions = regions_from_bounds(
            combined.min_lon,
            combined.min_lat,
            combined.max_lon,
            combined.max_lat,
        );

        let before = pairs.len();
        let mut kept = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if self.pair_is_published(&pair, product_prefix, &regions)? {
                log::debug!("Dropping already-published pair {:?}", pair.key());
            } else {
                kept.push(pair);
            }
        }
        log::debug!("Published dedup: {} of {} pairs remain", kept.len(), before);
        Ok(kept)
    }

    fn pair_is_published(
        &self,
        pair: &CandidatePair,
        product_prefix: &str,
        regions: &BTreeSet<String>,
    ) -> PairResult<bool> {
        let stem = published_key_stem(pair);
        for region in regions {
            let prefix = format!("{}{}/{}", product_prefix, region, stem);
            let keys = self.object_store.list_keys(&prefix)?;
            if keys.iter().any(|key| key.ends_with(PRODUCT_SUFFIX)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// The search-key stem for a pair's published product.
///
/// The store names products with the two scenes ordered alphabetically,
/// regardless of which member is semantically the reference, so the pair is
/// re-sorted here at the storage boundary.
fn published_key_stem(pair: &CandidatePair) -> String {
    let reference = pair.reference.join(" ");
    let secondary = pair.secondary.join(" ");
    let (earliest, latest) = if reference <= secondary {
        (reference, secondary)
    } else {
        (secondary, reference)
    };
    format!("{}_X_{}", earliest, latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::job_api::JobRecord;
    use crate::types::{BoundingBox, JobHandle, PairError};
    use chrono::{DateTime, TimeZone, Utc};
    use std::cell::RefCell;

    struct FakeJobApi {
        records: Vec<JobRecord>,
    }

    impl JobApi for FakeJobApi {
        fn find_jobs(
            &self,
            _job_type: &str,
            _user: &str,
            name: &str,
            _min_time: DateTime<Utc>,
            status: JobStatus,
        ) -> PairResult<Vec<JobRecord>> {
            // Split the canned records across the two statuses to exercise
            // the union.
            let take_pending = |i: usize| i % 2 == 0;
            Ok(self
                .records
                .iter()
                .enumerate()
                .filter(|(i, r)| {
                    r.job_name == name
                        && (take_pending(*i) == (status == JobStatus::Pending))
                })
                .map(|(_, r)| r.clone())
                .collect())
        }

        fn submit(&self, _pairs: &[CandidatePair], _job_type: &str) -> PairResult<Vec<JobHandle>> {
            unimplemented!("not used by dedup tests")
        }
    }

    struct FakeObjectStore {
        keys: Vec<String>,
        prefixes_seen: RefCell<Vec<String>>,
    }

    impl ObjectStore for FakeObjectStore {
        fn list_keys(&self, prefix: &str) -> PairResult<Vec<String>> {
            self.prefixes_seen.borrow_mut().push(prefix.to_string());
            Ok(self
                .keys
                .iter()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            min_lon: -128.0,
            max_lon: -127.0,
            min_lat: 60.0,
            max_lat: 61.0,
        }
    }

    fn pair(reference: &str, secondary: &str) -> CandidatePair {
        CandidatePair {
            reference: vec![reference.to_string()],
            secondary: vec![secondary.to_string()],
            reference_acquisition: Utc.with_ymd_and_hms(2024, 1, 28, 4, 29, 49).unwrap(),
            job_name: reference.to_string(),
            bbox: bbox(),
        }
    }

    fn record(reference: &str, secondary: &str) -> JobRecord {
        JobRecord {
            reference: vec![reference.to_string()],
            secondary: vec![secondary.to_string()],
            job_name: reference.to_string(),
        }
    }

    #[test]
    fn test_in_flight_dedup_drops_matching_keys() {
        let job_api = FakeJobApi {
            records: vec![
                record("LC08_REF", "LC09_SEC_A"),
                record("LC08_REF", "LC09_SEC_B"),
            ],
        };
        let object_store = FakeObjectStore {
            keys: vec![],
            prefixes_seen: RefCell::new(vec![]),
        };
        let config = Config::new("its-live-operator");
        let dedup = Deduplicator::new(&job_api, &object_store, &config);

        let pairs = vec![
            pair("LC08_REF", "LC09_SEC_A"),
            pair("LC08_REF", "LC09_SEC_B"),
            pair("LC08_REF", "LC09_SEC_C"),
        ];
        let kept = dedup.drop_in_flight(pairs).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].secondary, vec!["LC09_SEC_C".to_string()]);
    }

    #[test]
    fn test_in_flight_dedup_with_empty_store_is_noop() {
        let job_api = FakeJobApi { records: vec![] };
        let object_store = FakeObjectStore {
            keys: vec![],
            prefixes_seen: RefCell::new(vec![]),
        };
        let config = Config::new("its-live-operator");
        let dedup = Deduplicator::new(&job_api, &object_store, &config);

        let pairs = vec![pair("LC08_REF", "LC09_SEC_A")];
        let kept = dedup.drop_in_flight(pairs.clone()).unwrap();
        assert_eq!(kept, pairs);
    }

    #[test]
    fn test_published_dedup_resorts_pair_alphabetically() {
        // Reference sorts after its secondary; the stored product key uses
        // the alphabetical order.
        let p = pair("LC09_LATER", "LC08_EARLIER");
        let job_api = FakeJobApi { records: vec![] };
        let object_store = FakeObjectStore {
            keys: vec![
                "velocity_image_pair/landsatOLI/v02/N60W120/LC08_EARLIER_X_LC09_LATER_v02.nc"
                    .to_string(),
            ],
            prefixes_seen: RefCell::new(vec![]),
        };
        let config = Config::new("its-live-operator");
        let dedup = Deduplicator::new(&job_api, &object_store, &config);

        let kept = dedup.drop_published(Mission::Landsat, vec![p]).unwrap();
        assert!(kept.is_empty());
        assert!(object_store
            .prefixes_seen
            .borrow()
            .iter()
            .any(|p| p.contains("/LC08_EARLIER_X_LC09_LATER")));
    }

    #[test]
    fn test_published_dedup_keeps_unpublished_pairs() {
        let job_api = FakeJobApi { records: vec![] };
        let object_store = FakeObjectStore {
            keys: vec![],
            prefixes_seen: RefCell::new(vec![]),
        };
        let config = Config::new("its-live-operator");
        let dedup = Deduplicator::new(&job_api, &object_store, &config);

        let pairs = vec![pair("LC08_REF", "LC09_SEC_A")];
        let kept = dedup.drop_published(Mission::Landsat, pairs.clone()).unwrap();
        assert_eq!(kept, pairs);
    }

    #[test]
    fn test_published_dedup_skipped_for_sentinel1() {
        let job_api = FakeJobApi { records: vec![] };
        let object_store = FakeObjectStore {
            keys: vec!["anything".to_string()],
            prefixes_seen: RefCell::new(vec![]),
        };
        let config = Config::new("its-live-operator");
        let dedup = Deduplicator::new(&job_api, &object_store, &config);

        let pairs = vec![pair("S1_A-BURST", "S1_B-BURST")];
        let kept = dedup.drop_published(Mission::Sentinel1, pairs.clone()).unwrap();
        assert_eq!(kept, pairs);
        assert!(object_store.prefixes_seen.borrow().is_empty());
    }

    #[test]
    fn test_deduplication_is_idempotent() {
        let job_api = FakeJobApi {
            records: vec![record("LC08_REF", "LC09_SEC_A")],
        };
        let object_store = FakeObjectStore {
            keys: vec![
                "velocity_image_pair/landsatOLI/v02/N60W120/LC08_REF_X_LC09_SEC_B_v02.nc"
                    .to_string(),
            ],
            prefixes_seen: RefCell::new(vec![]),
        };
        let config = Config::new("its-live-operator");
        let dedup = Deduplicator::new(&job_api, &object_store, &config);

        let pairs = vec![
            pair("LC08_REF", "LC09_SEC_A"),
            pair("LC08_REF", "LC09_SEC_B"),
            pair("LC08_REF", "LC09_SEC_C"),
        ];
        let once = dedup.deduplicate(Mission::Landsat, pairs).unwrap();
        let twice = dedup.deduplicate(Mission::Landsat, once.clone()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
    }
}
