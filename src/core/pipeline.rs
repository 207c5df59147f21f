//! Pipeline orchestrator: qualify, pair, deduplicate, submit.
//!
//! One `Pipeline` holds the collaborator handles and the read-only
//! configuration; every `process_scene` call is an independent, stateless
//! invocation. A failed invocation is safe to re-run in full because
//! deduplication is re-evaluated against current store state each time.

use crate::config::Config;
use crate::core::dedup::Deduplicator;
use crate::core::frame_assembly::FrameAssembler;
use crate::core::pair_search;
use crate::core::qualify;
use crate::io::catalog::CatalogClient;
use crate::io::job_api::JobApi;
use crate::io::object_store::ObjectStore;
use crate::types::{CandidatePair, JobHandle, Mission, PairError, PairResult, Scene};
use log::Level;

pub struct Pipeline<'a> {
    catalog: &'a dyn CatalogClient,
    job_api: &'a dyn JobApi,
    object_store: &'a dyn ObjectStore,
    config: Config,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        catalog: &'a dyn CatalogClient,
        job_api: &'a dyn JobApi,
        object_store: &'a dyn ObjectStore,
        config: Config,
    ) -> Self {
        Self {
            catalog,
            job_api,
            object_store,
            config,
        }
    }

    /// Qualification-only entry point for diagnostics and backfill tooling.
    pub fn qualifies(&self, scene: &Scene) -> bool {
        qualify::scene_qualifies(scene, &self.config, Level::Info)
    }

    /// The novel, qualifying, deduplicated pairs for a scene, without
    /// submitting anything. A disqualified scene yields an empty set.
    pub fn candidate_pairs(&self, scene_id: &str) -> PairResult<Vec<CandidatePair>> {
        let mission = Mission::from_scene_id(scene_id)?;
        let scene = self
            .catalog
            .get_scene(mission, scene_id)?
            .ok_or_else(|| PairError::SceneNotFound(scene_id.to_string()))?;

        if !qualify::scene_qualifies(&scene, &self.config, Level::Info) {
            return Ok(Vec::new());
        }

        // A qualifying scene the processing service cannot pull yet is an
        // error, so the caller retries the whole invocation later.
        self.catalog.ensure_retrievable(&scene)?;

        let pairs = match mission {
            Mission::Landsat => {
                pair_search::landsat_pairs_for_reference(self.catalog, &scene, &self.config)?
            }
            Mission::Sentinel2 => {
                pair_search::sentinel2_pairs_for_reference(self.catalog, &scene, &self.config)?
            }
            Mission::Sentinel1 => FrameAssembler::new(
                self.catalog,
                &self.config.sentinel1,
                &self.config.burst_frame_map,
            )
            .pairs_for_reference_burst(&scene)?,
        };
        log::info!("Found {} pairs for {}", pairs.len(), scene_id);

        if pairs.is_empty() {
            return Ok(pairs);
        }

        let dedup = Deduplicator::new(self.job_api, self.object_store, &self.config);
        let pairs = dedup.deduplicate(mission, pairs)?;
        log::info!("Deduplicated pairs; {} remaining", pairs.len());

        Ok(pairs)
    }

    /// Full invocation: qualify, pair, deduplicate, and submit in chunks.
    pub fn process_scene(&self, scene_id: &str) -> PairResult<Vec<JobHandle>> {
        let pairs = self.candidate_pairs(scene_id)?;
        self.submit_pairs(&pairs)
    }

    /// Submit a pair set in fixed-size chunks, returning every job handle.
    pub fn submit_pairs(&self, pairs: &[CandidatePair]) -> PairResult<Vec<JobHandle>> {
        let mut handles = Vec::with_capacity(pairs.len());
        for chunk in pairs.chunks(self.config.submission_chunk_size.max(1)) {
            handles.extend(self.job_api.submit(chunk, &self.config.job_type)?);
        }
        log::info!("Submitted {} jobs", handles.len());
        Ok(handles)
    }
}
