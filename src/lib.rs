//! icepair: pairing and deduplication engine for glacier velocity processing
//!
//! Given a newly observed Landsat, Sentinel-2, or Sentinel-1 scene, this
//! library decides whether the scene qualifies for velocity-mapping
//! processing, assembles candidate reference/secondary pairs within the
//! mission's temporal and spatial constraints, removes pairs that are
//! already in flight or already published, and submits the remainder to the
//! processing service.

pub mod config;
pub mod types;
pub mod core;
pub mod io;

// Re-export main types and functions for easier access
pub use config::{BurstFrameMap, Config, LandsatConfig, Sentinel1Config, Sentinel2Config};
pub use core::{point_to_region, regions_from_bounds, Deduplicator, FrameAssembler, Pipeline};
pub use io::{
    CatalogClient, CatalogQuery, HttpCatalogClient, HttpObjectStore, Hyp3Client, JobApi,
    JobRecord, JobStatus, ObjectStore,
};
pub use types::{
    BoundingBox, CandidatePair, JobHandle, Mission, PairError, PairResult, Polarization, Scene,
    SceneProperties,
};
