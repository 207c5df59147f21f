//! Core pairing and deduplication modules

pub mod region;
pub mod qualify;
pub mod pair_search;
pub mod frame_assembly;
pub mod dedup;
pub mod pipeline;

// Re-export main types
pub use dedup::Deduplicator;
pub use frame_assembly::FrameAssembler;
pub use pipeline::Pipeline;
pub use region::{point_to_region, regions_from_bounds};
