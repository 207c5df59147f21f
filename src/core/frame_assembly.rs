//! Sentinel-1 burst-to-frame assembly.
//!
//! A burst observation belongs to one or two OPERA frames. For each candidate
//! frame the assembler searches the catalog for every member burst's
//! acquisition stack, validates that the frame can be fully reconstructed,
//! groups acquisitions by calendar day, and emits one candidate pair per
//! (frame, earlier qualifying day-group) with the latest day-group as the
//! reference.

use crate::config::{BurstFrameMap, Sentinel1Config};
use crate::io::catalog::{CatalogClient, CatalogQuery};
use crate::types::{
    BoundingBox, CandidatePair, Mission, PairError, PairResult, Polarization, Scene,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};

/// One burst acquisition inside a frame stack.
#[derive(Debug, Clone)]
struct StackRow {
    scene_name: String,
    burst_id: String,
    acquired: DateTime<Utc>,
    day: NaiveDate,
    bbox: BoundingBox,
}

/// Assembles OPERA frame stacks for a reference burst.
pub struct FrameAssembler<'a> {
    catalog: &'a dyn CatalogClient,
    config: &'a Sentinel1Config,
    map: &'a BurstFrameMap,
}

impl<'a> FrameAssembler<'a> {
    pub fn new(
        catalog: &'a dyn CatalogClient,
        config: &'a Sentinel1Config,
        map: &'a BurstFrameMap,
    ) -> Self {
        Self {
            catalog,
            config,
            map,
        }
    }

    /// All candidate pairs for the frames containing the reference burst.
    ///
    /// Incompleteness while reconstructing a frame stack is fatal for the
    /// whole request: the missing burst is usually just not yet ingested
    /// upstream, and the caller retries the scene later.
    pub fn pairs_for_reference_burst(&self, reference: &Scene) -> PairResult<Vec<CandidatePair>> {
        let burst_id = reference.properties.full_burst_id.as_deref().ok_or_else(|| {
            PairError::InvalidScene(format!("{} has no full burst id", reference.id))
        })?;
        let polarization = reference.properties.polarization.ok_or_else(|| {
            PairError::InvalidScene(format!("{} has no polarization", reference.id))
        })?;

        let frame_ids = self.map.frames_for_burst(burst_id);
        if frame_ids.is_empty() {
            return Err(PairError::InvalidScene(format!(
                "Burst {} is not a member of any OPERA frame",
                burst_id
            )));
        }

        let mut pairs = Vec::new();
        for &frame_id in frame_ids {
            let stack = self.build_frame_stack(reference, frame_id, polarization)?;
            pairs.extend(self.pairs_from_stack(frame_id, stack));
        }

        log::debug!(
            "Assembled {} pairs across {} frames for {}",
            pairs.len(),
            frame_ids.len(),
            reference.id
        );
        Ok(pairs)
    }

    /// Search the acquisition stack of every member burst of `frame_id` and
    /// concatenate them into one per-frame table.
    fn build_frame_stack(
        &self,
        reference: &Scene,
        frame_id: u32,
        polarization: Polarization,
    ) -> PairResult<Vec<StackRow>> {
        let members = self.map.bursts_for_frame(frame_id);
        if members.is_empty() {
            return Err(PairError::Config(format!(
                "OPERA frame {} has no member bursts in the frame map",
                frame_id
            )));
        }

        let tolerance = Duration::minutes(self.config.frame_tolerance_minutes);
        let start =
            reference.acquired - Duration::days(self.config.max_pair_separation_days) - tolerance;
        let end = reference.acquired + tolerance;

        let mut rows = Vec::new();
        for member in members {
            let query = CatalogQuery {
                mission: Mission::Sentinel1,
                match_keys: vec![
                    ("fullBurstID".to_string(), member.clone()),
                    ("polarization".to_string(), polarization.to_string()),
                ],
                start,
                end,
            };
            let stack = self.catalog.search(&query)?;

            if stack.is_empty() {
                return Err(PairError::IncompleteFrame(format!(
                    "No bursts found in the search window for {} of frame {}",
                    member, frame_id
                )));
            }

            // The reference pass itself must appear in every member's stack;
            // the tolerance absorbs timing jitter between bursts of one pass.
            let has_reference = stack.iter().any(|scene| {
                (scene.acquired - reference.acquired).abs() <= tolerance
            });
            if !has_reference {
                return Err(PairError::IncompleteFrame(format!(
                    "No reference acquisition for {} within {} minutes of {}",
                    member, self.config.frame_tolerance_minutes, reference.acquired
                )));
            }

            if stack.len() < 2 {
                return Err(PairError::IncompleteFrame(format!(
                    "No secondary acquisitions for {} of frame {}",
                    member, frame_id
                )));
            }

            rows.extend(stack.into_iter().map(|scene| StackRow {
                scene_name: scene.id,
                burst_id: member.clone(),
                day: scene.acquired.date_naive(),
                acquired: scene.acquired,
                bbox: scene.bbox,
            }));
        }

        Ok(rows)
    }

    /// Group a frame stack by acquisition day and emit one pair per earlier
    /// qualifying day-group, with the latest qualifying day-group as the
    /// reference. Day-groups failing validation, and day-groups closer to
    /// the reference than the minimum pair separation, are excluded, not
    /// fatal.
    fn pairs_from_stack(&self, frame_id: u32, rows: Vec<StackRow>) -> Vec<CandidatePair> {
        let mut day_groups: BTreeMap<NaiveDate, Vec<StackRow>> = BTreeMap::new();
        for row in rows {
            day_groups.entry(row.day).or_default().push(row);
        }

        let qualifying: Vec<(NaiveDate, Vec<StackRow>)> = day_groups
            .into_iter()
            .filter(|(day, group)| {
                let burst_ids: HashSet<&str> =
                    group.iter().map(|row| row.burst_id.as_str()).collect();
                let ok = self.day_group_qualifies(&burst_ids, frame_id);
                if !ok {
                    log::debug!(
                        "Excluding day-group {} of frame {}: partial frame ({} bursts)",
                        day,
                        frame_id,
                        burst_ids.len()
                    );
                }
                ok
            })
            .collect();

        if qualifying.len() < 2 {
            log::debug!(
                "Frame {} has {} qualifying day-groups; nothing to pair",
                frame_id,
                qualifying.len()
            );
            return Vec::new();
        }

        let (reference_day, reference_group) = qualifying.last().expect("at least two groups");
        let reference_names = ordered_scene_names(reference_group);
        let reference_acquisition = reference_group
            .iter()
            .map(|row| row.acquired)
            .max()
            .expect("non-empty group");
        let reference_bbox = combined_bbox(reference_group);
        let min_separation = Duration::days(self.config.min_pair_separation_days);

        qualifying[..qualifying.len() - 1]
            .iter()
            .filter(|(day, _)| {
                let far_enough = *reference_day - *day >= min_separation;
                if !far_enough {
                    log::debug!(
                        "Excluding day-group {} of frame {}: within {} days of the reference",
                        day,
                        frame_id,
                        self.config.min_pair_separation_days
                    );
                }
                far_enough
            })
            .map(|(_, secondary_group)| CandidatePair {
                reference: reference_names.clone(),
                secondary: ordered_scene_names(secondary_group),
                reference_acquisition,
                job_name: format!(
                    "OPERA_{}_{}",
                    frame_id,
                    reference_acquisition.format("%Y%m%dT%H%M%S")
                ),
                bbox: reference_bbox.union(&combined_bbox(secondary_group)),
            })
            .collect()
    }

    /// A day-group stands in for its frame only when its burst ids are all
    /// expected members and at least `frame_quorum` of them are present.
    pub fn day_group_qualifies(&self, burst_ids: &HashSet<&str>, frame_id: u32) -> bool {
        let expected: HashSet<&str> = self
            .map
            .bursts_for_frame(frame_id)
            .iter()
            .map(String::as_str)
            .collect();

        burst_ids.is_subset(&expected) && burst_ids.len() >= self.config.frame_quorum
    }
}

fn ordered_scene_names(group: &[StackRow]) -> Vec<String> {
    let mut rows: Vec<&StackRow> = group.iter().collect();
    rows.sort_by(|a, b| a.burst_id.cmp(&b.burst_id));
    rows.iter().map(|row| row.scene_name.clone()).collect()
}

fn combined_bbox(group: &[StackRow]) -> BoundingBox {
    group
        .iter()
        .map(|row| row.bbox)
        .reduce(|a, b| a.union(&b))
        .expect("non-empty group")
}
