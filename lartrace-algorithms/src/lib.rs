//! lartrace-algorithms: Matching and association algorithms for LArTPC events.
//!
//! This crate provides:
//! - **truth** - Hit, truth-particle and pfo attribution with reproducible tie-breaking
//! - **association** - Delta-ray parent/daughter association between pfos
//! - **consolidation** - Reassignment of shower hits that lie along a track
//!
#![warn(missing_docs)]

pub mod association;
pub mod consolidation;
pub mod truth;

pub use association::{AssociationConfig, DeltaRayIdentification, PfoAssociationMap, ResolvedLink};
pub use consolidation::{ClusterToHitMap, ConsolidationConfig, ReclusterPlan, TrackConsolidation};
pub use truth::{
    attribute_hits_to_pfos, attribute_hits_to_truth, attribute_neutrino_truth,
    attribute_pfos_to_truth, collect_hits, extract_target_pfos, hit_set, rank_truth_particles,
    CaloHitList, HitSet, HitToMcMap, HitToPfoMap, McContributionMap, McToPfoMap,
    McToPfoMatchingMap, PfoContributionMap, PfoHitMatches, PfoMatches, TruthHitMatches,
};
